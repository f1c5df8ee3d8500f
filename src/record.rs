use csv::StringRecord;
use crate::address::AddressComponents;

/// names of the five generated components, in output order
pub const COMPONENT_NAMES: [&str; 5] = ["address1", "address2", "city", "state", "zip"];

/// Header layout of an output file: every input column verbatim, followed by
/// the five generated component columns.
#[derive(Debug)]
pub struct OutputLayout {
    headers: Vec<String>,
    input_len: usize,
}

impl OutputLayout {
    /// Generated columns are named `{prefix}{name}`; a name already taken gets
    /// `_1`, `_2`, ... appended until it is free.
    pub fn new<S: AsRef<str>>(input_headers: &[String], names: &[S], prefix: &str) -> Self {
        let mut headers = input_headers.to_vec();
        for name in names {
            let base = format!("{}{}", prefix, name.as_ref());
            let mut candidate = base.clone();
            let mut suffix = 1;
            while headers.contains(&candidate) {
                candidate = format!("{}_{}", base, suffix);
                suffix += 1;
            }
            headers.push(candidate);
        }
        Self {
            headers,
            input_len: input_headers.len(),
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn generated(&self) -> &[String] {
        &self.headers[self.input_len..]
    }

    /// input fields padded or cut to the input header width, then the components
    pub fn row(&self, input: &[String], components: &AddressComponents) -> StringRecord {
        let mut record = StringRecord::with_capacity(0, self.headers.len());
        for idx in 0..self.input_len {
            record.push_field(input.get(idx).map(String::as_str).unwrap_or_default());
        }
        for field in components.fields() {
            record.push_field(field);
        }
        record
    }
}

/// position of `name` among `headers`, ignoring case and surrounding whitespace
pub fn find_column(headers: &[String], name: &str) -> Option<usize> {
    let wanted = name.trim().to_lowercase();
    headers.iter().position(|h| h.trim().to_lowercase() == wanted)
}
