use std::io::Write;
use log::warn;
use serde::Serialize;
use crate::address::{normalize, AddressComponents};
use crate::verify::Verify;

/// built-in sample inputs: street, secondary, city, state, zip
pub const SAMPLE_ADDRESSES: [[&str; 5]; 8] = [
    ["123 Main Street", "", "Anytown", "New York", "12345"],
    ["456 Elm St Apt 4B", "", "Smallville", "Illinois", "60606-1234"],
    ["PO Box 789", "", "Post City", "California", "90210"],
    ["100 North Broadway Suite 200", "", "Bigcity", "tx", "73301"],
    ["12-34 W. Maple Avenue, #5", "", "Sample", "Florida", "33101"],
    ["742 Evergreen Terrace", "", "Springfield", "illinois", "62704"],
    ["1600 Pennsylvania Ave NW", "", "Washington", "district of columbia", "20500"],
    ["500 S HIGHWAY 101", "UNIT 3", "Coastal", "oregon", "97101-1234"],
];

/// one line of the sample report
#[derive(Debug, Serialize)]
pub struct SampleRecord {
    case: usize,
    /// `local`, or the name of the verifier
    source: String,
    input: String,
    address1: String,
    address2: String,
    city: String,
    state: String,
    zip: String,
    error: String,
}

impl SampleRecord {
    fn new(case: usize, source: &str, input: &[&str; 5], components: AddressComponents) -> Self {
        Self {
            case,
            source: source.to_string(),
            input: input.join(" | "),
            address1: components.address1,
            address2: components.address2,
            city: components.city,
            state: components.state,
            zip: components.zip,
            error: String::new(),
        }
    }
}

/// Normalize every sample and, given a verifier, add a line with its merged
/// result (or its error) right after the local one.
pub async fn write_samples<W, V>(output: W, verifier: Option<&V>) -> color_eyre::Result<usize>
where
    W: Write,
    V: Verify,
{
    let mut wtr = csv::Writer::from_writer(output);
    let mut written = 0;
    for (idx, input) in SAMPLE_ADDRESSES.iter().enumerate() {
        let case = idx + 1;
        let [street, unit, city, state, zip] = *input;
        let local = normalize(street, unit, city, state, zip);

        wtr.serialize(SampleRecord::new(case, "local", input, local.clone()))?;
        written += 1;

        let Some(verifier) = verifier else {
            continue;
        };
        let record = match verifier.verify(&local).await {
            Ok(verified) => SampleRecord::new(case, verifier.name(), input, local.overlay(verified)),
            Err(e) => {
                warn!("sample [{}]: {} verification failed: {}", case, verifier.name(), e);
                SampleRecord {
                    error: e.to_string(),
                    ..SampleRecord::new(case, verifier.name(), input, AddressComponents::default())
                }
            }
        };
        wtr.serialize(record)?;
        written += 1;
    }
    wtr.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::{Verifier, VerifyError};

    struct Unreachable;

    impl Verify for Unreachable {
        fn name(&self) -> &'static str {
            "USPS"
        }

        async fn verify(&self, _address: &AddressComponents) -> Result<AddressComponents, VerifyError> {
            Err(VerifyError::Transport("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn samples_are_normalized_locally() {
        let mut output = Vec::new();
        let written = write_samples(&mut output, None::<&Verifier>).await.unwrap();
        assert_eq!(written, 8);

        let output = String::from_utf8(output).unwrap();
        let lines = output.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "case,source,input,address1,address2,city,state,zip,error");
        assert_eq!(
            lines[5],
            "5,local,\"12-34 W. Maple Avenue, #5 |  | Sample | Florida | 33101\",12-34 W MAPLE AVE,APT 5,SAMPLE,FL,33101,"
        );
        assert_eq!(lines.len(), 9);
    }

    #[tokio::test]
    async fn verifier_errors_are_reported_per_case() {
        let mut output = Vec::new();
        let written = write_samples(&mut output, Some(&Unreachable)).await.unwrap();
        assert_eq!(written, 16);

        let output = String::from_utf8(output).unwrap();
        let line = output.lines().nth(2).unwrap();
        assert!(line.starts_with("1,USPS,"));
        assert!(line.ends_with(",,,,,,request error: connection refused"));
    }
}
