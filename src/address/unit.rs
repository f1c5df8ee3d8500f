use std::sync::LazyLock;
use regex::{Captures, Regex};
use crate::address::clean::collapse_whitespace;
use crate::address::tables::{lookup, UNIT_DESIGNATORS};

static PO_BOX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bP\.?O\.?\s*BOX\b").expect("valid regex"));

/// designator at the very end of the line, i.e. `... APT 4B`
static TRAILING_UNIT_RE: LazyLock<Regex> = LazyLock::new(|| unit_regex(r"\b", "$"));

/// designator anywhere after a comma or whitespace, i.e. `... STE 300 REAR`
static MID_UNIT_RE: LazyLock<Regex> = LazyLock::new(|| unit_regex(r"[,\s]\s*", r"\b"));

fn unit_regex(lead: &str, tail: &str) -> Regex {
    let designators = UNIT_DESIGNATORS
        .iter()
        .map(|(designator, _)| regex::escape(designator))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(
        r"(?i){lead}(?P<designator>{designators})(?P<sep>\.?\s*#?:?\s*)(?P<value>[A-Z0-9-]+){tail}"
    ))
        .expect("valid unit regex")
}

pub fn is_po_box(text: &str) -> bool {
    PO_BOX_RE.is_match(text)
}

/// rewrite any `P.O. BOX` spelling to `PO BOX` and drop periods
pub fn normalize_po_box(text: &str) -> String {
    let replaced = PO_BOX_RE.replace_all(text, "PO BOX").replace('.', "");
    collapse_whitespace(&replaced)
}

/// A designator/value pair located in a street line.
#[derive(Debug)]
struct UnitMatch {
    start: usize,
    end: usize,
    unit: String,
}

impl UnitMatch {
    /// `None` when the designator is glued to a word, as in `UNITED` or `FLORIDA`
    fn from_captures(caps: &Captures) -> Option<Self> {
        let whole = caps.get(0)?;
        let designator = caps.name("designator")?.as_str().to_uppercase();
        let sep = caps.name("sep")?.as_str();
        let value = caps.name("value")?.as_str();

        let glued_to_word = sep.is_empty()
            && designator != "#"
            && value.starts_with(|c: char| c.is_alphabetic());
        if glued_to_word {
            return None;
        }

        let canonical = lookup(UNIT_DESIGNATORS, &designator).unwrap_or(designator.as_str());
        Some(Self {
            start: whole.start(),
            end: whole.end(),
            unit: format!("{} {}", canonical, value.to_uppercase()),
        })
    }
}

fn find_unit(re: &Regex, text: &str) -> Option<UnitMatch> {
    re.captures_iter(text)
        .find_map(|caps| UnitMatch::from_captures(&caps))
}

/// Split a secondary unit designator off a street line.
///
/// A designator ending the line wins over one in the middle; at most one unit
/// is extracted. PO Box lines never carry a unit.
pub fn extract_unit(street: &str) -> (String, Option<String>) {
    let text = collapse_whitespace(&street.replace(',', " "));
    if is_po_box(&text) {
        return (text, None);
    }

    if let Some(found) = find_unit(&TRAILING_UNIT_RE, &text) {
        let rest = text[..found.start].trim().to_string();
        return (rest, Some(found.unit));
    }

    if let Some(found) = find_unit(&MID_UNIT_RE, &text) {
        let rest = format!("{}{}", &text[..found.start], &text[found.end..]);
        return (collapse_whitespace(&rest), Some(found.unit));
    }

    (text, None)
}
