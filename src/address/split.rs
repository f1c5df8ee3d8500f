use std::sync::LazyLock;
use regex::Regex;
use crate::address::clean::{collapse_whitespace, standardize_state};
use crate::address::model::AddressComponents;
use crate::address::normalize;
use crate::address::tables::STATES;
use crate::address::unit::extract_unit;

/// 5-digit ZIP with optional +4, bounded on the right only so `IL62704`
/// still yields a ZIP; the first match in a substring wins
static ZIP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]{5}(?:-[0-9]{4})?\b").expect("valid regex"));

/// un-normalized pieces of a combined address
#[derive(Debug, Default, PartialEq, Eq)]
struct RawParts {
    street: String,
    unit: String,
    city: String,
    state: String,
    zip: String,
}

impl RawParts {
    /// street portion still carries the unit; pull it out
    fn with_street(street: &str, city: &str, state: &str, zip: &str) -> Self {
        let (street, unit) = extract_unit(street);
        Self {
            street,
            unit: unit.unwrap_or_default(),
            city: city.to_string(),
            state: state.to_string(),
            zip: zip.to_string(),
        }
    }
}

/// Parse a combined address such as `123 Main St, Apt 4, Springfield, IL 62704`
/// and normalize the result.
pub fn split_full_address(text: &str) -> AddressComponents {
    let parts = split_parts(text);
    normalize(&parts.street, &parts.unit, &parts.city, &parts.state, &parts.zip)
}

fn split_parts(text: &str) -> RawParts {
    // line breaks are whitespace too
    let text = collapse_whitespace(text);
    if text.is_empty() {
        return RawParts::default();
    }

    let segments = text
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    match segments.as_slice() {
        [street @ .., city, tail] if !street.is_empty() => split_segments(street, city, tail),
        [street, rest] => split_two_segments(street, rest),
        _ => split_single_segment(&text),
    }
}

/// `street..., city, state zip`
fn split_segments(street: &[&str], city: &str, tail: &str) -> RawParts {
    let (state, zip) = take_zip(tail);

    // `street, city, state, zip`: the tail only held the ZIP
    if state.is_empty() && street.len() >= 2 && is_known_state(city) {
        if let Some((actual_city, street)) = street.split_last() {
            if could_be_city(actual_city) {
                return RawParts::with_street(&street.join(", "), actual_city, city, zip);
            }
        }
    }

    RawParts::with_street(&street.join(", "), city, state, zip)
}

/// `street, city state zip`
fn split_two_segments(street: &str, rest: &str) -> RawParts {
    let (city_state, zip) = take_zip(rest);
    let tokens = city_state.split_whitespace().collect::<Vec<_>>();
    match tokens.split_last() {
        Some((state, city)) => RawParts::with_street(street, &city.join(" "), state, zip),
        None => RawParts::with_street(street, city_state, "", zip),
    }
}

/// No commas to go by: only split off a state when a plausible trailing
/// state token follows something that looks like a street number.
fn split_single_segment(text: &str) -> RawParts {
    let (before_zip, zip) = take_zip(text);
    let tokens = before_zip.split_whitespace().collect::<Vec<_>>();
    let has_number = tokens
        .iter()
        .any(|token| token.chars().any(|c| c.is_ascii_digit()));

    let mut parts = RawParts {
        street: before_zip.to_string(),
        zip: zip.to_string(),
        ..Default::default()
    };
    if !has_number {
        return parts;
    }

    if let Some(last) = tokens.last() {
        let plausible_state = last.chars().count() == 2 || last.chars().all(char::is_alphabetic);
        if tokens.len() >= 3 && plausible_state {
            parts.state = last.to_string();
            // the token before the state is dropped rather than guessed as a city
            parts.street = tokens[..tokens.len() - 2].join(" ");
        }
    }
    parts
}

/// split `text` around its first ZIP: (text before the ZIP, ZIP)
fn take_zip(text: &str) -> (&str, &str) {
    match ZIP_RE.find(text) {
        Some(zip) => (text[..zip.start()].trim(), zip.as_str()),
        None => (text.trim(), ""),
    }
}

/// `Suite 200` or `Bldg 4` belong to the street, not the city
fn could_be_city(segment: &str) -> bool {
    !segment.chars().any(|c| c.is_ascii_digit()) && extract_unit(segment).1.is_none()
}

fn is_known_state(text: &str) -> bool {
    let code = standardize_state(text);
    STATES.iter().any(|(_, known)| *known == code)
}
