use std::sync::LazyLock;
use regex::Regex;

pub use crate::address::clean::{canonicalize, clean, collapse_whitespace, standardize_state, standardize_zip};
use crate::address::clean::{replace_whole_words, whole_word_alternation};
pub use crate::address::model::AddressComponents;
pub use crate::address::split::split_full_address;
use crate::address::tables::UNIT_DESIGNATORS;
pub use crate::address::unit::{extract_unit, is_po_box, normalize_po_box};

mod clean;
pub mod model;
mod split;
pub mod tables;
mod unit;

/// `APARTMENT` and `SUITE` inside a unit line
static UNIT_WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    let spelled_out = UNIT_DESIGNATORS
        .iter()
        .copied()
        .filter(|(long, short)| long != short && long.chars().all(char::is_alphabetic))
        .collect::<Vec<_>>();
    whole_word_alternation(&spelled_out)
});

/// Normalize already-separated address components.
///
/// When `unit` is empty a unit designator embedded in `street` is moved into
/// `address2`. PO Box lines are rewritten to `PO BOX <n>` and never lose a unit.
pub fn normalize(street: &str, unit: &str, city: &str, state: &str, zip: &str) -> AddressComponents {
    let mut address1 = clean(street);
    let mut address2 = clean(unit);

    if is_po_box(&address1) {
        address1 = normalize_po_box(&address1);
    } else if address2.is_empty() {
        let (rest, extracted) = extract_unit(&address1);
        address1 = rest;
        if let Some(extracted) = extracted {
            address2 = extracted;
        }
    }

    if !address2.is_empty() {
        address2 = collapse_whitespace(&replace_whole_words(&UNIT_WORD_RE, UNIT_DESIGNATORS, &address2));
    }

    AddressComponents {
        address1: collapse_whitespace(&canonicalize(&address1)),
        address2: collapse_whitespace(&canonicalize(&address2)),
        city: clean(city),
        state: standardize_state(state),
        zip: standardize_zip(zip),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use super::*;

    fn components(fields: [&str; 5]) -> AddressComponents {
        let [address1, address2, city, state, zip] = fields.map(str::to_string);
        AddressComponents { address1, address2, city, state, zip }
    }

    #[test]
    fn full_names_are_abbreviated() {
        assert_eq!(
            normalize("123 Main Street", "", "Anytown", "New York", "12345"),
            components(["123 MAIN ST", "", "ANYTOWN", "NY", "12345"])
        );
        assert_eq!(
            normalize("742 Evergreen Terrace", "", "Springfield", "illinois", "62704"),
            components(["742 EVERGREEN TER", "", "SPRINGFIELD", "IL", "62704"])
        );
    }

    #[test]
    fn embedded_unit_moves_to_address2() {
        assert_eq!(
            normalize("456 Elm St Apt 4B", "", "Smallville", "Illinois", "60606-1234"),
            components(["456 ELM ST", "APT 4B", "SMALLVILLE", "IL", "60606-1234"])
        );
        assert_eq!(
            normalize("100 North Broadway Suite 200", "", "Bigcity", "tx", "73301"),
            components(["100 N BROADWAY", "STE 200", "BIGCITY", "TX", "73301"])
        );
        assert_eq!(
            normalize("12-34 W. Maple Avenue, #5", "", "Sample", "Florida", "33101"),
            components(["12-34 W MAPLE AVE", "APT 5", "SAMPLE", "FL", "33101"])
        );
    }

    #[test]
    fn supplied_unit_is_kept_and_street_left_alone() {
        assert_eq!(
            normalize("500 S HIGHWAY 101", "UNIT 3", "Coastal", "oregon", "97101-1234"),
            components(["500 S HWY 101", "UNIT 3", "COASTAL", "OR", "97101-1234"])
        );
        assert_eq!(
            normalize("1 Main St Apt 9", "Suite 4", "X", "CA", "90001"),
            components(["1 MAIN ST APT 9", "STE 4", "X", "CA", "90001"])
        );
    }

    #[test]
    fn spelled_out_unit_words_are_abbreviated() {
        assert_eq!(normalize("1 Main St", "Apartment 2", "", "", "").address2, "APT 2");
        assert_eq!(normalize("1 Main St", "suite 7", "", "", "").address2, "STE 7");
        assert_eq!(normalize("1 Main St", "floor 3", "", "", "").address2, "FLOOR 3");
        assert_eq!(normalize("1 Main St", "Room 12", "", "", "").address2, "ROOM 12");
        assert_eq!(normalize("1 Main St", "#3", "", "", "").address2, "#3");
    }

    #[test]
    fn po_box_is_normalized() {
        assert_eq!(
            normalize("PO Box 789", "", "Post City", "California", "90210"),
            components(["PO BOX 789", "", "POST CITY", "CA", "90210"])
        );
        assert_eq!(normalize("P.O. Box 12", "", "", "", "").address1, "PO BOX 12");
        assert_eq!(normalize("POBOX 12", "Rear", "", "", "").address2, "REAR");
    }

    #[test]
    fn directional_suffix_is_left_as_is() {
        assert_eq!(
            normalize("1600 Pennsylvania Ave NW", "", "Washington", "district of columbia", "20500"),
            components(["1600 PENNSYLVANIA AVE NW", "", "WASHINGTON", "DC", "20500"])
        );
    }

    #[test]
    fn empty_input_gives_empty_components() {
        assert!(normalize("", "", "", "", "").is_empty());
    }

    fn renormalize(first: &AddressComponents) -> AddressComponents {
        let [street, unit, city, state, zip] = first.fields();
        normalize(street, unit, city, state, zip)
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(
            street in "[A-Za-z0-9 ,.#-]{0,30}",
            unit in "[A-Za-z0-9 .#-]{0,10}",
            city in "[A-Za-z .-]{0,15}",
            state in "[A-Za-z .]{0,20}",
            zip in "[0-9 -]{0,12}",
        ) {
            let once = normalize(&street, &unit, &city, &state, &zip);
            prop_assert_eq!(renormalize(&once), once);
        }

        #[test]
        fn street_suffix_words_are_idempotent(
            number in 1u32..99999,
            words in proptest::sample::subsequence(
                vec!["NORTH", "MAPLE", "STREET", "AVENUE", "SUITE", "12", "APT", "4B", "WEST"],
                0..6,
            ),
        ) {
            let street = format!("{number} {}", words.join(" "));
            let once = normalize(&street, "", "", "", "");
            prop_assert_eq!(renormalize(&once), once);
        }
    }
}
