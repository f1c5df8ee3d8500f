use serde::Serialize;

/// the five components of a normalized U.S. address
///
/// Every field is either empty or upper-cased, punctuation-stripped text.
#[derive(Debug, Default, Hash, PartialEq, Eq, Clone, Serialize)]
pub struct AddressComponents {
    /// primary street line
    pub address1: String,
    /// secondary / unit line, i.e. `APT 4B`
    pub address2: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

impl AddressComponents {
    /// all five components in output column order
    pub fn fields(&self) -> [&str; 5] {
        [
            &self.address1,
            &self.address2,
            &self.city,
            &self.state,
            &self.zip,
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|f| f.is_empty())
    }

    /// take every non-empty component of `preferred`, keep `self` for the rest
    pub fn overlay(self, preferred: AddressComponents) -> Self {
        fn pick(preferred: String, fallback: String) -> String {
            if preferred.is_empty() {
                fallback
            } else {
                preferred
            }
        }

        Self {
            address1: pick(preferred.address1, self.address1),
            address2: pick(preferred.address2, self.address2),
            city: pick(preferred.city, self.city),
            state: pick(preferred.state, self.state),
            zip: pick(preferred.zip, self.zip),
        }
    }
}
