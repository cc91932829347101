//! Codes

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! code_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new code
            pub fn new(code: impl Into<String>) -> Self {
                Self(code.into())
            }

            /// The code as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(code: &str) -> Self {
                Self(code.to_string())
            }
        }

        impl From<String> for $name {
            fn from(code: String) -> Self {
                Self(code)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

code_type!(
    /// Airline designator, e.g. `BA`.
    CarrierCode
);

code_type!(
    /// Airport or city code, e.g. `LHR`.
    LocCode
);

code_type!(
    /// Country code, e.g. `GB`.
    CountryCode
);

code_type!(
    /// Reservation booking designator, e.g. `Y`.
    BookingCode
);

code_type!(
    /// Passenger type code, e.g. `ADT`.
    PaxTypeCode
);

code_type!(
    /// Fare basis / fare class code.
    FareClass
);

code_type!(
    /// Fare family brand code.
    BrandCode
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_compare_by_value() {
        assert_eq!(CarrierCode::from("BA"), CarrierCode::new("BA".to_string()));
        assert_ne!(CarrierCode::from("BA"), CarrierCode::from("AA"));
        assert_eq!(LocCode::from("LHR").to_string(), "LHR");
        assert_eq!(PaxTypeCode::from("ADT").as_str(), "ADT");
    }
}
