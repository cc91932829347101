//! Passengers

use serde::{Deserialize, Serialize};

use super::codes::PaxTypeCode;

/// Broad passenger category used by accompanied travel rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaxKind {
    /// Adult or any other passenger travelling on their own.
    Adult,

    /// Child.
    Child,

    /// Infant, with or without a seat.
    Infant,
}

/// A passenger type on the request and how many travellers share it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaxType {
    code: PaxTypeCode,
    count: u32,
    kind: PaxKind,
}

impl PaxType {
    /// Creates a passenger type, inferring its kind from the code.
    pub fn new(code: impl Into<PaxTypeCode>, count: u32) -> Self {
        let code = code.into();
        let kind = kind_of(&code);

        PaxType { code, count, kind }
    }

    /// Creates a passenger type with an explicit kind.
    pub fn with_kind(code: impl Into<PaxTypeCode>, count: u32, kind: PaxKind) -> Self {
        PaxType {
            code: code.into(),
            count,
            kind,
        }
    }

    /// Passenger type code
    pub fn code(&self) -> &PaxTypeCode {
        &self.code
    }

    /// Number of travellers of this type
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Passenger category
    pub fn kind(&self) -> PaxKind {
        self.kind
    }

    /// Whether fares for this type take part in cross-passenger currency
    /// matching.
    ///
    /// Only the adult, military, senior, child and infant families qualify,
    /// plus the `C`/`I` + age style codes such as `C09`.
    pub fn matches_currency(&self) -> bool {
        const FAMILIES: [&str; 7] = ["ADT", "MIL", "SRC", "CNN", "INF", "INS", "SNN"];

        let code = self.code.as_str();

        if FAMILIES.contains(&code) {
            return true;
        }

        let mut chars = code.chars();

        matches!(
            (chars.next(), chars.next(), chars.next(), chars.next()),
            (Some(letter), Some(first), Some(second), None)
                if letter.is_ascii_alphabetic() && first.is_ascii_digit() && second.is_ascii_digit()
        )
    }
}

fn kind_of(code: &PaxTypeCode) -> PaxKind {
    match code.as_str() {
        "INF" | "INS" => PaxKind::Infant,
        "CNN" | "CHD" | "UNN" => PaxKind::Child,
        other if other.starts_with('C') && other.chars().skip(1).all(|c| c.is_ascii_digit()) && other.len() == 3 => {
            PaxKind::Child
        }
        _ => PaxKind::Adult,
    }
}
