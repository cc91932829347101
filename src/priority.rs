//! Priority metadata
//!
//! Combinations at the same amount are ordered by how well their fares match
//! the request's preferences. Lower values are preferred.

use crate::{context::PricingOptions, model::FareCandidate, prices::Amount};

const DEFAULT_PRIORITY: u8 = 1;
const DEFERRED_PRIORITY: u8 = 2;

/// Preference ranking of a fare or a combination of fares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PriorityStatus {
    /// Fare type preference
    pub fare_priority: u8,

    /// Negotiated fare preference
    pub negotiated_priority: u8,

    /// Substituted passenger type fares rank behind exact ones
    pub pax_type_priority: u8,

    /// Carrier fares rank ahead of industry fares
    pub fare_carrier_type_priority: u8,

    /// Accumulated rank of the fares
    pub rank: u32,
}

impl Default for PriorityStatus {
    fn default() -> Self {
        PriorityStatus {
            fare_priority: DEFAULT_PRIORITY,
            negotiated_priority: DEFAULT_PRIORITY,
            pax_type_priority: DEFAULT_PRIORITY,
            fare_carrier_type_priority: DEFAULT_PRIORITY,
            rank: 0,
        }
    }
}

impl PriorityStatus {
    /// Priority of a single fare under the request's preferences.
    pub fn of_fare(fare: &FareCandidate, options: &PricingOptions) -> Self {
        let deferred_if = |condition: bool| {
            if condition { DEFERRED_PRIORITY } else { DEFAULT_PRIORITY }
        };

        PriorityStatus {
            fare_priority: deferred_if(
                options
                    .preferred_fare_type
                    .is_some_and(|preferred| preferred != fare.fare_type),
            ),
            negotiated_priority: deferred_if(options.prefer_negotiated_fares && !fare.negotiated),
            pax_type_priority: deferred_if(fare.pax_type_substituted),
            fare_carrier_type_priority: deferred_if(fare.industry),
            rank: 0,
        }
    }

    /// Combined priority: the worst of each preference, ranks added.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        PriorityStatus {
            fare_priority: self.fare_priority.max(other.fare_priority),
            negotiated_priority: self.negotiated_priority.max(other.negotiated_priority),
            pax_type_priority: self.pax_type_priority.max(other.pax_type_priority),
            fare_carrier_type_priority: self.fare_carrier_type_priority.max(other.fare_carrier_type_priority),
            rank: self.rank.saturating_add(other.rank),
        }
    }
}

/// Queue key shared by every factory level: amount first, then preferences.
pub type Rank = (Amount, PriorityStatus);

/// Merges the priorities of several parts, starting from the default.
pub fn merged<'a>(parts: impl IntoIterator<Item = &'a PriorityStatus>) -> PriorityStatus {
    parts
        .into_iter()
        .fold(PriorityStatus::default(), |acc, part| acc.merge(part))
}
