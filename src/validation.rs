//! Rule validation
//!
//! The rule categories themselves live outside this crate. Factories call a
//! [`RuleValidator`] at each level and only act on its verdicts.

use smallvec::SmallVec;

use crate::{
    errors::SearchError,
    factories::{
        fare_path::FarePath,
        pricing_unit::{FareUsage, PricingUnit},
    },
    model::{CarrierCode, FareCandidate, Market, PaxKind, PaxType},
};

/// Outcome of validating a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// Valid.
    Pass,

    /// Valid with a warning; only acceptable under command pricing.
    SoftPass,

    /// Invalid.
    Fail,
}

impl Verdict {
    /// Combines two verdicts, keeping the worse one.
    #[must_use]
    pub fn and(self, other: Verdict) -> Verdict {
        match (self, other) {
            (Verdict::Fail, _) | (_, Verdict::Fail) => Verdict::Fail,
            (Verdict::SoftPass, _) | (_, Verdict::SoftPass) => Verdict::SoftPass,
            (Verdict::Pass, Verdict::Pass) => Verdict::Pass,
        }
    }

    /// Whether the candidate is kept, given the command pricing switch.
    pub fn accepts(self, command_pricing: bool) -> bool {
        match self {
            Verdict::Pass => true,
            Verdict::SoftPass => command_pricing,
            Verdict::Fail => false,
        }
    }
}

impl From<bool> for Verdict {
    fn from(valid: bool) -> Self {
        if valid { Verdict::Pass } else { Verdict::Fail }
    }
}

/// Rule engine seam.
///
/// Every method has a permissive default so implementations only override the
/// levels they care about. Returning an error aborts the itinerary being
/// priced.
pub trait RuleValidator: Send + Sync {
    /// Validates one fare in one market for one passenger type.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::RuleEngine`] when the rule data cannot be processed.
    fn validate_fare(&self, _pax: &PaxType, _market: &Market, _fare: &FareCandidate) -> Result<Verdict, SearchError> {
        Ok(Verdict::Pass)
    }

    /// Validates a complete pricing unit.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::RuleEngine`] when the rule data cannot be processed.
    fn validate_pricing_unit(&self, _pax: &PaxType, _unit: &PricingUnit) -> Result<Verdict, SearchError> {
        Ok(Verdict::Pass)
    }

    /// Checks that the pricing units of a fare path may be combined.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::RuleEngine`] when the rule data cannot be processed.
    fn validate_combinability(&self, _fare_path: &FarePath) -> Result<bool, SearchError> {
        Ok(true)
    }

    /// Checks accompanied travel restrictions across a party.
    fn validate_accompanied_travel(&self, party: &[&FarePath]) -> bool {
        accompanied_travel_satisfied(party)
    }

    /// Carriers allowed by both lists, in the order of `a`.
    fn intersect_validating_carriers(&self, a: &[CarrierCode], b: &[CarrierCode]) -> SmallVec<[CarrierCode; 4]> {
        a.iter().filter(|carrier| b.contains(carrier)).cloned().collect()
    }
}

/// Validator that accepts everything and applies the default party checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveRules;

impl RuleValidator for PermissiveRules {}

/// Every restricted child or infant fare is escorted by an adult fare path of
/// the party. Parties without adults are not checked here.
pub fn accompanied_travel_satisfied(party: &[&FarePath]) -> bool {
    let adults: SmallVec<[&FarePath; 4]> = party
        .iter()
        .copied()
        .filter(|fare_path| fare_path.pax().kind() == PaxKind::Adult)
        .collect();

    if adults.is_empty() {
        return true;
    }

    party
        .iter()
        .filter(|fare_path| fare_path.pax().kind() != PaxKind::Adult)
        .flat_map(|fare_path| fare_path.fare_usages())
        .filter(|usage| usage.fare().accompanied.is_restricted())
        .all(|usage| adults.iter().any(|adult| escorts(adult, usage)))
}

fn escorts(adult: &FarePath, usage: &FareUsage) -> bool {
    let rule = usage.fare().accompanied;
    let span = usage.span();

    adult.fare_usages().any(|escort| {
        let covers = if rule.same_fare_break {
            escort.span() == span
        } else {
            escort.span().first <= span.first && span.first <= escort.span().last
        };

        covers && (!rule.same_cabin || escort.fare().cabin == usage.fare().cabin)
    })
}
