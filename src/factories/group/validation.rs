//! Cross-passenger validation of group fare paths

use rusty_money::iso::Currency;
use smallvec::SmallVec;

use crate::{
    context::{SearchContext, SearchVariant, ValidatingCarrierPolicy},
    errors::{RuleErrorCode, SearchError},
    factories::fare_path::FarePath,
    model::{CarrierCode, SegmentSpan},
    validation::Verdict,
};

use super::{GroupFarePath, Rejection};

/// Validates a group, recording its validating carriers and divide party
/// flag on it.
///
/// Returns why the group was rejected, if it was.
pub(super) fn validate(
    context: &SearchContext,
    variant: &SearchVariant,
    required_carrier: Option<&CarrierCode>,
    group: &mut GroupFarePath,
) -> Result<Option<Rejection>, SearchError> {
    let fare_paths = &group.fare_paths;

    if fare_paths.iter().any(|fare_path| fare_path.verdict() == Verdict::Fail) {
        return Ok(Some(Rejection::FarePath));
    }

    if !fare_paths
        .iter()
        .all(|fare_path| variant.accepts_fare_breaks(fare_path.fare_breaks()))
    {
        return Ok(Some(Rejection::FareBreaks));
    }

    let party: SmallVec<[&FarePath; 4]> = fare_paths.iter().map(AsRef::as_ref).collect();

    if party.len() > 1 {
        if !currencies_match(&party) {
            return Ok(Some(Rejection::Currency));
        }

        if !context.rules().validate_accompanied_travel(&party) {
            return Ok(Some(Rejection::AccompaniedTravel));
        }
    }

    let Some(carriers) = shared_validating_carriers(context, &party) else {
        if context.options().validating_carrier_policy == ValidatingCarrierPolicy::Error {
            return Err(SearchError::RuleEngine {
                code: RuleErrorCode::ValidatingCarrier,
                message: "passengers share no validating carrier".to_string(),
            });
        }

        return Ok(Some(Rejection::ValidatingCarrier));
    };

    if let Some(required) = required_carrier
        && !carriers.is_empty()
        && !carriers.contains(required)
    {
        return Ok(Some(Rejection::ValidatingCarrier));
    }

    let divide_party = party.split_first().is_some_and(|(lead, others)| {
        others.iter().any(|fare_path| {
            fare_path.fare_breaks() != lead.fare_breaks() || fare_path.booking_codes() != lead.booking_codes()
        })
    });

    group.validating_carriers = carriers;
    group.divide_party = divide_party;

    if divide_party && context.options().inhibit_split_pnr {
        return Ok(Some(Rejection::DivideParty));
    }

    Ok(None)
}

/// Whether `fare_path` could be ticketed together with `lead` without
/// splitting the party.
pub(super) fn same_party(lead: &FarePath, fare_path: &FarePath) -> bool {
    fare_path.fare_breaks() == lead.fare_breaks() && fare_path.booking_codes() == lead.booking_codes()
}

/// Intersection of every fare path's validating carriers. Unrestricted fare
/// paths are skipped; `None` means the restricted ones share nothing.
fn shared_validating_carriers(context: &SearchContext, party: &[&FarePath]) -> Option<SmallVec<[CarrierCode; 4]>> {
    let mut shared: SmallVec<[CarrierCode; 4]> = SmallVec::new();

    for fare_path in party {
        let carriers = fare_path.validating_carriers();

        if carriers.is_empty() {
            continue;
        }

        if shared.is_empty() {
            shared = carriers.iter().cloned().collect();
            continue;
        }

        shared = context.rules().intersect_validating_carriers(&shared, carriers);

        if shared.is_empty() {
            return None;
        }
    }

    Some(shared)
}

/// Passengers sharing a fare break arrangement must price every component in
/// the same currency. Only adult, child and infant family passenger types are
/// compared.
fn currencies_match(party: &[&FarePath]) -> bool {
    if !party.iter().all(|fare_path| fare_path.pax().matches_currency()) {
        return true;
    }

    let Some((lead, others)) = party.split_first() else {
        return true;
    };

    if others
        .iter()
        .any(|fare_path| fare_path.fare_breaks() != lead.fare_breaks())
    {
        return true;
    }

    let expected = component_currencies(lead);

    others
        .iter()
        .all(|fare_path| component_currencies(fare_path) == expected)
}

fn component_currencies(fare_path: &FarePath) -> SmallVec<[(SegmentSpan, &'static Currency); 6]> {
    let mut components: SmallVec<[(SegmentSpan, &'static Currency); 6]> = fare_path
        .fare_usages()
        .map(|usage| (usage.span(), usage.fare().currency()))
        .collect();

    components.sort_by_key(|(span, _)| *span);

    components
}
