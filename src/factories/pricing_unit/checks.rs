//! Pricing unit checks

use crate::{
    context::SearchContext,
    errors::SearchError,
    model::{CountryCode, FareCandidate, FareTypeGroup, Market, OpenJawKind, PaxType, PuKind, TripTariff},
    validation::Verdict,
};

use super::FareUsage;

/// Checks of a single fare in a single slot. The verdict only depends on the
/// candidate, so callers memoise it per candidate index.
pub(super) fn fare_verdict(
    context: &SearchContext,
    pax: &PaxType,
    market: &Market,
    fare: &FareCandidate,
) -> Result<Verdict, SearchError> {
    let options = context.options();

    let rejected = options
        .alternate_currency
        .is_some_and(|currency| currency != fare.currency())
        || (!fare.booking_codes.is_empty() && fare.booking_codes.len() != market.span.len())
        || (!options.fare_type_groups.is_empty() && !options.fare_type_groups.contains(&fare.fare_type))
        || options
            .governing_carrier_override
            .as_ref()
            .is_some_and(|carrier| carrier != &fare.carrier)
        || (options.force_corporate_fares && !fare.negotiated);

    if rejected {
        return Ok(Verdict::Fail);
    }

    let mut verdict = Verdict::Pass;

    if options.cabin.is_some_and(|cabin| cabin != fare.cabin) {
        if !options.command_pricing {
            return Ok(Verdict::Fail);
        }

        verdict = Verdict::SoftPass;
    }

    Ok(verdict.and(context.rules().validate_fare(pax, market, fare)?))
}

/// One-way-only fares cannot be doubled and round-trip fares cannot price a
/// one way unit.
pub(super) fn tariff_compatible(kind: PuKind, usages: &[FareUsage]) -> bool {
    usages.iter().all(|usage| match usage.fare().tariff {
        TripTariff::OneWayOnly => !kind.is_doubled(),
        TripTariff::RoundTrip => kind.is_doubled(),
        TripTariff::OneWayOrHalfRoundTrip => true,
    })
}

pub(super) fn single_currency(usages: &[FareUsage]) -> bool {
    let mut currencies = usages.iter().map(|usage| usage.fare().currency());

    currencies
        .next()
        .is_none_or(|first| currencies.all(|currency| currency == first))
}

/// International round trips, circle trips and open jaws must use fares with
/// the same mileage surcharge.
pub(super) fn mileage_consistent(kind: PuKind, usages: &[FareUsage]) -> bool {
    if !kind.is_doubled() || !usages.iter().any(|usage| usage.market().is_international()) {
        return true;
    }

    let mut surcharges = usages.iter().map(|usage| usage.fare().mileage_surcharge);

    surcharges
        .next()
        .is_none_or(|first| surcharges.all(|surcharge| surcharge == first))
}

/// Normal fares may only open a jaw within one country or one IATA area.
pub(super) fn open_jaw_surface(kind: PuKind, usages: &[FareUsage]) -> bool {
    let PuKind::OpenJaw(jaw) = kind else {
        return true;
    };

    if usages.iter().any(|usage| usage.fare().fare_type == FareTypeGroup::Special) {
        return true;
    }

    let (Some(outbound), Some(inbound)) = (usages.first(), usages.last()) else {
        return true;
    };

    let (outbound, inbound) = (outbound.market(), inbound.market());

    let surface = |from_country: &CountryCode, from_area: u8, to_country: &CountryCode, to_area: u8| {
        from_country == to_country || from_area == to_area
    };

    let turnaround = || {
        surface(
            &outbound.destination_country,
            outbound.destination_area,
            &inbound.origin_country,
            inbound.origin_area,
        )
    };
    let origin = || {
        surface(
            &inbound.destination_country,
            inbound.destination_area,
            &outbound.origin_country,
            outbound.origin_area,
        )
    };

    match jaw {
        OpenJawKind::Origin => origin(),
        OpenJawKind::Turnaround => turnaround(),
        OpenJawKind::Double => origin() && turnaround(),
    }
}

/// Whether a circle trip is built only from special fares and leaves the
/// country, which caps its number of fare components.
pub(super) fn special_international(usages: &[FareUsage]) -> bool {
    usages.iter().all(|usage| usage.fare().fare_type == FareTypeGroup::Special)
        && usages.iter().any(|usage| usage.market().is_international())
}
