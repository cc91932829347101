//! Fares

use std::sync::Arc;

use rusty_money::{Money, iso::Currency};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::prices::Amount;

use super::codes::{BookingCode, BrandCode, CarrierCode, FareClass};

/// Cabin of service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cabin {
    /// First
    First,

    /// Business
    Business,

    /// Premium economy
    PremiumEconomy,

    /// Economy
    Economy,
}

/// Fare type group used by fare type matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FareTypeGroup {
    /// Normal (unrestricted) fares.
    Normal,

    /// Special (restricted, excursion, promotional) fares.
    Special,
}

/// One-way / round-trip tariff tag of a fare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripTariff {
    /// One-way fare that may be doubled into a half round trip.
    #[default]
    OneWayOrHalfRoundTrip,

    /// Round-trip fare, only usable in round, circle or open-jaw trips.
    RoundTrip,

    /// One-way fare that may not be doubled.
    OneWayOnly,
}

/// Accompanied travel requirements carried by child and infant fares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccompaniedTravel {
    /// The accompanying adult must use the same fare breaks.
    #[serde(default)]
    pub same_fare_break: bool,

    /// The accompanying adult must travel in the same cabin.
    #[serde(default)]
    pub same_cabin: bool,
}

impl AccompaniedTravel {
    /// Whether any restriction applies.
    pub fn is_restricted(&self) -> bool {
        self.same_fare_break || self.same_cabin
    }
}

/// A priced fare option for one market and one passenger type.
///
/// Candidates come from the fare source already ranked and are never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct FareCandidate {
    /// Fare basis code
    pub fare_class: FareClass,

    /// Owning carrier
    pub carrier: CarrierCode,

    /// Amount used for ranking
    pub amount: Amount,

    /// Published amount in the fare's own currency
    pub published: Money<'static, Currency>,

    /// Fare type group
    pub fare_type: FareTypeGroup,

    /// Cabin of service
    pub cabin: Cabin,

    /// Booking codes, one per travel segment of the market
    pub booking_codes: SmallVec<[BookingCode; 4]>,

    /// One-way / round-trip tag
    pub tariff: TripTariff,

    /// Carriers allowed to validate a ticket with this fare; empty means any
    pub validating_carriers: SmallVec<[CarrierCode; 4]>,

    /// Negotiated (private) fare
    pub negotiated: bool,

    /// Industry (multilateral) fare rather than a carrier fare
    pub industry: bool,

    /// Fare published for another passenger type and substituted
    pub pax_type_substituted: bool,

    /// Accompanied travel restrictions
    pub accompanied: AccompaniedTravel,

    /// Mileage surcharge percentage applied to the fare
    pub mileage_surcharge: u8,

    /// Change penalty, if the fare carries one
    pub penalty: Option<Amount>,

    /// Fare family brand
    pub brand: Option<BrandCode>,
}

impl FareCandidate {
    /// Creates a normal economy candidate with no restrictions.
    pub fn new(
        fare_class: impl Into<FareClass>,
        carrier: impl Into<CarrierCode>,
        amount: Amount,
        published: Money<'static, Currency>,
    ) -> Self {
        FareCandidate {
            fare_class: fare_class.into(),
            carrier: carrier.into(),
            amount,
            published,
            fare_type: FareTypeGroup::Normal,
            cabin: Cabin::Economy,
            booking_codes: SmallVec::new(),
            tariff: TripTariff::default(),
            validating_carriers: SmallVec::new(),
            negotiated: false,
            industry: false,
            pax_type_substituted: false,
            accompanied: AccompaniedTravel::default(),
            mileage_surcharge: 0,
            penalty: None,
            brand: None,
        }
    }

    /// Currency the fare is published in.
    pub fn currency(&self) -> &'static Currency {
        self.published.currency()
    }

    /// Sets the fare type group.
    #[must_use]
    pub fn with_fare_type(mut self, fare_type: FareTypeGroup) -> Self {
        self.fare_type = fare_type;
        self
    }

    /// Sets the cabin.
    #[must_use]
    pub fn with_cabin(mut self, cabin: Cabin) -> Self {
        self.cabin = cabin;
        self
    }

    /// Sets the booking codes.
    #[must_use]
    pub fn with_booking_codes<I, B>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<BookingCode>,
    {
        self.booking_codes = codes.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the one-way / round-trip tag.
    #[must_use]
    pub fn with_tariff(mut self, tariff: TripTariff) -> Self {
        self.tariff = tariff;
        self
    }

    /// Sets the validating carriers.
    #[must_use]
    pub fn with_validating_carriers<I, C>(mut self, carriers: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<CarrierCode>,
    {
        self.validating_carriers = carriers.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the accompanied travel restrictions.
    #[must_use]
    pub fn with_accompanied(mut self, accompanied: AccompaniedTravel) -> Self {
        self.accompanied = accompanied;
        self
    }

    /// Sets the change penalty.
    #[must_use]
    pub fn with_penalty(mut self, penalty: Amount) -> Self {
        self.penalty = Some(penalty);
        self
    }

    /// Sets the brand.
    #[must_use]
    pub fn with_brand(mut self, brand: impl Into<BrandCode>) -> Self {
        self.brand = Some(brand.into());
        self
    }
}

/// Ranked candidate list for one market slot, shared read-only.
pub type CandidateList = Arc<[Arc<FareCandidate>]>;

#[cfg(test)]
mod tests {
    use rusty_money::iso;

    use super::*;

    #[test]
    fn new_candidate_is_unrestricted_economy() {
        let fare = FareCandidate::new("Y", "BA", Amount::from(100), Money::from_minor(10_000, iso::GBP));

        assert_eq!(fare.cabin, Cabin::Economy);
        assert_eq!(fare.fare_type, FareTypeGroup::Normal);
        assert_eq!(fare.currency(), iso::GBP);
        assert!(!fare.accompanied.is_restricted());
    }

    #[test]
    fn builders_set_fields() {
        let fare = FareCandidate::new("QOW", "AA", Amount::from(80), Money::from_minor(8_000, iso::USD))
            .with_fare_type(FareTypeGroup::Special)
            .with_booking_codes(["Q", "Q"])
            .with_validating_carriers(["AA"])
            .with_accompanied(AccompaniedTravel {
                same_fare_break: true,
                same_cabin: false,
            });

        assert_eq!(fare.booking_codes.len(), 2);
        assert_eq!(fare.validating_carriers.first(), Some(&CarrierCode::from("AA")));
        assert!(fare.accompanied.is_restricted());
    }
}
