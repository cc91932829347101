//! Fare Fixtures

use std::str::FromStr;

use rust_decimal::Decimal;
use rusty_money::{Money, iso};
use serde::Deserialize;

use crate::{
    fixtures::FixtureError,
    model::{AccompaniedTravel, Cabin, FareCandidate, FareTypeGroup, TripTariff},
    prices::Amount,
};

/// Wrapper for fares in YAML
#[derive(Debug, Deserialize)]
pub struct FaresFixture {
    /// Fares grouped by market and passenger type
    pub fares: Vec<MarketFaresFixture>,
}

/// Fares of one directional market for one passenger type
#[derive(Debug, Deserialize)]
pub struct MarketFaresFixture {
    /// Market origin
    pub origin: String,

    /// Market destination
    pub destination: String,

    /// Passenger type code
    pub pax: String,

    /// Fares, in any order
    pub fares: Vec<FareFixture>,
}

/// Fare fixture from YAML
#[derive(Debug, Deserialize)]
pub struct FareFixture {
    /// Fare class
    pub class: String,

    /// Owning carrier
    pub carrier: String,

    /// Published price, e.g. "500.00 GBP"
    pub price: String,

    /// Comparable amount; defaults to the published value
    #[serde(default)]
    pub amount: Option<String>,

    /// Fare type group
    #[serde(default)]
    pub fare_type: Option<FareTypeGroup>,

    /// Cabin
    #[serde(default)]
    pub cabin: Option<Cabin>,

    /// Booking code per segment
    #[serde(default)]
    pub booking_codes: Vec<String>,

    /// Tariff
    #[serde(default)]
    pub tariff: Option<TripTariff>,

    /// Carriers allowed to validate the ticket
    #[serde(default)]
    pub validating_carriers: Vec<String>,

    /// Negotiated fare
    #[serde(default)]
    pub negotiated: bool,

    /// Accompanied travel restrictions
    #[serde(default)]
    pub accompanied: Option<AccompaniedTravel>,

    /// Change penalty
    #[serde(default)]
    pub penalty: Option<String>,

    /// Brand
    #[serde(default)]
    pub brand: Option<String>,
}

impl TryFrom<FareFixture> for FareCandidate {
    type Error = FixtureError;

    fn try_from(fixture: FareFixture) -> Result<Self, Self::Error> {
        let (value, currency) = parse_price(&fixture.price)?;

        let amount = match &fixture.amount {
            Some(amount) => parse_decimal(amount)?,
            None => value,
        };

        let mut fare = FareCandidate::new(
            fixture.class,
            fixture.carrier,
            Amount::new(amount),
            Money::from_decimal(value, currency),
        )
        .with_booking_codes(fixture.booking_codes)
        .with_validating_carriers(fixture.validating_carriers);

        if let Some(fare_type) = fixture.fare_type {
            fare = fare.with_fare_type(fare_type);
        }

        if let Some(cabin) = fixture.cabin {
            fare = fare.with_cabin(cabin);
        }

        if let Some(tariff) = fixture.tariff {
            fare = fare.with_tariff(tariff);
        }

        if let Some(accompanied) = fixture.accompanied {
            fare = fare.with_accompanied(accompanied);
        }

        if let Some(penalty) = &fixture.penalty {
            fare = fare.with_penalty(Amount::new(parse_decimal(penalty)?));
        }

        if let Some(brand) = fixture.brand {
            fare = fare.with_brand(brand);
        }

        fare.negotiated = fixture.negotiated;

        Ok(fare)
    }
}

/// Parses a price such as `"12.50 GBP"` into its value and currency.
///
/// # Errors
///
/// Returns an error if the value is not a decimal or the currency is unknown.
pub fn parse_price(price: &str) -> Result<(Decimal, &'static iso::Currency), FixtureError> {
    let (value, code) = price
        .trim()
        .split_once(' ')
        .ok_or_else(|| FixtureError::InvalidPrice(price.to_string()))?;

    let currency = iso::find(code.trim()).ok_or_else(|| FixtureError::UnknownCurrency(code.trim().to_string()))?;

    Ok((parse_decimal(value)?, currency))
}

fn parse_decimal(value: &str) -> Result<Decimal, FixtureError> {
    Decimal::from_str(value.trim()).map_err(|error| FixtureError::InvalidPrice(format!("{value}: {error}")))
}
