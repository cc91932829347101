//! Published totals

use rusty_money::{Money, MoneyError, iso};
use thiserror::Error;

use crate::model::FareCandidate;

/// Errors that can occur while totalling published fare amounts.
#[derive(Debug, Error, PartialEq)]
pub enum TotalPriceError {
    /// No fares were provided, so currency could not be determined.
    #[error("no fares provided; cannot determine currency")]
    NoFares,

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Sums the published amounts of a set of fares.
///
/// # Errors
///
/// - [`TotalPriceError::NoFares`]: No fares were provided, so currency could not be determined.
/// - [`TotalPriceError::Money`]: The fares are published in more than one currency.
pub fn published_total<'a, I>(fares: I) -> Result<Money<'static, iso::Currency>, TotalPriceError>
where
    I: IntoIterator<Item = &'a FareCandidate>,
{
    let mut fares = fares.into_iter();
    let first = fares.next().ok_or(TotalPriceError::NoFares)?;

    let total = fares.try_fold(first.published, |acc, fare| acc.add(fare.published))?;

    Ok(total)
}
