//! Fare candidates
//!
//! The data access layer hands over fares per market and passenger type.
//! [`CandidateLists`] snapshots them for one itinerary, sorted cheapest first,
//! so every factory reads the same immutable lists without locking.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::model::{
    BrandCode, CandidateList, CarrierCode, FareCandidate, Itinerary, LocCode, Market, MarketKey, PaxType,
    PaxTypeCode,
};

/// Source of fares for a market and passenger type.
pub trait FareSource: Send + Sync {
    /// Fares for the market, in any order.
    fn candidates(&self, market: &Market, pax: &PaxType) -> Vec<FareCandidate>;
}

/// In-memory fares keyed by origin, destination and passenger type.
#[derive(Debug, Clone, Default)]
pub struct FareTable {
    fares: FxHashMap<(LocCode, LocCode, PaxTypeCode), Vec<FareCandidate>>,
}

impl FareTable {
    /// Creates an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds fares for a directional market and passenger type.
    pub fn insert(
        &mut self,
        origin: impl Into<LocCode>,
        destination: impl Into<LocCode>,
        pax: impl Into<PaxTypeCode>,
        fares: impl IntoIterator<Item = FareCandidate>,
    ) -> &mut Self {
        self.fares
            .entry((origin.into(), destination.into(), pax.into()))
            .or_default()
            .extend(fares);
        self
    }
}

impl FareSource for FareTable {
    fn candidates(&self, market: &Market, pax: &PaxType) -> Vec<FareCandidate> {
        self.fares
            .get(&(market.origin.clone(), market.destination.clone(), pax.code().clone()))
            .cloned()
            .unwrap_or_default()
    }
}

/// Sorted candidate lists of one itinerary, per market and passenger.
#[derive(Debug, Clone, Default)]
pub struct CandidateLists {
    lists: FxHashMap<(MarketKey, usize), CandidateList>,
}

impl CandidateLists {
    /// Loads every market of `itinerary` for every passenger, keeping only
    /// fares of `brand` when one is given.
    pub fn load(source: &dyn FareSource, itinerary: &Itinerary, passengers: &[PaxType], brand: Option<&BrandCode>) -> Self {
        let mut lists = CandidateLists::default();

        for (key, market) in itinerary.markets() {
            for (pax_index, pax) in passengers.iter().enumerate() {
                let fares = source
                    .candidates(market, pax)
                    .into_iter()
                    .filter(|fare| brand.is_none_or(|brand| fare.brand.as_ref() == Some(brand)));

                lists.insert(key, pax_index, fares);
            }
        }

        lists
    }

    /// Stores a list, sorting it by amount. Equal amounts keep their order.
    pub fn insert(&mut self, market: MarketKey, pax_index: usize, fares: impl IntoIterator<Item = FareCandidate>) {
        let mut fares: Vec<Arc<FareCandidate>> = fares.into_iter().map(Arc::new).collect();
        fares.sort_by_key(|fare| fare.amount);

        self.lists.insert((market, pax_index), fares.into());
    }

    /// The list for a market and passenger; empty when none was loaded.
    pub fn get(&self, market: MarketKey, pax_index: usize) -> CandidateList {
        self.lists
            .get(&(market, pax_index))
            .cloned()
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    /// Whether some market has no fare owned by `carrier` for some passenger.
    pub fn missing_carrier(&self, carrier: &CarrierCode) -> bool {
        self.lists
            .values()
            .any(|list| !list.iter().any(|fare| &fare.carrier == carrier))
    }

    /// Whether any list contains a negotiated fare.
    pub fn has_negotiated(&self) -> bool {
        self.lists.values().flat_map(|list| list.iter()).any(|fare| fare.negotiated)
    }
}
