//! Itinerary model
//!
//! Segments, fare markets, pricing unit templates and the fare candidates
//! supplied for them. Everything here is built once before a search starts and
//! shared read-only by the factories.

pub mod codes;
pub mod fares;
pub mod itinerary;
pub mod passengers;
pub mod templates;

pub use codes::{BookingCode, BrandCode, CarrierCode, CountryCode, FareClass, LocCode, PaxTypeCode};
pub use fares::{AccompaniedTravel, Cabin, CandidateList, FareCandidate, FareTypeGroup, TripTariff};
pub use itinerary::{
    DatePair, Itinerary, ItineraryError, Market, MarketKey, Segment, SegmentSpan, Solution, TemplateKey,
};
pub use passengers::{PaxKind, PaxType};
pub use templates::{FareBreaks, OpenJawKind, PuKind, PuPath, PuTemplate};
