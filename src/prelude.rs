//! Fare search prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    candidates::{CandidateLists, FareSource, FareTable},
    config::{ConfigError, ConfigProvider, PoolSizes, SearchConfig, StaticConfig, YamlConfig},
    context::{PricingOptions, SearchContext, SearchVariant, ValidatingCarrierPolicy},
    deadline::{AbortSignal, Deadline},
    errors::{RuleErrorCode, SearchError},
    executor::{TaskKind, WorkerPools},
    factories::{
        FactoryState, Generation, ResumeToken,
        fare_path::{FarePath, PaxFarePathFactory},
        group::{GroupFarePath, GroupFarePathFactory, GroupSearchState, Rejection},
        pricing_unit::{FareUsage, PricingUnit, PricingUnitFactory},
    },
    fixtures::{Fixture, FixtureError},
    model::{
        AccompaniedTravel, BookingCode, BrandCode, Cabin, CarrierCode, DatePair, FareBreaks, FareCandidate,
        FareTypeGroup, Itinerary, ItineraryError, OpenJawKind, PaxKind, PaxType, PuKind, Segment, TripTariff,
    },
    observer::{DiagnosticEvent, DiagnosticLog, NoopObserver, SearchObserver},
    orchestrator::{Orchestrator, PricingError, PricingSummary},
    prices::Amount,
    validation::{PermissiveRules, RuleValidator, Verdict},
};
