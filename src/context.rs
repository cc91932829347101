//! Search context
//!
//! Everything a factory needs beyond its own inputs travels in one
//! [`SearchContext`]: configuration, request options, worker pools, the rule
//! validator, the diagnostic observer and the abort signal. Nothing is read
//! from global state.

use std::{fmt, sync::Arc};

use rusty_money::iso::Currency;

use crate::{
    config::SearchConfig,
    deadline::AbortSignal,
    errors::SearchError,
    executor::WorkerPools,
    model::{Cabin, CarrierCode, FareBreaks, FareTypeGroup},
    observer::{NoopObserver, SearchObserver},
    prices::Amount,
    validation::{PermissiveRules, RuleValidator},
};

/// What to do when passengers share no validating carrier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ValidatingCarrierPolicy {
    /// Discard the combination and keep searching.
    #[default]
    Reject,

    /// Stop the itinerary with a rule engine error.
    Error,
}

/// Request options.
#[derive(Debug, Clone, Default, PartialEq)]
#[expect(clippy::struct_excessive_bools, reason = "independent request switches")]
pub struct PricingOptions {
    /// The agent entered an explicit pricing command; soft passes are kept.
    pub command_pricing: bool,

    /// Never return a combination that would split the party.
    pub inhibit_split_pnr: bool,

    /// Fares in other cabins fail, or soft pass under command pricing.
    pub cabin: Option<Cabin>,

    /// Only fares published in this currency are used.
    pub alternate_currency: Option<&'static Currency>,

    /// Allowed fare type groups; empty allows all.
    pub fare_type_groups: Vec<FareTypeGroup>,

    /// Fare type ranked ahead of others at equal amounts.
    pub preferred_fare_type: Option<FareTypeGroup>,

    /// Negotiated fares rank ahead of public ones at equal amounts.
    pub prefer_negotiated_fares: bool,

    /// Only negotiated fares may be used.
    pub force_corporate_fares: bool,

    /// Fares must be owned by this carrier.
    pub governing_carrier_override: Option<CarrierCode>,

    /// Carrier that must validate the ticket; triggers a constrained second
    /// pass when the first solution does not allow it.
    pub ticketing_carrier: Option<CarrierCode>,

    /// Handling of an empty validating carrier intersection.
    pub validating_carrier_policy: ValidatingCarrierPolicy,

    /// Fare paths whose highest change penalty exceeds this fail.
    pub max_penalty: Option<Amount>,

    /// Number of solutions to return per itinerary; zero means one.
    pub solutions_wanted: u32,
}

/// Search variant, fixed when a group search is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchVariant {
    /// Plain pricing.
    Standard,

    /// Shopping: many itineraries, no same fare break fallback.
    Shopping,

    /// Price a similar itinerary with the mother itinerary's fare breaks.
    SimilarItin(FareBreaks),
}

impl SearchVariant {
    /// Whether the group search may switch to same fare break combinations.
    pub fn allows_short_circuit(&self) -> bool {
        !matches!(self, SearchVariant::Shopping)
    }

    /// Whether a fare path with these fare breaks may be used.
    pub fn accepts_fare_breaks(&self, fare_breaks: &FareBreaks) -> bool {
        match self {
            SearchVariant::SimilarItin(mother) => mother == fare_breaks,
            SearchVariant::Standard | SearchVariant::Shopping => true,
        }
    }
}

/// Shared state of one pricing transaction.
pub struct SearchContext {
    config: SearchConfig,
    options: PricingOptions,
    pools: Arc<WorkerPools>,
    rules: Arc<dyn RuleValidator>,
    observer: Arc<dyn SearchObserver>,
    abort: AbortSignal,
}

impl fmt::Debug for SearchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchContext")
            .field("config", &self.config)
            .field("options", &self.options)
            .field("pools", &self.pools)
            .field("abort", &self.abort)
            .finish_non_exhaustive()
    }
}

impl SearchContext {
    /// Creates a context with worker pools sized from `config`, permissive
    /// rules and no observer.
    ///
    /// # Errors
    ///
    /// - [`SearchError::Executor`]: a worker pool could not be started.
    pub fn new(config: SearchConfig, options: PricingOptions) -> Result<Self, SearchError> {
        let pools = WorkerPools::new(&config.pools)?;

        Ok(Self::with_pools(config, options, pools))
    }

    /// Creates a context using the given pools.
    pub fn with_pools(config: SearchConfig, options: PricingOptions, pools: WorkerPools) -> Self {
        let abort = config.global_timeout.map_or_else(AbortSignal::new, AbortSignal::with_timeout);

        SearchContext {
            config,
            options,
            pools: Arc::new(pools),
            rules: Arc::new(PermissiveRules),
            observer: Arc::new(NoopObserver),
            abort,
        }
    }

    /// Replaces the rule validator.
    #[must_use]
    pub fn with_rules(mut self, rules: Arc<dyn RuleValidator>) -> Self {
        self.rules = rules;
        self
    }

    /// Replaces the observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn SearchObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Replaces the abort signal, sharing cancellation with the caller.
    #[must_use]
    pub fn with_abort(mut self, abort: AbortSignal) -> Self {
        self.abort = abort;
        self
    }

    /// Configuration
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Request options
    pub fn options(&self) -> &PricingOptions {
        &self.options
    }

    /// Worker pools
    pub fn pools(&self) -> &WorkerPools {
        &self.pools
    }

    /// Rule validator
    pub fn rules(&self) -> &dyn RuleValidator {
        self.rules.as_ref()
    }

    /// Observer
    pub fn observer(&self) -> &dyn SearchObserver {
        self.observer.as_ref()
    }

    /// Abort signal
    pub fn abort(&self) -> &AbortSignal {
        &self.abort
    }

    /// Context sharing pools, rules, observer and abort signal, with
    /// different options.
    pub(crate) fn derive(&self, options: PricingOptions) -> Self {
        SearchContext {
            config: self.config.clone(),
            options,
            pools: Arc::clone(&self.pools),
            rules: Arc::clone(&self.rules),
            observer: Arc::clone(&self.observer),
            abort: self.abort.clone(),
        }
    }
}
