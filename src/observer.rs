//! Search observer
//!
//! Diagnostic hooks called as the factories work. The search never depends on
//! what an observer does; it is the single place where diagnostic output is
//! captured, so renderers can be built on top without touching the factories.

use std::sync::{Mutex, PoisonError};

use crate::{
    factories::group::{GroupSearchState, Rejection},
    model::{PaxTypeCode, TemplateKey},
    prices::Amount,
    validation::Verdict,
};

/// Factory level that reported an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactoryLevel {
    /// Pricing unit factory
    PricingUnit,

    /// Fare path factory
    FarePath,

    /// Group fare path factory
    Group,
}

/// Why a factory stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShortCircuitReason {
    /// The factory deadline elapsed.
    Timeout,

    /// The combination ceiling was reached.
    CombinationLimit,

    /// The group search switched to same fare break combinations.
    SameFareBreak,
}

/// Observer of search progress.
///
/// All methods default to doing nothing.
pub trait SearchObserver: Send + Sync {
    /// A pricing unit combination was validated.
    fn on_pricing_unit(&self, _pax: &PaxTypeCode, _template: TemplateKey, _amount: Amount, _verdict: Verdict) {}

    /// A fare path combination was validated.
    fn on_fare_path(&self, _pax: &PaxTypeCode, _amount: Amount, _verdict: Verdict) {}

    /// A group combination was validated; `rejection` is `None` when valid.
    fn on_group_fare_path(&self, _amount: Amount, _rejection: Option<Rejection>) {}

    /// A factory stopped early.
    fn on_short_circuit(&self, _level: FactoryLevel, _reason: ShortCircuitReason) {}

    /// The group search changed state.
    fn on_state_change(&self, _from: GroupSearchState, _to: GroupSearchState) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SearchObserver for NoopObserver {}

/// One recorded observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticEvent {
    /// See [`SearchObserver::on_pricing_unit`]
    PricingUnit {
        /// Passenger type
        pax: PaxTypeCode,
        /// Template priced
        template: TemplateKey,
        /// Amount of the combination
        amount: Amount,
        /// Validation outcome
        verdict: Verdict,
    },

    /// See [`SearchObserver::on_fare_path`]
    FarePath {
        /// Passenger type
        pax: PaxTypeCode,
        /// Amount of the combination
        amount: Amount,
        /// Validation outcome
        verdict: Verdict,
    },

    /// See [`SearchObserver::on_group_fare_path`]
    GroupFarePath {
        /// Amount of the combination
        amount: Amount,
        /// Why it was rejected
        rejection: Option<Rejection>,
    },

    /// See [`SearchObserver::on_short_circuit`]
    ShortCircuit {
        /// Reporting level
        level: FactoryLevel,
        /// Reason
        reason: ShortCircuitReason,
    },

    /// See [`SearchObserver::on_state_change`]
    StateChange {
        /// Previous state
        from: GroupSearchState,
        /// New state
        to: GroupSearchState,
    },
}

/// Observer that records every event in order.
#[derive(Debug, Default)]
pub struct DiagnosticLog {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl DiagnosticLog {
    /// Creates an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded so far
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Amounts of valid group combinations, in the order they were validated
    pub fn accepted_group_amounts(&self) -> Vec<Amount> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                DiagnosticEvent::GroupFarePath {
                    amount,
                    rejection: None,
                } => Some(amount),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: DiagnosticEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }
}

impl SearchObserver for DiagnosticLog {
    fn on_pricing_unit(&self, pax: &PaxTypeCode, template: TemplateKey, amount: Amount, verdict: Verdict) {
        self.record(DiagnosticEvent::PricingUnit {
            pax: pax.clone(),
            template,
            amount,
            verdict,
        });
    }

    fn on_fare_path(&self, pax: &PaxTypeCode, amount: Amount, verdict: Verdict) {
        self.record(DiagnosticEvent::FarePath {
            pax: pax.clone(),
            amount,
            verdict,
        });
    }

    fn on_group_fare_path(&self, amount: Amount, rejection: Option<Rejection>) {
        self.record(DiagnosticEvent::GroupFarePath { amount, rejection });
    }

    fn on_short_circuit(&self, level: FactoryLevel, reason: ShortCircuitReason) {
        self.record(DiagnosticEvent::ShortCircuit { level, reason });
    }

    fn on_state_change(&self, from: GroupSearchState, to: GroupSearchState) {
        self.record(DiagnosticEvent::StateChange { from, to });
    }
}
