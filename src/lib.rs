//! Fare Search
//!
//! Cheapest-first combinatorial search for airline fares. Candidate fares are
//! combined lazily into pricing units, pricing units into fare paths for each
//! passenger type, and fare paths into group fare paths for the whole party.
//! Every level emits its items in non-decreasing price order and stops as soon
//! as the caller has what it needs, a timeout fires or a combination ceiling
//! is reached.

pub mod arena;
pub mod candidates;
pub mod config;
pub mod context;
pub mod deadline;
pub mod errors;
pub mod executor;
pub mod factories;
pub mod fixtures;
pub mod model;
pub mod observer;
pub mod orchestrator;
pub mod prelude;
pub mod prices;
pub mod pricing;
pub mod priority;
pub mod queue;
pub mod validation;
