//! Executor
//!
//! Named worker pools, one per task category. A batch runs on its category's
//! pool and the caller blocks until every task has finished; single-task
//! batches and categories without a pool run on the calling thread. Panics
//! are caught at the task boundary and surface as
//! [`SearchError::Unexpected`].

use std::{
    any::Any,
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
};

use rayon::{ThreadPool, ThreadPoolBuilder, prelude::*};
use tracing::warn;

use crate::{config::PoolSizes, errors::SearchError};

/// Task category; each has its own pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Pricing unit factory initialisation
    FactoryInit,

    /// Fare path fetch inside the group search
    GroupFetch,

    /// One task per itinerary
    Itinerary,

    /// One task per brand of an itinerary
    Brand,

    /// Always on the calling thread
    Synchronous,
}

impl TaskKind {
    fn label(self) -> &'static str {
        match self {
            TaskKind::FactoryInit => "factory-init",
            TaskKind::GroupFetch => "group-fetch",
            TaskKind::Itinerary => "itinerary",
            TaskKind::Brand => "brand",
            TaskKind::Synchronous => "synchronous",
        }
    }
}

/// The worker pools of a transaction.
#[derive(Default)]
pub struct WorkerPools {
    factory_init: Option<ThreadPool>,
    group_fetch: Option<ThreadPool>,
    itinerary: Option<ThreadPool>,
    brand: Option<ThreadPool>,
}

impl fmt::Debug for WorkerPools {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let threads = |pool: Option<&ThreadPool>| pool.map_or(0, ThreadPool::current_num_threads);

        f.debug_struct("WorkerPools")
            .field("factory_init", &threads(self.factory_init.as_ref()))
            .field("group_fetch", &threads(self.group_fetch.as_ref()))
            .field("itinerary", &threads(self.itinerary.as_ref()))
            .field("brand", &threads(self.brand.as_ref()))
            .finish()
    }
}

impl WorkerPools {
    /// Builds one pool per category with a non-zero size.
    ///
    /// # Errors
    ///
    /// - [`SearchError::Executor`]: a pool could not be started.
    pub fn new(sizes: &PoolSizes) -> Result<Self, SearchError> {
        Ok(WorkerPools {
            factory_init: build_pool(TaskKind::FactoryInit, sizes.factory_init)?,
            group_fetch: build_pool(TaskKind::GroupFetch, sizes.group_fetch)?,
            itinerary: build_pool(TaskKind::Itinerary, sizes.itinerary)?,
            brand: build_pool(TaskKind::Brand, sizes.brand)?,
        })
    }

    /// No pools; every batch runs on the calling thread.
    pub fn synchronous() -> Self {
        Self::default()
    }

    fn pool(&self, kind: TaskKind) -> Option<&ThreadPool> {
        match kind {
            TaskKind::FactoryInit => self.factory_init.as_ref(),
            TaskKind::GroupFetch => self.group_fetch.as_ref(),
            TaskKind::Itinerary => self.itinerary.as_ref(),
            TaskKind::Brand => self.brand.as_ref(),
            TaskKind::Synchronous => None,
        }
    }

    /// Runs every task and returns each task's own result, in submission
    /// order.
    pub fn run_isolated<I, R, F>(&self, kind: TaskKind, inputs: Vec<I>, task: F) -> Vec<Result<R, SearchError>>
    where
        I: Send,
        R: Send,
        F: Fn(I) -> Result<R, SearchError> + Sync,
    {
        let guarded = |input: I| guard(kind, || task(input));

        match self.pool(kind) {
            Some(pool) if inputs.len() > 1 => pool.install(|| inputs.into_par_iter().map(guarded).collect()),
            _ => inputs.into_iter().map(guarded).collect(),
        }
    }

    /// Runs every task and returns their results in submission order.
    ///
    /// The whole batch is always joined before returning.
    ///
    /// # Errors
    ///
    /// The first failed task's error, in submission order.
    pub fn run_batch<I, R, F>(&self, kind: TaskKind, inputs: Vec<I>, task: F) -> Result<Vec<R>, SearchError>
    where
        I: Send,
        R: Send,
        F: Fn(I) -> Result<R, SearchError> + Sync,
    {
        self.run_isolated(kind, inputs, task).into_iter().collect()
    }
}

fn build_pool(kind: TaskKind, threads: usize) -> Result<Option<ThreadPool>, SearchError> {
    if threads == 0 {
        return Ok(None);
    }

    let pool = ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(move |index| format!("{}-{index}", kind.label()))
        .build()?;

    Ok(Some(pool))
}

fn guard<R>(kind: TaskKind, task: impl FnOnce() -> Result<R, SearchError>) -> Result<R, SearchError> {
    catch_unwind(AssertUnwindSafe(task)).unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());

        warn!(task = kind.label(), %message, "task panicked");

        Err(SearchError::Unexpected(message))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "task panicked".to_string())
}
