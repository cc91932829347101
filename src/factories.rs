//! Factories
//!
//! Three levels of lazy, cheapest-first enumeration. A pricing unit factory
//! combines fare candidates for one template and passenger type, a fare path
//! factory combines pricing units for one passenger type, and the group
//! factory combines one fare path per passenger type. Each level only asks the
//! level below for the items it needs, and every level caches what it emitted
//! so that repeated requests for the same index are free.

use smallvec::SmallVec;

pub mod fare_path;
pub mod group;
pub mod pricing_unit;

/// Outcome of asking a factory for an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation<T> {
    /// The item was built (or was already cached).
    Complete(T),

    /// The per-request search budget ran out before the item was built.
    Paused(ResumeToken),

    /// The item does not exist and never will: the factory is exhausted,
    /// timed out or hit its combination ceiling.
    Failed,
}

impl<T> Generation<T> {
    /// The item, if complete.
    pub fn complete(self) -> Option<T> {
        match self {
            Generation::Complete(item) => Some(item),
            Generation::Paused(_) | Generation::Failed => None,
        }
    }
}

/// Where a paused build can be picked up again.
///
/// Only the index vector is kept, together with the cache generation it
/// refers to; a token from before a `clear` no longer resolves.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResumeToken {
    indices: SmallVec<[usize; 4]>,
    generation: u32,
}

impl ResumeToken {
    pub(crate) fn new(indices: SmallVec<[usize; 4]>, generation: u32) -> Self {
        ResumeToken { indices, generation }
    }

    /// Index vector to resume
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Cache generation the token belongs to
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Lifecycle of a pricing unit or fare path factory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FactoryState {
    /// Not initialised, or cleared.
    #[default]
    NotStarted,

    /// Emitting items.
    Searching,

    /// Every combination has been tried.
    Exhausted,

    /// Stopped by its deadline or combination ceiling.
    ShortCircuited,
}

impl FactoryState {
    /// Whether no further items will be built.
    pub fn is_done(self) -> bool {
        matches!(self, FactoryState::Exhausted | FactoryState::ShortCircuited)
    }
}
