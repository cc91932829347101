//! Group fare path factory
//!
//! The top of the search: one fare path per passenger type, combined into
//! group fare paths in non-decreasing total price. A combination is an index
//! vector with one entry per passenger factory; the entries are fetched in
//! parallel on the group fetch pool.
//!
//! Once the multi-passenger deadline has passed the search stops exploring
//! the frontier and walks the primary passenger's fare paths instead, pairing
//! each with the other passengers' cheapest fare paths on the same fare breaks.
//! Pairings returned before the switch are skipped.
//!
//! A valid group can be held back instead of returned. A soft pass group
//! waits until no clean group is left. A divide party group waits only while
//! the frontier stays at its price, in case a group keeping the party together
//! costs the same.

use std::{collections::VecDeque, fmt, mem, sync::Arc};

use smallvec::{SmallVec, smallvec};
use tracing::{debug, trace};

use crate::{
    candidates::CandidateLists,
    context::{SearchContext, SearchVariant},
    deadline::Deadline,
    errors::SearchError,
    executor::TaskKind,
    model::{CarrierCode, Itinerary, PaxType},
    observer::{FactoryLevel, ShortCircuitReason},
    prices::Amount,
    priority::{PriorityStatus, Rank, merged},
    queue::{PriorityQueue, QueueOrder},
};

use super::{
    Generation, ResumeToken,
    fare_path::{FarePath, PaxFarePathFactory},
};

mod validation;

/// State of a group search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum GroupSearchState {
    /// Not initialised, or cleared.
    #[default]
    NotStarted,

    /// Assembling and validating a combination.
    Building,

    /// A valid group fare path was returned.
    ValidEmitted,

    /// The last combination was rejected.
    InvalidDiscarded,

    /// Queueing the neighbours of a combination.
    Expanding,

    /// The frontier is empty or the combination ceiling was reached.
    Exhausted,

    /// Searching same fare break combinations after the deadline.
    ShortCircuited,

    /// Nothing more will be returned.
    Terminal,
}

impl fmt::Display for GroupSearchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Why a group fare path was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// One of the fare paths is invalid.
    FarePath,

    /// Fare breaks differ from the ones the search is restricted to.
    FareBreaks,

    /// Passengers sharing fare breaks price a component in different
    /// currencies.
    Currency,

    /// A child or infant fare travels without its escort.
    AccompaniedTravel,

    /// No carrier can validate every passenger's ticket.
    ValidatingCarrier,

    /// The party would be split and splitting is inhibited.
    DivideParty,
}

/// One fare path per passenger type.
#[derive(Debug, Clone)]
pub struct GroupFarePath {
    indices: SmallVec<[usize; 4]>,
    expansion_point: usize,
    fare_paths: SmallVec<[Arc<FarePath>; 4]>,
    amount: Amount,
    priority: PriorityStatus,
    valid: bool,
    soft_pass: bool,
    divide_party: bool,
    validating_carriers: SmallVec<[CarrierCode; 4]>,
}

impl GroupFarePath {
    /// Fare path index per passenger factory; empty for same fare break
    /// combinations.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Fare paths, in passenger order
    pub fn fare_paths(&self) -> &[Arc<FarePath>] {
        &self.fare_paths
    }

    /// Total over every passenger: each fare path amount times its
    /// passenger count.
    pub fn amount(&self) -> Amount {
        self.amount
    }

    /// Merged priority
    pub fn priority(&self) -> &PriorityStatus {
        &self.priority
    }

    /// Queue key
    pub fn rank(&self) -> Rank {
        (self.amount, self.priority)
    }

    /// Whether every cross-passenger check passed
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Whether some fare path carries a warning
    pub fn is_soft_pass(&self) -> bool {
        self.soft_pass
    }

    /// Whether the passengers need separate records
    pub fn is_divide_party(&self) -> bool {
        self.divide_party
    }

    /// Carriers that can validate every ticket; empty means unrestricted.
    pub fn validating_carriers(&self) -> &[CarrierCode] {
        &self.validating_carriers
    }
}

enum Request {
    Fetch(usize),
    Resume(ResumeToken),
}

#[derive(Debug)]
struct Deferred {
    indices: SmallVec<[usize; 4]>,
    expansion_point: usize,
    tokens: SmallVec<[Option<ResumeToken>; 4]>,
}

/// Cheapest-first group fare paths of a party.
#[derive(Debug)]
pub struct GroupFarePathFactory {
    context: Arc<SearchContext>,
    variant: SearchVariant,
    factories: Vec<PaxFarePathFactory>,
    queue: PriorityQueue<Rank, GroupFarePath>,
    deferred: Vec<Deferred>,
    to_expand: Option<GroupFarePath>,
    state: GroupSearchState,
    tried: u64,
    started: Deadline,
    short_circuited: bool,
    next_primary: usize,
    required_carrier: Option<CarrierCode>,
    reserved: VecDeque<GroupFarePath>,
    emitted: Vec<SmallVec<[Arc<FarePath>; 4]>>,
}

impl GroupFarePathFactory {
    /// Creates one fare path factory per passenger type. The first passenger
    /// is the primary one.
    ///
    /// # Errors
    ///
    /// - [`SearchError::Itinerary`]: the itinerary's paths refer to unknown templates or markets.
    pub fn new(
        context: Arc<SearchContext>,
        variant: SearchVariant,
        itinerary: &Itinerary,
        passengers: &[PaxType],
        lists: &CandidateLists,
    ) -> Result<Self, SearchError> {
        let factories = passengers
            .iter()
            .enumerate()
            .map(|(pax_index, pax)| {
                PaxFarePathFactory::new(Arc::clone(&context), pax.clone(), pax_index, itinerary, lists)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let queue = PriorityQueue::new(QueueOrder::Ascending);

        Ok(GroupFarePathFactory {
            context,
            variant,
            factories,
            queue,
            deferred: Vec::new(),
            to_expand: None,
            state: GroupSearchState::NotStarted,
            tried: 0,
            started: Deadline::unbounded(),
            short_circuited: false,
            next_primary: 0,
            required_carrier: None,
            reserved: VecDeque::new(),
            emitted: Vec::new(),
        })
    }

    /// Initialises every passenger factory and queues the cheapest
    /// combination.
    ///
    /// Returns whether there is anything to search.
    ///
    /// # Errors
    ///
    /// - [`SearchError::EmptyCandidateSlot`]: a passenger has no usable pricing unit path.
    /// - Any error raised while building the first combination.
    pub fn init_search(&mut self) -> Result<bool, SearchError> {
        self.clear();

        if self.factories.is_empty() {
            self.set_state(GroupSearchState::Terminal);
            return Ok(false);
        }

        self.set_state(GroupSearchState::Building);
        self.started = Deadline::start(self.context.config().multi_pax_timeout);

        for factory in &mut self.factories {
            factory.initialize()?;
        }

        self.build_combination(smallvec![0; self.factories.len()], 0)?;

        debug!(
            passengers = self.factories.len(),
            variant = ?self.variant,
            queued = self.queue.len(),
            "group search initialised"
        );

        Ok(!self.queue.is_empty() || !self.deferred.is_empty())
    }

    /// The next cheapest valid group fare path.
    ///
    /// Combinations above `ceiling` are left queued and `None` is returned,
    /// so a later call with a higher ceiling picks them up again.
    ///
    /// # Errors
    ///
    /// - [`SearchError::Aborted`]: the transaction was cancelled.
    /// - [`SearchError::RuleEngine`]: a validator failed, or no validating carrier is shared under the erroring policy.
    pub fn get_next(&mut self, ceiling: Option<Amount>) -> Result<Option<GroupFarePath>, SearchError> {
        if matches!(self.state, GroupSearchState::NotStarted | GroupSearchState::Terminal) {
            return Ok(None);
        }

        if let Some(previous) = self.to_expand.take() {
            self.expand(&previous)?;
        }

        let multi_pax = self.factories.len() > 1;

        loop {
            self.context.abort().check()?;
            self.retry_deferred()?;

            if multi_pax && self.variant.allows_short_circuit() && (self.short_circuited || self.started.expired()) {
                return self.same_fare_break_search();
            }

            if self.tried >= self.context.config().max_group_combinations {
                return Ok(self.finish());
            }

            let Some(amount) = self.queue.peek().map(|((amount, _), _)| *amount) else {
                return Ok(self.finish());
            };

            if let Some(ceiling) = ceiling
                && amount > ceiling
            {
                return Ok(self.release_reserved(|held| held.amount <= ceiling));
            }

            if let Some(held) = self.release_reserved(|held| !held.soft_pass && held.amount != amount) {
                return Ok(Some(held));
            }

            let Some((_, mut group)) = self.queue.pop() else {
                return Ok(self.finish());
            };

            self.tried += 1;
            self.set_state(GroupSearchState::Building);

            let rejection = validation::validate(&self.context, &self.variant, self.required_carrier.as_ref(), &mut group)?;

            self.context.observer().on_group_fare_path(group.amount, rejection);

            if rejection.is_some() {
                self.set_state(GroupSearchState::InvalidDiscarded);
                self.expand(&group)?;
                continue;
            }

            group.valid = true;

            if group.soft_pass || (group.divide_party && self.non_divide_party_possible(&group)) {
                self.expand(&group)?;

                trace!(amount = %group.amount, soft_pass = group.soft_pass, "group fare path reserved");
                self.reserved.push_back(group);

                continue;
            }

            self.set_state(GroupSearchState::ValidEmitted);
            self.to_expand = Some(group.clone());

            return Ok(Some(self.emit(group)));
        }
    }

    /// Releases every item at every level. The factory can be initialised
    /// again afterwards.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.deferred.clear();
        self.to_expand = None;
        self.tried = 0;
        self.short_circuited = false;
        self.next_primary = 0;
        self.reserved.clear();
        self.emitted.clear();

        for factory in &mut self.factories {
            factory.clear();
        }

        self.set_state(GroupSearchState::NotStarted);
    }

    /// Only accepts groups that `carrier` can validate.
    pub fn require_validating_carrier(&mut self, carrier: CarrierCode) {
        self.required_carrier = Some(carrier);
    }

    /// Search state
    pub fn state(&self) -> GroupSearchState {
        self.state
    }

    /// Combinations popped since initialisation
    pub fn combinations_tried(&self) -> u64 {
        self.tried
    }

    /// Passenger factories, primary first
    pub fn pax_factories(&self) -> &[PaxFarePathFactory] {
        &self.factories
    }

    fn finish(&mut self) -> Option<GroupFarePath> {
        self.set_state(GroupSearchState::Exhausted);

        let reserved = self.release_reserved(|_| true);

        if reserved.is_none() {
            self.set_state(GroupSearchState::Terminal);
        }

        reserved
    }

    /// Returns the oldest held back group that `releasable` accepts. Pairings
    /// that already went out are dropped.
    fn release_reserved(&mut self, releasable: impl Fn(&GroupFarePath) -> bool) -> Option<GroupFarePath> {
        while let Some(position) = self.reserved.iter().position(&releasable) {
            let Some(group) = self.reserved.remove(position) else {
                break;
            };

            if self.was_emitted(&group.fare_paths) {
                continue;
            }

            debug!(amount = %group.amount, divide_party = group.divide_party, "reserved group fare path released");

            self.set_state(GroupSearchState::ValidEmitted);

            return Some(self.emit(group));
        }

        None
    }

    fn emit(&mut self, group: GroupFarePath) -> GroupFarePath {
        self.emitted.push(group.fare_paths.clone());
        group
    }

    fn was_emitted(&self, fare_paths: &[Arc<FarePath>]) -> bool {
        self.emitted.iter().any(|emitted| {
            emitted.len() == fare_paths.len()
                && emitted.iter().zip(fare_paths).all(|(a, b)| Arc::ptr_eq(a, b))
        })
    }

    /// Whether other passengers already have fare paths that would keep the
    /// party together with this group's primary fare path.
    fn non_divide_party_possible(&self, group: &GroupFarePath) -> bool {
        let Some((lead, _)) = group.fare_paths.split_first() else {
            return false;
        };

        self.factories
            .iter()
            .skip(1)
            .all(|factory| factory.built().any(|fare_path| validation::same_party(lead, fare_path)))
    }

    fn expand(&mut self, group: &GroupFarePath) -> Result<(), SearchError> {
        self.set_state(GroupSearchState::Expanding);

        for position in group.expansion_point..group.indices.len() {
            let mut next = group.indices.clone();

            let Some(index) = next.get_mut(position) else {
                continue;
            };

            *index += 1;

            if self
                .factories
                .get(position)
                .is_some_and(|factory| factory.is_exhausted() && *index >= factory.len())
            {
                continue;
            }

            self.build_combination(next, position)?;
        }

        Ok(())
    }

    fn build_combination(&mut self, indices: SmallVec<[usize; 4]>, expansion_point: usize) -> Result<(), SearchError> {
        let requests = indices.iter().map(|index| Request::Fetch(*index)).collect();

        self.settle(indices, expansion_point, requests)
    }

    /// Fetches a combination's fare paths and queues it, defers it while a
    /// fetch is paused, or drops it when a fare path does not exist.
    fn settle(
        &mut self,
        indices: SmallVec<[usize; 4]>,
        expansion_point: usize,
        requests: Vec<Request>,
    ) -> Result<(), SearchError> {
        let mut fare_paths = SmallVec::new();
        let mut tokens = SmallVec::new();
        let mut paused = false;

        for outcome in self.fetch_all(requests)? {
            match outcome {
                Generation::Complete(fare_path) => {
                    fare_paths.push(fare_path);
                    tokens.push(None);
                }
                Generation::Paused(token) => {
                    paused = true;
                    tokens.push(Some(token));
                }
                Generation::Failed => return Ok(()),
            }
        }

        if paused {
            self.deferred.push(Deferred {
                indices,
                expansion_point,
                tokens,
            });
            return Ok(());
        }

        let group = self.assemble(indices, expansion_point, fare_paths);
        self.queue.push(group.rank(), group);

        Ok(())
    }

    /// Resolves every deferred combination before the frontier is popped
    /// again, so emissions stay in price order.
    fn retry_deferred(&mut self) -> Result<(), SearchError> {
        while !self.deferred.is_empty() {
            self.context.abort().check()?;

            for deferred in mem::take(&mut self.deferred) {
                let requests = deferred
                    .indices
                    .iter()
                    .zip(deferred.tokens)
                    .map(|(index, token)| token.map_or(Request::Fetch(*index), Request::Resume))
                    .collect();

                self.settle(deferred.indices, deferred.expansion_point, requests)?;
            }
        }

        Ok(())
    }

    /// Fetches one fare path per passenger factory. Cached ones are read
    /// directly; the rest run as one batch on the group fetch pool.
    fn fetch_all(&mut self, requests: Vec<Request>) -> Result<Vec<Generation<Arc<FarePath>>>, SearchError> {
        let context = Arc::clone(&self.context);
        let mut outcomes = Vec::with_capacity(requests.len());
        let mut batch = Vec::new();

        for (factory, request) in self.factories.iter_mut().zip(requests) {
            let cached = match &request {
                Request::Fetch(index) => factory.cached(*index).cloned(),
                Request::Resume(_) => None,
            };

            if let Some(fare_path) = cached {
                outcomes.push(Some(Generation::Complete(fare_path)));
            } else {
                outcomes.push(None);
                batch.push((factory, request));
            }
        }

        let mut fetched = context
            .pools()
            .run_batch(
                TaskKind::GroupFetch,
                batch,
                |(factory, request): (&mut PaxFarePathFactory, Request)| match request {
                    Request::Fetch(index) => factory.fetch(index),
                    Request::Resume(token) => factory.resume(&token),
                },
            )?
            .into_iter();

        outcomes
            .into_iter()
            .map(|outcome| {
                outcome
                    .or_else(|| fetched.next())
                    .ok_or_else(|| SearchError::Unexpected("fare path fetch lost a result".to_string()))
            })
            .collect()
    }

    fn assemble(
        &self,
        indices: SmallVec<[usize; 4]>,
        expansion_point: usize,
        fare_paths: SmallVec<[Arc<FarePath>; 4]>,
    ) -> GroupFarePath {
        let amount: Amount = fare_paths
            .iter()
            .map(|fare_path| fare_path.amount().times(fare_path.pax().count()))
            .sum();

        GroupFarePath {
            indices,
            expansion_point,
            amount,
            priority: merged(fare_paths.iter().map(|fare_path| fare_path.priority())),
            valid: false,
            soft_pass: fare_paths.iter().any(|fare_path| fare_path.is_soft_pass()),
            divide_party: false,
            validating_carriers: SmallVec::new(),
            fare_paths,
        }
    }

    /// Pairs the primary passenger's fare paths, cheapest first, with every
    /// other passenger's cheapest fare path on the same fare breaks. Reserved
    /// groups come last.
    fn same_fare_break_search(&mut self) -> Result<Option<GroupFarePath>, SearchError> {
        if !self.short_circuited {
            self.short_circuited = true;
            self.set_state(GroupSearchState::ShortCircuited);

            debug!(
                tried = self.tried,
                elapsed_ms = self.started.elapsed().as_millis(),
                "group search switched to same fare break combinations"
            );

            self.context
                .observer()
                .on_short_circuit(FactoryLevel::Group, ShortCircuitReason::SameFareBreak);
        }

        let context = Arc::clone(&self.context);

        loop {
            context.abort().check()?;

            let Some((primary_factory, others)) = self.factories.split_first_mut() else {
                break;
            };

            let Some(primary) = primary_factory.get_item(self.next_primary)? else {
                break;
            };

            self.next_primary += 1;

            let matched = context.pools().run_batch(
                TaskKind::GroupFetch,
                others.iter_mut().collect(),
                |factory: &mut PaxFarePathFactory| factory.same_fare_break_item(&primary),
            )?;

            let Some(matched) = matched.into_iter().collect::<Option<Vec<_>>>() else {
                continue;
            };

            let mut fare_paths: SmallVec<[Arc<FarePath>; 4]> = smallvec![primary];
            fare_paths.extend(matched);

            if self.was_emitted(&fare_paths) {
                continue;
            }

            let mut group = self.assemble(SmallVec::new(), 0, fare_paths);
            let rejection = validation::validate(&context, &self.variant, self.required_carrier.as_ref(), &mut group)?;

            context.observer().on_group_fare_path(group.amount, rejection);

            if rejection.is_none() {
                group.valid = true;
                return Ok(Some(self.emit(group)));
            }
        }

        let reserved = self.release_reserved(|_| true);

        if reserved.is_none() {
            self.set_state(GroupSearchState::Terminal);
        }

        Ok(reserved)
    }

    fn set_state(&mut self, state: GroupSearchState) {
        if self.state != state {
            trace!(from = %self.state, to = %state, "group search state");

            self.context.observer().on_state_change(self.state, state);
            self.state = state;
        }
    }
}
