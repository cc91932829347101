//! Fare path factory
//!
//! Combines pricing units into fare paths for one passenger type. Each
//! pricing unit path of the itinerary is a separate arrangement of slots, one
//! slot per template, and all arrangements share one queue. The candidates of
//! a slot are the items of that template's pricing unit factory, requested
//! lazily as the search advances.

use std::sync::Arc;

use rusty_money::{Money, iso};
use slotmap::new_key_type;
use smallvec::{SmallVec, smallvec};
use tracing::debug;

use crate::{
    arena::ItemCache,
    candidates::CandidateLists,
    context::SearchContext,
    deadline::Deadline,
    errors::SearchError,
    executor::TaskKind,
    model::{BookingCode, CarrierCode, FareBreaks, Itinerary, PaxType, TemplateKey},
    observer::{FactoryLevel, ShortCircuitReason},
    prices::Amount,
    pricing::published_total,
    priority::{PriorityStatus, Rank, merged},
    queue::{PriorityQueue, QueueOrder},
    validation::Verdict,
};

use super::{
    FactoryState, Generation, ResumeToken,
    pricing_unit::{FareUsage, PricingUnit, PricingUnitFactory},
};

new_key_type! {
    /// Fare path key
    pub struct FarePathKey;
}

/// One pricing unit per template of a pricing unit path, for one passenger
/// type.
#[derive(Debug, Clone)]
pub struct FarePath {
    pax: PaxType,
    path: usize,
    fare_breaks: FareBreaks,
    units: SmallVec<[Arc<PricingUnit>; 4]>,
    indices: SmallVec<[usize; 4]>,
    amount: Amount,
    priority: PriorityStatus,
    verdict: Verdict,
    validating_carriers: SmallVec<[CarrierCode; 4]>,
    booking_codes: Vec<Option<BookingCode>>,
    published_total: Option<Money<'static, iso::Currency>>,
    max_penalty: Option<Amount>,
}

impl FarePath {
    /// Passenger type
    pub fn pax(&self) -> &PaxType {
        &self.pax
    }

    /// Index of the pricing unit path in the itinerary
    pub fn path_index(&self) -> usize {
        self.path
    }

    /// Fare breaks of the pricing unit path
    pub fn fare_breaks(&self) -> &FareBreaks {
        &self.fare_breaks
    }

    /// Pricing units, in template order
    pub fn pricing_units(&self) -> &[Arc<PricingUnit>] {
        &self.units
    }

    /// Every fare usage of every pricing unit
    pub fn fare_usages(&self) -> impl Iterator<Item = &FareUsage> {
        self.units.iter().flat_map(|unit| unit.fare_usages())
    }

    /// Pricing unit index chosen in each slot
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Amount for one passenger
    pub fn amount(&self) -> Amount {
        self.amount
    }

    /// Merged priority of the pricing units
    pub fn priority(&self) -> &PriorityStatus {
        &self.priority
    }

    /// Validation outcome
    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    /// Whether the fare path was kept with a warning
    pub fn is_soft_pass(&self) -> bool {
        self.verdict == Verdict::SoftPass
    }

    /// Carriers allowed to validate the ticket; empty means unrestricted.
    pub fn validating_carriers(&self) -> &[CarrierCode] {
        &self.validating_carriers
    }

    /// Booking code per segment, where the fare names one
    pub fn booking_codes(&self) -> &[Option<BookingCode>] {
        &self.booking_codes
    }

    /// Sum of published amounts, when every fare shares a currency
    pub fn published_total(&self) -> Option<&Money<'static, iso::Currency>> {
        self.published_total.as_ref()
    }

    /// Highest change penalty among the fares
    pub fn max_penalty(&self) -> Option<Amount> {
        self.max_penalty
    }
}

#[derive(Debug)]
struct PathPlan {
    units: SmallVec<[usize; 4]>,
    fare_breaks: FareBreaks,
    live: bool,
}

#[derive(Debug)]
struct Pending {
    path: usize,
    indices: SmallVec<[usize; 4]>,
    expansion_point: usize,
    units: SmallVec<[Arc<PricingUnit>; 4]>,
}

enum Step {
    Built(Arc<FarePath>),
    Paused,
    Stopped,
}

/// Cheapest-first fare paths of one passenger type.
#[derive(Debug)]
pub struct PaxFarePathFactory {
    context: Arc<SearchContext>,
    pax: PaxType,
    segments: usize,
    units: Vec<PricingUnitFactory>,
    paths: Vec<PathPlan>,
    queue: PriorityQueue<Rank, Pending>,
    cache: ItemCache<FarePathKey, FarePath>,
    state: FactoryState,
    deadline: Deadline,
    tried: u64,
}

impl PaxFarePathFactory {
    /// Creates the factory and one pricing unit factory per template used by
    /// the itinerary's pricing unit paths.
    ///
    /// # Errors
    ///
    /// - [`SearchError::Itinerary`]: a path refers to a template or market the itinerary does not have.
    pub fn new(
        context: Arc<SearchContext>,
        pax: PaxType,
        pax_index: usize,
        itinerary: &Itinerary,
        lists: &CandidateLists,
    ) -> Result<Self, SearchError> {
        let mut templates: Vec<TemplateKey> = Vec::new();
        let mut units = Vec::new();
        let mut paths = Vec::with_capacity(itinerary.paths().len());

        for path in itinerary.paths() {
            let mut positions = SmallVec::new();

            for key in path.templates() {
                let position = match templates.iter().position(|known| known == key) {
                    Some(position) => position,
                    None => {
                        units.push(PricingUnitFactory::new(
                            Arc::clone(&context),
                            pax.clone(),
                            pax_index,
                            itinerary,
                            *key,
                            lists,
                        )?);
                        templates.push(*key);
                        templates.len() - 1
                    }
                };

                positions.push(position);
            }

            paths.push(PathPlan {
                units: positions,
                fare_breaks: path.fare_breaks().clone(),
                live: true,
            });
        }

        let queue = PriorityQueue::new(QueueOrder::Ascending);

        Ok(PaxFarePathFactory {
            context,
            pax,
            segments: itinerary.segments().len(),
            units,
            paths,
            queue,
            cache: ItemCache::new(),
            state: FactoryState::NotStarted,
            deadline: Deadline::unbounded(),
            tried: 0,
        })
    }

    /// Initialises the pricing unit factories on the factory init pool and
    /// seeds one combination per usable pricing unit path.
    ///
    /// A path is unusable when one of its templates has a market without
    /// candidates. Returns whether anything is queued.
    ///
    /// # Errors
    ///
    /// - [`SearchError::EmptyCandidateSlot`]: no path is usable.
    /// - Any other error raised while initialising a pricing unit factory.
    pub fn initialize(&mut self) -> Result<bool, SearchError> {
        self.clear();

        let context = Arc::clone(&self.context);
        let outcomes = context.pools().run_isolated(
            TaskKind::FactoryInit,
            self.units.iter_mut().collect(),
            |unit: &mut PricingUnitFactory| unit.initialize(),
        );

        let mut usable = Vec::with_capacity(outcomes.len());
        let mut empty_slot = None;

        for outcome in outcomes {
            match outcome {
                Ok(_) => usable.push(true),
                Err(error @ SearchError::EmptyCandidateSlot { .. }) => {
                    usable.push(false);
                    empty_slot.get_or_insert(error);
                }
                Err(error) => return Err(error),
            }
        }

        for path in &mut self.paths {
            path.live = path
                .units
                .iter()
                .all(|position| usable.get(*position).copied().unwrap_or(false));
        }

        if let Some(error) = empty_slot
            && !self.paths.iter().any(|path| path.live)
        {
            return Err(error);
        }

        self.deadline = Deadline::start(context.config().fare_path_timeout);
        self.state = FactoryState::Searching;

        for path in 0..self.paths.len() {
            let Some(plan) = self.paths.get(path) else {
                continue;
            };

            if plan.live {
                let indices = smallvec![0; plan.units.len()];
                self.enqueue(path, indices, 0)?;
            }
        }

        debug!(
            pax = %self.pax.code(),
            paths = self.paths.iter().filter(|path| path.live).count(),
            seeds = self.queue.len(),
            "fare path search seeded"
        );

        Ok(!self.queue.is_empty())
    }

    /// The fare path at `index` in emission order.
    ///
    /// With a per-request budget configured, a build that uses up the budget
    /// returns [`Generation::Paused`]; [`PaxFarePathFactory::resume`] picks it
    /// up again with a fresh budget. A zero budget counts as no budget.
    ///
    /// # Errors
    ///
    /// - [`SearchError::Aborted`]: the transaction was cancelled.
    /// - [`SearchError::RuleEngine`]: a validator failed.
    pub fn fetch(&mut self, index: usize) -> Result<Generation<Arc<FarePath>>, SearchError> {
        let mut budget = self.context.config().max_search_per_request.filter(|budget| *budget > 0);

        loop {
            if let Some(fare_path) = self.cache.get(index) {
                return Ok(Generation::Complete(Arc::clone(fare_path)));
            }

            match self.build_next(&mut budget)? {
                Step::Built(_) => {}
                Step::Paused => {
                    return Ok(Generation::Paused(ResumeToken::new(
                        smallvec![index],
                        self.cache.generation(),
                    )));
                }
                Step::Stopped => return Ok(Generation::Failed),
            }
        }
    }

    /// Continues a paused build.
    ///
    /// Tokens issued before the last [`PaxFarePathFactory::clear`] fail.
    ///
    /// # Errors
    ///
    /// See [`PaxFarePathFactory::fetch`].
    pub fn resume(&mut self, token: &ResumeToken) -> Result<Generation<Arc<FarePath>>, SearchError> {
        match token.indices().first() {
            Some(index) if token.generation() == self.cache.generation() => self.fetch(*index),
            _ => Ok(Generation::Failed),
        }
    }

    /// The fare path at `index`, building through any pauses.
    ///
    /// # Errors
    ///
    /// See [`PaxFarePathFactory::fetch`].
    pub fn get_item(&mut self, index: usize) -> Result<Option<Arc<FarePath>>, SearchError> {
        loop {
            match self.fetch(index)? {
                Generation::Complete(fare_path) => return Ok(Some(fare_path)),
                Generation::Paused(_) => {}
                Generation::Failed => return Ok(None),
            }
        }
    }

    /// An already built fare path, without searching.
    pub fn cached(&self, index: usize) -> Option<&Arc<FarePath>> {
        self.cache.get(index)
    }

    /// Fare paths built so far, in emission order.
    pub fn built(&self) -> impl Iterator<Item = &Arc<FarePath>> {
        self.cache.iter()
    }

    /// The cheapest fare path with the same fare breaks as `reference` that
    /// can travel with it.
    ///
    /// Built fare paths are searched first. The search then only continues
    /// while combinations of that fare break arrangement are still queued.
    ///
    /// # Errors
    ///
    /// See [`PaxFarePathFactory::fetch`].
    pub fn same_fare_break_item(&mut self, reference: &FarePath) -> Result<Option<Arc<FarePath>>, SearchError> {
        let context = Arc::clone(&self.context);
        let matches = |fare_path: &FarePath| {
            fare_path.fare_breaks == reference.fare_breaks
                && context.rules().validate_accompanied_travel(&[reference, fare_path])
        };

        if let Some(found) = self.cache.iter().find(|fare_path| matches(fare_path)) {
            return Ok(Some(Arc::clone(found)));
        }

        loop {
            let pending = self.queue.iter().any(|pending| {
                self.paths
                    .get(pending.path)
                    .is_some_and(|path| path.fare_breaks == reference.fare_breaks)
            });

            if !pending {
                return Ok(None);
            }

            match self.build_next(&mut None)? {
                Step::Built(fare_path) if matches(&fare_path) => return Ok(Some(fare_path)),
                Step::Built(_) => {}
                Step::Paused | Step::Stopped => return Ok(None),
            }
        }
    }

    /// Releases every fare path and pricing unit. Resume tokens issued so far
    /// become stale.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.cache.clear();
        self.state = FactoryState::NotStarted;
        self.tried = 0;

        for unit in &mut self.units {
            unit.clear();
        }
    }

    /// Passenger type
    pub fn pax(&self) -> &PaxType {
        &self.pax
    }

    /// Factory state
    pub fn state(&self) -> FactoryState {
        self.state
    }

    /// Whether no further fare paths will be built
    pub fn is_exhausted(&self) -> bool {
        self.state.is_done()
    }

    /// Number of fare paths built so far
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether nothing has been built
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Combinations popped so far
    pub fn combinations_tried(&self) -> u64 {
        self.tried
    }

    fn build_next(&mut self, budget: &mut Option<u64>) -> Result<Step, SearchError> {
        if self.state != FactoryState::Searching {
            return Ok(Step::Stopped);
        }

        let command_pricing = self.context.options().command_pricing;

        loop {
            self.context.abort().check()?;

            if self.deadline.expired() {
                self.short_circuit(ShortCircuitReason::Timeout);
                return Ok(Step::Stopped);
            }

            if self.tried >= self.context.config().max_fare_path_combinations {
                self.short_circuit(ShortCircuitReason::CombinationLimit);
                return Ok(Step::Stopped);
            }

            if let Some(remaining) = budget {
                if *remaining == 0 {
                    return Ok(Step::Paused);
                }

                *remaining -= 1;
            }

            let Some(((amount, priority), pending)) = self.queue.pop() else {
                self.state = FactoryState::Exhausted;
                return Ok(Step::Stopped);
            };

            self.tried += 1;
            self.expand(&pending)?;

            let fare_path = self.assemble(pending, amount, priority)?;

            self.context
                .observer()
                .on_fare_path(self.pax.code(), amount, fare_path.verdict);

            if fare_path.verdict.accepts(command_pricing) {
                let (_, fare_path) = self.cache.push(fare_path);
                return Ok(Step::Built(fare_path));
            }
        }
    }

    fn assemble(&self, pending: Pending, amount: Amount, priority: PriorityStatus) -> Result<FarePath, SearchError> {
        let context = &self.context;
        let rules = context.rules();
        let options = context.options();

        let mut verdict = pending
            .units
            .iter()
            .fold(Verdict::Pass, |verdict, unit| verdict.and(unit.verdict()));

        let usages = || pending.units.iter().flat_map(|unit| unit.fare_usages());

        let mut booking_codes = vec![None; self.segments];
        for usage in usages() {
            for (segment, code) in usage.span().segments().zip(&usage.fare().booking_codes) {
                if let Some(slot) = booking_codes.get_mut(segment) {
                    *slot = Some(code.clone());
                }
            }
        }

        let mut validating: Option<SmallVec<[CarrierCode; 4]>> = None;
        for usage in usages() {
            let carriers = &usage.fare().validating_carriers;

            if carriers.is_empty() {
                continue;
            }

            validating = Some(match validating {
                None => carriers.clone(),
                Some(current) => rules.intersect_validating_carriers(&current, carriers),
            });
        }

        if validating.as_ref().is_some_and(SmallVec::is_empty) {
            verdict = Verdict::Fail;
        }

        let max_penalty = usages().filter_map(|usage| usage.fare().penalty).max();

        if options
            .max_penalty
            .is_some_and(|ceiling| max_penalty.is_some_and(|penalty| penalty > ceiling))
        {
            verdict = Verdict::Fail;
        }

        let published_total = published_total(usages().map(FareUsage::fare)).ok();

        let plan = self
            .paths
            .get(pending.path)
            .ok_or_else(|| SearchError::Unexpected(format!("pricing unit path {} missing", pending.path)))?;

        let mut fare_path = FarePath {
            pax: self.pax.clone(),
            path: pending.path,
            fare_breaks: plan.fare_breaks.clone(),
            units: pending.units,
            indices: pending.indices,
            amount,
            priority,
            verdict,
            validating_carriers: validating.unwrap_or_default(),
            booking_codes,
            published_total,
            max_penalty,
        };

        if verdict != Verdict::Fail && !rules.validate_combinability(&fare_path)? {
            fare_path.verdict = Verdict::Fail;
        }

        Ok(fare_path)
    }

    fn expand(&mut self, pending: &Pending) -> Result<(), SearchError> {
        for slot in pending.expansion_point..pending.indices.len() {
            let mut next = pending.indices.clone();

            if let Some(index) = next.get_mut(slot) {
                *index += 1;
                self.enqueue(pending.path, next, slot)?;
            }
        }

        Ok(())
    }

    /// Queues a combination, building the pricing units it needs. A slot
    /// whose factory cannot produce the index drops the combination.
    fn enqueue(&mut self, path: usize, indices: SmallVec<[usize; 4]>, expansion_point: usize) -> Result<(), SearchError> {
        let Some(plan) = self.paths.get(path) else {
            return Ok(());
        };

        let mut units = SmallVec::new();

        for (position, index) in plan.units.iter().zip(&indices) {
            let Some(factory) = self.units.get_mut(*position) else {
                return Ok(());
            };

            match factory.get_item(*index)? {
                Some(unit) => units.push(unit),
                None => return Ok(()),
            }
        }

        let amount: Amount = units.iter().map(|unit: &Arc<PricingUnit>| unit.amount()).sum();
        let priority = merged(units.iter().map(|unit| unit.priority()));

        self.queue.push(
            (amount, priority),
            Pending {
                path,
                indices,
                expansion_point,
                units,
            },
        );

        Ok(())
    }

    fn short_circuit(&mut self, reason: ShortCircuitReason) {
        debug!(
            pax = %self.pax.code(),
            tried = self.tried,
            ?reason,
            "fare path search stopped early"
        );

        self.state = FactoryState::ShortCircuited;
        self.context.observer().on_short_circuit(FactoryLevel::FarePath, reason);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rusty_money::{Money, iso};
    use testresult::TestResult;

    use crate::{
        config::SearchConfig,
        context::PricingOptions,
        deadline::AbortSignal,
        executor::WorkerPools,
        model::{FareCandidate, MarketKey, PuKind, Segment},
    };

    use super::*;

    fn fare(amount: u32) -> FareCandidate {
        FareCandidate::new("Y", "BA", Amount::from(amount), Money::from_minor(i64::from(amount) * 100, iso::GBP))
    }

    fn context(config: SearchConfig, options: PricingOptions) -> Arc<SearchContext> {
        Arc::new(SearchContext::with_pools(config, options, WorkerPools::synchronous()))
    }

    /// LON-PAR-LON priced either as a round trip or as two one ways.
    fn return_trip() -> Result<(Itinerary, MarketKey, MarketKey), SearchError> {
        let mut itinerary = Itinerary::new("LON-PAR-LON");
        itinerary.add_segment(Segment::new("LON", "PAR", "BA"));
        itinerary.add_segment(Segment::new("PAR", "LON", "BA"));

        let out = itinerary.add_market(0, 0)?;
        let back = itinerary.add_market(1, 1)?;

        let round_trip = itinerary.add_template(PuKind::RoundTrip, &[out, back])?;
        let outbound = itinerary.add_template(PuKind::OneWay, &[out])?;
        let inbound = itinerary.add_template(PuKind::OneWay, &[back])?;

        itinerary.add_path(&[round_trip])?;
        itinerary.add_path(&[outbound, inbound])?;

        Ok((itinerary, out, back))
    }

    fn factory(context: Arc<SearchContext>, itinerary: &Itinerary, lists: &CandidateLists) -> Result<PaxFarePathFactory, SearchError> {
        PaxFarePathFactory::new(context, PaxType::new("ADT", 1), 0, itinerary, lists)
    }

    #[test]
    fn paths_merge_in_price_order() -> TestResult {
        let (itinerary, out, back) = return_trip()?;
        let mut lists = CandidateLists::default();
        lists.insert(out, 0, [fare(100), fare(200)]);
        lists.insert(back, 0, [fare(120), fare(150)]);

        let mut factory = factory(context(SearchConfig::default(), PricingOptions::default()), &itinerary, &lists)?;
        assert!(factory.initialize()?);

        let mut amounts = Vec::new();
        while let Some(fare_path) = factory.get_item(amounts.len())? {
            amounts.push(fare_path.amount());
        }

        // Four round trips and four pairs of one ways.
        assert_eq!(amounts.len(), 8);
        assert_eq!(amounts.first(), Some(&Amount::from(220)));
        assert!(amounts.windows(2).all(|pair| pair.first() <= pair.get(1)));

        Ok(())
    }

    #[test]
    fn cached_fare_paths_are_identical() -> TestResult {
        let (itinerary, out, back) = return_trip()?;
        let mut lists = CandidateLists::default();
        lists.insert(out, 0, [fare(100)]);
        lists.insert(back, 0, [fare(120)]);

        let mut factory = factory(context(SearchConfig::default(), PricingOptions::default()), &itinerary, &lists)?;
        factory.initialize()?;

        let first = factory.get_item(1)?.ok_or("no fare path")?;
        let again = factory.get_item(1)?.ok_or("no fare path")?;

        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(first.booking_codes().len(), 2);

        Ok(())
    }

    #[test]
    fn budget_pauses_and_resumes() -> TestResult {
        let (itinerary, out, back) = return_trip()?;
        let mut lists = CandidateLists::default();
        lists.insert(out, 0, [fare(100), fare(200), fare(300)]);
        lists.insert(back, 0, [fare(100), fare(200), fare(300)]);

        let config = SearchConfig {
            max_search_per_request: Some(2),
            ..SearchConfig::default()
        };
        let mut factory = factory(context(config, PricingOptions::default()), &itinerary, &lists)?;
        factory.initialize()?;

        let Generation::Paused(token) = factory.fetch(5)? else {
            return Err("expected the build to pause".into());
        };

        let mut outcome = factory.resume(&token)?;
        while let Generation::Paused(token) = outcome {
            outcome = factory.resume(&token)?;
        }

        let fare_path = outcome.complete().ok_or("no fare path")?;
        assert!(Arc::ptr_eq(&fare_path, factory.cached(5).ok_or("not cached")?));

        factory.clear();
        assert!(matches!(factory.resume(&token)?, Generation::Failed));

        Ok(())
    }

    #[test]
    fn zero_budget_never_pauses() -> TestResult {
        let (itinerary, out, back) = return_trip()?;
        let mut lists = CandidateLists::default();
        lists.insert(out, 0, [fare(100), fare(200)]);
        lists.insert(back, 0, [fare(100)]);

        let config = SearchConfig {
            max_search_per_request: Some(0),
            ..SearchConfig::default()
        };
        let mut factory = factory(context(config, PricingOptions::default()), &itinerary, &lists)?;
        factory.initialize()?;

        assert!(matches!(factory.fetch(0)?, Generation::Complete(_)));
        assert_eq!(factory.get_item(1)?.map(|fare_path| fare_path.amount()), Some(Amount::from(200)));

        Ok(())
    }

    #[test]
    fn abort_surfaces_from_get_item() -> TestResult {
        let (itinerary, out, back) = return_trip()?;
        let mut lists = CandidateLists::default();
        lists.insert(out, 0, [fare(100), fare(200)]);
        lists.insert(back, 0, [fare(100)]);

        let abort = AbortSignal::new();
        let context = Arc::new(
            SearchContext::with_pools(SearchConfig::default(), PricingOptions::default(), WorkerPools::synchronous())
                .with_abort(abort.clone()),
        );
        let mut factory = factory(context, &itinerary, &lists)?;
        factory.initialize()?;

        let first = factory.get_item(0)?.ok_or("no fare path")?;
        abort.abort();

        let cached = factory.get_item(0)?.ok_or("not cached")?;

        assert!(Arc::ptr_eq(&first, &cached));
        assert_eq!(factory.get_item(1).err(), Some(SearchError::Aborted));

        Ok(())
    }

    #[test]
    fn path_without_candidates_is_dropped() -> TestResult {
        let (itinerary, out, _) = return_trip()?;
        let mut lists = CandidateLists::default();
        lists.insert(out, 0, [fare(100)]);

        let mut factory = factory(context(SearchConfig::default(), PricingOptions::default()), &itinerary, &lists)?;

        assert!(matches!(
            factory.initialize(),
            Err(SearchError::EmptyCandidateSlot { .. })
        ));

        Ok(())
    }

    #[test]
    fn disjoint_validating_carriers_fail() -> TestResult {
        let (itinerary, out, back) = return_trip()?;
        let mut lists = CandidateLists::default();
        lists.insert(out, 0, [fare(100).with_validating_carriers(["BA"])]);
        lists.insert(back, 0, [fare(100).with_validating_carriers(["AF"]), fare(150)]);

        let mut factory = factory(context(SearchConfig::default(), PricingOptions::default()), &itinerary, &lists)?;
        factory.initialize()?;

        let first = factory.get_item(0)?.ok_or("no fare path")?;

        assert_eq!(first.amount(), Amount::from(250));
        assert_eq!(first.validating_carriers(), &[CarrierCode::from("BA")]);

        Ok(())
    }

    #[test]
    fn penalty_above_ceiling_fails() -> TestResult {
        let (itinerary, out, back) = return_trip()?;
        let mut lists = CandidateLists::default();
        lists.insert(out, 0, [fare(100).with_penalty(Amount::from(80)), fare(130)]);
        lists.insert(back, 0, [fare(100)]);

        let options = PricingOptions {
            max_penalty: Some(Amount::from(50)),
            ..PricingOptions::default()
        };
        let mut factory = factory(context(SearchConfig::default(), options), &itinerary, &lists)?;
        factory.initialize()?;

        assert_eq!(factory.get_item(0)?.ok_or("no fare path")?.amount(), Amount::from(230));

        Ok(())
    }

    #[test]
    fn zero_deadline_builds_nothing() -> TestResult {
        let (itinerary, out, back) = return_trip()?;
        let mut lists = CandidateLists::default();
        lists.insert(out, 0, [fare(100)]);
        lists.insert(back, 0, [fare(100)]);

        let config = SearchConfig {
            fare_path_timeout: Some(Duration::ZERO),
            ..SearchConfig::default()
        };
        let mut factory = factory(context(config, PricingOptions::default()), &itinerary, &lists)?;
        factory.initialize()?;

        assert!(factory.get_item(0)?.is_none());
        assert_eq!(factory.state(), FactoryState::ShortCircuited);

        Ok(())
    }

    #[test]
    fn same_fare_break_search_stays_on_arrangement() -> TestResult {
        let (itinerary, out, back) = return_trip()?;
        let mut lists = CandidateLists::default();
        lists.insert(out, 0, [fare(100), fare(200)]);
        lists.insert(back, 0, [fare(100), fare(200)]);

        let mut factory = factory(context(SearchConfig::default(), PricingOptions::default()), &itinerary, &lists)?;
        factory.initialize()?;

        let cheapest = factory.get_item(0)?.ok_or("no fare path")?;
        let other_path = factory
            .built()
            .find(|fare_path| fare_path.path_index() != cheapest.path_index())
            .cloned();

        let found = factory.same_fare_break_item(&cheapest)?.ok_or("no match")?;
        assert_eq!(found.fare_breaks(), cheapest.fare_breaks());

        if let Some(other) = other_path {
            assert_ne!(other.fare_breaks(), cheapest.fare_breaks());
        }

        Ok(())
    }
}
