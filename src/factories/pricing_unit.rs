//! Pricing unit factory
//!
//! Enumerates the pricing units of one template for one passenger type,
//! cheapest first. Combinations are index vectors into the slots' sorted
//! candidate lists. The queue starts from the all-zero vector; popping a
//! vector validates it and pushes its successors, each one slot advanced by
//! one candidate. Successors only advance slots at or after the slot that
//! produced the vector, so every vector is generated exactly once.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use slotmap::new_key_type;
use smallvec::{SmallVec, smallvec};
use tracing::debug;

use crate::{
    arena::ItemCache,
    candidates::CandidateLists,
    context::SearchContext,
    deadline::Deadline,
    errors::SearchError,
    model::{
        CandidateList, CarrierCode, FareCandidate, FareTypeGroup, Itinerary, ItineraryError, Market, MarketKey,
        PaxType, PuKind, PuTemplate, SegmentSpan, TemplateKey,
    },
    observer::{FactoryLevel, ShortCircuitReason},
    prices::Amount,
    priority::{PriorityStatus, Rank},
    queue::{PriorityQueue, QueueOrder},
    validation::Verdict,
};

use super::FactoryState;

mod checks;

new_key_type! {
    /// Pricing unit key
    pub struct PricingUnitKey;
}

/// A fare chosen for one market of a pricing unit.
#[derive(Debug, Clone)]
pub struct FareUsage {
    market_key: MarketKey,
    market: Arc<Market>,
    fare: Arc<FareCandidate>,
    candidate: usize,
}

impl FareUsage {
    /// Market key
    pub fn market_key(&self) -> MarketKey {
        self.market_key
    }

    /// Market priced
    pub fn market(&self) -> &Market {
        &self.market
    }

    /// Fare used
    pub fn fare(&self) -> &FareCandidate {
        &self.fare
    }

    /// Segments covered
    pub fn span(&self) -> SegmentSpan {
        self.market.span
    }

    /// Position of the fare in its candidate list
    pub fn candidate_index(&self) -> usize {
        self.candidate
    }
}

/// One candidate per slot of a template, validated.
#[derive(Debug, Clone)]
pub struct PricingUnit {
    template: TemplateKey,
    kind: PuKind,
    side_trip: bool,
    fare_usages: SmallVec<[FareUsage; 4]>,
    amount: Amount,
    priority: PriorityStatus,
    verdict: Verdict,
    indices: SmallVec<[usize; 4]>,
}

impl PricingUnit {
    /// Template priced
    pub fn template(&self) -> TemplateKey {
        self.template
    }

    /// Pricing unit type
    pub fn kind(&self) -> PuKind {
        self.kind
    }

    /// Whether this unit prices a side trip
    pub fn is_side_trip(&self) -> bool {
        self.side_trip
    }

    /// Fares, one per template slot
    pub fn fare_usages(&self) -> &[FareUsage] {
        &self.fare_usages
    }

    /// Total amount
    pub fn amount(&self) -> Amount {
        self.amount
    }

    /// Merged priority of the fares
    pub fn priority(&self) -> &PriorityStatus {
        &self.priority
    }

    /// Validation outcome
    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    /// Whether the unit was kept with a warning
    pub fn is_soft_pass(&self) -> bool {
        self.verdict == Verdict::SoftPass
    }

    /// Candidate index chosen in each slot
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }
}

#[derive(Debug)]
struct Slot {
    market_key: MarketKey,
    market: Arc<Market>,
    candidates: CandidateList,
    verdicts: Vec<Option<Verdict>>,
}

#[derive(Debug)]
struct Pending {
    indices: SmallVec<[usize; 4]>,
    expansion_point: usize,
}

/// Cheapest-first pricing units of one template for one passenger type.
#[derive(Debug)]
pub struct PricingUnitFactory {
    context: Arc<SearchContext>,
    pax: PaxType,
    template_key: TemplateKey,
    template: PuTemplate,
    slots: SmallVec<[Slot; 4]>,
    queue: PriorityQueue<Rank, Pending>,
    seen: Option<FxHashSet<SmallVec<[usize; 4]>>>,
    cache: ItemCache<PricingUnitKey, PricingUnit>,
    state: FactoryState,
    deadline: Deadline,
    tried: u64,
    limit: u64,
}

impl PricingUnitFactory {
    /// Creates a factory over the template's markets, reading the candidate
    /// lists of passenger `pax_index`.
    ///
    /// # Errors
    ///
    /// - [`SearchError::Itinerary`]: the template or one of its markets is not part of the itinerary.
    pub fn new(
        context: Arc<SearchContext>,
        pax: PaxType,
        pax_index: usize,
        itinerary: &Itinerary,
        template_key: TemplateKey,
        lists: &CandidateLists,
    ) -> Result<Self, SearchError> {
        let template = itinerary
            .template(template_key)
            .ok_or(ItineraryError::UnknownTemplate(template_key))?
            .clone();

        let slots = template
            .markets()
            .iter()
            .map(|key| {
                let market = itinerary.market(*key).ok_or(ItineraryError::UnknownMarket(*key))?;
                let candidates = lists.get(*key, pax_index);

                Ok(Slot {
                    market_key: *key,
                    market: Arc::clone(market),
                    verdicts: vec![None; candidates.len()],
                    candidates,
                })
            })
            .collect::<Result<SmallVec<[Slot; 4]>, SearchError>>()?;

        let config = context.config();
        let mut limit = config.max_pu_combinations;

        if template.is_side_trip() {
            limit = limit.min(config.max_side_trip_search);
        }

        if template.kind() == PuKind::CircleTrip {
            limit = limit.min(config.max_circle_trip_search);
        }

        let queue = PriorityQueue::new(QueueOrder::Ascending);

        Ok(PricingUnitFactory {
            context,
            pax,
            template_key,
            template,
            slots,
            queue,
            seen: None,
            cache: ItemCache::new(),
            state: FactoryState::NotStarted,
            deadline: Deadline::unbounded(),
            tried: 0,
            limit,
        })
    }

    /// Seeds the search and starts the factory deadline.
    ///
    /// Returns whether anything is queued.
    ///
    /// # Errors
    ///
    /// - [`SearchError::EmptyCandidateSlot`]: a slot has no candidates at all.
    pub fn initialize(&mut self) -> Result<bool, SearchError> {
        if let Some(slot) = self.slots.iter().find(|slot| slot.candidates.is_empty()) {
            return Err(SearchError::EmptyCandidateSlot {
                origin: slot.market.origin.to_string(),
                destination: slot.market.destination.to_string(),
                pax: self.pax.code().clone(),
            });
        }

        self.clear();
        self.deadline = Deadline::start(self.context.config().pu_timeout);
        self.state = FactoryState::Searching;

        let root: SmallVec<[usize; 4]> = smallvec![0; self.slots.len()];

        if self.context.config().carrier_fare_search {
            let seeds = self.bucket_seeds();

            self.seen = Some(FxHashSet::default());
            self.enqueue(root, 0);

            for seed in seeds {
                self.enqueue(seed, 0);
            }
        } else {
            self.enqueue(root, 0);
        }

        debug!(
            pax = %self.pax.code(),
            kind = %self.template.kind(),
            seeds = self.queue.len(),
            "pricing unit search seeded"
        );

        Ok(!self.queue.is_empty())
    }

    /// The pricing unit at `index` in emission order, building it if needed.
    ///
    /// Returns `None` once the factory is exhausted, timed out or at its
    /// combination ceiling. Cached items are returned even after that.
    ///
    /// # Errors
    ///
    /// - [`SearchError::Aborted`]: the transaction was cancelled.
    /// - [`SearchError::RuleEngine`]: a validator failed.
    pub fn get_item(&mut self, index: usize) -> Result<Option<Arc<PricingUnit>>, SearchError> {
        loop {
            if let Some(unit) = self.cache.get(index) {
                return Ok(Some(Arc::clone(unit)));
            }

            if self.build_next()?.is_none() {
                return Ok(None);
            }
        }
    }

    /// Releases every item and pending combination.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.cache.clear();
        self.seen = None;
        self.state = FactoryState::NotStarted;
        self.tried = 0;
    }

    /// Template key
    pub fn template_key(&self) -> TemplateKey {
        self.template_key
    }

    /// Passenger type
    pub fn pax(&self) -> &PaxType {
        &self.pax
    }

    /// Factory state
    pub fn state(&self) -> FactoryState {
        self.state
    }

    /// Number of pricing units emitted so far
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether nothing has been emitted
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Combinations popped so far
    pub fn combinations_tried(&self) -> u64 {
        self.tried
    }

    fn build_next(&mut self) -> Result<Option<Arc<PricingUnit>>, SearchError> {
        if self.state != FactoryState::Searching {
            return Ok(None);
        }

        let command_pricing = self.context.options().command_pricing;

        loop {
            self.context.abort().check()?;

            if self.deadline.expired() {
                self.short_circuit(ShortCircuitReason::Timeout);
                return Ok(None);
            }

            if self.tried >= self.limit {
                self.short_circuit(ShortCircuitReason::CombinationLimit);
                return Ok(None);
            }

            let Some(((amount, priority), pending)) = self.queue.pop() else {
                self.state = FactoryState::Exhausted;
                return Ok(None);
            };

            self.tried += 1;

            let unit = self.evaluate(&pending, amount, priority)?;
            self.expand(&pending);

            self.context
                .observer()
                .on_pricing_unit(self.pax.code(), self.template_key, amount, unit.verdict);

            if unit.verdict.accepts(command_pricing) {
                let (_, unit) = self.cache.push(unit);
                return Ok(Some(unit));
            }
        }
    }

    fn evaluate(&mut self, pending: &Pending, amount: Amount, priority: PriorityStatus) -> Result<PricingUnit, SearchError> {
        let context = Arc::clone(&self.context);
        let mut verdict = Verdict::Pass;
        let mut fare_usages = SmallVec::new();

        for (slot, index) in self.slots.iter_mut().zip(&pending.indices) {
            let fare = slot
                .candidates
                .get(*index)
                .cloned()
                .ok_or_else(|| SearchError::Unexpected(format!("candidate {index} out of range")))?;

            let fare_verdict = match slot.verdicts.get(*index).copied().flatten() {
                Some(memo) => memo,
                None => {
                    let computed = checks::fare_verdict(&context, &self.pax, &slot.market, &fare)?;

                    if let Some(memo) = slot.verdicts.get_mut(*index) {
                        *memo = Some(computed);
                    }

                    computed
                }
            };

            verdict = verdict.and(fare_verdict);

            fare_usages.push(FareUsage {
                market_key: slot.market_key,
                market: Arc::clone(&slot.market),
                fare,
                candidate: *index,
            });
        }

        let mut unit = PricingUnit {
            template: self.template_key,
            kind: self.template.kind(),
            side_trip: self.template.is_side_trip(),
            fare_usages,
            amount,
            priority,
            verdict,
            indices: pending.indices.clone(),
        };

        if verdict != Verdict::Fail {
            verdict = verdict.and(self.structure_verdict(&unit));
        }

        if verdict != Verdict::Fail {
            verdict = verdict.and(context.rules().validate_pricing_unit(&self.pax, &unit)?);
        }

        unit.verdict = verdict;

        Ok(unit)
    }

    fn structure_verdict(&self, unit: &PricingUnit) -> Verdict {
        let config = self.context.config();
        let usages = unit.fare_usages();
        let kind = unit.kind();

        let valid = checks::tariff_compatible(kind, usages)
            && (config.allow_mixed_currency_units || checks::single_currency(usages))
            && checks::mileage_consistent(kind, usages)
            && checks::open_jaw_surface(kind, usages)
            && !(kind == PuKind::CircleTrip
                && checks::special_international(usages)
                && usages.len() > config.max_special_ct_components);

        Verdict::from(valid)
    }

    fn expand(&mut self, pending: &Pending) {
        let exhaustive = self.seen.is_some();
        let start = if exhaustive { 0 } else { pending.expansion_point };

        for slot_index in start..self.slots.len() {
            let Some(len) = self.slots.get(slot_index).map(|slot| slot.candidates.len()) else {
                continue;
            };

            let mut next = pending.indices.clone();

            let Some(index) = next.get_mut(slot_index) else {
                continue;
            };

            if *index + 1 >= len {
                continue;
            }

            *index += 1;

            self.enqueue(next, if exhaustive { 0 } else { slot_index });
        }
    }

    fn enqueue(&mut self, indices: SmallVec<[usize; 4]>, expansion_point: usize) {
        if let Some(seen) = &mut self.seen
            && !seen.insert(indices.clone())
        {
            return;
        }

        let Some(rank) = self.rank(&indices) else {
            return;
        };

        self.queue.push(
            rank,
            Pending {
                indices,
                expansion_point,
            },
        );
    }

    fn rank(&self, indices: &[usize]) -> Option<Rank> {
        let options = self.context.options();
        let mut amount = Amount::ZERO;
        let mut priority = PriorityStatus::default();

        for (slot, index) in self.slots.iter().zip(indices) {
            let fare = slot.candidates.get(*index)?;

            amount = amount + fare.amount;
            priority = priority.merge(&PriorityStatus::of_fare(fare, options));
        }

        Some((amount, priority))
    }

    /// One seed per carrier and fare type found in the first slot, each slot
    /// starting at its cheapest fare of that bucket.
    fn bucket_seeds(&self) -> Vec<SmallVec<[usize; 4]>> {
        let Some(first) = self.slots.first() else {
            return Vec::new();
        };

        let mut buckets: Vec<(&CarrierCode, FareTypeGroup)> = Vec::new();

        for fare in first.candidates.iter() {
            let bucket = (&fare.carrier, fare.fare_type);

            if !buckets.contains(&bucket) {
                buckets.push(bucket);
            }
        }

        buckets
            .into_iter()
            .map(|(carrier, fare_type)| {
                self.slots
                    .iter()
                    .map(|slot| {
                        slot.candidates
                            .iter()
                            .position(|fare| &fare.carrier == carrier && fare.fare_type == fare_type)
                            .unwrap_or(0)
                    })
                    .collect()
            })
            .collect()
    }

    fn short_circuit(&mut self, reason: ShortCircuitReason) {
        debug!(
            pax = %self.pax.code(),
            kind = %self.template.kind(),
            tried = self.tried,
            ?reason,
            "pricing unit search stopped early"
        );

        self.state = FactoryState::ShortCircuited;
        self.context.observer().on_short_circuit(FactoryLevel::PricingUnit, reason);
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
        executor::WorkerPools,
        model::{Cabin, OpenJawKind, Segment, TripTariff},
        observer::DiagnosticLog,
    };

    use super::*;

    fn fare(amount: u32) -> FareCandidate {
        FareCandidate::new("Y", "BA", Amount::from(amount), Money::from_minor(i64::from(amount) * 100, iso::GBP))
    }

    fn context(config: SearchConfig, options: PricingOptions) -> Arc<SearchContext> {
        Arc::new(SearchContext::with_pools(config, options, WorkerPools::synchronous()))
    }

    /// A domestic three-leg circle trip with the same prices in every market.
    fn circle_trip(prices: &[u32]) -> Result<(Itinerary, TemplateKey, CandidateLists), ItineraryError> {
        let mut itinerary = Itinerary::new("A-B-C-A");

        itinerary.add_segment(Segment::new("AAA", "BBB", "BA"));
        itinerary.add_segment(Segment::new("BBB", "CCC", "BA"));
        itinerary.add_segment(Segment::new("CCC", "AAA", "BA"));

        let markets = [
            itinerary.add_market(0, 0)?,
            itinerary.add_market(1, 1)?,
            itinerary.add_market(2, 2)?,
        ];

        let template = itinerary.add_template(PuKind::CircleTrip, &markets)?;
        let mut lists = CandidateLists::default();

        for market in markets {
            lists.insert(market, 0, prices.iter().map(|price| fare(*price)));
        }

        Ok((itinerary, template, lists))
    }

    fn factory(
        context: Arc<SearchContext>,
        itinerary: &Itinerary,
        template: TemplateKey,
        lists: &CandidateLists,
    ) -> Result<PricingUnitFactory, SearchError> {
        PricingUnitFactory::new(context, PaxType::new("ADT", 1), 0, itinerary, template, lists)
    }

    #[test]
    fn three_slots_emit_cheapest_first() -> TestResult {
        let (itinerary, template, lists) = circle_trip(&[100, 150, 300])?;
        let mut factory = factory(
            context(SearchConfig::default(), PricingOptions::default()),
            &itinerary,
            template,
            &lists,
        )?;

        assert!(factory.initialize()?);

        let first = factory.get_item(0)?.ok_or("no first unit")?;
        let second = factory.get_item(1)?.ok_or("no second unit")?;

        assert_eq!(first.amount(), Amount::from(300));
        assert_eq!(first.indices(), &[0, 0, 0]);
        assert_eq!(second.amount(), Amount::from(350));

        Ok(())
    }

    #[test]
    fn enumerates_every_combination_exactly_once() -> TestResult {
        let (itinerary, template, lists) = circle_trip(&[100, 150, 300])?;
        let mut factory = factory(
            context(SearchConfig::default(), PricingOptions::default()),
            &itinerary,
            template,
            &lists,
        )?;

        factory.initialize()?;

        let mut amounts = Vec::new();
        let mut vectors = FxHashSet::default();

        while let Some(unit) = factory.get_item(amounts.len())? {
            vectors.insert(unit.indices().to_vec());
            amounts.push(unit.amount());
        }

        assert_eq!(amounts.len(), 27);
        assert_eq!(vectors.len(), 27);
        assert!(amounts.windows(2).all(|pair| pair.first() <= pair.get(1)));
        assert_eq!(factory.state(), FactoryState::Exhausted);

        Ok(())
    }

    #[test]
    fn cached_items_are_shared() -> TestResult {
        let (itinerary, template, lists) = circle_trip(&[100, 150])?;
        let mut factory = factory(
            context(SearchConfig::default(), PricingOptions::default()),
            &itinerary,
            template,
            &lists,
        )?;

        factory.initialize()?;

        let first = factory.get_item(2)?.ok_or("no unit")?;
        let tried = factory.combinations_tried();
        let again = factory.get_item(2)?.ok_or("no unit")?;

        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(factory.combinations_tried(), tried);

        Ok(())
    }

    #[test]
    fn zero_deadline_returns_none_without_error() -> TestResult {
        let (itinerary, template, lists) = circle_trip(&[100])?;
        let config = SearchConfig {
            pu_timeout: Some(Duration::ZERO),
            ..SearchConfig::default()
        };
        let log = Arc::new(DiagnosticLog::new());
        let context = Arc::new(
            SearchContext::with_pools(config, PricingOptions::default(), WorkerPools::synchronous())
                .with_observer(log.clone()),
        );

        let mut factory = factory(context, &itinerary, template, &lists)?;
        factory.initialize()?;

        assert!(factory.get_item(0)?.is_none());
        assert_eq!(factory.state(), FactoryState::ShortCircuited);
        assert_eq!(log.events().len(), 1);

        Ok(())
    }

    #[test]
    fn empty_slot_is_reported() -> TestResult {
        let (itinerary, template, _) = circle_trip(&[100])?;
        let mut factory = factory(
            context(SearchConfig::default(), PricingOptions::default()),
            &itinerary,
            template,
            &CandidateLists::default(),
        )?;

        assert!(matches!(
            factory.initialize(),
            Err(SearchError::EmptyCandidateSlot { .. })
        ));

        Ok(())
    }

    #[test]
    fn combination_ceiling_stops_search() -> TestResult {
        let (itinerary, template, lists) = circle_trip(&[100, 150, 300])?;
        let config = SearchConfig {
            max_circle_trip_search: 4,
            ..SearchConfig::default()
        };
        let mut factory = factory(context(config, PricingOptions::default()), &itinerary, template, &lists)?;

        factory.initialize()?;

        let mut emitted = 0;
        while factory.get_item(emitted)?.is_some() {
            emitted += 1;
        }

        assert_eq!(emitted, 4);
        assert_eq!(factory.state(), FactoryState::ShortCircuited);

        Ok(())
    }

    #[test]
    fn failed_combinations_are_skipped_but_expanded() -> TestResult {
        let (itinerary, template, mut lists) = circle_trip(&[100, 150])?;
        let first_market = itinerary
            .template(template)
            .and_then(|template| template.markets().first().copied())
            .ok_or("no market")?;

        lists.insert(
            first_market,
            0,
            [fare(100).with_tariff(TripTariff::OneWayOnly), fare(150)],
        );

        let mut factory = factory(
            context(SearchConfig::default(), PricingOptions::default()),
            &itinerary,
            template,
            &lists,
        )?;

        factory.initialize()?;

        let first = factory.get_item(0)?.ok_or("no unit")?;

        assert_eq!(first.amount(), Amount::from(350));
        assert_eq!(first.indices(), &[1, 0, 0]);

        Ok(())
    }

    #[test]
    fn cabin_mismatch_soft_passes_under_command_pricing() -> TestResult {
        let (itinerary, template, _) = circle_trip(&[100])?;
        let mut lists = CandidateLists::default();

        for market in itinerary.template(template).ok_or("no template")?.markets() {
            lists.insert(*market, 0, [fare(100).with_cabin(Cabin::Business)]);
        }

        let strict = PricingOptions {
            cabin: Some(Cabin::Economy),
            ..PricingOptions::default()
        };
        let command = PricingOptions {
            command_pricing: true,
            ..strict.clone()
        };

        let mut rejected = factory(context(SearchConfig::default(), strict), &itinerary, template, &lists)?;
        rejected.initialize()?;
        assert!(rejected.get_item(0)?.is_none());

        let mut kept = factory(context(SearchConfig::default(), command), &itinerary, template, &lists)?;
        kept.initialize()?;
        assert!(kept.get_item(0)?.ok_or("no unit")?.is_soft_pass());

        Ok(())
    }

    #[test]
    fn carrier_buckets_seed_each_carrier() -> TestResult {
        let mut itinerary = Itinerary::new("LON-NYC");
        itinerary.add_segment(Segment::new("LON", "NYC", "BA"));
        let market = itinerary.add_market(0, 0)?;
        let template = itinerary.add_template(PuKind::OneWay, &[market])?;

        let mut lists = CandidateLists::default();
        lists.insert(
            market,
            0,
            [
                fare(100),
                FareCandidate::new("Y", "AA", Amount::from(120), Money::from_minor(12_000, iso::GBP)),
                fare(130),
            ],
        );

        let config = SearchConfig {
            carrier_fare_search: true,
            ..SearchConfig::default()
        };
        let mut factory = factory(context(config, PricingOptions::default()), &itinerary, template, &lists)?;
        factory.initialize()?;

        let mut amounts = Vec::new();
        while let Some(unit) = factory.get_item(amounts.len())? {
            amounts.push(unit.amount());
        }

        assert_eq!(amounts, vec![Amount::from(100), Amount::from(120), Amount::from(130)]);

        Ok(())
    }

    #[test]
    fn normal_fare_open_jaw_across_areas_fails() -> TestResult {
        let mut itinerary = Itinerary::new("LON-NYC-TYO");
        itinerary.add_segment(Segment::new("LON", "NYC", "BA").between("GB", "US").areas(2, 1));
        itinerary.add_segment(Segment::new("NYC", "TYO", "JL").between("US", "JP").areas(1, 3));

        let out = itinerary.add_market(0, 0)?;
        let back = itinerary.add_market(1, 1)?;
        let template = itinerary.add_template(PuKind::OpenJaw(OpenJawKind::Origin), &[out, back])?;

        let mut lists = CandidateLists::default();
        lists.insert(out, 0, [fare(100)]);
        lists.insert(back, 0, [fare(100)]);

        let mut factory = factory(
            context(SearchConfig::default(), PricingOptions::default()),
            &itinerary,
            template,
            &lists,
        )?;
        factory.initialize()?;

        assert!(factory.get_item(0)?.is_none());

        Ok(())
    }
}
