//! Orchestrator
//!
//! Drives the group search for every itinerary of a request, in parallel on
//! the itinerary pool, and commits the accepted group fare paths back onto the
//! itineraries. Branded itineraries run one search per brand on the brand
//! pool. Similar itineraries are priced with their mother itinerary's fare
//! breaks first, falling back to an unrestricted search.

use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    candidates::{CandidateLists, FareSource},
    context::{SearchContext, SearchVariant},
    errors::SearchError,
    executor::TaskKind,
    factories::group::{GroupFarePath, GroupFarePathFactory},
    model::{BrandCode, CarrierCode, FareBreaks, Itinerary, PaxType},
    prices::Amount,
};

/// Why a request produced no solution, in the order the user is told.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PricingError {
    /// Some market has no fare owned by the requested governing carrier
    #[error("no fares found for governing carrier override {0}")]
    GoverningCarrierOverride(CarrierCode),

    /// Corporate fares were forced but none were filed
    #[error("corporate fare not found")]
    CorporateFareNotFound,

    /// Fares exist but none combine
    #[error("no combinable fares for class")]
    NoCombinableFares,

    /// The pass was aborted as a whole
    #[error(transparent)]
    Search(#[from] SearchError),
}

/// Outcome of a pricing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PricingSummary {
    /// Itineraries with at least one solution
    pub priced: usize,

    /// Itineraries whose search failed with an error
    pub failed: usize,

    /// Alternate date itineraries dropped by the price jump cut-off
    pub cut_off: usize,

    /// Cheapest solution over every itinerary
    pub cheapest: Option<Amount>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Outcome {
    solved: bool,
    missing_override: bool,
    missing_corporate: bool,
}

#[derive(Debug, Default)]
struct Search {
    groups: Vec<GroupFarePath>,
    missing_override: bool,
    missing_corporate: bool,
}

/// Entry point of a pricing request.
pub struct Orchestrator {
    context: Arc<SearchContext>,
    fares: Arc<dyn FareSource>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Creates an orchestrator reading fares from `fares`.
    pub fn new(context: Arc<SearchContext>, fares: Arc<dyn FareSource>) -> Self {
        Orchestrator { context, fares }
    }

    /// Search context
    pub fn context(&self) -> &SearchContext {
        &self.context
    }

    /// Prices every itinerary for the party.
    ///
    /// Failures of one itinerary are recorded on it and do not affect the
    /// others. More than one itinerary is priced as a shopping request.
    ///
    /// # Errors
    ///
    /// - [`PricingError::Search`]: resources ran out or a worker pool failed; the whole pass is abandoned.
    /// - [`PricingError::GoverningCarrierOverride`], [`PricingError::CorporateFareNotFound`],
    ///   [`PricingError::NoCombinableFares`]: no itinerary was priced, reported in that priority.
    #[tracing::instrument(
        name = "orchestrator.price",
        skip_all,
        fields(itineraries = itineraries.len(), passengers = passengers.len()),
        err
    )]
    pub fn price(&self, passengers: &[PaxType], itineraries: &mut [Itinerary]) -> Result<PricingSummary, PricingError> {
        let variant = if itineraries.len() > 1 {
            SearchVariant::Shopping
        } else {
            SearchVariant::Standard
        };

        for itinerary in itineraries.iter_mut() {
            itinerary.reset_outcome();
        }

        let results = self.context.pools().run_isolated(
            TaskKind::Itinerary,
            itineraries.iter_mut().collect(),
            |itinerary: &mut Itinerary| self.price_itinerary(passengers, itinerary, &variant),
        );

        let mut summary = PricingSummary::default();
        let mut outcomes = Vec::with_capacity(results.len());
        let mut global = None;

        for (itinerary, result) in itineraries.iter_mut().zip(results) {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(error) if error.is_global() => {
                    global.get_or_insert(error);
                }
                Err(error) => {
                    warn!(itinerary = itinerary.label(), %error, "itinerary search failed");

                    summary.failed += 1;
                    itinerary.record_error(error);
                }
            }
        }

        if let Some(error) = global {
            return Err(error.into());
        }

        if let Some(percent) = self.context.config().alt_date_price_jump {
            summary.cut_off = cut_off_alternate_dates(itineraries, percent);
        }

        summary.priced = itineraries
            .iter()
            .filter(|itinerary| !itinerary.is_cut_off() && !itinerary.solutions().is_empty())
            .count();
        summary.cheapest = itineraries.iter().filter_map(Itinerary::cheapest).min();

        if summary.priced > 0 || outcomes.iter().any(|outcome| outcome.solved) {
            return Ok(summary);
        }

        let options = self.context.options();

        if let Some(carrier) = &options.governing_carrier_override
            && outcomes.iter().any(|outcome| outcome.missing_override)
        {
            return Err(PricingError::GoverningCarrierOverride(carrier.clone()));
        }

        if outcomes.iter().any(|outcome| outcome.missing_corporate) {
            return Err(PricingError::CorporateFareNotFound);
        }

        Err(PricingError::NoCombinableFares)
    }

    #[tracing::instrument(
        name = "orchestrator.price_itinerary",
        skip_all,
        fields(itinerary = itinerary.label(), brands = itinerary.brands().len())
    )]
    fn price_itinerary(
        &self,
        passengers: &[PaxType],
        itinerary: &mut Itinerary,
        variant: &SearchVariant,
    ) -> Result<Outcome, SearchError> {
        let brands: Vec<Option<BrandCode>> = if itinerary.brands().is_empty() {
            vec![None]
        } else {
            itinerary.brands().iter().cloned().map(Some).collect()
        };

        let shared: &Itinerary = itinerary;
        let results = self.context.pools().run_isolated(TaskKind::Brand, brands.clone(), |brand: Option<BrandCode>| {
            self.search(passengers, shared, brand.as_ref(), variant.clone())
        });

        let mut outcome = Outcome::default();
        let mut first_error = None;
        let mut solved = Vec::new();

        for (brand, result) in brands.into_iter().zip(results) {
            match result {
                Ok(search) => {
                    outcome.missing_override |= search.missing_override;
                    outcome.missing_corporate |= search.missing_corporate;

                    if !search.groups.is_empty() {
                        solved.push((brand, search.groups));
                    }
                }
                Err(error) if error.is_global() => return Err(error),
                Err(error) => {
                    first_error.get_or_insert(error);
                }
            }
        }

        if solved.is_empty()
            && let Some(error) = first_error
        {
            return Err(error);
        }

        outcome.solved = !solved.is_empty();

        let mother_fare_breaks: Option<FareBreaks> = solved
            .first()
            .and_then(|(_, groups)| groups.first())
            .and_then(|group| group.fare_paths().first())
            .map(|fare_path| fare_path.fare_breaks().clone());

        for (brand, groups) in solved {
            itinerary.commit(brand, groups);
        }

        info!(
            itinerary = itinerary.label(),
            solutions = itinerary.solutions().len(),
            cheapest = ?itinerary.cheapest(),
            "itinerary priced"
        );

        if let Some(fare_breaks) = mother_fare_breaks {
            for similar in itinerary.similar_mut() {
                self.price_similar(passengers, similar, &fare_breaks);
            }
        }

        Ok(outcome)
    }

    /// Prices a similar itinerary with the mother's fare breaks, then without
    /// restriction if that finds nothing. Errors stay on the similar
    /// itinerary.
    fn price_similar(&self, passengers: &[PaxType], similar: &mut Itinerary, fare_breaks: &FareBreaks) {
        similar.reset_outcome();

        let result = self
            .search(passengers, similar, None, SearchVariant::SimilarItin(fare_breaks.clone()))
            .and_then(|search| {
                if search.groups.is_empty() {
                    self.search(passengers, similar, None, SearchVariant::Standard)
                } else {
                    Ok(search)
                }
            });

        match result {
            Ok(search) => similar.commit(None, search.groups),
            Err(error) => {
                warn!(itinerary = similar.label(), %error, "similar itinerary search failed");
                similar.record_error(error);
            }
        }
    }

    /// One group search over one itinerary and brand.
    fn search(
        &self,
        passengers: &[PaxType],
        itinerary: &Itinerary,
        brand: Option<&BrandCode>,
        variant: SearchVariant,
    ) -> Result<Search, SearchError> {
        let options = self.context.options();
        let lists = CandidateLists::load(self.fares.as_ref(), itinerary, passengers, brand);

        let missing_override = options
            .governing_carrier_override
            .as_ref()
            .is_some_and(|carrier| lists.missing_carrier(carrier));
        let missing_corporate = options.force_corporate_fares && !lists.has_negotiated();

        let mut factory =
            GroupFarePathFactory::new(Arc::clone(&self.context), variant, itinerary, passengers, &lists)?;

        let mut groups = if factory.init_search()? {
            self.collect(&mut factory)?
        } else {
            Vec::new()
        };

        if let Some(carrier) = &options.ticketing_carrier
            && groups.first().is_some_and(|group| {
                !group.validating_carriers().is_empty() && !group.validating_carriers().contains(carrier)
            })
        {
            info!(
                itinerary = itinerary.label(),
                %carrier,
                "repricing for the requested ticketing carrier"
            );

            factory.clear();
            factory.require_validating_carrier(carrier.clone());

            if factory.init_search()? {
                let constrained = self.collect(&mut factory)?;

                if !constrained.is_empty() {
                    groups = constrained;
                }
            }
        }

        Ok(Search {
            groups,
            missing_override,
            missing_corporate,
        })
    }

    fn collect(&self, factory: &mut GroupFarePathFactory) -> Result<Vec<GroupFarePath>, SearchError> {
        let wanted = usize::try_from(self.context.options().solutions_wanted.max(1)).unwrap_or(1);
        let mut groups = Vec::with_capacity(wanted);

        while groups.len() < wanted {
            match factory.get_next(None)? {
                Some(group) => groups.push(group),
                None => break,
            }
        }

        Ok(groups)
    }
}

/// Marks alternate date itineraries whose cheapest solution is more than
/// `percent` above the cheapest date pair. Returns how many were cut.
fn cut_off_alternate_dates(itineraries: &mut [Itinerary], percent: u64) -> usize {
    let Some(cheapest) = itineraries
        .iter()
        .filter(|itinerary| itinerary.date_pair().is_some())
        .filter_map(Itinerary::cheapest)
        .min()
    else {
        return 0;
    };

    let limit = *cheapest * Decimal::from(percent.saturating_add(100)) / Decimal::ONE_HUNDRED;
    let mut cut = 0;

    for itinerary in itineraries {
        if itinerary.date_pair().is_some() && itinerary.cheapest().is_some_and(|amount| *amount > limit) {
            itinerary.cut();
            cut += 1;
        }
    }

    cut
}

#[cfg(test)]
mod tests {
    use rusty_money::{Money, iso};
    use testresult::TestResult;

    use crate::{
        candidates::FareTable,
        config::SearchConfig,
        context::PricingOptions,
        executor::WorkerPools,
        model::{DatePair, FareCandidate, PuKind, Segment},
    };

    use super::*;

    fn fare(amount: u32) -> FareCandidate {
        FareCandidate::new("Y", "BA", Amount::from(amount), Money::from_minor(i64::from(amount) * 100, iso::GBP))
    }

    fn orchestrator(options: PricingOptions, table: FareTable) -> Orchestrator {
        let config = SearchConfig::default().synchronous();
        let context = SearchContext::with_pools(config, options, WorkerPools::synchronous());

        Orchestrator::new(Arc::new(context), Arc::new(table))
    }

    fn one_way(label: &str) -> Result<Itinerary, SearchError> {
        let mut itinerary = Itinerary::new(label);
        itinerary.add_segment(Segment::new("LON", "PAR", "BA"));
        let market = itinerary.add_market(0, 0)?;
        let template = itinerary.add_template(PuKind::OneWay, &[market])?;
        itinerary.add_path(&[template])?;

        Ok(itinerary)
    }

    #[test]
    fn commits_cheapest_solution() -> TestResult {
        let mut table = FareTable::new();
        table.insert("LON", "PAR", "ADT", [fare(200), fare(120)]);

        let mut itineraries = [one_way("LON-PAR")?];
        let summary = orchestrator(PricingOptions::default(), table).price(&[PaxType::new("ADT", 2)], &mut itineraries)?;

        let [itinerary] = &itineraries;

        assert_eq!(summary.priced, 1);
        assert_eq!(summary.cheapest, Some(Amount::from(240)));
        assert_eq!(itinerary.fare_paths().len(), 1);

        Ok(())
    }

    #[test]
    fn failure_priority_reports_override_first() -> TestResult {
        let mut table = FareTable::new();
        table.insert("LON", "PAR", "ADT", [fare(100)]);

        let options = PricingOptions {
            governing_carrier_override: Some("AF".into()),
            force_corporate_fares: true,
            ..PricingOptions::default()
        };

        let mut itineraries = [one_way("LON-PAR")?];
        let result = orchestrator(options, table).price(&[PaxType::new("ADT", 1)], &mut itineraries);

        assert_eq!(result, Err(PricingError::GoverningCarrierOverride("AF".into())));

        Ok(())
    }

    #[test]
    fn corporate_failure_before_no_combinable_fares() -> TestResult {
        let mut table = FareTable::new();
        table.insert("LON", "PAR", "ADT", [fare(100)]);

        let options = PricingOptions {
            force_corporate_fares: true,
            ..PricingOptions::default()
        };

        let mut itineraries = [one_way("LON-PAR")?];
        let result = orchestrator(options, table).price(&[PaxType::new("ADT", 1)], &mut itineraries);

        assert_eq!(result, Err(PricingError::CorporateFareNotFound));

        Ok(())
    }

    #[test]
    fn missing_fares_stay_on_the_itinerary() -> TestResult {
        let mut table = FareTable::new();
        table.insert("LON", "PAR", "ADT", [fare(100)]);

        let mut unpriceable = Itinerary::new("LON-NCE");
        unpriceable.add_segment(Segment::new("LON", "NCE", "BA"));
        let market = unpriceable.add_market(0, 0)?;
        let template = unpriceable.add_template(PuKind::OneWay, &[market])?;
        unpriceable.add_path(&[template])?;

        let mut itineraries = [one_way("LON-PAR")?, unpriceable];
        let summary = orchestrator(PricingOptions::default(), table).price(&[PaxType::new("ADT", 1)], &mut itineraries)?;

        let [priced, failed] = &itineraries;

        assert_eq!(summary.priced, 1);
        assert_eq!(summary.failed, 1);
        assert!(priced.error().is_none());
        assert!(matches!(failed.error(), Some(SearchError::EmptyCandidateSlot { .. })));

        Ok(())
    }

    #[test]
    fn expensive_date_pairs_are_cut_off() -> TestResult {
        let mut table = FareTable::new();
        table.insert("LON", "PAR", "ADT", [fare(100)]);
        table.insert("LON", "NCE", "ADT", [fare(180)]);

        let mut late = Itinerary::new("LON-NCE").with_date_pair(DatePair {
            outbound: "2026-11-02".to_string(),
            inbound: Some("2026-11-09".to_string()),
        });
        late.add_segment(Segment::new("LON", "NCE", "BA"));
        let market = late.add_market(0, 0)?;
        let template = late.add_template(PuKind::OneWay, &[market])?;
        late.add_path(&[template])?;

        let early = one_way("LON-PAR")?.with_date_pair(DatePair {
            outbound: "2026-11-01".to_string(),
            inbound: Some("2026-11-08".to_string()),
        });

        let config = SearchConfig {
            alt_date_price_jump: Some(50),
            ..SearchConfig::default().synchronous()
        };
        let context = SearchContext::with_pools(config, PricingOptions::default(), WorkerPools::synchronous());
        let orchestrator = Orchestrator::new(Arc::new(context), Arc::new(table));

        let mut itineraries = [early, late];
        let summary = orchestrator.price(&[PaxType::new("ADT", 1)], &mut itineraries)?;

        let [early, late] = &itineraries;

        assert_eq!(summary.cut_off, 1);
        assert!(!early.is_cut_off());
        assert!(late.is_cut_off());

        Ok(())
    }
}
