//! Integration tests for pricing whole requests

use std::sync::Arc;

use rusty_money::{Money, iso};
use testresult::TestResult;

use fare_search::{
    candidates::FareTable,
    config::SearchConfig,
    context::{PricingOptions, SearchContext, ValidatingCarrierPolicy},
    errors::{RuleErrorCode, SearchError},
    executor::WorkerPools,
    model::{BrandCode, FareCandidate, Itinerary, Market, PaxType, PuKind, Segment},
    orchestrator::{Orchestrator, PricingError},
    prices::Amount,
    validation::{RuleValidator, Verdict},
};

fn fare(class: &str, amount: u32) -> FareCandidate {
    FareCandidate::new(class, "BA", Amount::from(amount), Money::from_minor(i64::from(amount) * 100, iso::GBP))
}

fn one_way(label: &str, origin: &str, destination: &str) -> TestResult<Itinerary> {
    let mut itinerary = Itinerary::new(label);
    itinerary.add_segment(Segment::new(origin, destination, "BA"));
    let market = itinerary.add_market(0, 0)?;
    let template = itinerary.add_template(PuKind::OneWay, &[market])?;
    itinerary.add_path(&[template])?;

    Ok(itinerary)
}

fn orchestrator(options: PricingOptions, table: FareTable) -> Orchestrator {
    let context = SearchContext::with_pools(SearchConfig::default().synchronous(), options, WorkerPools::synchronous());

    Orchestrator::new(Arc::new(context), Arc::new(table))
}

#[test]
fn each_brand_gets_its_own_solution() -> TestResult {
    let mut table = FareTable::new();
    table.insert(
        "LON",
        "PAR",
        "ADT",
        [fare("LIGHT", 100).with_brand("LT"), fare("FLEX", 180).with_brand("FX")],
    );

    let mut itineraries = [one_way("LON-PAR", "LON", "PAR")?.with_brands(["LT", "FX"])];
    let summary = orchestrator(PricingOptions::default(), table).price(&[PaxType::new("ADT", 1)], &mut itineraries)?;

    let [itinerary] = &itineraries;

    let solutions: Vec<_> = itinerary
        .solutions()
        .iter()
        .map(|solution| (solution.brand.clone(), solution.group.amount()))
        .collect();

    assert_eq!(summary.cheapest, Some(Amount::from(100)));
    assert_eq!(
        solutions,
        vec![
            (Some(BrandCode::from("LT")), Amount::from(100)),
            (Some(BrandCode::from("FX")), Amount::from(180)),
        ]
    );

    Ok(())
}

#[test]
fn similar_itineraries_reuse_the_mother_fare_breaks() -> TestResult {
    let mut table = FareTable::new();
    table.insert("LON", "PAR", "ADT", [fare("Y", 100)]);

    let mut mother = one_way("BA304", "LON", "PAR")?;
    mother.add_similar(one_way("BA308", "LON", "PAR")?);

    let mut itineraries = [mother];
    orchestrator(PricingOptions::default(), table).price(&[PaxType::new("ADT", 1)], &mut itineraries)?;

    let [mother] = &itineraries;
    let similar = mother.similar().first().ok_or("no similar itinerary")?;

    assert_eq!(mother.cheapest(), Some(Amount::from(100)));
    assert_eq!(similar.cheapest(), Some(Amount::from(100)));
    assert!(similar.error().is_none());

    Ok(())
}

#[test]
fn ticketing_carrier_triggers_a_constrained_search() -> TestResult {
    let mut table = FareTable::new();
    table.insert(
        "LON",
        "PAR",
        "ADT",
        [
            fare("Q", 100).with_validating_carriers(["AF"]),
            fare("Y", 150).with_validating_carriers(["BA", "AF"]),
        ],
    );

    let options = PricingOptions {
        ticketing_carrier: Some("BA".into()),
        ..PricingOptions::default()
    };

    let mut itineraries = [one_way("LON-PAR", "LON", "PAR")?];
    let summary = orchestrator(options, table).price(&[PaxType::new("ADT", 1)], &mut itineraries)?;

    let [itinerary] = &itineraries;
    let solution = itinerary.solutions().first().ok_or("no solution")?;

    assert_eq!(summary.cheapest, Some(Amount::from(150)));
    assert!(solution.group.validating_carriers().contains(&"BA".into()));

    Ok(())
}

#[test]
fn shopping_prices_every_itinerary_on_worker_pools() -> TestResult {
    let mut table = FareTable::new();
    table.insert("LON", "PAR", "ADT", [fare("Y", 100), fare("B", 140)]);
    table.insert("LON", "NCE", "ADT", [fare("Y", 160)]);
    table.insert("LON", "MAD", "ADT", [fare("Y", 120)]);

    let config = SearchConfig::default();
    let pools = WorkerPools::new(&config.pools)?;
    let options = PricingOptions {
        solutions_wanted: 2,
        ..PricingOptions::default()
    };
    let orchestrator = Orchestrator::new(
        Arc::new(SearchContext::with_pools(config, options, pools)),
        Arc::new(table),
    );

    let mut itineraries = [
        one_way("LON-PAR", "LON", "PAR")?,
        one_way("LON-NCE", "LON", "NCE")?,
        one_way("LON-MAD", "LON", "MAD")?,
    ];
    let summary = orchestrator.price(&[PaxType::new("ADT", 1)], &mut itineraries)?;

    let counts: Vec<_> = itineraries.iter().map(|itinerary| itinerary.solutions().len()).collect();

    assert_eq!(summary.priced, 3);
    assert_eq!(summary.cheapest, Some(Amount::from(100)));
    assert_eq!(counts, vec![2, 1, 1]);

    Ok(())
}

#[test]
fn nothing_priced_reports_no_combinable_fares() -> TestResult {
    let mut itineraries = [one_way("LON-PAR", "LON", "PAR")?];
    let table = FareTable::new();

    let result = orchestrator(PricingOptions::default(), table).price(&[PaxType::new("ADT", 1)], &mut itineraries);

    assert_eq!(result, Err(PricingError::NoCombinableFares));

    let [itinerary] = &itineraries;
    assert!(itinerary.error().is_some());

    Ok(())
}

#[test]
fn validating_carrier_error_stays_on_its_itinerary() -> TestResult {
    let mut table = FareTable::new();
    table.insert("LON", "PAR", "ADT", [fare("Y", 100).with_validating_carriers(["AF"])]);
    table.insert("LON", "PAR", "CNN", [fare("Y", 75).with_validating_carriers(["BA"])]);
    table.insert("LON", "MAD", "ADT", [fare("Y", 120)]);
    table.insert("LON", "MAD", "CNN", [fare("Y", 90)]);

    let options = PricingOptions {
        validating_carrier_policy: ValidatingCarrierPolicy::Error,
        ..PricingOptions::default()
    };

    let mut itineraries = [one_way("LON-PAR", "LON", "PAR")?, one_way("LON-MAD", "LON", "MAD")?];
    let summary = orchestrator(options, table).price(&[PaxType::new("ADT", 1), PaxType::new("CNN", 1)], &mut itineraries)?;

    let [paris, madrid] = &itineraries;

    assert_eq!(summary.priced, 1);
    assert_eq!(summary.failed, 1);
    assert!(matches!(
        paris.error(),
        Some(SearchError::RuleEngine {
            code: RuleErrorCode::ValidatingCarrier,
            ..
        })
    ));
    assert!(paris.solutions().is_empty());
    assert_eq!(madrid.cheapest(), Some(Amount::from(210)));
    assert!(madrid.error().is_none());

    Ok(())
}

/// Runs out of resources as soon as a fare to `destination` is checked.
struct ExhaustedAt(&'static str);

impl RuleValidator for ExhaustedAt {
    fn validate_fare(&self, _pax: &PaxType, market: &Market, _fare: &FareCandidate) -> Result<Verdict, SearchError> {
        if market.destination.as_str() == self.0 {
            return Err(SearchError::ResourceExhausted("fare rule cache full".to_string()));
        }

        Ok(Verdict::Pass)
    }
}

#[test]
fn resource_exhaustion_abandons_the_whole_pass() -> TestResult {
    let mut table = FareTable::new();
    table.insert("LON", "PAR", "ADT", [fare("Y", 100)]);
    table.insert("LON", "NCE", "ADT", [fare("Y", 160)]);

    let context = SearchContext::with_pools(
        SearchConfig::default().synchronous(),
        PricingOptions::default(),
        WorkerPools::synchronous(),
    )
    .with_rules(Arc::new(ExhaustedAt("NCE")));
    let orchestrator = Orchestrator::new(Arc::new(context), Arc::new(table));

    let mut itineraries = [one_way("LON-PAR", "LON", "PAR")?, one_way("LON-NCE", "LON", "NCE")?];
    let result = orchestrator.price(&[PaxType::new("ADT", 1)], &mut itineraries);

    assert_eq!(
        result,
        Err(PricingError::Search(SearchError::ResourceExhausted(
            "fare rule cache full".to_string()
        )))
    );

    Ok(())
}
