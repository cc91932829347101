//! Fixtures

use std::{fs, path::PathBuf};

use thiserror::Error;

use crate::{
    candidates::{CandidateLists, FareTable},
    fixtures::{fares::FaresFixture, itineraries::ItineraryFixture},
    model::{FareCandidate, Itinerary, ItineraryError, PaxType},
};

pub mod fares;
pub mod itineraries;

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Invalid price format
    #[error("Invalid price format: {0}")]
    InvalidPrice(String),

    /// Unknown currency code
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    /// Market not found
    #[error("Market not found: {0}")]
    MarketNotFound(String),

    /// Template not found
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// No itinerary loaded
    #[error("No itinerary loaded")]
    NoItinerary,

    /// Itinerary construction error
    #[error(transparent)]
    Itinerary(#[from] ItineraryError),
}

/// Fixture
#[derive(Debug, Clone)]
pub struct Fixture {
    /// Base path for fixture files
    base_path: PathBuf,

    /// Passengers of the request, primary first
    passengers: Vec<PaxType>,

    /// Itinerary with its markets, templates and paths
    itinerary: Option<Itinerary>,

    /// Fares by market and passenger type
    fares: FareTable,
}

impl Fixture {
    /// Create a new empty fixture with default base path
    pub fn new() -> Self {
        Self::with_base_path("./fixtures")
    }

    /// Create a new empty fixture with custom base path
    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            passengers: Vec::new(),
            itinerary: None,
            fares: FareTable::new(),
        }
    }

    /// Load passengers and an itinerary from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if it
    /// describes an invalid itinerary.
    pub fn load_itinerary(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let file_path = self.base_path.join("itineraries").join(format!("{name}.yml"));
        let contents = fs::read_to_string(&file_path)?;
        let fixture: ItineraryFixture = serde_norway::from_str(&contents)?;

        let (passengers, itinerary) = fixture.build(name)?;

        self.passengers = passengers;
        self.itinerary = Some(itinerary);

        Ok(self)
    }

    /// Load fares from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a price is
    /// malformed.
    pub fn load_fares(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let file_path = self.base_path.join("fares").join(format!("{name}.yml"));
        let contents = fs::read_to_string(&file_path)?;
        let fixture: FaresFixture = serde_norway::from_str(&contents)?;

        for market in fixture.fares {
            let fares = market
                .fares
                .into_iter()
                .map(FareCandidate::try_from)
                .collect::<Result<Vec<_>, _>>()?;

            self.fares.insert(market.origin, market.destination, market.pax, fares);
        }

        Ok(self)
    }

    /// Load a complete fixture set (itinerary and fares with the same name)
    ///
    /// # Errors
    ///
    /// Returns an error if any of the fixture files cannot be loaded.
    pub fn from_set(name: &str) -> Result<Self, FixtureError> {
        let mut fixture = Self::new();

        fixture.load_itinerary(name)?.load_fares(name)?;

        Ok(fixture)
    }

    /// Passengers, primary first
    pub fn passengers(&self) -> &[PaxType] {
        &self.passengers
    }

    /// Get the loaded itinerary
    ///
    /// # Errors
    ///
    /// Returns an error if no itinerary has been loaded.
    pub fn itinerary(&self) -> Result<&Itinerary, FixtureError> {
        self.itinerary.as_ref().ok_or(FixtureError::NoItinerary)
    }

    /// Fares loaded so far
    pub fn fares(&self) -> &FareTable {
        &self.fares
    }

    /// Sorted candidate lists of the loaded itinerary
    ///
    /// # Errors
    ///
    /// Returns an error if no itinerary has been loaded.
    pub fn candidate_lists(&self) -> Result<CandidateLists, FixtureError> {
        Ok(CandidateLists::load(&self.fares, self.itinerary()?, &self.passengers, None))
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}
