//! Itinerary Fixtures

use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::{
    fixtures::FixtureError,
    model::{Itinerary, MarketKey, OpenJawKind, PaxType, PuKind, Segment, TemplateKey},
};

/// Passengers and itinerary in YAML
#[derive(Debug, Deserialize)]
pub struct ItineraryFixture {
    /// Passenger types, primary first
    pub passengers: Vec<PassengerFixture>,

    /// Segments in travel order
    pub segments: Vec<SegmentFixture>,

    /// Map of market key -> first and last segment index
    pub markets: FxHashMap<String, (usize, usize)>,

    /// Map of template key -> template
    pub templates: FxHashMap<String, TemplateFixture>,

    /// Pricing unit paths, each a list of template keys
    pub paths: Vec<Vec<String>>,
}

/// Passenger fixture from YAML
#[derive(Debug, Deserialize)]
pub struct PassengerFixture {
    /// Passenger type code
    pub code: String,

    /// Number of travellers
    #[serde(default = "one")]
    pub count: u32,
}

/// Segment fixture from YAML
#[derive(Debug, Deserialize)]
pub struct SegmentFixture {
    /// Board point
    pub origin: String,

    /// Off point
    pub destination: String,

    /// Marketing carrier
    pub carrier: String,

    /// Board country
    #[serde(default)]
    pub origin_country: Option<String>,

    /// Off country
    #[serde(default)]
    pub destination_country: Option<String>,

    /// Board and off IATA areas
    #[serde(default)]
    pub areas: Option<(u8, u8)>,
}

/// Template kind in YAML
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKindFixture {
    /// One way
    OneWay,

    /// Round trip
    RoundTrip,

    /// Circle trip
    CircleTrip,

    /// Open jaw at the origin
    OpenJawOrigin,

    /// Open jaw at the turnaround
    OpenJawTurnaround,

    /// Open at both ends
    OpenJawDouble,
}

impl From<TemplateKindFixture> for PuKind {
    fn from(kind: TemplateKindFixture) -> Self {
        match kind {
            TemplateKindFixture::OneWay => PuKind::OneWay,
            TemplateKindFixture::RoundTrip => PuKind::RoundTrip,
            TemplateKindFixture::CircleTrip => PuKind::CircleTrip,
            TemplateKindFixture::OpenJawOrigin => PuKind::OpenJaw(OpenJawKind::Origin),
            TemplateKindFixture::OpenJawTurnaround => PuKind::OpenJaw(OpenJawKind::Turnaround),
            TemplateKindFixture::OpenJawDouble => PuKind::OpenJaw(OpenJawKind::Double),
        }
    }
}

/// Template fixture from YAML
#[derive(Debug, Deserialize)]
pub struct TemplateFixture {
    /// Pricing unit type
    pub kind: TemplateKindFixture,

    /// Market keys, in slot order
    pub markets: Vec<String>,

    /// Whether the template prices a side trip
    #[serde(default)]
    pub side_trip: bool,
}

fn one() -> u32 {
    1
}

impl ItineraryFixture {
    /// Builds the passengers and the itinerary.
    ///
    /// # Errors
    ///
    /// Returns an error if a key is unknown or the itinerary is invalid.
    pub fn build(self, label: &str) -> Result<(Vec<PaxType>, Itinerary), FixtureError> {
        let passengers = self
            .passengers
            .into_iter()
            .map(|passenger| PaxType::new(passenger.code, passenger.count))
            .collect();

        let mut itinerary = Itinerary::new(label);

        for fixture in self.segments {
            let mut segment = Segment::new(fixture.origin, fixture.destination, fixture.carrier);

            if let (Some(origin), Some(destination)) = (fixture.origin_country, fixture.destination_country) {
                segment = segment.between(origin, destination);
            }

            if let Some((origin, destination)) = fixture.areas {
                segment = segment.areas(origin, destination);
            }

            itinerary.add_segment(segment);
        }

        let mut markets: FxHashMap<String, MarketKey> = FxHashMap::default();

        for (name, (first, last)) in self.markets {
            markets.insert(name, itinerary.add_market(first, last)?);
        }

        let mut templates: FxHashMap<String, TemplateKey> = FxHashMap::default();

        for (name, template) in self.templates {
            let keys = template
                .markets
                .iter()
                .map(|market| {
                    markets
                        .get(market)
                        .copied()
                        .ok_or_else(|| FixtureError::MarketNotFound(market.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?;

            let key = if template.side_trip {
                itinerary.add_side_trip(template.kind.into(), &keys)?
            } else {
                itinerary.add_template(template.kind.into(), &keys)?
            };

            templates.insert(name, key);
        }

        for path in self.paths {
            let keys = path
                .iter()
                .map(|name| {
                    templates
                        .get(name)
                        .copied()
                        .ok_or_else(|| FixtureError::TemplateNotFound(name.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?;

            itinerary.add_path(&keys)?;
        }

        Ok((passengers, itinerary))
    }
}
