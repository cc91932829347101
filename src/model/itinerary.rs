//! Itineraries

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    errors::SearchError,
    factories::{fare_path::FarePath, group::GroupFarePath},
};

use super::{
    codes::{BrandCode, CarrierCode, CountryCode, LocCode},
    templates::{FareBreaks, OpenJawKind, PuKind, PuPath, PuTemplate},
};

new_key_type! {
    /// Market key
    pub struct MarketKey;

    /// Pricing unit template key
    pub struct TemplateKey;
}

/// Errors raised while describing an itinerary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ItineraryError {
    /// A market referenced segments outside the itinerary.
    #[error("segments {first}..={last} are not part of the itinerary")]
    UnknownSegments {
        /// First segment index
        first: usize,
        /// Last segment index
        last: usize,
    },

    /// A template referenced an unknown market.
    #[error("unknown market {0:?}")]
    UnknownMarket(MarketKey),

    /// A path referenced an unknown template.
    #[error("unknown pricing unit template {0:?}")]
    UnknownTemplate(TemplateKey),

    /// The markets do not form the requested pricing unit type.
    #[error("markets do not form a {kind} pricing unit: {reason}")]
    InvalidTemplate {
        /// Requested kind
        kind: PuKind,
        /// What is wrong
        reason: &'static str,
    },

    /// A path did not cover every segment exactly once.
    #[error("segment {0} is not covered exactly once")]
    Coverage(usize),
}

/// Inclusive range of segment indexes covered by a fare component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentSpan {
    /// First segment
    pub first: usize,

    /// Last segment
    pub last: usize,
}

impl SegmentSpan {
    /// Creates a new span
    pub fn new(first: usize, last: usize) -> Self {
        SegmentSpan { first, last }
    }

    /// Number of segments in the span
    pub fn len(&self) -> usize {
        self.last.saturating_sub(self.first) + 1
    }

    /// Spans are never empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Segment indexes in the span
    pub fn segments(&self) -> impl Iterator<Item = usize> {
        self.first..=self.last
    }
}

/// A flown segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Boarding point
    pub origin: LocCode,

    /// Off point
    pub destination: LocCode,

    /// Country of the boarding point
    #[serde(default)]
    pub origin_country: CountryCode,

    /// Country of the off point
    #[serde(default)]
    pub destination_country: CountryCode,

    /// IATA traffic conference area of the boarding point
    #[serde(default = "default_area")]
    pub origin_area: u8,

    /// IATA traffic conference area of the off point
    #[serde(default = "default_area")]
    pub destination_area: u8,

    /// Marketing carrier
    pub carrier: CarrierCode,

    /// Ticketed point mileage
    #[serde(default)]
    pub miles: u32,
}

fn default_area() -> u8 {
    1
}

impl Segment {
    /// Creates a domestic segment in area 1.
    pub fn new(origin: impl Into<LocCode>, destination: impl Into<LocCode>, carrier: impl Into<CarrierCode>) -> Self {
        Segment {
            origin: origin.into(),
            destination: destination.into(),
            origin_country: CountryCode::default(),
            destination_country: CountryCode::default(),
            origin_area: default_area(),
            destination_area: default_area(),
            carrier: carrier.into(),
            miles: 0,
        }
    }

    /// Sets the countries at both ends.
    #[must_use]
    pub fn between(mut self, origin_country: impl Into<CountryCode>, destination_country: impl Into<CountryCode>) -> Self {
        self.origin_country = origin_country.into();
        self.destination_country = destination_country.into();
        self
    }

    /// Sets the IATA areas at both ends.
    #[must_use]
    pub fn areas(mut self, origin_area: u8, destination_area: u8) -> Self {
        self.origin_area = origin_area;
        self.destination_area = destination_area;
        self
    }

    /// Sets the mileage.
    #[must_use]
    pub fn miles(mut self, miles: u32) -> Self {
        self.miles = miles;
        self
    }
}

/// A fare market: the span of segments priced by one fare component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Market {
    /// Market origin
    pub origin: LocCode,

    /// Market destination
    pub destination: LocCode,

    /// Origin country
    pub origin_country: CountryCode,

    /// Destination country
    pub destination_country: CountryCode,

    /// Origin IATA area
    pub origin_area: u8,

    /// Destination IATA area
    pub destination_area: u8,

    /// Segments covered
    pub span: SegmentSpan,

    /// Carriers flying the segments, in order
    pub carriers: SmallVec<[CarrierCode; 4]>,

    /// Total mileage
    pub miles: u32,
}

impl Market {
    /// Whether the market crosses a national border.
    pub fn is_international(&self) -> bool {
        self.origin_country != self.destination_country
    }

    /// Whether the market travels between IATA areas.
    pub fn crosses_areas(&self) -> bool {
        self.origin_area != self.destination_area
    }
}

/// Outbound/inbound travel dates of an alternate date itinerary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatePair {
    /// Outbound date
    pub outbound: String,

    /// Inbound date
    #[serde(default)]
    pub inbound: Option<String>,
}

/// An accepted group fare path committed onto the itinerary.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Brand priced, for branded passes
    pub brand: Option<BrandCode>,

    /// Accepted combination
    pub group: GroupFarePath,
}

/// An itinerary to price and the results committed onto it.
#[derive(Debug, Clone, Default)]
pub struct Itinerary {
    label: String,
    segments: Vec<Segment>,
    markets: SlotMap<MarketKey, Arc<Market>>,
    templates: SlotMap<TemplateKey, PuTemplate>,
    paths: Vec<PuPath>,
    date_pair: Option<DatePair>,
    brands: Vec<BrandCode>,
    similar: Vec<Itinerary>,
    solutions: Vec<Solution>,
    error: Option<SearchError>,
    cut_off: bool,
}

impl Itinerary {
    /// Creates an empty itinerary
    pub fn new(label: impl Into<String>) -> Self {
        Itinerary {
            label: label.into(),
            ..Itinerary::default()
        }
    }

    /// Itinerary label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Appends a segment and returns its index.
    pub fn add_segment(&mut self, segment: Segment) -> usize {
        self.segments.push(segment);
        self.segments.len() - 1
    }

    /// Segments in travel order
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Adds a fare market spanning segments `first..=last`.
    ///
    /// # Errors
    ///
    /// - [`ItineraryError::UnknownSegments`]: the span is empty or outside the itinerary.
    pub fn add_market(&mut self, first: usize, last: usize) -> Result<MarketKey, ItineraryError> {
        let covered = self
            .segments
            .get(first..=last)
            .filter(|segments| !segments.is_empty())
            .ok_or(ItineraryError::UnknownSegments { first, last })?;

        let (Some(head), Some(tail)) = (covered.first(), covered.last()) else {
            return Err(ItineraryError::UnknownSegments { first, last });
        };

        let market = Market {
            origin: head.origin.clone(),
            destination: tail.destination.clone(),
            origin_country: head.origin_country.clone(),
            destination_country: tail.destination_country.clone(),
            origin_area: head.origin_area,
            destination_area: tail.destination_area,
            span: SegmentSpan::new(first, last),
            carriers: covered.iter().map(|segment| segment.carrier.clone()).collect(),
            miles: covered.iter().map(|segment| segment.miles).sum(),
        };

        Ok(self.markets.insert(Arc::new(market)))
    }

    /// Looks up a market
    pub fn market(&self, key: MarketKey) -> Option<&Arc<Market>> {
        self.markets.get(key)
    }

    /// All markets
    pub fn markets(&self) -> impl Iterator<Item = (MarketKey, &Arc<Market>)> {
        self.markets.iter()
    }

    /// Adds a pricing unit template over the given markets.
    ///
    /// # Errors
    ///
    /// - [`ItineraryError::UnknownMarket`]: a market key is not part of this itinerary.
    /// - [`ItineraryError::InvalidTemplate`]: the markets do not form the requested kind.
    pub fn add_template(&mut self, kind: PuKind, markets: &[MarketKey]) -> Result<TemplateKey, ItineraryError> {
        self.insert_template(kind, markets, false)
    }

    /// Adds a pricing unit template priced as a side trip.
    ///
    /// # Errors
    ///
    /// See [`Itinerary::add_template`].
    pub fn add_side_trip(&mut self, kind: PuKind, markets: &[MarketKey]) -> Result<TemplateKey, ItineraryError> {
        self.insert_template(kind, markets, true)
    }

    fn insert_template(
        &mut self,
        kind: PuKind,
        markets: &[MarketKey],
        side_trip: bool,
    ) -> Result<TemplateKey, ItineraryError> {
        let resolved = markets
            .iter()
            .map(|key| self.markets.get(*key).ok_or(ItineraryError::UnknownMarket(*key)))
            .collect::<Result<SmallVec<[&Arc<Market>; 4]>, _>>()?;

        check_shape(kind, &resolved)?;

        Ok(self
            .templates
            .insert(PuTemplate::new(kind, markets.iter().copied().collect(), side_trip)))
    }

    /// Looks up a template
    pub fn template(&self, key: TemplateKey) -> Option<&PuTemplate> {
        self.templates.get(key)
    }

    /// Adds a pricing unit path made of the given templates and returns its
    /// index.
    ///
    /// # Errors
    ///
    /// - [`ItineraryError::UnknownTemplate`]: a template key is not part of this itinerary.
    /// - [`ItineraryError::Coverage`]: the templates do not cover every segment exactly once.
    pub fn add_path(&mut self, templates: &[TemplateKey]) -> Result<usize, ItineraryError> {
        let mut coverage = vec![0_u8; self.segments.len()];
        let mut spans = SmallVec::<[SegmentSpan; 6]>::new();

        for key in templates {
            let template = self.templates.get(*key).ok_or(ItineraryError::UnknownTemplate(*key))?;

            for market_key in template.markets() {
                let market = self
                    .markets
                    .get(*market_key)
                    .ok_or(ItineraryError::UnknownMarket(*market_key))?;

                spans.push(market.span);

                for segment in market.span.segments() {
                    let count = coverage.get_mut(segment).ok_or(ItineraryError::Coverage(segment))?;
                    *count += 1;
                }
            }
        }

        if let Some(segment) = coverage.iter().position(|count| *count != 1) {
            return Err(ItineraryError::Coverage(segment));
        }

        self.paths
            .push(PuPath::new(templates.iter().copied().collect(), FareBreaks::new(spans)));

        Ok(self.paths.len() - 1)
    }

    /// Pricing unit paths
    pub fn paths(&self) -> &[PuPath] {
        &self.paths
    }

    /// Marks this itinerary as one alternate date of the request.
    #[must_use]
    pub fn with_date_pair(mut self, date_pair: DatePair) -> Self {
        self.date_pair = Some(date_pair);
        self
    }

    /// Date pair, for alternate date requests
    pub fn date_pair(&self) -> Option<&DatePair> {
        self.date_pair.as_ref()
    }

    /// Requests one branded pass per brand.
    #[must_use]
    pub fn with_brands<I, B>(mut self, brands: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<BrandCode>,
    {
        self.brands = brands.into_iter().map(Into::into).collect();
        self
    }

    /// Brands requested
    pub fn brands(&self) -> &[BrandCode] {
        &self.brands
    }

    /// Attaches an itinerary with the same fare markets on other flights.
    pub fn add_similar(&mut self, itinerary: Itinerary) {
        self.similar.push(itinerary);
    }

    /// Similar itineraries
    pub fn similar(&self) -> &[Itinerary] {
        &self.similar
    }

    pub(crate) fn similar_mut(&mut self) -> &mut [Itinerary] {
        &mut self.similar
    }

    /// Committed solutions, cheapest first
    pub fn solutions(&self) -> &[Solution] {
        &self.solutions
    }

    /// Fare paths of the cheapest committed solution, one per passenger type
    pub fn fare_paths(&self) -> &[Arc<FarePath>] {
        self.solutions
            .first()
            .map_or(&[], |solution| solution.group.fare_paths())
    }

    /// Error that stopped this itinerary, if any
    pub fn error(&self) -> Option<&SearchError> {
        self.error.as_ref()
    }

    /// Whether the itinerary was dropped by the alternate date price cut-off
    pub fn is_cut_off(&self) -> bool {
        self.cut_off
    }

    /// Cheapest committed amount
    pub fn cheapest(&self) -> Option<crate::prices::Amount> {
        self.solutions.iter().map(|solution| solution.group.amount()).min()
    }

    pub(crate) fn commit(&mut self, brand: Option<BrandCode>, groups: Vec<GroupFarePath>) {
        self.solutions
            .extend(groups.into_iter().map(|group| Solution { brand: brand.clone(), group }));
    }

    pub(crate) fn record_error(&mut self, error: SearchError) {
        self.error = Some(error);
    }

    pub(crate) fn cut(&mut self) {
        self.cut_off = true;
    }

    pub(crate) fn reset_outcome(&mut self) {
        self.solutions.clear();
        self.error = None;
        self.cut_off = false;
    }
}

fn check_shape(kind: PuKind, markets: &[&Arc<Market>]) -> Result<(), ItineraryError> {
    let invalid = |reason| Err(ItineraryError::InvalidTemplate { kind, reason });

    let (Some(first), Some(last)) = (markets.first(), markets.last()) else {
        return invalid("no markets");
    };

    match kind {
        PuKind::OneWay if markets.len() != 1 => invalid("a one way unit has exactly one component"),
        PuKind::RoundTrip | PuKind::OpenJaw(_) if markets.len() != 2 => invalid("expected two components"),
        PuKind::RoundTrip if first.origin != last.destination || first.destination != last.origin => {
            invalid("inbound does not mirror outbound")
        }
        PuKind::CircleTrip if markets.len() < 2 => invalid("a circle trip has at least two components"),
        PuKind::CircleTrip if last.destination != first.origin => invalid("journey does not return to origin"),
        PuKind::OpenJaw(jaw) => {
            let turnaround_open = first.destination != last.origin;
            let origin_open = last.destination != first.origin;

            match (jaw, turnaround_open, origin_open) {
                (OpenJawKind::Origin, false, true)
                | (OpenJawKind::Turnaround, true, false)
                | (OpenJawKind::Double, true, true) => Ok(()),
                _ => invalid("open points do not match the open jaw type"),
            }
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    fn return_trip() -> Itinerary {
        let mut itinerary = Itinerary::new("LON-NYC-LON");

        itinerary.add_segment(Segment::new("LON", "NYC", "BA").between("GB", "US").areas(2, 1));
        itinerary.add_segment(Segment::new("NYC", "LON", "BA").between("US", "GB").areas(1, 2));

        itinerary
    }

    #[test]
    fn markets_take_endpoints_from_segments() -> TestResult {
        let mut itinerary = return_trip();

        let key = itinerary.add_market(0, 0)?;
        let market = itinerary.market(key).ok_or("missing market")?;

        assert_eq!(market.origin, LocCode::from("LON"));
        assert_eq!(market.destination, LocCode::from("NYC"));
        assert!(market.is_international());
        assert!(market.crosses_areas());

        Ok(())
    }

    #[test]
    fn market_outside_itinerary_is_rejected() {
        let mut itinerary = return_trip();

        assert_eq!(
            itinerary.add_market(1, 3),
            Err(ItineraryError::UnknownSegments { first: 1, last: 3 })
        );
    }

    #[test]
    fn round_trip_template_requires_mirrored_markets() -> TestResult {
        let mut itinerary = return_trip();

        let out = itinerary.add_market(0, 0)?;
        let back = itinerary.add_market(1, 1)?;

        assert!(itinerary.add_template(PuKind::RoundTrip, &[out, back]).is_ok());
        assert!(matches!(
            itinerary.add_template(PuKind::RoundTrip, &[out, out]),
            Err(ItineraryError::InvalidTemplate { .. })
        ));
        assert!(matches!(
            itinerary.add_template(PuKind::OpenJaw(OpenJawKind::Origin), &[out, back]),
            Err(ItineraryError::InvalidTemplate { .. })
        ));

        Ok(())
    }

    #[test]
    fn path_must_cover_every_segment_once() -> TestResult {
        let mut itinerary = return_trip();

        let out = itinerary.add_market(0, 0)?;
        let back = itinerary.add_market(1, 1)?;
        let rt = itinerary.add_template(PuKind::RoundTrip, &[out, back])?;
        let ow_out = itinerary.add_template(PuKind::OneWay, &[out])?;

        assert_eq!(itinerary.add_path(&[ow_out]), Err(ItineraryError::Coverage(1)));
        assert_eq!(itinerary.add_path(&[rt, ow_out]), Err(ItineraryError::Coverage(0)));

        let path = itinerary.add_path(&[rt])?;
        let breaks = itinerary.paths().get(path).ok_or("missing path")?.fare_breaks();

        assert_eq!(breaks.spans(), &[SegmentSpan::new(0, 0), SegmentSpan::new(1, 1)]);

        Ok(())
    }
}
