//! Pricing unit templates

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::itinerary::{MarketKey, SegmentSpan, TemplateKey};

/// Which ends of an open jaw are open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenJawKind {
    /// Return to a different point than the origin.
    Origin,

    /// Outbound destination differs from the inbound origin.
    Turnaround,

    /// Both ends are open.
    Double,
}

/// Pricing unit type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PuKind {
    /// A single fare component.
    OneWay,

    /// Two components, the inbound mirroring the outbound.
    RoundTrip,

    /// Two or more components returning to the origin.
    CircleTrip,

    /// Two components with a surface sector at one or both ends.
    OpenJaw(OpenJawKind),
}

impl PuKind {
    /// Whether this unit combines fares as halves of a round trip.
    pub fn is_doubled(self) -> bool {
        !matches!(self, PuKind::OneWay)
    }
}

impl fmt::Display for PuKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PuKind::OneWay => f.write_str("OW"),
            PuKind::RoundTrip => f.write_str("RT"),
            PuKind::CircleTrip => f.write_str("CT"),
            PuKind::OpenJaw(OpenJawKind::Origin) => f.write_str("OJ(origin)"),
            PuKind::OpenJaw(OpenJawKind::Turnaround) => f.write_str("OJ(turnaround)"),
            PuKind::OpenJaw(OpenJawKind::Double) => f.write_str("OJ(double)"),
        }
    }
}

/// Fixed arrangement of fare component slots, shared by every passenger type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PuTemplate {
    kind: PuKind,
    markets: SmallVec<[MarketKey; 4]>,
    side_trip: bool,
}

impl PuTemplate {
    pub(crate) fn new(kind: PuKind, markets: SmallVec<[MarketKey; 4]>, side_trip: bool) -> Self {
        PuTemplate {
            kind,
            markets,
            side_trip,
        }
    }

    /// Pricing unit type
    pub fn kind(&self) -> PuKind {
        self.kind
    }

    /// Markets, one per fare component slot
    pub fn markets(&self) -> &[MarketKey] {
        &self.markets
    }

    /// Whether the unit prices a side trip
    pub fn is_side_trip(&self) -> bool {
        self.side_trip
    }
}

/// Segment spans at which fare components break, in segment order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FareBreaks(SmallVec<[SegmentSpan; 6]>);

impl FareBreaks {
    /// Builds fare breaks from component spans in any order.
    pub fn new(spans: impl IntoIterator<Item = SegmentSpan>) -> Self {
        let mut spans: SmallVec<[SegmentSpan; 6]> = spans.into_iter().collect();
        spans.sort_unstable();

        FareBreaks(spans)
    }

    /// Component spans in segment order
    pub fn spans(&self) -> &[SegmentSpan] {
        &self.0
    }
}

/// One way of breaking the itinerary into pricing units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PuPath {
    templates: SmallVec<[TemplateKey; 4]>,
    fare_breaks: FareBreaks,
}

impl PuPath {
    pub(crate) fn new(templates: SmallVec<[TemplateKey; 4]>, fare_breaks: FareBreaks) -> Self {
        PuPath {
            templates,
            fare_breaks,
        }
    }

    /// Templates priced together by this path
    pub fn templates(&self) -> &[TemplateKey] {
        &self.templates
    }

    /// Fare breaks of the path
    pub fn fare_breaks(&self) -> &FareBreaks {
        &self.fare_breaks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fare_breaks_are_ordered() {
        let breaks = FareBreaks::new([SegmentSpan::new(2, 3), SegmentSpan::new(0, 1)]);

        assert_eq!(breaks.spans(), &[SegmentSpan::new(0, 1), SegmentSpan::new(2, 3)]);
        assert_eq!(breaks, FareBreaks::new([SegmentSpan::new(0, 1), SegmentSpan::new(2, 3)]));
    }

    #[test]
    fn only_one_way_is_not_doubled() {
        assert!(!PuKind::OneWay.is_doubled());
        assert!(PuKind::RoundTrip.is_doubled());
        assert!(PuKind::OpenJaw(OpenJawKind::Double).is_doubled());
        assert_eq!(PuKind::CircleTrip.to_string(), "CT");
    }
}
