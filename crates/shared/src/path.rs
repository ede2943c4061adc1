//! Chronological path through the dated pins a viewer can see.
use crate::models::{DateKey, ImagePoint, PinId};
use crate::pin_store::VisiblePins;

/// A dated pin in chronological position.
#[derive(Debug, Clone, PartialEq)]
pub struct ChronoStop {
    pub pin_id: PinId,
    /// 0-based; the badge shows `order_index + 1`.
    pub order_index: usize,
    pub position: ImagePoint,
    pub key: DateKey,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathSegment {
    pub from_pin_id: PinId,
    pub to_pin_id: PinId,
    /// Index of the segment, i.e. of its starting stop.
    pub order_index: usize,
    /// Quadratic bezier control point in image-percent space.
    pub control: ImagePoint,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChronoPath {
    pub stops: Vec<ChronoStop>,
    pub segments: Vec<PathSegment>,
}

impl ChronoPath {
    pub fn order_of(&self, pin_id: &PinId) -> Option<usize> {
        self.stops
            .iter()
            .find(|stop| &stop.pin_id == pin_id)
            .map(|stop| stop.order_index)
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Order the dated pins by date key and connect consecutive ones. Pins
/// sharing a key keep their store order. Undated pins are left out.
pub fn build_path(pins: &VisiblePins, curvature: f64) -> ChronoPath {
    let mut dated: Vec<_> = pins
        .iter()
        .filter_map(|pin| pin.date.as_ref().map(|date| (pin, date)))
        .collect();
    // sort_by_key is stable.
    dated.sort_by_key(|(_, date)| date.key);

    let stops: Vec<ChronoStop> = dated
        .into_iter()
        .enumerate()
        .map(|(order_index, (pin, date))| ChronoStop {
            pin_id: pin.id.clone(),
            order_index,
            position: pin.position(),
            key: date.key,
            label: date.label.clone(),
        })
        .collect();

    let segments = stops
        .windows(2)
        .map(|pair| PathSegment {
            from_pin_id: pair[0].pin_id.clone(),
            to_pin_id: pair[1].pin_id.clone(),
            order_index: pair[0].order_index,
            control: control_point(pair[0].position, pair[1].position, pair[0].order_index, curvature),
        })
        .collect();

    ChronoPath { stops, segments }
}

/// Offset the segment midpoint along its normal by `curvature` times the
/// segment length, bending left and right alternately so consecutive
/// segments read as a meandering route.
pub fn control_point(from: ImagePoint, to: ImagePoint, order_index: usize, curvature: f64) -> ImagePoint {
    let mid_x = (from.x + to.x) / 2.0;
    let mid_y = (from.y + to.y) / 2.0;
    // Rotating (dx, dy) by 90 degrees gives a normal of the same length.
    let normal_x = -(to.y - from.y);
    let normal_y = to.x - from.x;
    let side = if order_index % 2 == 0 { 1.0 } else { -1.0 };
    ImagePoint::new(
        mid_x + normal_x * curvature * side,
        mid_y + normal_y * curvature * side,
    )
}
