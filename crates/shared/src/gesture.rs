//! Turns raw pointer, touch and wheel input into pan/zoom changes and pin
//! intents.
//!
//! Mouse and touch feed the same state machine through [`PointerEvent`]; a
//! pinch is simply the two-pointer case. Only one of pan, pin interaction or
//! pinch is active at a time.
use std::collections::BTreeMap;

use tracing::debug;

use crate::config::ViewportConfig;
use crate::coords::{self, Point, ViewportLayout};
use crate::models::{ImagePoint, PendingPlacement, PinId};
use crate::transform::Transform;

pub type PointerId = i64;

/// Pointer id used for the mouse; touch identifiers are non-negative.
pub const MOUSE_POINTER_ID: PointerId = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Mouse,
    Touch,
    Pen,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub id: PointerId,
    pub kind: PointerKind,
    /// Client-space position.
    pub client: Point,
    /// Left mouse button, or any touch/pen contact.
    pub primary: bool,
}

impl PointerEvent {
    pub fn mouse(client: Point, primary: bool) -> Self {
        PointerEvent {
            id: MOUSE_POINTER_ID,
            kind: PointerKind::Mouse,
            client,
            primary,
        }
    }

    pub fn touch(id: PointerId, client: Point) -> Self {
        PointerEvent {
            id,
            kind: PointerKind::Touch,
            client,
            primary: true,
        }
    }

    /// Touch events must not scroll or zoom the page underneath the map.
    pub fn prevents_default(&self) -> bool {
        self.kind == PointerKind::Touch
    }
}

/// What a pointer-down landed on.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerTarget {
    Background,
    Pin(PinId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum GestureOutcome {
    None,
    /// Pan or scale changed.
    ViewChanged,
    /// A click in placement mode produced a pending placement.
    PlacementProposed(ImagePoint),
    /// A click on a pin toggled the selection.
    SelectionChanged(Option<PinId>),
    /// The dragged marker should be drawn here; the pin store is untouched.
    DragPreview { pin: PinId, at: ImagePoint },
    /// A drag finished inside the image: persist the new position.
    MovePin { pin: PinId, to: ImagePoint },
    /// A drag was cancelled or ended outside the image: redraw the pin at
    /// its stored position.
    SnapBack { pin: PinId },
}

/// Result of feeding one event to the recognizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Handled {
    pub outcome: GestureOutcome,
    /// The caller must call `preventDefault` on the native event. Wheel
    /// listeners therefore have to be registered as non-passive.
    pub prevent_default: bool,
}

impl Handled {
    fn new(outcome: GestureOutcome, prevent_default: bool) -> Self {
        Handled {
            outcome,
            prevent_default,
        }
    }

    pub fn ignored(prevent_default: bool) -> Self {
        Handled::new(GestureOutcome::None, prevent_default)
    }
}

/// Lives from pointer-down on a pin until pointer-up.
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    pub pin_id: PinId,
    pub pointer: PointerId,
    pub pointer_anchor: Point,
    pub moved_past_threshold: bool,
    preview: Option<ImagePoint>,
}

impl DragSession {
    fn new(pin_id: PinId, pointer: PointerId, pointer_anchor: Point) -> Self {
        DragSession {
            pin_id,
            pointer,
            pointer_anchor,
            moved_past_threshold: false,
            preview: None,
        }
    }

    /// Last in-bounds position the marker was dragged to.
    pub fn preview(&self) -> Option<ImagePoint> {
        self.preview
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PanSession {
    pointer: PointerId,
    anchor: Point,
    /// Transform at pointer-down; every move pans relative to it so rounding
    /// never accumulates within one drag.
    anchor_transform: Transform,
}

#[derive(Debug, Clone, PartialEq)]
struct PlacementClick {
    pointer: PointerId,
    anchor: Point,
    moved: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct PinchSession {
    pointers: (PointerId, PointerId),
    previous_distance: f64,
}

impl PinchSession {
    fn involves(&self, id: PointerId) -> bool {
        self.pointers.0 == id || self.pointers.1 == id
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    Idle,
    Panning(PanSession),
    Placing(PlacementClick),
    Dragging(DragSession),
    Pinching(PinchSession),
    /// A pinch ended but fingers are still down; wait for all to lift.
    Settling,
}

/// Snapshot of the interaction for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteractionState<'a> {
    pub placing: bool,
    pub pending: Option<&'a PendingPlacement>,
    pub dragging: Option<&'a PinId>,
    pub selected: Option<&'a PinId>,
    pub panning: bool,
}

#[derive(Debug, Clone)]
pub struct GestureRecognizer {
    config: ViewportConfig,
    pointers: BTreeMap<PointerId, Point>,
    phase: Phase,
    placing_armed: bool,
    pending: Option<PendingPlacement>,
    selected: Option<PinId>,
}

impl GestureRecognizer {
    pub fn new(config: ViewportConfig) -> Self {
        GestureRecognizer {
            config,
            pointers: BTreeMap::new(),
            phase: Phase::Idle,
            placing_armed: false,
            pending: None,
            selected: None,
        }
    }

    /// Forget everything, e.g. when a new map image is loaded.
    pub fn reset(&mut self) {
        *self = GestureRecognizer::new(self.config);
    }

    pub fn interaction(&self) -> InteractionState<'_> {
        InteractionState {
            placing: self.placing_armed,
            pending: self.pending.as_ref(),
            dragging: self.dragging(),
            selected: self.selected.as_ref(),
            panning: matches!(self.phase, Phase::Panning(_)),
        }
    }

    // --- placement mode -------------------------------------------------

    /// Arm single-shot placement: the next click on the image proposes a pin.
    pub fn arm_placement(&mut self) {
        self.placing_armed = true;
        self.pending = None;
    }

    pub fn cancel_placement(&mut self) {
        self.placing_armed = false;
        self.pending = None;
        if matches!(self.phase, Phase::Placing(_)) {
            self.phase = Phase::Idle;
        }
    }

    pub fn is_placing_armed(&self) -> bool {
        self.placing_armed
    }

    pub fn pending(&self) -> Option<&PendingPlacement> {
        self.pending.as_ref()
    }

    /// For the placement form to edit the transient fields.
    pub fn pending_mut(&mut self) -> Option<&mut PendingPlacement> {
        self.pending.as_mut()
    }

    /// Drop the pending placement once the pin has been created.
    pub fn clear_pending(&mut self) {
        self.pending = None;
    }

    // --- selection -------------------------------------------------------

    pub fn selected(&self) -> Option<&PinId> {
        self.selected.as_ref()
    }

    pub fn select(&mut self, pin: Option<PinId>) {
        self.selected = pin;
    }

    /// A pin disappeared from the store: drop every reference to it.
    pub fn forget_pin(&mut self, pin: &PinId) {
        if self.selected.as_ref() == Some(pin) {
            self.selected = None;
        }
        if matches!(&self.phase, Phase::Dragging(drag) if &drag.pin_id == pin) {
            self.phase = Phase::Idle;
        }
    }

    // --- drag state --------------------------------------------------------

    pub fn drag_session(&self) -> Option<&DragSession> {
        match &self.phase {
            Phase::Dragging(drag) => Some(drag),
            _ => None,
        }
    }

    /// Pin being dragged, once the press has crossed the drag threshold.
    pub fn dragging(&self) -> Option<&PinId> {
        self.drag_session()
            .filter(|drag| drag.moved_past_threshold)
            .map(|drag| &drag.pin_id)
    }

    /// Immediate on-screen position of the dragged marker, if any.
    pub fn drag_preview(&self) -> Option<(&PinId, ImagePoint)> {
        let drag = self.drag_session()?;
        if !drag.moved_past_threshold {
            return None;
        }
        drag.preview.map(|at| (&drag.pin_id, at))
    }

    // --- input -----------------------------------------------------------

    pub fn pointer_down(&mut self, event: PointerEvent, target: PointerTarget, transform: &Transform) -> Handled {
        let prevent_default = event.prevents_default();
        if !event.primary {
            return Handled::ignored(prevent_default);
        }
        self.pointers.insert(event.id, event.client);

        if self.pointers.len() >= 2 {
            return Handled::new(self.begin_pinch(), prevent_default);
        }
        if self.phase != Phase::Idle {
            return Handled::ignored(prevent_default);
        }

        self.phase = match target {
            _ if self.placing_armed => Phase::Placing(PlacementClick {
                pointer: event.id,
                anchor: event.client,
                moved: false,
            }),
            PointerTarget::Pin(pin_id) => Phase::Dragging(DragSession::new(pin_id, event.id, event.client)),
            PointerTarget::Background => Phase::Panning(PanSession {
                pointer: event.id,
                anchor: event.client,
                anchor_transform: *transform,
            }),
        };
        Handled::ignored(prevent_default)
    }

    pub fn pointer_move(&mut self, event: PointerEvent, transform: &mut Transform, layout: &ViewportLayout) -> Handled {
        let prevent_default = event.prevents_default();
        // Hovering mouse, or a finger we never saw go down.
        let Some(position) = self.pointers.get_mut(&event.id) else {
            return Handled::ignored(prevent_default);
        };
        *position = event.client;

        let threshold = self.config.drag_threshold_px;
        let outcome = match &mut self.phase {
            Phase::Panning(pan) if pan.pointer == event.id => {
                *transform = pan.anchor_transform;
                transform.pan_by(event.client.x - pan.anchor.x, event.client.y - pan.anchor.y);
                GestureOutcome::ViewChanged
            }
            Phase::Placing(click) if click.pointer == event.id => {
                if coords::distance(event.client, click.anchor) > threshold {
                    click.moved = true;
                }
                GestureOutcome::None
            }
            Phase::Dragging(drag) if drag.pointer == event.id => {
                if !drag.moved_past_threshold && coords::distance(event.client, drag.pointer_anchor) > threshold {
                    debug!(pin = %drag.pin_id, "pin drag started");
                    drag.moved_past_threshold = true;
                }
                if drag.moved_past_threshold {
                    match coords::client_to_image_percent(event.client, layout.image_rect(transform)) {
                        Some(at) => {
                            drag.preview = Some(at);
                            GestureOutcome::DragPreview {
                                pin: drag.pin_id.clone(),
                                at,
                            }
                        }
                        None => GestureOutcome::None,
                    }
                } else {
                    GestureOutcome::None
                }
            }
            Phase::Pinching(pinch) if pinch.involves(event.id) => {
                apply_pinch(pinch, &self.pointers, &self.config, transform, layout)
            }
            _ => GestureOutcome::None,
        };
        Handled::new(outcome, prevent_default)
    }

    pub fn pointer_up(&mut self, event: PointerEvent, transform: &Transform, layout: &ViewportLayout) -> Handled {
        let prevent_default = event.prevents_default();
        // Releasing another mouse button does not end the primary press.
        if !event.primary || self.pointers.remove(&event.id).is_none() {
            return Handled::ignored(prevent_default);
        }

        let outcome = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Panning(pan) if pan.pointer == event.id => GestureOutcome::None,
            Phase::Placing(click) if click.pointer == event.id => self.finish_placement(click, transform, layout),
            Phase::Dragging(drag) if drag.pointer == event.id => self.finish_drag(drag, event.client, transform, layout),
            Phase::Pinching(pinch) if pinch.involves(event.id) => {
                self.settle();
                GestureOutcome::None
            }
            Phase::Settling => {
                self.settle();
                GestureOutcome::None
            }
            other => {
                self.phase = other;
                GestureOutcome::None
            }
        };
        Handled::new(outcome, prevent_default)
    }

    /// The pointer left the viewport or the platform cancelled it. Whatever
    /// gesture it drove is abandoned without side effects.
    pub fn pointer_cancel(&mut self, id: PointerId) -> Handled {
        let prevent_default = id != MOUSE_POINTER_ID;
        if self.pointers.remove(&id).is_none() {
            return Handled::ignored(prevent_default);
        }

        let outcome = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Dragging(drag) if drag.pointer == id => {
                if drag.moved_past_threshold {
                    debug!(pin = %drag.pin_id, "pin drag cancelled");
                    GestureOutcome::SnapBack { pin: drag.pin_id }
                } else {
                    GestureOutcome::None
                }
            }
            Phase::Panning(pan) if pan.pointer == id => GestureOutcome::None,
            Phase::Placing(click) if click.pointer == id => GestureOutcome::None,
            Phase::Pinching(pinch) if pinch.involves(id) => {
                self.settle();
                GestureOutcome::None
            }
            Phase::Settling => {
                self.settle();
                GestureOutcome::None
            }
            other => {
                self.phase = other;
                GestureOutcome::None
            }
        };
        Handled::new(outcome, prevent_default)
    }

    /// Wheel zoom around the pointer. Always asks for `preventDefault`, even
    /// at a scale limit, so the page never scrolls under the map.
    pub fn wheel(&mut self, delta_y: f64, client: Point, transform: &mut Transform, layout: &ViewportLayout) -> Handled {
        if delta_y == 0.0 || !delta_y.is_finite() {
            return Handled::ignored(true);
        }
        let step = self.config.wheel_step;
        let factor = if delta_y < 0.0 { step } else { 1.0 / step };
        let outcome = zoom_outcome(transform.zoom_at(layout.to_viewport(client), factor, self.config.scale_limits()));
        Handled::new(outcome, true)
    }

    fn begin_pinch(&mut self) -> GestureOutcome {
        if self.pointers.len() > 2 || matches!(self.phase, Phase::Pinching(_)) {
            return GestureOutcome::None;
        }
        let mut down = self.pointers.iter();
        let (Some((&a, &pa)), Some((&b, &pb))) = (down.next(), down.next()) else {
            return GestureOutcome::None;
        };

        let outcome = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Dragging(drag) if drag.moved_past_threshold => GestureOutcome::SnapBack { pin: drag.pin_id },
            _ => GestureOutcome::None,
        };
        debug!("pinch started");
        self.phase = Phase::Pinching(PinchSession {
            pointers: (a, b),
            previous_distance: coords::distance(pa, pb),
        });
        outcome
    }

    fn settle(&mut self) {
        self.phase = if self.pointers.is_empty() {
            Phase::Idle
        } else {
            Phase::Settling
        };
    }

    fn finish_placement(&mut self, click: PlacementClick, transform: &Transform, layout: &ViewportLayout) -> GestureOutcome {
        if click.moved {
            return GestureOutcome::None;
        }
        match coords::client_to_image_percent(click.anchor, layout.image_rect(transform)) {
            Some(at) => {
                self.pending = Some(PendingPlacement::at(at));
                self.placing_armed = false;
                GestureOutcome::PlacementProposed(at)
            }
            None => {
                debug!("placement click outside the image ignored");
                GestureOutcome::None
            }
        }
    }

    fn finish_drag(
        &mut self,
        drag: DragSession,
        release: Point,
        transform: &Transform,
        layout: &ViewportLayout,
    ) -> GestureOutcome {
        if !drag.moved_past_threshold {
            self.selected = if self.selected.as_ref() == Some(&drag.pin_id) {
                None
            } else {
                Some(drag.pin_id)
            };
            return GestureOutcome::SelectionChanged(self.selected.clone());
        }
        match coords::client_to_image_percent(release, layout.image_rect(transform)) {
            Some(to) => GestureOutcome::MovePin { pin: drag.pin_id, to },
            None => {
                debug!(pin = %drag.pin_id, "pin released outside the image");
                GestureOutcome::SnapBack { pin: drag.pin_id }
            }
        }
    }
}

/// One incremental pinch step: the factor is relative to the previous move,
/// not the gesture start, so the zoom rate stays proportional to finger travel.
fn apply_pinch(
    pinch: &mut PinchSession,
    pointers: &BTreeMap<PointerId, Point>,
    config: &ViewportConfig,
    transform: &mut Transform,
    layout: &ViewportLayout,
) -> GestureOutcome {
    let (Some(&a), Some(&b)) = (pointers.get(&pinch.pointers.0), pointers.get(&pinch.pointers.1)) else {
        return GestureOutcome::None;
    };
    let current = coords::distance(a, b);
    let previous = std::mem::replace(&mut pinch.previous_distance, current);
    if previous < config.min_pinch_distance_px || current < config.min_pinch_distance_px {
        debug!(previous, current, "pinch distance too small, skipping step");
        return GestureOutcome::None;
    }
    let focus = layout.to_viewport(coords::midpoint(a, b));
    zoom_outcome(transform.zoom_at(focus, current / previous, config.scale_limits()))
}

fn zoom_outcome(result: Result<bool, crate::error::MapError>) -> GestureOutcome {
    match result {
        Ok(true) => GestureOutcome::ViewChanged,
        Ok(false) => GestureOutcome::None,
        Err(err) => {
            debug!(%err, "zoom step ignored");
            GestureOutcome::None
        }
    }
}
