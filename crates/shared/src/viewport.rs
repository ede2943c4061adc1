use crate::config::ViewportConfig;
use crate::coords::{self, Point, ViewportLayout};
use crate::gesture::{GestureRecognizer, Handled, PointerEvent, PointerId, PointerTarget};
use crate::models::{ImagePoint, Pin, PinId};
use crate::transform::Transform;

/// The map viewport: transform, layout and gesture state for one open map.
///
/// Until the image has been measured there is no layout and pointer input
/// is ignored.
#[derive(Debug, Clone)]
pub struct MapViewport {
    config: ViewportConfig,
    transform: Transform,
    layout: Option<ViewportLayout>,
    gestures: GestureRecognizer,
}

impl MapViewport {
    pub fn new(config: ViewportConfig) -> Self {
        let config = config.validated();
        MapViewport {
            config,
            transform: Transform::IDENTITY,
            layout: None,
            gestures: GestureRecognizer::new(config),
        }
    }

    pub fn config(&self) -> &ViewportConfig {
        &self.config
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn layout(&self) -> Option<&ViewportLayout> {
        self.layout.as_ref()
    }

    pub fn gestures(&self) -> &GestureRecognizer {
        &self.gestures
    }

    pub fn gestures_mut(&mut self) -> &mut GestureRecognizer {
        &mut self.gestures
    }

    /// Update after the container was resized or scrolled.
    pub fn set_layout(&mut self, layout: ViewportLayout) {
        self.layout = Some(layout);
    }

    /// A new map image: forget the view and any half-finished interaction.
    pub fn load_image(&mut self, layout: Option<ViewportLayout>) {
        self.transform.reset();
        self.gestures.reset();
        self.layout = layout;
    }

    pub fn reset_view(&mut self) {
        self.transform.reset();
    }

    /// Keyboard / button zoom around the middle of the viewport.
    pub fn zoom_about_center(&mut self, factor: f64) -> bool {
        let Some(layout) = self.layout else {
            return false;
        };
        self.transform
            .zoom_at(layout.viewport_center(), factor, self.config.scale_limits())
            .unwrap_or(false)
    }

    /// Viewport position of a pin's anchor under the current transform.
    pub fn screen_anchor(&self, pin: &Pin) -> Option<Point> {
        let layout = self.layout?;
        let at = self.marker_position(pin);
        Some(coords::image_percent_to_viewport(at, &self.transform, layout.image_size))
    }

    /// Where a marker is drawn: the drag preview while this pin is being
    /// dragged, its stored position otherwise.
    pub fn marker_position(&self, pin: &Pin) -> ImagePoint {
        match self.gestures.drag_preview() {
            Some((id, at)) if id == &pin.id => at,
            _ => pin.position(),
        }
    }

    /// Nearest pin marker within the hit radius of `client`, in viewport
    /// pixels so the radius does not grow with zoom.
    pub fn hit_test(&self, client: Point, pins: &[Pin]) -> Option<PinId> {
        let layout = self.layout?;
        let pointer = layout.to_viewport(client);
        let mut best: Option<&Pin> = None;
        let mut best_dist = self.config.hit_radius_px;
        for pin in pins {
            let anchor = coords::image_percent_to_viewport(pin.position(), &self.transform, layout.image_size);
            let dist = coords::distance(anchor, pointer);
            if dist <= best_dist {
                best_dist = dist;
                best = Some(pin);
            }
        }
        best.map(|pin| pin.id.clone())
    }

    /// Hit-test and forward a pointer-down.
    pub fn pointer_down(&mut self, event: PointerEvent, pins: &[Pin]) -> Handled {
        if self.layout.is_none() {
            return Handled::ignored(event.prevents_default());
        }
        let target = match self.hit_test(event.client, pins) {
            Some(id) => PointerTarget::Pin(id),
            None => PointerTarget::Background,
        };
        self.gestures.pointer_down(event, target, &self.transform)
    }

    pub fn pointer_move(&mut self, event: PointerEvent) -> Handled {
        match &self.layout {
            Some(layout) => self.gestures.pointer_move(event, &mut self.transform, layout),
            None => Handled::ignored(event.prevents_default()),
        }
    }

    pub fn pointer_up(&mut self, event: PointerEvent) -> Handled {
        match &self.layout {
            Some(layout) => self.gestures.pointer_up(event, &self.transform, layout),
            None => Handled::ignored(event.prevents_default()),
        }
    }

    pub fn pointer_cancel(&mut self, id: PointerId) -> Handled {
        self.gestures.pointer_cancel(id)
    }

    pub fn wheel(&mut self, delta_y: f64, client: Point) -> Handled {
        match &self.layout {
            Some(layout) => self.gestures.wheel(delta_y, client, &mut self.transform, layout),
            None => Handled::ignored(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{Rect, Size};
    use crate::gesture::GestureOutcome;
    use crate::models::Visibility;

    fn pin(id: &str, x: f64, y: f64) -> Pin {
        Pin {
            id: PinId::new(id),
            x,
            y,
            title: id.to_string(),
            notes: None,
            related_article_id: None,
            visibility: Visibility::Players,
            date: None,
        }
    }

    /// Viewport at client (100, 50), image laid out 1000x500.
    fn viewport() -> MapViewport {
        let mut v = MapViewport::new(ViewportConfig::default());
        let layout =
            ViewportLayout::fit_width(Rect::new(100.0, 50.0, 1000.0, 700.0), Size::new(4000.0, 2000.0)).unwrap();
        v.set_layout(layout);
        v
    }

    #[test]
    fn test_hit_test_picks_nearest_within_radius() {
        let v = viewport();
        let pins = vec![pin("a", 50.0, 50.0), pin("b", 51.0, 50.0)];
        // "a" sits at client (600, 300), "b" at (610, 300).
        assert_eq!(v.hit_test(Point::new(603.0, 300.0), &pins), Some(PinId::new("a")));
        assert_eq!(v.hit_test(Point::new(608.0, 301.0), &pins), Some(PinId::new("b")));
        assert_eq!(v.hit_test(Point::new(600.0, 330.0), &pins), None);
    }

    #[test]
    fn test_hit_radius_is_constant_on_screen() {
        let mut v = viewport();
        let pins = vec![pin("a", 50.0, 50.0)];
        v.zoom_about_center(4.0);
        let anchor = v.screen_anchor(&pins[0]).unwrap();
        let client = Point::new(anchor.x + 100.0 + 13.0, anchor.y + 50.0);
        assert_eq!(v.hit_test(client, &pins), Some(PinId::new("a")));
        let client = Point::new(anchor.x + 100.0 + 15.0, anchor.y + 50.0);
        assert_eq!(v.hit_test(client, &pins), None);
    }

    #[test]
    fn test_press_on_pin_does_not_pan() {
        let mut v = viewport();
        let pins = vec![pin("a", 50.0, 50.0)];
        v.pointer_down(PointerEvent::mouse(Point::new(600.0, 300.0), true), &pins);
        v.pointer_move(PointerEvent::mouse(Point::new(700.0, 300.0), true));
        assert_eq!(*v.transform(), Transform::IDENTITY);
        assert_eq!(v.gestures().dragging(), Some(&PinId::new("a")));

        // Renderer fast path: the marker follows the pointer, the pin does not.
        let at = v.marker_position(&pins[0]);
        assert!((at.x - 60.0).abs() < 1e-9);
        assert_eq!(pins[0].position(), ImagePoint::new(50.0, 50.0));

        let h = v.pointer_up(PointerEvent::mouse(Point::new(700.0, 300.0), true));
        assert!(matches!(h.outcome, GestureOutcome::MovePin { .. }));
        assert_eq!(v.marker_position(&pins[0]), ImagePoint::new(50.0, 50.0));
    }

    #[test]
    fn test_press_on_background_pans() {
        let mut v = viewport();
        let pins = vec![pin("a", 50.0, 50.0)];
        v.pointer_down(PointerEvent::mouse(Point::new(200.0, 100.0), true), &pins);
        v.pointer_move(PointerEvent::mouse(Point::new(260.0, 90.0), true));
        assert_eq!(v.transform().pan(), Point::new(60.0, -10.0));
    }

    #[test]
    fn test_wheel_uses_viewport_coordinates() {
        let mut v = viewport();
        v.wheel(-1.0, Point::new(300.0, 250.0));
        // The content under viewport (200, 200) stays put.
        let content = v.transform().viewport_to_content(Point::new(200.0, 200.0));
        assert!((content.x - 200.0).abs() < 1e-9);
        assert!((content.y - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_without_layout_input_is_ignored() {
        let mut v = MapViewport::new(ViewportConfig::default());
        let h = v.pointer_down(PointerEvent::mouse(Point::new(1.0, 1.0), true), &[]);
        assert_eq!(h.outcome, GestureOutcome::None);
        assert!(!h.prevent_default);
        // Touches still must not scroll the page before the image is measured.
        let h = v.pointer_down(PointerEvent::touch(3, Point::new(1.0, 1.0)), &[]);
        assert!(h.prevent_default);
        let h = v.pointer_move(PointerEvent::touch(3, Point::new(2.0, 2.0)));
        assert!(h.prevent_default);
        let h = v.wheel(-1.0, Point::new(1.0, 1.0));
        assert!(h.prevent_default);
        assert_eq!(*v.transform(), Transform::IDENTITY);
        assert!(!v.zoom_about_center(2.0));
    }

    #[test]
    fn test_load_image_resets_view_and_gestures() {
        let mut v = viewport();
        v.zoom_about_center(2.0);
        v.gestures_mut().arm_placement();
        v.load_image(None);
        assert_eq!(*v.transform(), Transform::IDENTITY);
        assert!(!v.gestures().is_placing_armed());
        assert!(v.layout().is_none());
    }

    #[test]
    fn test_zoom_about_center_keeps_center() {
        let mut v = viewport();
        v.zoom_about_center(2.0);
        let center = v.layout().unwrap().viewport_center();
        let content = v.transform().viewport_to_content(center);
        assert!((content.x - center.x).abs() < 1e-9);
        assert!((content.y - center.y).abs() < 1e-9);
        v.reset_view();
        assert_eq!(*v.transform(), Transform::IDENTITY);
    }
}
