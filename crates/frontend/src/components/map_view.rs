use chronicle_shared::coords::{self, Point};
use chronicle_shared::gesture::{GestureOutcome, Handled, PointerEvent, MOUSE_POINTER_ID};
use chronicle_shared::models::{ImagePoint, PinId, Visibility};
use chronicle_shared::path::{self, ChronoPath};
use chronicle_shared::pin_store::VisiblePins;
use chronicle_shared::viewport::MapViewport;
use dioxus::html::geometry::WheelDelta;
use dioxus::html::input_data::MouseButton;
use dioxus::prelude::*;

use crate::coords::measure_layout;

pub const MAP_CONTAINER_ID: &str = "chronicle-map-container";
const MAP_IMAGE_ID: &str = "chronicle-map-image";

const MARKER_RADIUS: f64 = 8.0;

// ---------------------------------------------------------------------------
// Event helpers
// ---------------------------------------------------------------------------

/// Convert a wheel delta (pixels / lines / pages) to a uniform pixel-like value.
fn wheel_delta_y(delta: WheelDelta) -> f64 {
    match delta {
        WheelDelta::Pixels(d) => d.y,
        WheelDelta::Lines(d) => d.y * 40.0,
        WheelDelta::Pages(d) => d.y * 400.0,
    }
}

/// The container may have moved or resized since the last event.
fn refresh_layout(viewport: &mut Signal<MapViewport>) {
    if let Some(layout) = measure_layout(MAP_CONTAINER_ID, MAP_IMAGE_ID) {
        viewport.write().set_layout(layout);
    }
}

/// Passes the outcome on and reports whether the native event's default
/// action has to be suppressed.
fn forward(handled: Handled, on_outcome: &EventHandler<GestureOutcome>) -> bool {
    if handled.outcome != GestureOutcome::None {
        on_outcome.call(handled.outcome);
    }
    handled.prevent_default
}

// ---------------------------------------------------------------------------
// SVG overlay (pure, viewport pixel space)
// ---------------------------------------------------------------------------

pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Draw the chronological path, the pin markers with their order badges and
/// the pending placement. Markers sit in viewport pixels so they keep their
/// size at any zoom.
pub fn build_overlay_svg(viewport: &MapViewport, pins: &VisiblePins, path: &ChronoPath, curvature: f64) -> String {
    let Some(layout) = viewport.layout() else {
        return String::new();
    };
    let transform = viewport.transform();
    let to_screen = |at: ImagePoint| coords::image_percent_to_viewport(at, transform, layout.image_size);

    let mut svg = String::with_capacity(4096);
    build_path_segments(&mut svg, viewport, pins, path, curvature, &to_screen);
    build_pin_markers(&mut svg, viewport, pins, path, &to_screen);

    if let Some(pending) = viewport.gestures().pending() {
        let p = to_screen(pending.position);
        svg.push_str(&format!(
            r#"<circle class="pin-pending" cx="{}" cy="{}" r="{MARKER_RADIUS}" fill="none" stroke="white" stroke-width="2" stroke-dasharray="4 3"/>"#,
            p.x, p.y
        ));
    }
    svg
}

fn build_path_segments(
    svg: &mut String,
    viewport: &MapViewport,
    pins: &VisiblePins,
    path: &ChronoPath,
    curvature: f64,
    to_screen: &impl Fn(ImagePoint) -> Point,
) {
    let dragging = viewport.gestures().drag_preview().map(|(id, _)| id.clone());
    for segment in &path.segments {
        let (Some(from), Some(to)) = (pins.get(&segment.from_pin_id), pins.get(&segment.to_pin_id)) else {
            continue;
        };
        let from_at = viewport.marker_position(from);
        let to_at = viewport.marker_position(to);
        // A dragged endpoint bends its segments along with it.
        let control = if is_pin(&dragging, &segment.from_pin_id) || is_pin(&dragging, &segment.to_pin_id) {
            path::control_point(from_at, to_at, segment.order_index, curvature)
        } else {
            segment.control
        };
        let (a, c, b) = (to_screen(from_at), to_screen(control), to_screen(to_at));
        svg.push_str(&format!(
            r#"<path class="chrono-path" d="M {} {} Q {} {} {} {}" fill="none" stroke="rgba(230,200,120,0.9)" stroke-width="3" stroke-linecap="round"/>"#,
            a.x, a.y, c.x, c.y, b.x, b.y
        ));
    }
}

fn is_pin(candidate: &Option<PinId>, id: &PinId) -> bool {
    candidate.as_ref() == Some(id)
}

fn build_pin_markers(
    svg: &mut String,
    viewport: &MapViewport,
    pins: &VisiblePins,
    path: &ChronoPath,
    to_screen: &impl Fn(ImagePoint) -> Point,
) {
    let gestures = viewport.gestures();
    let selected = gestures.selected();
    let dragging = gestures.drag_preview().map(|(id, _)| id);

    for pin in pins.iter() {
        let p = to_screen(viewport.marker_position(pin));
        let mut class = String::from("pin-marker");
        if selected == Some(&pin.id) {
            class.push_str(" selected");
        }
        if dragging == Some(&pin.id) {
            class.push_str(" dragging");
        }
        if pin.visibility == Visibility::Gm {
            class.push_str(" gm");
        }
        let title = escape_xml(&pin.title);

        svg.push_str(&format!(r#"<g class="{class}" role="img"><title>{title}</title>"#));
        svg.push_str(&format!(
            r#"<circle cx="{}" cy="{}" r="{MARKER_RADIUS}" stroke="white" stroke-width="2"/>"#,
            p.x, p.y
        ));
        if let Some(order) = path.order_of(&pin.id) {
            svg.push_str(&format!(
                r#"<text class="order-badge" x="{}" y="{}" font-size="11" font-family="sans-serif" font-weight="700" text-anchor="middle" fill="white" stroke="rgba(0,0,0,0.7)" stroke-width="3" paint-order="stroke">{}</text>"#,
                p.x,
                p.y - MARKER_RADIUS - 4.0,
                order + 1
            ));
        }
        svg.push_str("</g>");
    }
}

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

#[component]
pub fn MapView(
    image_url: String,
    viewport: Signal<MapViewport>,
    pins: VisiblePins,
    path: ChronoPath,
    on_outcome: EventHandler<GestureOutcome>,
) -> Element {
    let mut viewport = viewport;

    let (svg_html, transform_style, container_class) = {
        let vp = viewport.read();
        let curvature = vp.config().path_curvature;
        let svg = build_overlay_svg(&vp, &pins, &path, curvature);
        let style = format!("transform: {}; transform-origin: 0 0;", vp.transform().css());
        let interaction = vp.gestures().interaction();
        let class = if interaction.placing {
            "map-container placing"
        } else if interaction.panning || interaction.dragging.is_some() {
            "map-container grabbing"
        } else {
            "map-container"
        };
        (svg, style, class)
    };

    let (width, height) = viewport
        .read()
        .layout()
        .map(|l| (l.viewport_size.width, l.viewport_size.height))
        .unwrap_or((0.0, 0.0));

    let pins_for_down = pins.clone();
    let pins_for_touch = pins.clone();
    let overlay_html = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">{svg_html}</svg>"#
    );

    rsx! {
        div {
            id: MAP_CONTAINER_ID,
            class: "{container_class}",

            onwheel: move |evt: Event<WheelData>| {
                refresh_layout(&mut viewport);
                let delta_y = wheel_delta_y(evt.data().delta());
                let client = evt.data().client_coordinates();
                let handled = viewport.write().wheel(delta_y, Point::new(client.x, client.y));
                if forward(handled, &on_outcome) {
                    evt.prevent_default();
                }
            },

            onmousedown: move |evt: Event<MouseData>| {
                refresh_layout(&mut viewport);
                let client = evt.client_coordinates();
                let primary = evt.trigger_button() == Some(MouseButton::Primary);
                let event = PointerEvent::mouse(Point::new(client.x, client.y), primary);
                let handled = viewport.write().pointer_down(event, &pins_for_down);
                if forward(handled, &on_outcome) {
                    evt.prevent_default();
                }
            },

            onmousemove: move |evt: Event<MouseData>| {
                let client = evt.client_coordinates();
                let event = PointerEvent::mouse(Point::new(client.x, client.y), true);
                let handled = viewport.write().pointer_move(event);
                if forward(handled, &on_outcome) {
                    evt.prevent_default();
                }
            },

            onmouseup: move |evt: Event<MouseData>| {
                let client = evt.client_coordinates();
                let primary = evt.trigger_button() == Some(MouseButton::Primary);
                let event = PointerEvent::mouse(Point::new(client.x, client.y), primary);
                let handled = viewport.write().pointer_up(event);
                if forward(handled, &on_outcome) {
                    evt.prevent_default();
                }
            },

            onmouseleave: move |_| {
                let handled = viewport.write().pointer_cancel(MOUSE_POINTER_ID);
                let _ = forward(handled, &on_outcome);
            },

            ondoubleclick: move |evt: Event<MouseData>| {
                evt.prevent_default();
                viewport.write().reset_view();
                on_outcome.call(GestureOutcome::ViewChanged);
            },

            // --- Touch event handlers ---

            ontouchstart: move |evt: Event<TouchData>| {
                refresh_layout(&mut viewport);
                let mut prevent = false;
                for touch in evt.data().touches_changed() {
                    let client = touch.client_coordinates();
                    let event = PointerEvent::touch(touch.identifier() as i64, Point::new(client.x, client.y));
                    let handled = viewport.write().pointer_down(event, &pins_for_touch);
                    prevent |= forward(handled, &on_outcome);
                }
                if prevent {
                    evt.prevent_default();
                }
            },

            ontouchmove: move |evt: Event<TouchData>| {
                let mut prevent = false;
                for touch in evt.data().touches_changed() {
                    let client = touch.client_coordinates();
                    let event = PointerEvent::touch(touch.identifier() as i64, Point::new(client.x, client.y));
                    let handled = viewport.write().pointer_move(event);
                    prevent |= forward(handled, &on_outcome);
                }
                if prevent {
                    evt.prevent_default();
                }
            },

            ontouchend: move |evt: Event<TouchData>| {
                let mut prevent = false;
                for touch in evt.data().touches_changed() {
                    let client = touch.client_coordinates();
                    let event = PointerEvent::touch(touch.identifier() as i64, Point::new(client.x, client.y));
                    let handled = viewport.write().pointer_up(event);
                    prevent |= forward(handled, &on_outcome);
                }
                if prevent {
                    evt.prevent_default();
                }
            },

            ontouchcancel: move |evt: Event<TouchData>| {
                let mut prevent = false;
                for touch in evt.data().touches_changed() {
                    let handled = viewport.write().pointer_cancel(touch.identifier() as i64);
                    prevent |= forward(handled, &on_outcome);
                }
                if prevent {
                    evt.prevent_default();
                }
            },

            // Inner wrapper: the CSS transform pans and zooms the image only.
            div {
                class: "map-inner",
                style: "{transform_style}",

                img {
                    id: MAP_IMAGE_ID,
                    src: "{image_url}",
                    draggable: "false",
                    onload: move |_| {
                        viewport.write().load_image(measure_layout(MAP_CONTAINER_ID, MAP_IMAGE_ID));
                    },
                }
            }

            // Overlay in viewport pixels, outside the transform.
            div {
                class: "map-overlay",
                dangerous_inner_html: "{overlay_html}",
            }
        }
    }
}
