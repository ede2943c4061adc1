//! Conversions between the three coordinate spaces of the map viewport:
//!
//! * client space: pointer coordinates as reported by the browser,
//! * viewport space: pixels relative to the viewport's top-left corner,
//!   after the pan/zoom transform,
//! * image-percent space: `0..=100` of the image's natural size, independent
//!   of layout and transform. Only this space is ever persisted.
//!
//! Everything here is a pure function of its inputs.
use crate::models::ImagePoint;
use crate::transform::Transform;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Size { width, height }
    }
}

/// Axis-aligned rectangle in client space (a DOM bounding rect).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Rect {
            left,
            top,
            width,
            height,
        }
    }
}

/// Where the viewport sits on screen and how large the image is laid out
/// before any zoom is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportLayout {
    /// Client coordinates of the viewport's top-left corner.
    pub origin: Point,
    pub viewport_size: Size,
    /// Layout size of the image at scale 1.
    pub image_size: Size,
}

impl ViewportLayout {
    /// Layout for an image rendered `width: 100%; height: auto` inside the
    /// viewport, i.e. both axes share the viewport-width scale factor.
    pub fn fit_width(viewport: Rect, natural: Size) -> Option<Self> {
        if viewport.width <= 0.0 || natural.width <= 0.0 || natural.height <= 0.0 {
            return None;
        }
        let height = viewport.width * natural.height / natural.width;
        Some(ViewportLayout {
            origin: Point::new(viewport.left, viewport.top),
            viewport_size: Size::new(viewport.width, viewport.height),
            image_size: Size::new(viewport.width, height),
        })
    }

    pub fn to_viewport(&self, client: Point) -> Point {
        client_to_viewport(client, self.origin)
    }

    pub fn viewport_center(&self) -> Point {
        Point::new(self.viewport_size.width / 2.0, self.viewport_size.height / 2.0)
    }

    /// Client-space rectangle the image currently occupies.
    pub fn image_rect(&self, transform: &Transform) -> Rect {
        image_screen_rect(self.origin, transform, self.image_size)
    }
}

pub fn client_to_viewport(client: Point, origin: Point) -> Point {
    Point::new(client.x - origin.x, client.y - origin.y)
}

pub fn distance(a: Point, b: Point) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    (dx * dx + dy * dy).sqrt()
}

pub fn midpoint(a: Point, b: Point) -> Point {
    Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
}

/// Map a pointer position to image-percent coordinates using the image's
/// on-screen bounding rectangle. Returns `None` when the pointer is outside
/// the image (e.g. in letterbox padding) or the rectangle is empty.
pub fn client_to_image_percent(client: Point, image_rect: Rect) -> Option<ImagePoint> {
    if image_rect.width <= 0.0 || image_rect.height <= 0.0 {
        return None;
    }
    let x = (client.x - image_rect.left) / image_rect.width * 100.0;
    let y = (client.y - image_rect.top) / image_rect.height * 100.0;
    let point = ImagePoint::new(x, y);
    point.is_within_bounds().then_some(point)
}

/// Place an image-percent point in viewport pixels under `transform`. Used
/// for overlay elements that must track the rendered image exactly.
pub fn image_percent_to_viewport(point: ImagePoint, transform: &Transform, image_size: Size) -> Point {
    let content = Point::new(
        point.x / 100.0 * image_size.width,
        point.y / 100.0 * image_size.height,
    );
    transform.content_to_viewport(content)
}

/// The image's client-space rectangle: the image sits at the content origin,
/// so it is the viewport origin shifted by the pan and scaled.
pub fn image_screen_rect(viewport_origin: Point, transform: &Transform, image_size: Size) -> Rect {
    let pan = transform.pan();
    Rect::new(
        viewport_origin.x + pan.x,
        viewport_origin.y + pan.y,
        image_size.width * transform.scale(),
        image_size.height * transform.scale(),
    )
}
