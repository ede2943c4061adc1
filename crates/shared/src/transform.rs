use serde::{Deserialize, Serialize};

use crate::coords::Point;
use crate::error::MapError;

pub const MIN_SCALE: f64 = 0.25;
pub const MAX_SCALE: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleLimits {
    min: f64,
    max: f64,
}

impl ScaleLimits {
    /// Falls back to the default bounds unless `0 < min <= max`.
    pub fn new(min: f64, max: f64) -> Self {
        if min.is_finite() && max.is_finite() && min > 0.0 && min <= max {
            ScaleLimits { min, max }
        } else {
            ScaleLimits::default()
        }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn clamp(&self, scale: f64) -> f64 {
        scale.clamp(self.min, self.max)
    }
}

impl Default for ScaleLimits {
    fn default() -> Self {
        ScaleLimits {
            min: MIN_SCALE,
            max: MAX_SCALE,
        }
    }
}

/// Pan offset and scale of the map content inside the viewport:
/// `viewport = pan + content * scale`, i.e. CSS
/// `translate(pan) scale(scale)` with `transform-origin: 0 0`.
///
/// The scale never leaves its limits, so it is always strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pan_x: f64,
    pan_y: f64,
    scale: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Transform::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        pan_x: 0.0,
        pan_y: 0.0,
        scale: 1.0,
    };

    pub fn new(pan_x: f64, pan_y: f64, scale: f64, limits: ScaleLimits) -> Self {
        Transform {
            pan_x,
            pan_y,
            scale: limits.clamp(scale),
        }
    }

    pub fn pan(&self) -> Point {
        Point::new(self.pan_x, self.pan_y)
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Scale by `factor` while keeping the content point under
    /// `screen_point` (viewport space) fixed on screen.
    ///
    /// Returns whether anything changed; the scale may already sit at a limit.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64, limits: ScaleLimits) -> Result<bool, MapError> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(MapError::DegenerateGesture("zoom factor must be positive"));
        }
        let old_scale = self.scale;
        let new_scale = limits.clamp(old_scale * factor);
        if (new_scale - old_scale).abs() < 1e-12 {
            return Ok(false);
        }
        let ratio = new_scale / old_scale;
        self.pan_x = screen_point.x - (screen_point.x - self.pan_x) * ratio;
        self.pan_y = screen_point.y - (screen_point.y - self.pan_y) * ratio;
        self.scale = new_scale;
        Ok(true)
    }

    /// Unclamped: the map may be dragged past its edges.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.pan_x += dx;
        self.pan_y += dy;
    }

    pub fn reset(&mut self) {
        *self = Transform::IDENTITY;
    }

    pub fn viewport_to_content(&self, p: Point) -> Point {
        Point::new((p.x - self.pan_x) / self.scale, (p.y - self.pan_y) / self.scale)
    }

    pub fn content_to_viewport(&self, p: Point) -> Point {
        Point::new(self.pan_x + p.x * self.scale, self.pan_y + p.y * self.scale)
    }

    /// CSS `transform` value for the content layer.
    pub fn css(&self) -> String {
        format!(
            "translate({}px, {}px) scale({})",
            self.pan_x, self.pan_y, self.scale
        )
    }
}
