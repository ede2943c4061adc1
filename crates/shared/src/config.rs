use serde::{Deserialize, Serialize};

use crate::transform::ScaleLimits;

/// Tunables for the map viewport. Every field has a default, so a partial
/// JSON override is enough.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub min_scale: f64,
    pub max_scale: f64,
    /// Zoom factor per wheel notch.
    pub wheel_step: f64,
    /// Pointer travel (client px) that turns a press on a pin into a drag.
    pub drag_threshold_px: f64,
    /// Radius (viewport px) around a marker that counts as hitting it.
    pub hit_radius_px: f64,
    /// Finger distances below this are too small to divide by.
    pub min_pinch_distance_px: f64,
    /// Bend of path segments, as a fraction of segment length.
    pub path_curvature: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        ViewportConfig {
            min_scale: 0.25,
            max_scale: 8.0,
            wheel_step: 1.12,
            drag_threshold_px: 5.0,
            hit_radius_px: 14.0,
            min_pinch_distance_px: 10.0,
            path_curvature: 0.18,
        }
    }
}

impl ViewportConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: ViewportConfig = serde_json::from_str(json)?;
        Ok(config.validated())
    }

    /// Replace nonsensical values with defaults, so the scale floor stays
    /// strictly positive and zooming can always be undone.
    pub fn validated(self) -> Self {
        let defaults = ViewportConfig::default();
        let mut config = self;

        let scale_ok = config.min_scale.is_finite()
            && config.max_scale.is_finite()
            && config.min_scale > 0.0
            && config.min_scale <= config.max_scale;
        if !scale_ok {
            tracing::warn!(
                min = config.min_scale,
                max = config.max_scale,
                "invalid scale bounds, using defaults"
            );
            config.min_scale = defaults.min_scale;
            config.max_scale = defaults.max_scale;
        }
        if !(config.wheel_step.is_finite() && config.wheel_step > 1.0) {
            tracing::warn!(step = config.wheel_step, "invalid wheel step, using default");
            config.wheel_step = defaults.wheel_step;
        }
        if !(config.drag_threshold_px.is_finite() && config.drag_threshold_px >= 0.0) {
            config.drag_threshold_px = defaults.drag_threshold_px;
        }
        if !(config.hit_radius_px.is_finite() && config.hit_radius_px >= 0.0) {
            config.hit_radius_px = defaults.hit_radius_px;
        }
        if !(config.min_pinch_distance_px.is_finite() && config.min_pinch_distance_px > 0.0) {
            config.min_pinch_distance_px = defaults.min_pinch_distance_px;
        }
        if !config.path_curvature.is_finite() {
            config.path_curvature = defaults.path_curvature;
        }
        config
    }

    pub fn scale_limits(&self) -> ScaleLimits {
        ScaleLimits::new(self.min_scale, self.max_scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ViewportConfig::from_json(r#"{"maxScale": 4.0}"#).unwrap_or_default();
        // serde field names are snake_case; unknown keys are ignored
        assert_eq!(config, ViewportConfig::default());

        let config = ViewportConfig::from_json(r#"{"max_scale": 4.0}"#).unwrap();
        assert_eq!(config.max_scale, 4.0);
        assert_eq!(config.min_scale, 0.25);
    }

    #[test]
    fn test_validated_rejects_zero_floor() {
        let config = ViewportConfig {
            min_scale: 0.0,
            ..Default::default()
        }
        .validated();
        assert_eq!(config.min_scale, 0.25);
        assert_eq!(config.max_scale, 8.0);
    }

    #[test]
    fn test_validated_rejects_inverted_bounds_and_flat_step() {
        let config = ViewportConfig {
            min_scale: 5.0,
            max_scale: 2.0,
            wheel_step: 1.0,
            ..Default::default()
        }
        .validated();
        assert!(config.min_scale <= config.max_scale);
        assert!(config.wheel_step > 1.0);
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(ViewportConfig::from_json("{not json").is_err());
    }
}
