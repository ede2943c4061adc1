use serde::{Deserialize, Serialize};

use crate::calendar::DateSystem;
use crate::error::MapError;

/// Server-issued pin identifier. Opaque to the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PinId(pub String);

impl PinId {
    pub fn new(id: impl Into<String>) -> Self {
        PinId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PinId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapId(pub String);

impl MapId {
    pub fn new(id: impl Into<String>) -> Self {
        MapId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MapId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Players,
    Gm,
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Visibility::Players => write!(f, "players"),
            Visibility::Gm => write!(f, "gm"),
        }
    }
}

/// Totally ordered scalar produced by the date collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DateKey(pub i64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinDate {
    pub key: DateKey,
    pub label: String,
}

/// Position in image-percent space: `0..=100` on both axes, relative to the
/// source image's natural dimensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ImagePoint {
    pub x: f64,
    pub y: f64,
}

impl ImagePoint {
    pub fn new(x: f64, y: f64) -> Self {
        ImagePoint { x, y }
    }

    pub fn is_within_bounds(&self) -> bool {
        (0.0..=100.0).contains(&self.x) && (0.0..=100.0).contains(&self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pin {
    pub id: PinId,
    pub x: f64,
    pub y: f64,
    pub title: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub related_article_id: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub date: Option<PinDate>,
}

impl Pin {
    pub fn position(&self) -> ImagePoint {
        ImagePoint::new(self.x, self.y)
    }

    pub fn date_key(&self) -> Option<DateKey> {
        self.date.as_ref().map(|d| d.key)
    }

    /// Apply every field the patch carries.
    pub fn apply(&mut self, patch: &PinPatch) {
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(notes) = &patch.notes {
            self.notes = notes.clone();
        }
        if let Some(article) = &patch.related_article_id {
            self.related_article_id = article.clone();
        }
        if let Some(visibility) = patch.visibility {
            self.visibility = visibility;
        }
        if let Some(date) = &patch.date {
            self.date = date.clone();
        }
    }
}

/// Fields of a pin that has not been created yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPin {
    pub x: f64,
    pub y: f64,
    pub title: String,
    pub notes: Option<String>,
    pub related_article_id: Option<String>,
    pub visibility: Visibility,
    pub date: Option<PinDate>,
}

/// Partial pin update. An outer `None` leaves the field untouched; for the
/// nullable fields `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_article_id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<Option<PinDate>>,
}

impl PinPatch {
    pub fn position(at: ImagePoint) -> Self {
        PinPatch {
            x: Some(at.x),
            y: Some(at.y),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == PinPatch::default()
    }

    /// Position carried by the patch, if it moves the pin at all.
    pub fn target_position(&self) -> Option<ImagePoint> {
        match (self.x, self.y) {
            (Some(x), Some(y)) => Some(ImagePoint::new(x, y)),
            _ => None,
        }
    }
}

/// A pin being authored: placed on the map but not yet created.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPlacement {
    pub position: ImagePoint,
    pub title: String,
    pub notes: String,
    pub related_article_id: String,
    pub visibility: Visibility,
    /// Raw date text as typed; resolved through the date collaborator on submit.
    pub date_input: String,
}

impl PendingPlacement {
    pub fn at(position: ImagePoint) -> Self {
        PendingPlacement {
            position,
            title: String::new(),
            notes: String::new(),
            related_article_id: String::new(),
            visibility: Visibility::Players,
            date_input: String::new(),
        }
    }

    /// Validate the form and turn it into creation fields.
    pub fn to_new_pin<D: DateSystem>(&self, dates: &D) -> Result<NewPin, MapError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(MapError::Validation("a pin needs a title".to_string()));
        }
        if !self.position.is_within_bounds() {
            return Err(MapError::OutOfBounds {
                x: self.position.x,
                y: self.position.y,
            });
        }
        Ok(NewPin {
            x: self.position.x,
            y: self.position.y,
            title: title.to_string(),
            notes: non_empty(&self.notes),
            related_article_id: non_empty(&self.related_article_id),
            visibility: self.visibility,
            date: dates.pin_date(&self.date_input)?,
        })
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
