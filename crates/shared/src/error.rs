use crate::models::PinId;

/// The pin operation a persistence failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Load,
    Create,
    Move,
    Edit,
    Delete,
}

impl SyncAction {
    /// Start of the notice shown when this action fails.
    pub fn failure_notice(&self) -> &'static str {
        match self {
            SyncAction::Load => "pins could not be loaded",
            SyncAction::Create => "pin could not be saved",
            SyncAction::Move => "position could not be saved",
            SyncAction::Edit => "pin details could not be saved",
            SyncAction::Delete => "pin could not be deleted",
        }
    }
}

impl std::fmt::Display for SyncAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncAction::Load => write!(f, "load"),
            SyncAction::Create => write!(f, "create"),
            SyncAction::Move => write!(f, "move"),
            SyncAction::Edit => write!(f, "edit"),
            SyncAction::Delete => write!(f, "delete"),
        }
    }
}

/// Everything that can go wrong in the map core. None of these are fatal:
/// the `Display` text doubles as the transient notice shown to the user.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MapError {
    #[error("point ({x:.1}%, {y:.1}%) lies outside the map image")]
    OutOfBounds { x: f64, y: f64 },

    #[error("{}: {message}", .action.failure_notice())]
    Persistence { action: SyncAction, message: String },

    #[error("stale confirmation for pin {0}")]
    StaleConfirmation(PinId),

    #[error("degenerate gesture: {0}")]
    DegenerateGesture(&'static str),

    #[error("unknown pin {0}")]
    UnknownPin(PinId),

    #[error("{0}")]
    Validation(String),
}

impl MapError {
    pub fn persistence(action: SyncAction, message: impl Into<String>) -> Self {
        MapError::Persistence {
            action,
            message: message.into(),
        }
    }
}
