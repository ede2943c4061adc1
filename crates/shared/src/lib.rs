//! Map viewport core for the campaign wiki: coordinate mapping, pan/zoom
//! transform, gesture recognition, pin synchronisation and the
//! chronological pin path.

pub mod calendar;
pub mod config;
pub mod coords;
pub mod error;
pub mod gesture;
pub mod models;
pub mod path;
pub mod pin_store;
pub mod transform;
pub mod viewport;
