//! Utility modules for the tasksync application.
//!
//! - [`datetime`] - conversions between instants and provider date times
//! - [`html`] - plain-text rendering of HTML task bodies

pub mod datetime;
pub mod html;
