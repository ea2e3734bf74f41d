//! Reformly onboarding — headless wizard core.

pub mod api;
pub mod calc;
pub mod config;
pub mod error;
pub mod profile;
pub mod sequencer;
pub mod store;
pub mod submission;
pub mod terminal;
pub mod wizard;
