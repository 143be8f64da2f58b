//! Methodology-driven screening.
//!
//! A root methodology describes which criteria exist. Users edit a methodology instance
//! against it, the instance compiles to flat conditions, and the conditions classify
//! entities into pass, not-pass and no-data buckets.

pub mod classification;
pub mod config;
pub mod error;
pub mod methodology;
pub mod session;
pub mod telemetry;
