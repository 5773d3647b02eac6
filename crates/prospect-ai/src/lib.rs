//! Outreach pipeline core: score scraped employers, draft partnership letters, and track
//! their review and delivery.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
