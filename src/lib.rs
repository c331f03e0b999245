//! Turn-based, body-part-targeted combat: slot planning, a speed-ordered
//! round timeline, an event-driven buff system and a damage pipeline.

pub mod autoplay;
pub mod buff;
pub mod cli;
pub mod combat;
pub mod config;
pub mod data;
pub mod error;
pub mod events;
pub mod logging;
pub mod phase;
pub mod planning;
pub mod report;
pub mod timeline;
