//! City Rules - Threshold Evaluation Library
//!
//! Maps a sensor reading onto an optional alert level using a per-sensor-type
//! threshold table:
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌───────────────────┐
//! │   Reading    │────▶│   evaluate   │────▶│ Option<AlertLevel>│
//! │ (type,value) │     │    (pure)    │     │ warning/critical  │
//! └──────────────┘     └──────────────┘     └───────────────────┘
//!                             ▲
//!                      ┌──────────────┐
//!                      │ThresholdTable│
//!                      │ (immutable)  │
//!                      └──────────────┘
//! ```

mod evaluator;
pub mod types;

pub use evaluator::evaluate;
pub use types::{AlertLevel, Threshold, ThresholdTable};
