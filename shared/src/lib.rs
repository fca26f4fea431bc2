//! Shared types for the etiket label printing core
//!
//! Common types used across the hub and terminal crates: job channel
//! message types, domain models (products, label specs, print jobs) and
//! the wire-level error code taxonomy.

pub mod error;
pub mod message;
pub mod models;

// Re-exports
pub use serde::{Deserialize, Serialize};

// Job channel re-exports (for convenient access)
pub use error::ErrorCode;
pub use message::{ChannelMessage, EventType};
pub use models::{LabelSpec, PackEntry, Presence, PrintJob, Product, RestockBatch};
