//! Domain models shared between hub and terminals

mod job;
mod label;
mod product;

pub use job::PrintJob;
pub use label::{LabelSpec, PackEntry};
pub use product::{Product, RestockBatch, RestockEntry};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a terminal currently has a usable print sink attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    NoPrinter,
    HasPrinter,
}

impl Presence {
    pub fn has_printer(self) -> bool {
        matches!(self, Presence::HasPrinter)
    }
}

impl fmt::Display for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Presence::NoPrinter => write!(f, "no_printer"),
            Presence::HasPrinter => write!(f, "has_printer"),
        }
    }
}
