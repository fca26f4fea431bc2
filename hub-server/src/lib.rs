//! Etiket Hub - shared side of the label printing core
//!
//! The hub is the single shared collaborator reachable by every point-of-
//! sale terminal. It owns:
//!
//! - **Job Channel server** (`channel`): message bus over pluggable TCP /
//!   in-memory transports, per-terminal connections with ordered delivery
//! - **Directory** (`directory`): authoritative terminal -> presence map,
//!   last-write-wins per terminal, removed on disconnect
//! - **Delegation Router** (`router`): deterministic choice of the terminal
//!   that executes a print job
//! - **Dispatcher** (`dispatch`): the hub event loop tying the three
//!   together and forwarding acks back to requesters
//!
//! # Module structure
//!
//! ```text
//! hub-server/src/
//! ├── channel/       # transports, message bus, TCP server
//! ├── directory.rs   # presence directory
//! ├── router.rs      # delegation policy
//! ├── dispatch.rs    # hub event loop + in-flight job tracking
//! ├── config.rs      # env-var configuration
//! ├── logger.rs      # tracing setup
//! └── error.rs       # hub error type
//! ```

pub mod channel;
pub mod config;
pub mod dispatch;
pub mod directory;
pub mod error;
pub mod logger;
pub mod router;

// Re-export public types
pub use channel::{MessageBus, Transport, TransportConfig};
pub use config::HubConfig;
pub use dispatch::{HubCore, HubDispatcher};
pub use directory::{Directory, PresenceEntry};
pub use error::{HubError, HubResult};
pub use logger::{init_logger, init_logger_with_file};
pub use router::select_executor;
