//! hintd Core Library
//!
//! A priority-based, time-bounded resource-request arbitration engine.
//! Named power hints compete to set the values of sysfs-style file nodes and
//! property keys; each request carries an expiration, and one background
//! thread continuously re-resolves the highest-priority unexpired value per
//! node and writes it out, waking early when a timer fires or a new request
//! arrives.
//!
//! # Module Structure
//!
//! - `request` - per-value request bookkeeping and deadlines
//! - `node` - controlled resources (file and property backed)
//! - `looper` - the background scheduling thread
//! - `manager` - the hint façade consumed by embedders
//! - `config` - configuration document parsing and validation
//! - `store` - the injected property persistence capability
//!
//! # Example
//!
//! ```no_run
//! use hint_core::HintManager;
//!
//! let manager = HintManager::from_file("/etc/hintd/hintd.json").unwrap();
//! manager.do_hint("INTERACTION");
//! ```

pub mod config;
pub mod looper;
pub mod manager;
pub mod node;
pub mod request;
pub mod store;

// Re-export the primary types
pub use config::{
    parse_actions, parse_config, parse_nodes, ActionEntry, ConfigDocument, NodeEntry, NodeType,
};
pub use looper::{NodeAction, NodeLooperThread};
pub use manager::HintManager;
pub use node::Node;
pub use request::{Deadline, RequestGroup};
pub use store::{InMemoryPropertyStore, PropertyStore};

// Re-export error types
pub use hint_error::{HintError, Result};
