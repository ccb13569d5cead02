//! The hint façade.
//!
//! [`HintManager`] maps human-readable hint names to the ordered action lists
//! that implement them and forwards request/cancel calls to the scheduling
//! thread. Construction parses and validates the configuration document and
//! starts the looper; an empty node or action table fails construction.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use hint_error::{HintError, Result};

use crate::config;
use crate::looper::{NodeAction, NodeLooperThread};
use crate::node::Node;
use crate::store::{InMemoryPropertyStore, PropertyStore};

pub struct HintManager {
    looper: NodeLooperThread,
    /// Hint type → ordered actions. Built once, read-only afterwards.
    actions: HashMap<String, Vec<NodeAction>>,
}

impl HintManager {
    /// Start a manager over pre-built nodes and actions.
    pub fn new(nodes: Vec<Node>, actions: HashMap<String, Vec<NodeAction>>) -> Result<Self> {
        if nodes.is_empty() {
            return Err(HintError::config("no nodes configured"));
        }
        if actions.is_empty() {
            return Err(HintError::config("no actions configured"));
        }
        let looper = NodeLooperThread::new(nodes)?;
        info!(hints = actions.len(), "hint manager started");
        Ok(Self { looper, actions })
    }

    /// Parse a configuration document and start a manager, with property
    /// nodes persisting through a fresh in-memory store.
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_json_with_store(json, InMemoryPropertyStore::shared())
    }

    /// Same as [`from_json`](Self::from_json) with an embedder-supplied
    /// property store.
    pub fn from_json_with_store(json: &str, store: Arc<dyn PropertyStore>) -> Result<Self> {
        let doc = config::parse_config(json)?;
        let nodes = config::parse_nodes(&doc, &store)?;
        let actions = config::parse_actions(&doc)?;
        Self::new(nodes, actions)
    }

    /// Load the configuration document from `path` and start a manager.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| HintError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Activate `hint_type` with its configured per-action timeouts.
    pub fn do_hint(&self, hint_type: &str) -> bool {
        match self.actions.get(hint_type) {
            Some(actions) => {
                debug!(hint = hint_type, "hint requested");
                self.looper.request(actions, hint_type)
            }
            None => {
                warn!(hint = hint_type, "unknown hint type");
                false
            }
        }
    }

    /// Activate `hint_type` with every action's timeout replaced by
    /// `timeout`. A zero timeout makes the hint outlive its configured
    /// durations until [`end_hint`](Self::end_hint).
    pub fn do_hint_for(&self, hint_type: &str, timeout: Duration) -> bool {
        match self.actions.get(hint_type) {
            Some(stored) => {
                debug!(hint = hint_type, ?timeout, "hint requested with timeout override");
                let overridden: Vec<NodeAction> = stored
                    .iter()
                    .map(|action| NodeAction {
                        timeout,
                        ..*action
                    })
                    .collect();
                self.looper.request(&overridden, hint_type)
            }
            None => {
                warn!(hint = hint_type, "unknown hint type");
                false
            }
        }
    }

    /// Withdraw `hint_type` from every node it touches.
    pub fn end_hint(&self, hint_type: &str) -> bool {
        match self.actions.get(hint_type) {
            Some(actions) => {
                debug!(hint = hint_type, "hint ended");
                self.looper.cancel(actions, hint_type)
            }
            None => {
                warn!(hint = hint_type, "unknown hint type");
                false
            }
        }
    }

    /// All known hint type names, sorted.
    pub fn hints(&self) -> Vec<String> {
        let mut hints: Vec<String> = self.actions.keys().cloned().collect();
        hints.sort();
        hints
    }

    pub fn is_running(&self) -> bool {
        self.looper.is_running()
    }

    /// Human-readable node table: banner, one line per node, banner.
    pub fn dump<W: io::Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(w, "========== Begin hintd nodes ==========")?;
        self.looper.dump(w)?;
        writeln!(w, "==========  End hintd nodes  ==========")
    }

    /// Stop the scheduling thread. Idempotent; also runs on drop.
    pub fn stop(&mut self) {
        self.looper.stop();
    }
}
