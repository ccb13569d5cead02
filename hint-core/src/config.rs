//! Configuration document parsing and validation.
//!
//! The document carries two top-level collections, `Nodes` and `Actions`.
//! Validation is all-or-nothing: any malformed, duplicate, or out-of-range
//! entry rejects the whole document so a half-built table can never reach the
//! scheduler.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use hint_error::{HintError, Result};

use crate::looper::NodeAction;
use crate::node::Node;
use crate::store::PropertyStore;

/// Parsed top-level configuration document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfigDocument {
    pub nodes: Vec<NodeEntry>,
    pub actions: Vec<ActionEntry>,
}

/// Persistence flavor of a node. Defaults to `File`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum NodeType {
    #[default]
    File,
    Property,
}

/// One entry of the `Nodes` collection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct NodeEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "Type", default)]
    pub node_type: NodeType,
    /// Possible values, highest priority first.
    pub values: Vec<String>,
    /// Defaults to the last (lowest-priority) value.
    pub default_index: Option<usize>,
    #[serde(default)]
    pub reset_on_init: bool,
    /// File nodes only; ignored on property nodes.
    #[serde(default)]
    pub hold_fd: bool,
}

/// One entry of the `Actions` collection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct ActionEntry {
    pub power_hint: String,
    pub node: String,
    pub value: String,
    /// Milliseconds; zero means the request never expires on its own.
    pub duration: u64,
}

/// Parse the raw JSON document.
pub fn parse_config(json: &str) -> Result<ConfigDocument> {
    let doc: ConfigDocument = serde_json::from_str(json)?;
    Ok(doc)
}

/// Build the node vector from the document, in declaration order.
pub fn parse_nodes(doc: &ConfigDocument, store: &Arc<dyn PropertyStore>) -> Result<Vec<Node>> {
    let mut names = HashSet::new();
    let mut paths = HashSet::new();
    let mut nodes = Vec::with_capacity(doc.nodes.len());

    for entry in &doc.nodes {
        if entry.name.is_empty() {
            return Err(HintError::invalid_config("Name", "must not be empty"));
        }
        if !names.insert(entry.name.as_str()) {
            return Err(HintError::invalid_config(
                "Name",
                format!("duplicate node name '{}'", entry.name),
            ));
        }
        if entry.path.is_empty() {
            return Err(HintError::invalid_config(
                "Path",
                format!("node '{}' has an empty path", entry.name),
            ));
        }
        if !paths.insert(entry.path.as_str()) {
            return Err(HintError::invalid_config(
                "Path",
                format!("duplicate node path '{}'", entry.path),
            ));
        }
        if entry.values.is_empty() {
            return Err(HintError::invalid_config(
                "Values",
                format!("node '{}' declares no values", entry.name),
            ));
        }

        let mut seen = HashSet::new();
        for value in &entry.values {
            if entry.node_type == NodeType::File && value.is_empty() {
                return Err(HintError::invalid_config(
                    "Values",
                    format!("file node '{}' declares an empty value", entry.name),
                ));
            }
            if !seen.insert(value.as_str()) {
                return Err(HintError::invalid_config(
                    "Values",
                    format!("node '{}' declares duplicate value '{}'", entry.name, value),
                ));
            }
        }

        let default_index = entry.default_index.unwrap_or(entry.values.len() - 1);
        if default_index >= entry.values.len() {
            return Err(HintError::invalid_config(
                "DefaultIndex",
                format!(
                    "node '{}' default index {} out of range ({} values)",
                    entry.name,
                    default_index,
                    entry.values.len()
                ),
            ));
        }

        let node = match entry.node_type {
            NodeType::File => Node::file(
                entry.name.as_str(),
                entry.path.as_str(),
                entry.values.clone(),
                default_index,
                entry.reset_on_init,
                entry.hold_fd,
            )?,
            NodeType::Property => Node::property(
                entry.name.as_str(),
                entry.path.as_str(),
                entry.values.clone(),
                default_index,
                entry.reset_on_init,
                Arc::clone(store),
            )?,
        };
        nodes.push(node);
    }

    debug!(count = nodes.len(), "parsed nodes");
    Ok(nodes)
}

/// Build the hint-type → action-list table from the document.
pub fn parse_actions(doc: &ConfigDocument) -> Result<HashMap<String, Vec<NodeAction>>> {
    let mut lookup: HashMap<&str, (usize, &[String])> = HashMap::new();
    for (index, entry) in doc.nodes.iter().enumerate() {
        lookup.insert(entry.name.as_str(), (index, &entry.values));
    }

    let mut actions: HashMap<String, Vec<NodeAction>> = HashMap::new();
    let mut nodes_per_hint: HashMap<&str, HashSet<usize>> = HashMap::new();

    for entry in &doc.actions {
        if entry.power_hint.is_empty() {
            return Err(HintError::invalid_config("PowerHint", "must not be empty"));
        }
        let (node_index, values) = match lookup.get(entry.node.as_str()) {
            Some(found) => *found,
            None => {
                return Err(HintError::invalid_config(
                    "Node",
                    format!(
                        "hint '{}' references unknown node '{}'",
                        entry.power_hint, entry.node
                    ),
                ));
            }
        };
        let value_index = match values.iter().position(|value| *value == entry.value) {
            Some(index) => index,
            None => {
                return Err(HintError::invalid_config(
                    "Value",
                    format!(
                        "hint '{}' references value '{}' not declared by node '{}'",
                        entry.power_hint, entry.value, entry.node
                    ),
                ));
            }
        };

        let referenced = nodes_per_hint
            .entry(entry.power_hint.as_str())
            .or_default();
        if !referenced.insert(node_index) {
            return Err(HintError::invalid_config(
                "Node",
                format!(
                    "hint '{}' references node '{}' more than once",
                    entry.power_hint, entry.node
                ),
            ));
        }

        actions
            .entry(entry.power_hint.clone())
            .or_default()
            .push(NodeAction {
                node_index,
                value_index,
                timeout: Duration::from_millis(entry.duration),
            });
    }

    debug!(count = actions.len(), "parsed hint actions");
    Ok(actions)
}
