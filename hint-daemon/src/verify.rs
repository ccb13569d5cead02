//! Node write verification.
//!
//! Deployment check: writes every declared value (with the default value
//! first and last) to each configured file node to confirm the daemon will
//! actually be able to drive it. Property nodes have nothing to verify.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{error, info};

use hint_core::{parse_config, parse_nodes, InMemoryPropertyStore, NodeEntry, NodeType};

/// Verify every node in the document at `config_path`.
///
/// Returns `Ok(true)` when all nodes accepted all their values. Parse or
/// validation failures abort with an error instead.
pub fn run(config_path: &Path) -> Result<bool> {
    let json = fs::read_to_string(config_path)
        .with_context(|| format!("reading {}", config_path.display()))?;
    let doc = parse_config(&json).context("parsing configuration")?;

    // Run the full validation pass so a document the daemon would reject
    // fails verification too.
    let store = InMemoryPropertyStore::shared();
    parse_nodes(&doc, &store).context("validating configuration")?;

    let mut all_ok = true;
    for entry in &doc.nodes {
        all_ok &= verify_node(entry);
    }
    Ok(all_ok)
}

fn verify_node(entry: &NodeEntry) -> bool {
    if entry.node_type == NodeType::Property {
        info!("Node {}: property node, nothing to verify", entry.name);
        return true;
    }

    let default_index = entry.default_index.unwrap_or(entry.values.len() - 1);
    let mut sequence: Vec<&str> = Vec::with_capacity(entry.values.len() + 2);
    sequence.push(&entry.values[default_index]);
    sequence.extend(entry.values.iter().map(String::as_str));
    sequence.push(&entry.values[default_index]);

    for value in sequence {
        if let Err(e) = fs::write(&entry.path, value) {
            error!(
                "Node {}: writing '{}' to {} failed: {}",
                entry.name, value, entry.path, e
            );
            return false;
        }
    }
    info!(
        "Node {}: all {} values written to {}",
        entry.name,
        entry.values.len(),
        entry.path
    );
    true
}
