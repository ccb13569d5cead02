//! Background scheduling loop.
//!
//! One [`NodeLooperThread`] owns the full node vector. All mutation happens
//! under a single mutex; a condition variable wakes the loop early whenever a
//! request arrives or is cancelled. Each cycle re-resolves every node and
//! sleeps until the nearest expiration.

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, warn};

use hint_error::Result;

use crate::node::Node;
use crate::request::Deadline;

/// Longest the loop sleeps when nothing is due. Bounds how stale a dump can
/// get while the system is idle.
const MAX_UPDATE_PERIOD: Duration = Duration::from_secs(10);

/// A single (node, value, timeout) step of a hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeAction {
    /// Position in the looper's node vector.
    pub node_index: usize,
    /// Position in that node's value list.
    pub value_index: usize,
    /// Zero means the request never expires on its own.
    pub timeout: Duration,
}

struct State {
    nodes: Vec<Node>,
    exiting: bool,
}

struct Shared {
    state: Mutex<State>,
    wake: Condvar,
}

/// The background worker thread and its monitor.
pub struct NodeLooperThread {
    shared: Arc<Shared>,
    handle: Option<thread::JoinHandle<()>>,
}

impl NodeLooperThread {
    /// Take ownership of `nodes` and start the scheduling thread.
    pub fn new(nodes: Vec<Node>) -> Result<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                nodes,
                exiting: false,
            }),
            wake: Condvar::new(),
        });
        let worker = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("hint-looper".to_owned())
            .spawn(move || run(&worker))?;
        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// Apply every action under `hint_type` and wake the loop.
    ///
    /// Returns false once shutdown has begun, or when any action named an
    /// invalid node or value index. Valid actions are still applied in that
    /// case; there is no rollback.
    pub fn request(&self, actions: &[NodeAction], hint_type: &str) -> bool {
        let now = Instant::now();
        let mut state = self.shared.state.lock();
        if state.exiting {
            debug!(hint = hint_type, "request after shutdown began");
            return false;
        }
        if !self.worker_alive() {
            error!(hint = hint_type, "looper thread stopped unexpectedly");
            return false;
        }

        let mut applied = true;
        for action in actions {
            if action.node_index >= state.nodes.len() {
                warn!(
                    hint = hint_type,
                    node_index = action.node_index,
                    "request names an unknown node index"
                );
                applied = false;
                continue;
            }
            let deadline = Deadline::after(now, action.timeout);
            applied &= state.nodes[action.node_index].add_request(action.value_index, hint_type, deadline);
        }
        self.shared.wake.notify_all();
        applied
    }

    /// Withdraw `hint_type` from every node the actions name and wake the
    /// loop so values revert promptly.
    pub fn cancel(&self, actions: &[NodeAction], hint_type: &str) -> bool {
        let mut state = self.shared.state.lock();
        if state.exiting {
            debug!(hint = hint_type, "cancel after shutdown began");
            return false;
        }
        if !self.worker_alive() {
            error!(hint = hint_type, "looper thread stopped unexpectedly");
            return false;
        }

        let mut cancelled = true;
        for action in actions {
            match state.nodes.get_mut(action.node_index) {
                Some(node) => {
                    node.remove_request(hint_type);
                }
                None => {
                    warn!(
                        hint = hint_type,
                        node_index = action.node_index,
                        "cancel names an unknown node index"
                    );
                    cancelled = false;
                }
            }
        }
        self.shared.wake.notify_all();
        cancelled
    }

    /// Write every node's dump line in configuration order.
    pub fn dump<W: io::Write>(&self, w: &mut W) -> io::Result<()> {
        let state = self.shared.state.lock();
        for node in &state.nodes {
            node.dump(w)?;
        }
        Ok(())
    }

    /// Whether the scheduling thread is alive and serving requests.
    pub fn is_running(&self) -> bool {
        !self.shared.state.lock().exiting && self.worker_alive()
    }

    /// Stop the scheduling thread and wait for it to exit. Safe to call more
    /// than once; later calls are no-ops.
    pub fn stop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            if state.exiting && self.handle.is_none() {
                return;
            }
            state.exiting = true;
        }
        self.shared.wake.notify_all();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("looper thread panicked during shutdown");
            }
        }
    }

    fn worker_alive(&self) -> bool {
        self.handle
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }
}

impl Drop for NodeLooperThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(shared: &Shared) {
    debug!("node looper thread started");
    let mut state = shared.state.lock();
    while !state.exiting {
        let now = Instant::now();

        // Settling pass, errors silenced: cross-node orderings (a floor node
        // must not overtake a ceiling node that has not moved yet) resolve
        // before the authoritative pass.
        for node in &mut state.nodes {
            node.update(now, false);
        }

        let mut nearest = Deadline::Never;
        for node in &mut state.nodes {
            nearest = nearest.earlier(node.update(now, true));
        }

        let timeout = nearest
            .remaining(now)
            .unwrap_or(MAX_UPDATE_PERIOD)
            .min(MAX_UPDATE_PERIOD);
        let _ = shared.wake.wait_for(&mut state, timeout);
    }
    debug!("node looper thread exiting");
}
