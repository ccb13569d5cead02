//! Controlled resource nodes.
//!
//! A [`Node`] is one tunable resource (a sysfs-style file or a property key)
//! together with the ordered list of values it may take, highest priority
//! first. Requests land in the per-value [`RequestGroup`]s; every
//! [`update`](Node::update) re-resolves which value currently wins and
//! persists it when it changed.
//!
//! The resolution algorithm is identical for both persistence strategies;
//! only the final write differs.

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::warn;

use hint_error::{HintError, Result};

use crate::request::{Deadline, RequestGroup};
use crate::store::PropertyStore;

/// Retry delay after a failed write of the selected value.
const RETRY_PERIOD: Duration = Duration::from_millis(500);

/// How a node persists its selected value.
enum Backing {
    /// Sysfs-style file node. With `hold_fd` set the descriptor stays open
    /// between writes while a non-default value is selected.
    File { hold_fd: bool, held: Option<File> },
    /// Key/value node persisting through the injected store.
    Property { store: Arc<dyn PropertyStore> },
}

impl Backing {
    fn persist(&mut self, path: &str, value: &str, is_default: bool) -> Result<()> {
        match self {
            Backing::File { hold_fd, held } => {
                let keep_open = *hold_fd && !is_default;
                let mut file = match held.take() {
                    Some(file) => file,
                    None => OpenOptions::new()
                        .write(true)
                        .truncate(true)
                        .open(path)
                        .map_err(|source| HintError::FileWrite {
                            path: PathBuf::from(path),
                            source,
                        })?,
                };
                write_value(&mut file, value).map_err(|source| HintError::FileWrite {
                    path: PathBuf::from(path),
                    source,
                })?;
                if keep_open {
                    *held = Some(file);
                }
                Ok(())
            }
            Backing::Property { store } => store.set(path, value),
        }
    }
}

/// Rewrite the whole file content to `value` and flush it to storage.
fn write_value(file: &mut File, value: &str) -> io::Result<()> {
    file.seek(SeekFrom::Start(0))?;
    file.set_len(0)?;
    file.write_all(value.as_bytes())?;
    file.sync_all()
}

/// One controlled resource and its priority-ordered request state.
pub struct Node {
    name: String,
    path: String,
    /// One group per possible value, index 0 = highest priority.
    req_sorted: Vec<RequestGroup>,
    default_index: usize,
    /// `None` until the first successful write, which forces that write to
    /// happen regardless of the selected value.
    current_index: Option<usize>,
    backing: Backing,
}

impl Node {
    /// File-backed node writing `values[i]` into the file at `path`.
    pub fn file(
        name: impl Into<String>,
        path: impl Into<String>,
        values: Vec<String>,
        default_index: usize,
        reset_on_init: bool,
        hold_fd: bool,
    ) -> Result<Self> {
        Self::with_backing(
            name.into(),
            path.into(),
            values,
            default_index,
            reset_on_init,
            Backing::File {
                hold_fd,
                held: None,
            },
        )
    }

    /// Property-backed node persisting through `store` under the key `path`.
    pub fn property(
        name: impl Into<String>,
        path: impl Into<String>,
        values: Vec<String>,
        default_index: usize,
        reset_on_init: bool,
        store: Arc<dyn PropertyStore>,
    ) -> Result<Self> {
        Self::with_backing(
            name.into(),
            path.into(),
            values,
            default_index,
            reset_on_init,
            Backing::Property { store },
        )
    }

    fn with_backing(
        name: String,
        path: String,
        values: Vec<String>,
        default_index: usize,
        reset_on_init: bool,
        backing: Backing,
    ) -> Result<Self> {
        if values.is_empty() {
            return Err(HintError::invalid_config(
                format!("node {name}"),
                "at least one value is required",
            ));
        }
        if default_index >= values.len() {
            return Err(HintError::IndexOutOfRange {
                node: name,
                index: default_index,
                len: values.len(),
            });
        }
        Ok(Self {
            name,
            path,
            req_sorted: values.into_iter().map(RequestGroup::new).collect(),
            default_index,
            // Without reset_on_init the resource is assumed to already carry
            // its default, so the first update only writes when a request is
            // active.
            current_index: if reset_on_init {
                None
            } else {
                Some(default_index)
            },
            backing,
        })
    }

    /// Record a request for the value at `value_index` under `hint_type`.
    ///
    /// Returns false when `value_index` is out of range; the request state is
    /// untouched in that case.
    pub fn add_request(&mut self, value_index: usize, hint_type: &str, deadline: Deadline) -> bool {
        match self.req_sorted.get_mut(value_index) {
            Some(group) => {
                group.add(hint_type, deadline);
                true
            }
            None => {
                warn!(
                    node = %self.name,
                    value_index,
                    values = self.req_sorted.len(),
                    "request for out-of-range value index"
                );
                false
            }
        }
    }

    /// Drop `hint_type` from every value group it appears in.
    pub fn remove_request(&mut self, hint_type: &str) -> bool {
        let mut removed = false;
        for group in &mut self.req_sorted {
            removed |= group.remove(hint_type);
        }
        removed
    }

    /// Re-resolve the winning value and persist it when it changed.
    ///
    /// The highest-priority group with a live request wins; with none active
    /// the node falls back to its default value. A failed write keeps the
    /// previous value and caps the returned deadline at 500ms so the next
    /// cycle retries soon. Failures are logged only when `log_error` is set.
    ///
    /// Returns the deadline after which the resolution may change again.
    pub fn update(&mut self, now: Instant, log_error: bool) -> Deadline {
        let mut value_index = self.default_index;
        let mut expire = Deadline::Never;

        for (index, group) in self.req_sorted.iter_mut().enumerate() {
            if let Some(deadline) = group.active_deadline(now) {
                value_index = index;
                expire = deadline;
                break;
            }
        }

        if self.current_index != Some(value_index) {
            let value = self.req_sorted[value_index].value().to_owned();
            let is_default = value_index == self.default_index;
            match self.backing.persist(&self.path, &value, is_default) {
                Ok(()) => {
                    self.current_index = Some(value_index);
                }
                Err(err) => {
                    if log_error {
                        warn!(
                            node = %self.name,
                            path = %self.path,
                            value = %value,
                            %err,
                            "failed to apply node value"
                        );
                    }
                    expire = expire.earlier(Deadline::after(now, RETRY_PERIOD));
                }
            }
        }
        expire
    }

    /// One `name\tpath\tindex\tvalue` line with the value read back live.
    pub fn dump<W: io::Write>(&self, w: &mut W) -> io::Result<()> {
        let value = self
            .read_back()
            .unwrap_or_else(|| "<unreadable>".to_owned());
        let index = match self.current_index {
            Some(index) => index.to_string(),
            None => "-".to_owned(),
        };
        writeln!(w, "{}\t{}\t{}\t{}", self.name, self.path, index, value)
    }

    fn read_back(&self) -> Option<String> {
        match &self.backing {
            Backing::File { .. } => std::fs::read_to_string(&self.path)
                .ok()
                .map(|content| content.trim_end().to_owned()),
            Backing::Property { store } => store.get(&self.path),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The HoldFd setting, `None` for property nodes.
    pub fn hold_fd(&self) -> Option<bool> {
        match &self.backing {
            Backing::File { hold_fd, .. } => Some(*hold_fd),
            Backing::Property { .. } => None,
        }
    }
}
