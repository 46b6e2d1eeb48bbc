//! Change watcher.
//!
//! Detects document changes through a cheap fingerprint (top-level child
//! count plus the selected identifiers) instead of diffing records. A check
//! broadcasts a fresh scan only when the fingerprint moved since the last
//! broadcast; the fix engine clears the stored fingerprint after every
//! mutation so the next check always goes out.

use crate::host::DocumentHost;
use ds_core::{ElementRecord, SceneGraph, ScanSource, scan};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// A pushed record set.
pub type Records = Arc<[ElementRecord]>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatcherState {
    pub is_watching: bool,
    /// Fingerprint of the last broadcast. `None` forces the next check out.
    pub last_fingerprint: Option<String>,
}

/// Session-scoped change watcher.
pub struct Watcher {
    state: Mutex<WatcherState>,
    tx: broadcast::Sender<Records>,
    scan_order: Vec<ScanSource>,
    task: Mutex<Option<JoinHandle<()>>>,
    errors: AtomicU64,
}

/// Structural and selection proxy for `graph`.
pub fn fingerprint(graph: &SceneGraph) -> String {
    let structure = graph.top_level_count().unwrap_or(graph.pages.len());
    let selection: Vec<&str> = graph
        .selection
        .iter()
        .filter_map(|&idx| graph.node(idx).and_then(|n| n.identifier()))
        .map(|id| id.as_str())
        .collect();
    format!("{structure}|{}", selection.join(","))
}

impl Watcher {
    pub fn new(scan_order: Vec<ScanSource>, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            state: Mutex::new(WatcherState::default()),
            tx,
            scan_order,
            task: Mutex::new(None),
            errors: AtomicU64::new(0),
        }
    }

    /// Receive every record set pushed from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Records> {
        self.tx.subscribe()
    }

    pub fn state(&self) -> WatcherState {
        self.state.lock().clone()
    }

    pub fn is_watching(&self) -> bool {
        self.state.lock().is_watching
    }

    /// Fingerprint of the host's current document. Without a document the
    /// value is time-derived, so it never matches the previous one.
    pub fn compute_fingerprint<H: DocumentHost + ?Sized>(&self, host: &H) -> String {
        host.read(fingerprint).unwrap_or_else(|| {
            let millis = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| d.as_millis());
            let n = self.errors.fetch_add(1, Ordering::Relaxed);
            format!("error:{millis}:{n}")
        })
    }

    /// Broadcast if the fingerprint moved since the last broadcast. Returns
    /// whether a broadcast went out.
    pub fn check<H: DocumentHost + ?Sized>(&self, host: &H) -> bool {
        let fingerprint = self.compute_fingerprint(host);
        {
            let mut state = self.state.lock();
            if state.last_fingerprint.as_deref() == Some(fingerprint.as_str()) {
                return false;
            }
            log::debug!(
                "watch: fingerprint {:?} -> {fingerprint:?}",
                state.last_fingerprint
            );
            state.last_fingerprint = Some(fingerprint);
        }
        self.broadcast(host);
        true
    }

    /// Scan and push unconditionally. Returns the number of receivers.
    pub fn broadcast<H: DocumentHost + ?Sized>(&self, host: &H) -> usize {
        let records: Records = host
            .read(|g| scan(g, &self.scan_order))
            .unwrap_or_default()
            .into();
        let count = records.len();
        let receivers = self.tx.send(records).unwrap_or(0);
        log::debug!("watch: pushed {count} records to {receivers} subscribers");
        receivers
    }

    /// Forget the last fingerprint so the next check broadcasts.
    pub fn invalidate(&self) {
        self.state.lock().last_fingerprint = None;
    }

    /// Start watching `host`: one immediate broadcast, then a check on every
    /// selection change and every `poll` tick. Returns `false` if already
    /// watching.
    pub fn start<H>(self: &Arc<Self>, host: Arc<H>, poll: Duration) -> bool
    where
        H: DocumentHost + 'static,
    {
        let mut task = self.task.lock();
        {
            let mut state = self.state.lock();
            if state.is_watching {
                return false;
            }
            state.is_watching = true;
            state.last_fingerprint = Some(self.compute_fingerprint(host.as_ref()));
        }
        self.broadcast(host.as_ref());

        let mut selection = host.selection_changes();
        let watcher = Arc::clone(self);
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; the start broadcast covers it.
            ticker.tick().await;
            let mut selection_open = true;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = selection.recv(), if selection_open => match changed {
                        Ok(()) | Err(RecvError::Lagged(_)) => {}
                        Err(RecvError::Closed) => {
                            selection_open = false;
                            continue;
                        }
                    }
                }
                watcher.check(host.as_ref());
            }
        }));
        log::info!("watch: started (poll every {poll:?})");
        true
    }

    /// Stop watching. Returns `false` if not watching.
    pub fn stop(&self) -> bool {
        let handle = self.task.lock().take();
        let was_watching = std::mem::take(&mut self.state.lock().is_watching);
        if let Some(handle) = handle {
            handle.abort();
        }
        if was_watching {
            log::info!("watch: stopped");
        }
        was_watching
    }
}
