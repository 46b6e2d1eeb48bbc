//! The operation set exposed to the presentation layer.

use crate::action::{FixAction, FixResult};
use crate::config::EngineConfig;
use crate::fix::FixEngine;
use crate::host::DocumentHost;
use crate::watch::{Records, Watcher};
use ds_core::{ElementGuidance, ElementRecord, describe, scan};
use std::sync::Arc;
use tokio::sync::broadcast;

/// One open document session: scanning, guidance, fixes and change pushes.
///
/// Owns the watcher state; dropping the session stops watching.
pub struct Session<H: DocumentHost + 'static> {
    host: Arc<H>,
    engine: FixEngine<H>,
    watcher: Arc<Watcher>,
    config: EngineConfig,
}

impl<H: DocumentHost + 'static> Session<H> {
    pub fn new(host: Arc<H>, config: EngineConfig) -> Self {
        let watcher = Arc::new(Watcher::new(
            config.scan_order.clone(),
            config.notify_capacity,
        ));
        let engine = FixEngine::new(
            Arc::clone(&host),
            Arc::clone(&watcher),
            config.inter_action_delay(),
        );
        Self {
            host,
            engine,
            watcher,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    /// Normalize the document, starting from the first scan source that
    /// yields anything. Empty without a document.
    pub async fn scan(&self) -> Vec<ElementRecord> {
        self.host
            .read(|g| scan(g, &self.config.scan_order))
            .unwrap_or_default()
    }

    pub async fn resolve_and_describe(&self, element_id: &str) -> ElementGuidance {
        self.host
            .read(|g| describe::resolve_and_describe(g, element_id, self.config.default_canvas))
            .unwrap_or_else(|| ElementGuidance::not_found(element_id))
    }

    pub async fn apply_fix(&self, action: FixAction) -> FixResult {
        let result = self.engine.apply_fix(action).await;
        if result.success {
            self.recheck();
        }
        result
    }

    pub async fn apply_bulk_fixes(&self, actions: Vec<FixAction>) -> Vec<FixResult> {
        let results = self.engine.apply_bulk_fixes(actions).await;
        if results.iter().any(|r| r.success) {
            self.recheck();
        }
        results
    }

    fn recheck(&self) {
        if self.watcher.is_watching() {
            self.watcher.check(self.host.as_ref());
        }
    }

    /// Start pushing document changes to subscribers. Idempotent.
    pub async fn start_watching(&self) -> bool {
        self.watcher
            .start(Arc::clone(&self.host), self.config.poll_interval())
    }

    pub fn stop_watching(&self) -> bool {
        self.watcher.stop()
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_watching()
    }

    /// Document-changed pushes: every record set broadcast from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Records> {
        self.watcher.subscribe()
    }

    pub fn watcher(&self) -> &Arc<Watcher> {
        &self.watcher
    }
}

impl<H: DocumentHost + 'static> Drop for Session<H> {
    fn drop(&mut self) {
        self.watcher.stop();
    }
}
