//! The host capability surface, and an in-memory host.
//!
//! The engine never owns the document. Everything it reads or writes goes
//! through [`DocumentHost`]: a synchronous read accessor, a synchronous
//! mutation scope, asynchronous font lookup and color construction. The
//! mutation scope takes a plain closure, so nothing inside it can `.await`.

use async_trait::async_trait;
use ds_core::{FontHandle, RawColor, SceneGraph};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;

/// What the engine needs from the application hosting the document.
#[async_trait]
pub trait DocumentHost: Send + Sync {
    /// Run `f` against the open document. `None` when no document is open.
    fn read<R>(&self, f: impl FnOnce(&SceneGraph) -> R) -> Option<R>;

    /// Run `f` inside the host's mutation scope. The writes `f` makes are
    /// applied as one unit. `None` when no document is open.
    fn edit<R>(&self, f: impl FnOnce(&mut SceneGraph) -> R) -> Option<R>;

    /// Look a font up by PostScript name (or family).
    async fn font_by_name(&self, name: &str) -> Option<FontHandle>;

    /// Build a host color object from canonical hex.
    fn color_from_hex(&self, hex: &str) -> Option<RawColor> {
        ds_core::from_hex(hex)
    }

    /// Notifications fired whenever the selection changes.
    fn selection_changes(&self) -> broadcast::Receiver<()>;

    fn has_document(&self) -> bool {
        self.read(|_| ()).is_some()
    }
}

// ─── In-memory host ──────────────────────────────────────────────────────

/// A [`DocumentHost`] over an owned [`SceneGraph`].
///
/// Backs the CLI and the tests. Selection changes made through
/// [`MemoryHost::set_selection`] are announced on the selection stream.
pub struct MemoryHost {
    document: RwLock<Option<SceneGraph>>,
    fonts: RwLock<Vec<FontHandle>>,
    selection_tx: broadcast::Sender<()>,
    edits: AtomicUsize,
}

impl MemoryHost {
    pub fn new(document: SceneGraph) -> Self {
        Self::with_document(Some(document))
    }

    /// A host with no open document.
    pub fn empty() -> Self {
        Self::with_document(None)
    }

    fn with_document(document: Option<SceneGraph>) -> Self {
        let (selection_tx, _) = broadcast::channel(16);
        Self {
            document: RwLock::new(document),
            fonts: RwLock::new(Vec::new()),
            selection_tx,
            edits: AtomicUsize::new(0),
        }
    }

    /// Make a font available to [`DocumentHost::font_by_name`].
    pub fn register_font(&self, font: FontHandle) {
        self.fonts.write().push(font);
    }

    /// Select the nodes carrying `ids` and announce the change. Returns how
    /// many nodes were selected, or `None` without a document.
    pub fn set_selection(&self, ids: &[&str]) -> Option<usize> {
        let selected = self.document.write().as_mut().map(|doc| doc.select(ids))?;
        // No listeners is fine.
        let _ = self.selection_tx.send(());
        Some(selected)
    }

    pub fn close_document(&self) -> Option<SceneGraph> {
        self.document.write().take()
    }

    pub fn replace_document(&self, document: SceneGraph) {
        *self.document.write() = Some(document);
    }

    /// How many mutation scopes have been opened.
    pub fn edit_count(&self) -> usize {
        self.edits.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DocumentHost for MemoryHost {
    fn read<R>(&self, f: impl FnOnce(&SceneGraph) -> R) -> Option<R> {
        self.document.read().as_ref().map(f)
    }

    fn edit<R>(&self, f: impl FnOnce(&mut SceneGraph) -> R) -> Option<R> {
        let mut document = self.document.write();
        let doc = document.as_mut()?;
        self.edits.fetch_add(1, Ordering::Relaxed);
        Some(f(doc))
    }

    async fn font_by_name(&self, name: &str) -> Option<FontHandle> {
        // Real hosts resolve fonts off-thread; give the scheduler a turn.
        tokio::task::yield_now().await;
        let fonts = self.fonts.read();
        fonts
            .iter()
            .find(|f| f.postscript_name == name)
            .or_else(|| fonts.iter().find(|f| f.family.eq_ignore_ascii_case(name)))
            .cloned()
    }

    fn selection_changes(&self) -> broadcast::Receiver<()> {
        self.selection_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ds_core::{NodeKind, SceneNode};
    use pretty_assertions::assert_eq;

    fn font(ps: &str, family: &str) -> FontHandle {
        FontHandle {
            postscript_name: ps.into(),
            family: family.into(),
            style: None,
            weight: None,
        }
    }

    #[tokio::test]
    async fn fonts_resolve_by_postscript_name_then_family() {
        let host = MemoryHost::empty();
        host.register_font(font("Inter-Bold", "Inter"));
        assert_eq!(
            host.font_by_name("Inter-Bold").await.map(|f| f.family),
            Some("Inter".to_string())
        );
        assert!(host.font_by_name("inter").await.is_some());
        assert!(host.font_by_name("Comic Sans").await.is_none());
    }

    #[test]
    fn edits_need_a_document() {
        let host = MemoryHost::empty();
        assert_eq!(host.edit(|_| ()), None);
        assert!(!host.has_document());
        assert_eq!(host.edit_count(), 0);

        host.replace_document(SceneGraph::with_root("h_root"));
        assert_eq!(host.edit(|g| g.graph.node_count()), Some(1));
        assert_eq!(host.edit_count(), 1);

        assert!(host.close_document().is_some());
        assert!(!host.has_document());
        assert_eq!(host.read(|g| g.graph.node_count()), None);
        assert!(host.close_document().is_none());
    }

    #[test]
    fn selection_changes_are_announced() {
        let mut doc = SceneGraph::with_root("h_root2");
        let root = doc.root.unwrap();
        doc.add_node(root, SceneNode::with_id(NodeKind::Rectangle, "h_box"));
        let host = MemoryHost::new(doc);
        let mut rx = host.selection_changes();

        assert_eq!(host.set_selection(&["h_box", "h_nope"]), Some(1));
        assert!(rx.try_recv().is_ok());
    }
}
