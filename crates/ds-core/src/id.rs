use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;

/// Global string interner for element identifiers.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// An interned element identifier (a host `id` or `guid`).
///
/// Internally a 4-byte `Spur` index, so copies and comparisons are cheap.
/// Identifiers are unique within one open document at a given instant but
/// are not stable across reload or undo, so never hold one as a long-lived
/// node handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(Spur);

impl NodeId {
    /// Intern a string as a NodeId, or return the existing one.
    pub fn intern(s: &str) -> Self {
        NodeId(INTERNER.get_or_intern(s))
    }

    /// Look up an already-interned identifier without growing the interner.
    ///
    /// Returns `None` when the string was never interned, which also means no
    /// node in any loaded document can carry it.
    pub fn lookup(s: &str) -> Option<Self> {
        INTERNER.get(s).map(NodeId)
    }

    /// Resolve back to a string slice.
    pub fn as_str(&self) -> &'static str {
        INTERNER.resolve(&self.0)
    }

    /// Synthetic identifier for a node the host gave no `id`/`guid`.
    ///
    /// `index` is the number of records emitted before it in the same pass.
    pub fn synthetic(index: usize) -> Self {
        Self::intern(&format!("element_{index}"))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.as_str())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(NodeId::intern(&s))
    }
}
