pub mod color;
pub mod describe;
pub mod id;
pub mod model;
pub mod normalize;
pub mod record;
pub mod resolve;
pub mod snapshot;
pub mod traverse;

pub use color::{ColorRepr, RawColor, from_hex, to_hex};
pub use describe::{ElementGuidance, describe_position, element_type_name, resolve_and_describe};
pub use id::NodeId;
pub use model::*;
pub use normalize::{DEFAULT_SCAN_ORDER, ScanSource, normalize, scan};
pub use record::{ElementRecord, FillRecord, ShadowRecord, Size, TextStyleRecord};
pub use resolve::resolve;
pub use snapshot::{SnapshotError, parse_snapshot};

// Re-export petgraph types so downstream crates don't need a direct dependency
pub use petgraph::graph::NodeIndex;
