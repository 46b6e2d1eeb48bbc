pub mod action;
pub mod config;
pub mod error;
pub mod fix;
pub mod host;
pub mod session;
pub mod watch;

pub use action::{ActionKind, FixAction, FixReport, FixResult, TextRange, extract_planned_actions};
pub use config::EngineConfig;
pub use error::{FixError, PlanError};
pub use fix::{FixEngine, PreparedAction, commit, prepare};
pub use host::{DocumentHost, MemoryHost};
pub use session::Session;
pub use watch::{Records, Watcher, WatcherState};
