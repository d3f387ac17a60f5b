//! Tool dispatch: model-requested actions executed on the host.

pub mod base;
pub mod dispatch;
pub mod host;

pub use base::{ActionOutcome, HostActions};
pub use dispatch::{declarations, ToolDispatcher};
pub use host::DesktopActions;
