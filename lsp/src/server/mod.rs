mod analysis;
mod cli;
mod config;
mod convert;
mod entry;
mod gateway;
mod handlers;
mod notifications;
mod oracle;
mod state;
mod text;
mod utils;

pub use cli::LaunchOptions;
pub use entry::{build_service, run};
pub use state::TstLanguageServer;

/// Delay before diagnostics are published for a freshly opened document.
pub(crate) const OPEN_DEBOUNCE_MS: u64 = 150;
/// Delay after an edit; later edits supersede the pending scan.
pub(crate) const CHANGE_DEBOUNCE_MS: u64 = 250;
