//! Language server for `TEST.*` scripts and the `// vmock` comments of coded-test
//! sources. All text analysis happens in `tst-core`; this crate owns the open
//! buffers, the client configuration and the choice-data transports.

mod server;

pub use server::{build_service, run, LaunchOptions, TstLanguageServer};
