//! External source adapter: fetches per-client post and comment deltas from
//! the remote tabular sheet gateway.

mod client;
mod error;

pub use client::SheetClient;
pub use error::SourceError;
