//! Sync engine: repository enumeration, the fast-skip decision, the bounded
//! worker pool, and the progress event stream. This is the system's one
//! piece of nontrivial engineering; everything else is I/O glue.

mod archive;
mod engine;
mod filter;
mod freshness;

pub use engine::SyncEngine;
pub use filter::Filter;
pub use freshness::{up_to_date, CLOCK_SKEW_TOLERANCE};
