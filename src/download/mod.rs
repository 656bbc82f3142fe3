//! Download layer (spec 4.6/4.7): the per-item downloader and the
//! bounded-concurrency queue that drives it.

pub mod downloader;
pub mod queue;
