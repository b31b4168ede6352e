//! Fixed-size worker pool fed from one shared queue.

pub mod manager;
pub mod worker;
