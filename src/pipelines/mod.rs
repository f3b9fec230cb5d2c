//! End-to-end runs, one module per command.
//!
//! Both pipelines are strictly linear: load, fetch, normalize, merge or
//! dedupe, write. Network collaborators are passed in so the runs can be
//! exercised without a network.

pub mod digest;
pub mod news;
