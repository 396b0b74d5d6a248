//! Storage facade consumed by the pondkeep workflow engine
//!
//! The engine never forms SQL and never touches a connection pool directly;
//! it calls through [`Storage`], a narrow async trait. This crate owns that
//! trait, the domain DTOs it deals in, and one reference implementation
//! ([`InMemoryStorage`]) backed by plain `HashMap`s. A production deployment
//! is expected to supply its own vector/relational-backed implementation;
//! this crate does not attempt to be that.

mod memory;
mod model;
mod store;

pub use memory::InMemoryStorage;
pub use model::{Flow, FlowStatus, Issue, IssueStatus, Knowledge, PondEntry, Schedule};
pub use store::{LogBatch, Storage, StorageError};
