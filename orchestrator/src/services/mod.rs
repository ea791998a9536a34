//! Service implementations
//!
//! Real implementations of the orchestrator's service traits: the job
//! stores, the provider registry with its search backends, and the LLM judge.
//! These are the production implementations that do actual I/O.

pub mod backends;
pub mod credentials;
pub mod judge;
pub mod memory_store;
pub mod registry;
pub mod sqlite_store;

#[cfg(test)]
mod tests;

// Re-export all service implementations
pub use credentials::CredentialDocument;
pub use judge::{JudgeSettings, LlmJudge};
pub use memory_store::MemoryJobStore;
pub use registry::BackendRegistry;
pub use sqlite_store::SqliteJobStore;
