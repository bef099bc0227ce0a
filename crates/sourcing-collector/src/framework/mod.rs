//! Collection framework
//!
//! A feed supplies a [`CollectorPolicy`]; the [`Orchestrator`] runs it against
//! the dedup index, the object store and the notifier, and returns a
//! [`CollectionResult`].

pub mod context;
pub mod orchestrator;
pub mod policy;
pub mod retry;
pub mod types;

pub use context::{RunContext, RunState};
pub use orchestrator::{Orchestrator, OrchestratorSettings};
pub use policy::CollectorPolicy;
pub use retry::RetryPolicy;
pub use types::{
    Candidate, CandidateError, CandidateOutcome, CollectionResult, ErrorKind, RunOptions,
    ScalarValue,
};
