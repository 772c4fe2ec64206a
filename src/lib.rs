pub mod access;
pub mod completeness;
pub mod config;
pub mod errors;
pub mod init;
pub mod logging;
pub mod phase;
pub mod store;
pub mod workflow;

pub use errors::{StoreError, TransitionError};
pub use phase::{Phase, PhaseId, PhaseRegistry};
pub use workflow::{PhaseController, TransitionKind, TransitionRequest};
