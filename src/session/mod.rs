//! Per-client intake sessions.
//!
//! A session walks the fixed step list (documents, then building elements),
//! collecting photos per step. The store keys sessions by client id and
//! gives each one its own async lock so that commands for one client run
//! one at a time while different clients proceed in parallel.

pub mod sequencer;
pub mod state;
pub mod store;

pub use sequencer::{PhotoSlot, StepSequencer, StepView};
pub use state::{ClientId, PhotoRef, Session};
pub use store::{SessionHandle, SessionStore};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("No active session for client {0}")]
    NotFound(ClientId),

    #[error("All intake steps are already completed")]
    AllStepsCompleted,

    #[error("The report for this session is being generated")]
    Busy,
}
