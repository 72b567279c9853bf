//! HTTP surface for the intake service.
//!
//! Routes are nested under `/api/`. `intake_router()` returns a `Router`
//! that can be mounted on any axum server instance; `start_intake_server()`
//! runs it on its own listener.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use router::intake_router;
pub use server::{start_intake_server, IntakeServer, ServerInfo};
pub use types::ApiContext;
