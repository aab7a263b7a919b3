//! Local JSON boundary.
//!
//! Read-only views over the line store, the latest forecast and the push
//! channel state, plus a manual reconnect action.

mod dto;
mod routes;
mod state;

pub use dto::*;
pub use routes::{AppError, create_router};
pub use state::AppState;
