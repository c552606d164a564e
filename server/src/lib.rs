//! HTTP and WebSocket surface of the staker dashboard.
//!
//! Serves the dashboard page, a JSON API over the controller handle and a
//! `/ws` endpoint that pushes every new view and transaction notification.

pub mod error;
pub mod messages;
pub mod page;
pub mod server;

pub use error::ServerError;
pub use messages::{ActionRequest, ClientMessage, ServerMessage};
pub use server::{AppState, DashboardServer};
