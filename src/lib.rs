//! CryptoPulse backend service
//!
//! Health monitoring of the service's dependencies and Cashfree payment
//! webhooks driving subscription state.

pub mod config;
pub mod error;
pub mod handlers;
pub mod health;
pub mod payments;
pub mod routes;
pub mod state;
pub mod storage;

pub use config::AppConfig;
pub use routes::create_router;
pub use state::AppState;
