//! Model Hub
//!
//! A REST service for managing users, datasets, and neural-network model
//! metadata, with training, inference, and transfer learning delegated to
//! the Burn-backed model runtime.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;
pub mod types;

pub use router::create_router;
pub use state::AppState;
