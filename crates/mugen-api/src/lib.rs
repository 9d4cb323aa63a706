//! Mugen API Library
//!
//! HTTP intake for image-to-video generation: handlers, upload staging,
//! application setup.

mod api_doc;
pub mod constants;
mod handlers;
pub mod services;
pub mod setup;
mod telemetry;

pub mod error;
pub mod state;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
