//! HTTP API for the musicbox service.

pub mod error;
pub mod lookup;
pub mod routes;
pub mod search;
pub mod status;

pub use routes::*;
