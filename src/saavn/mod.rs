//! Client for the unofficial Saavn (JioSaavn) API.

pub mod api;
mod breaker;
pub mod errors;
pub mod json;
pub mod models;
pub mod raw;
pub mod transport;

pub use api::{RetryPolicy, SaavnApi};
pub use errors::SaavnApiError;
pub use models::*;
pub use transport::{HttpTransport, QueryParams, RawResponse, Transport, TransportError};
