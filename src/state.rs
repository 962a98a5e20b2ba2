//! Application state shared across request handlers.

use crate::catalog::Catalog;
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Catalog,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            started_at: Instant::now(),
        }
    }
}
