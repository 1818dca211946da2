//! Shared DTO types used across multiple endpoints.

use serde::Serialize;
use utoipa::ToSchema;

/// List envelope for collection endpoints.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ListResponse<T> {
    /// Items.
    pub data: Vec<T>,
    /// Number of items in `data`.
    pub total: usize,
}

impl<T> ListResponse<T> {
    /// Wraps a list.
    #[must_use]
    pub fn new(data: Vec<T>) -> Self {
        Self {
            total: data.len(),
            data,
        }
    }
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(data: Vec<T>) -> Self {
        Self::new(data)
    }
}
