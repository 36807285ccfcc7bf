pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::InMemoryTripDirectory;

use crate::models::carrier::{CandidateCarrier, TripQuery};

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("trip directory unreachable: {0}")]
    Unreachable(String),
}

/// External source of planned carrier trips.
#[async_trait]
pub trait TripDirectory: Send + Sync {
    async fn search_trips(&self, query: &TripQuery) -> Result<Vec<CandidateCarrier>, DirectoryError>;
}
