//! Catalog sources: where the metadata and detail tiers are read from.
//!
//! The loader only sees [`CatalogSource`]. Retry policy lives here, in
//! [`retry::Retrying`], never in the loader.

pub mod dir;
pub mod memory;
pub mod retry;

pub use dir::DirSource;
pub use memory::StaticSource;
pub use retry::{RetryPolicy, Retrying};

use crate::core::error::SourceError;
use crate::core::types::{CategoryDetail, Metadata};
use async_trait::async_trait;
use std::sync::Arc;

/// Remote-read collaborator for catalog partitions.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Read the metadata tier.
    async fn read_metadata(&self) -> Result<Metadata, SourceError>;

    /// Read one category's detail partition. Unknown ids are `Missing`.
    async fn read_category(&self, category_id: &str) -> Result<CategoryDetail, SourceError>;
}

#[async_trait]
impl<S: CatalogSource + ?Sized> CatalogSource for Arc<S> {
    async fn read_metadata(&self) -> Result<Metadata, SourceError> {
        (**self).read_metadata().await
    }

    async fn read_category(&self, category_id: &str) -> Result<CategoryDetail, SourceError> {
        (**self).read_category(category_id).await
    }
}
