//! In-memory catalog registry.
//!
//! Category partitions are registered explicitly by id at startup instead of
//! being looked up through a hard-coded table.

use super::CatalogSource;
use crate::core::error::SourceError;
use crate::core::types::{CategoryDetail, Metadata};
use async_trait::async_trait;
use indexmap::IndexMap;

#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    metadata: Metadata,
    partitions: IndexMap<String, CategoryDetail>,
}

impl StaticSource {
    pub fn new(metadata: Metadata) -> Self {
        Self {
            metadata,
            partitions: IndexMap::new(),
        }
    }

    /// Register a detail partition under its own id, replacing any previous one.
    pub fn register_category(&mut self, detail: CategoryDetail) -> &mut Self {
        self.partitions.insert(detail.id.clone(), detail);
        self
    }

    pub fn with_category(mut self, detail: CategoryDetail) -> Self {
        self.register_category(detail);
        self
    }

    pub fn registered(&self) -> impl Iterator<Item = &str> {
        self.partitions.keys().map(String::as_str)
    }
}

#[async_trait]
impl CatalogSource for StaticSource {
    async fn read_metadata(&self) -> Result<Metadata, SourceError> {
        Ok(self.metadata.clone())
    }

    async fn read_category(&self, category_id: &str) -> Result<CategoryDetail, SourceError> {
        self.partitions
            .get(category_id)
            .cloned()
            .ok_or_else(|| SourceError::Missing(category_id.to_string()))
    }
}
