//! Directory-backed catalog source.
//!
//! Layout: `<root>/metadata.yaml` and `<root>/categories/<id>.yaml`.

use super::CatalogSource;
use crate::core::error::SourceError;
use crate::core::parser;
use crate::core::types::{CategoryDetail, Metadata};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.root.join("metadata.yaml")
    }

    pub fn category_path(&self, category_id: &str) -> PathBuf {
        self.root
            .join("categories")
            .join(format!("{}.yaml", category_id))
    }
}

async fn read_document(path: &Path) -> Result<String, SourceError> {
    tokio::fs::read_to_string(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => SourceError::Missing(path.display().to_string()),
        _ => SourceError::Unavailable(format!("cannot read {}: {}", path.display(), e)),
    })
}

#[async_trait]
impl CatalogSource for DirSource {
    async fn read_metadata(&self) -> Result<Metadata, SourceError> {
        let path = self.metadata_path();
        let content = read_document(&path).await?;
        parser::parse_metadata(&content).map_err(|message| SourceError::Malformed {
            key: path.display().to_string(),
            message,
        })
    }

    async fn read_category(&self, category_id: &str) -> Result<CategoryDetail, SourceError> {
        if !parser::is_safe_id(category_id) {
            return Err(SourceError::Missing(category_id.to_string()));
        }
        let path = self.category_path(category_id);
        let content = read_document(&path).await?;
        parser::parse_category_detail(&content).map_err(|message| SourceError::Malformed {
            key: path.display().to_string(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_catalog(root: &Path) {
        std::fs::create_dir_all(root.join("categories")).unwrap();
        std::fs::write(
            root.join("metadata.yaml"),
            r#"
categories:
  - id: street
    name: Street Workout
    skills:
      - id: pull-up
        name: Pull-up
        total_levels: 1
"#,
        )
        .unwrap();
        std::fs::write(
            root.join("categories").join("street.yaml"),
            r#"
id: street
skills:
  - id: pull-up
    levels:
      - { id: pu-1, ordinal: 1, name: Negatives, xp: 50 }
"#,
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_read_metadata_and_category() {
        let dir = tempfile::tempdir().unwrap();
        write_catalog(dir.path());
        let source = DirSource::new(dir.path());

        let meta = source.read_metadata().await.unwrap();
        assert_eq!(meta.categories[0].name, "Street Workout");

        let detail = source.read_category("street").await.unwrap();
        assert_eq!(detail.skills[0].levels[0].xp, 50);
    }

    #[tokio::test]
    async fn test_missing_category_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        write_catalog(dir.path());
        let source = DirSource::new(dir.path());
        let err = source.read_category("yoga").await.unwrap_err();
        assert!(matches!(err, SourceError::Missing(_)));
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_catalog(dir.path());
        let source = DirSource::new(dir.path());
        let err = source.read_category("../metadata").await.unwrap_err();
        assert!(matches!(err, SourceError::Missing(_)));
    }

    #[tokio::test]
    async fn test_malformed_document() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("metadata.yaml"), "categories: 7").unwrap();
        let source = DirSource::new(dir.path());
        let err = source.read_metadata().await.unwrap_err();
        assert!(matches!(err, SourceError::Malformed { .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_paths() {
        let source = DirSource::new("/catalog");
        assert_eq!(source.metadata_path(), PathBuf::from("/catalog/metadata.yaml"));
        assert_eq!(
            source.category_path("street"),
            PathBuf::from("/catalog/categories/street.yaml")
        );
    }
}
