//! Lazy catalog loader with per-key single-flight deduplication.
//!
//! Each resource key (the metadata tier, or one category's detail partition)
//! has at most one load in flight. The first caller spawns the load; later
//! callers clone its shared future. The slot lock is held only while the
//! cache and in-flight maps change, never across a read. Loads are spawned
//! tasks, so a load every caller walked away from still completes and fills
//! the cache.

use super::error::{CatalogError, ResourceKey, SourceError};
use super::parser;
use super::types::*;
use crate::source::CatalogSource;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

type LoadResult<T> = Result<Arc<T>, CatalogError>;
type Flight<T> = Shared<BoxFuture<'static, LoadResult<T>>>;

/// Cache and in-flight loads for one tier.
struct Tier<T> {
    cache: HashMap<ResourceKey, Arc<T>>,
    in_flight: HashMap<ResourceKey, Flight<T>>,
}

impl<T> Default for Tier<T> {
    fn default() -> Self {
        Self {
            cache: HashMap::new(),
            in_flight: HashMap::new(),
        }
    }
}

impl<T> Tier<T> {
    fn clear(&mut self) {
        self.cache.clear();
        self.in_flight.clear();
    }
}

#[derive(Default)]
struct Slots {
    /// Bumped by `reset`; loads from an older generation never touch the maps.
    generation: u64,
    metadata: Tier<Metadata>,
    details: Tier<CategoryDetail>,
}

/// A catalog document type the loader caches.
trait Cached: Send + Sync + 'static {
    fn tier(slots: &mut Slots) -> &mut Tier<Self>
    where
        Self: Sized;
}

impl Cached for Metadata {
    fn tier(slots: &mut Slots) -> &mut Tier<Self> {
        &mut slots.metadata
    }
}

impl Cached for CategoryDetail {
    fn tier(slots: &mut Slots) -> &mut Tier<Self> {
        &mut slots.details
    }
}

/// Catalog loader. Cheap to clone; clones share cache and in-flight state.
#[derive(Clone)]
pub struct Loader {
    source: Arc<dyn CatalogSource>,
    slots: Arc<Mutex<Slots>>,
    strict: bool,
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (cached, in_flight) = match self.slots.try_lock() {
            Ok(s) => (
                s.metadata.cache.len() + s.details.cache.len(),
                s.metadata.in_flight.len() + s.details.in_flight.len(),
            ),
            Err(_) => (0, 0),
        };
        f.debug_struct("Loader")
            .field("strict", &self.strict)
            .field("cached", &cached)
            .field("in_flight", &in_flight)
            .finish()
    }
}

impl Loader {
    pub fn new(source: impl CatalogSource + 'static) -> Self {
        Self::from_arc(Arc::new(source))
    }

    pub fn from_arc(source: Arc<dyn CatalogSource>) -> Self {
        Self {
            source,
            slots: Arc::new(Mutex::new(Slots::default())),
            strict: false,
        }
    }

    /// Reject metadata that fails graph validation instead of logging it.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// The metadata tier. Concurrent callers share one load.
    pub async fn get_metadata(&self) -> LoadResult<Metadata> {
        let source = Arc::clone(&self.source);
        let strict = self.strict;
        self.fetch(ResourceKey::Metadata, move || async move {
            let metadata = source
                .read_metadata()
                .await
                .map_err(|cause| CatalogError::LoadFailed {
                    resource: ResourceKey::Metadata,
                    cause,
                })?;
            check_metadata(&metadata, strict)?;
            info!("loaded catalog metadata ({} categories)", metadata.categories.len());
            Ok::<_, CatalogError>(metadata)
        })
        .await
    }

    /// One category's detail partition. Keyed independently per category.
    pub async fn get_category_detail(&self, category_id: &str) -> LoadResult<CategoryDetail> {
        let source = Arc::clone(&self.source);
        let id = category_id.to_string();
        self.fetch(ResourceKey::Category(id.clone()), move || async move {
            let detail = source.read_category(&id).await.map_err(|cause| match cause {
                SourceError::Missing(_) => CatalogError::category_not_found(&id),
                cause => CatalogError::LoadFailed {
                    resource: ResourceKey::Category(id.clone()),
                    cause,
                },
            })?;
            info!("loaded category '{}' ({} skills)", id, detail.skills.len());
            Ok::<_, CatalogError>(detail)
        })
        .await
    }

    /// A merged category. Fails if either tier fails.
    pub async fn get_category(&self, category_id: &str) -> Result<Category, CatalogError> {
        let (metadata, detail) = futures::join!(
            self.get_metadata(),
            self.get_category_detail(category_id)
        );
        let metadata = metadata?;
        let meta = metadata
            .category(category_id)
            .ok_or_else(|| CatalogError::category_not_found(category_id))?;
        let detail = detail?;
        Ok(merge_checked(meta, &detail))
    }

    /// A single skill with both tiers merged.
    ///
    /// If the detail tier cannot be loaded, the metadata-only partial skill is
    /// returned instead of an error.
    pub async fn get_full_skill(
        &self,
        category_id: &str,
        skill_id: &str,
    ) -> Result<Skill, CatalogError> {
        let (metadata, detail) = futures::join!(
            self.get_metadata(),
            self.get_category_detail(category_id)
        );
        let metadata = metadata?;
        let summary = metadata
            .category(category_id)
            .ok_or_else(|| CatalogError::category_not_found(category_id))?
            .skill(skill_id)
            .ok_or_else(|| CatalogError::skill_not_found(skill_id))?;

        match detail {
            Ok(detail) => match detail.skill(skill_id) {
                Some(sd) => Ok(Skill::merge(summary, sd)),
                None => {
                    warn!(
                        "category '{}' has no detail for skill '{}', serving summary only",
                        category_id, skill_id
                    );
                    Ok(Skill::partial(summary))
                }
            },
            Err(e) => {
                warn!(
                    "detail for category '{}' unavailable, serving partial skill '{}': {}",
                    category_id, skill_id, e
                );
                Ok(Skill::partial(summary))
            }
        }
    }

    /// Load metadata and the given categories for session generation.
    ///
    /// A metadata failure is returned. A category that is unknown or whose
    /// detail fails to load is left out, so it contributes no sessions
    /// without blocking the others.
    pub async fn load_catalog(&self, category_ids: &[String]) -> Result<Catalog, CatalogError> {
        let metadata = self.get_metadata().await?;

        let mut wanted: Vec<&str> = Vec::new();
        for id in category_ids {
            if wanted.contains(&id.as_str()) {
                continue;
            }
            if metadata.category(id).is_none() {
                info!("category '{}' is not in the catalog, skipping", id);
                continue;
            }
            wanted.push(id.as_str());
        }

        let details =
            futures::future::join_all(wanted.iter().map(|id| self.get_category_detail(id))).await;

        let mut catalog = Catalog::new();
        for (id, detail) in wanted.into_iter().zip(details) {
            let Some(meta) = metadata.category(id) else {
                continue;
            };
            match detail {
                Ok(detail) => {
                    catalog.insert(id.to_string(), Arc::new(merge_checked(meta, &detail)));
                }
                Err(e) => warn!("category '{}' left out of catalog: {}", id, e),
            }
        }
        Ok(catalog)
    }

    /// Drop every cached document and forget in-flight loads.
    ///
    /// Loads already running still resolve for the callers waiting on them,
    /// but their results are not cached.
    pub async fn reset(&self) {
        let mut slots = self.slots.lock().await;
        slots.generation += 1;
        slots.metadata.clear();
        slots.details.clear();
        debug!("catalog cache reset (generation {})", slots.generation);
    }

    async fn fetch<T, F, Fut>(&self, key: ResourceKey, load: F) -> LoadResult<T>
    where
        T: Cached,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CatalogError>> + Send + 'static,
    {
        let flight = {
            let mut slots = self.slots.lock().await;
            let generation = slots.generation;
            let tier = T::tier(&mut slots);

            if let Some(hit) = tier.cache.get(&key) {
                return Ok(Arc::clone(hit));
            }

            if let Some(flight) = tier.in_flight.get(&key) {
                debug!("singleflight wait: key={}", key);
                flight.clone()
            } else {
                debug!("singleflight lead: key={}", key);
                let flight = self.spawn_load(key.clone(), generation, load());
                tier.in_flight.insert(key, flight.clone());
                flight
            }
        };
        flight.await
    }

    fn spawn_load<T, Fut>(&self, key: ResourceKey, generation: u64, load: Fut) -> Flight<T>
    where
        T: Cached,
        Fut: Future<Output = Result<T, CatalogError>> + Send + 'static,
    {
        let slots = Arc::clone(&self.slots);
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            let result = load.await.map(Arc::new);
            let mut guard = slots.lock().await;
            if guard.generation == generation {
                let tier = T::tier(&mut guard);
                tier.in_flight.remove(&task_key);
                match &result {
                    Ok(value) => {
                        tier.cache.insert(task_key.clone(), Arc::clone(value));
                        debug!("singleflight complete: key={}", task_key);
                    }
                    Err(e) => debug!("singleflight failed: key={}: {}", task_key, e),
                }
            }
            result
        });

        let slots = Arc::clone(&self.slots);
        async move {
            match task.await {
                Ok(result) => result,
                Err(join_error) => {
                    warn!("load of {} did not finish: {}", key, join_error);
                    let mut guard = slots.lock().await;
                    if guard.generation == generation {
                        T::tier(&mut guard).in_flight.remove(&key);
                    }
                    Err(CatalogError::Interrupted(key))
                }
            }
        }
        .boxed()
        .shared()
    }
}

fn check_metadata(metadata: &Metadata, strict: bool) -> Result<(), CatalogError> {
    let errors = parser::validate_metadata(metadata);
    if errors.is_empty() {
        return Ok(());
    }
    if strict {
        return Err(CatalogError::InvalidCatalog(
            errors.into_iter().map(|e| e.message).collect(),
        ));
    }
    for e in &errors {
        warn!("catalog invariant violation: {}", e);
    }
    Ok(())
}

fn merge_checked(meta: &CategoryMeta, detail: &CategoryDetail) -> Category {
    for e in parser::validate_detail(meta, detail) {
        warn!("catalog invariant violation: {}", e);
    }
    Category::merge(meta, detail)
}
