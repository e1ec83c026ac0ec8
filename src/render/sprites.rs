//! Sprite resolution with a remote → generated → category-default fallback chain.

use crate::{
    data::{
        grouping::LocationGroup,
        marker::{Category, MarkerPoint},
    },
    prelude::{HashMap, HashSet},
    runtime,
    traits::SpriteFetcher,
};
use lru::LruCache;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::time::Duration;

/// Bundled pin asset per category
static CATEGORY_DEFAULTS: Lazy<HashMap<Category, &'static str>> = Lazy::new(|| {
    Category::ALL
        .iter()
        .map(|category| {
            let asset = match category {
                Category::Restaurant => "pin-restaurant",
                Category::Cafe => "pin-cafe",
                Category::Bar => "pin-bar",
                Category::Hotel => "pin-hotel",
                Category::Attraction => "pin-attraction",
                Category::Shop => "pin-shop",
                Category::Service => "pin-service",
                Category::Multi => "pin-multi",
                Category::Other => "pin-default",
            };
            (*category, asset)
        })
        .collect()
});

/// Asset name of the bundled pin for `category`
pub fn category_asset(category: Category) -> &'static str {
    CATEGORY_DEFAULTS.get(&category).copied().unwrap_or("pin-default")
}

/// What the host should draw for a render item
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ImageRef {
    /// Downloaded image for a sprite key
    Remote { key: String, url: String },
    /// Image generated at build time and shipped with the app
    Generated { key: String },
    /// Bundled pin for the marker's category
    CategoryDefault { category: Category },
    /// Count-bearing cluster icon; `tier` is the smallest count the icon represents
    Cluster { tier: u32 },
    /// Several venues at one location
    Stacked,
    /// Inert image for unused pool slots
    Placeholder,
}

impl ImageRef {
    /// Stable asset identifier for the host's lookup tables
    pub fn asset_key(&self) -> String {
        match self {
            ImageRef::Remote { key, .. } => format!("remote:{key}"),
            ImageRef::Generated { key } => format!("generated:{key}"),
            ImageRef::CategoryDefault { category } => category_asset(*category).to_string(),
            ImageRef::Cluster { tier } => format!("cluster-{tier}"),
            ImageRef::Stacked => "pin-stacked".to_string(),
            ImageRef::Placeholder => "placeholder".to_string(),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, ImageRef::Remote { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpriteConfig {
    /// Resolved sprite keys kept in the LRU cache
    pub cache_capacity: usize,
    /// Ascending cluster icon tiers
    pub cluster_tiers: Vec<u32>,
    /// Upper bound of prefetches started per frame
    pub max_prefetch_per_frame: usize,
    pub prefetch_timeout_ms: u64,
}

impl Default for SpriteConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 512,
            cluster_tiers: vec![2, 5, 10, 25, 50, 100, 250, 500, 1000],
            max_prefetch_per_frame: 16,
            prefetch_timeout_ms: 4_000,
        }
    }
}

impl SpriteConfig {
    pub fn prefetch_timeout(&self) -> Duration {
        Duration::from_millis(self.prefetch_timeout_ms)
    }

    /// Largest tier not above `count`
    pub fn cluster_tier(&self, count: u32) -> u32 {
        self.cluster_tiers
            .iter()
            .copied()
            .filter(|tier| *tier <= count)
            .max()
            .unwrap_or_else(|| self.cluster_tiers.iter().copied().min().unwrap_or(2))
    }
}

/// One remote sprite to download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchJob {
    pub key: String,
    pub url: String,
    /// Marker that asked for the sprite
    pub marker_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchRequest {
    pub generation: u64,
    pub jobs: Vec<PrefetchJob>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchOutcome {
    pub generation: u64,
    pub key: String,
    pub marker_id: String,
    /// `Err` carries the failure reason
    pub result: std::result::Result<(), String>,
}

/// Runs a prefetch request against the host's image loader
pub async fn run_prefetch(
    fetcher: &dyn SpriteFetcher,
    request: PrefetchRequest,
    timeout: Duration,
) -> Vec<PrefetchOutcome> {
    let calls: Vec<_> = request
        .jobs
        .iter()
        .map(|job| fetcher.prefetch(&job.key, &job.url))
        .collect();
    let results = runtime::join_with_timeout(calls, timeout).await;

    request
        .jobs
        .into_iter()
        .zip(results)
        .map(|(job, result)| PrefetchOutcome {
            generation: request.generation,
            key: job.key,
            marker_id: job.marker_id,
            result: result.map_err(|e| e.to_string()),
        })
        .collect()
}

/// Resolves sprite keys to images and remembers failed downloads for the session
pub struct SpriteResolver {
    config: SpriteConfig,
    remote: HashMap<String, String>,
    generated: HashSet<String>,
    failures: HashSet<String>,
    ready: HashSet<String>,
    in_flight: HashSet<String>,
    cache: LruCache<String, ImageRef>,
}

impl SpriteResolver {
    pub fn new(config: SpriteConfig) -> Self {
        let capacity = NonZeroUsize::new(config.cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            remote: HashMap::default(),
            generated: HashSet::default(),
            failures: HashSet::default(),
            ready: HashSet::default(),
            in_flight: HashSet::default(),
            cache: LruCache::new(capacity),
        }
    }

    pub fn config(&self) -> &SpriteConfig {
        &self.config
    }

    /// Replaces the key → URL table for remote sprites
    pub fn set_remote_sources(&mut self, sources: impl IntoIterator<Item = (String, String)>) {
        self.remote = sources.into_iter().collect();
        self.cache.clear();
    }

    /// Replaces the set of keys that have a generated local image
    pub fn set_generated_keys(&mut self, keys: impl IntoIterator<Item = String>) {
        self.generated = keys.into_iter().collect();
        self.cache.clear();
    }

    /// Resolves an explicit sprite key, falling back to `category`'s pin
    pub fn resolve_key(&mut self, key: &str, category: Category) -> ImageRef {
        if let Some(hit) = self.cache.get(key) {
            return hit.clone();
        }

        let remote = self.remote.get(key).filter(|_| !self.failures.contains(key));
        let image = if let Some(url) = remote {
            ImageRef::Remote {
                key: key.to_string(),
                url: url.clone(),
            }
        } else if self.generated.contains(key) {
            ImageRef::Generated { key: key.to_string() }
        } else {
            ImageRef::CategoryDefault { category }
        };

        self.cache.put(key.to_string(), image.clone());
        image
    }

    pub fn resolve_marker(&mut self, marker: &MarkerPoint) -> ImageRef {
        match marker.sprite_key.as_deref() {
            Some(key) if !key.is_empty() => self.resolve_key(key, marker.category),
            _ => ImageRef::CategoryDefault {
                category: marker.category,
            },
        }
    }

    pub fn resolve_group(&mut self, group: &LocationGroup) -> ImageRef {
        if group.is_stacked() {
            return ImageRef::Stacked;
        }
        self.resolve_marker(group.first())
    }

    pub fn cluster_image(&self, count: u32) -> ImageRef {
        ImageRef::Cluster {
            tier: self.config.cluster_tier(count),
        }
    }

    pub fn record_failure(&mut self, key: &str, reason: &str) {
        if self.failures.insert(key.to_string()) {
            log::warn!("sprite {} failed, using local fallback: {}", key, reason);
        }
        self.ready.remove(key);
        self.cache.pop(key);
    }

    pub fn has_failed(&self, key: &str) -> bool {
        self.failures.contains(key)
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Whether a remote sprite finished downloading
    pub fn is_ready(&self, key: &str) -> bool {
        self.ready.contains(key)
    }

    /// Remote sprites of `markers` that still need a download, capped per frame
    pub fn prefetch_request<'a>(
        &mut self,
        markers: impl IntoIterator<Item = &'a MarkerPoint>,
        generation: u64,
    ) -> Option<PrefetchRequest> {
        let mut jobs = Vec::new();
        for marker in markers {
            if jobs.len() >= self.config.max_prefetch_per_frame {
                break;
            }
            let Some(key) = marker.sprite_key.as_deref() else {
                continue;
            };
            if self.failures.contains(key)
                || self.ready.contains(key)
                || self.in_flight.contains(key)
            {
                continue;
            }
            let Some(url) = self.remote.get(key) else {
                continue;
            };
            self.in_flight.insert(key.to_string());
            jobs.push(PrefetchJob {
                key: key.to_string(),
                url: url.clone(),
                marker_id: marker.id.clone(),
            });
        }

        (!jobs.is_empty()).then_some(PrefetchRequest { generation, jobs })
    }

    /// Applies one finished download.
    ///
    /// Failures are always recorded. Successes only count while the requesting
    /// marker is still relevant; otherwise the key may be requested again later.
    pub fn apply_outcome(
        &mut self,
        outcome: &PrefetchOutcome,
        still_relevant: impl Fn(&str) -> bool,
    ) -> bool {
        self.in_flight.remove(&outcome.key);
        match &outcome.result {
            Err(reason) => {
                self.record_failure(&outcome.key, reason);
                true
            }
            Ok(()) if still_relevant(&outcome.marker_id) => {
                self.ready.insert(outcome.key.clone());
                true
            }
            Ok(()) => {
                log::trace!(
                    "dropping prefetch of {} for {}: no longer in view",
                    outcome.key,
                    outcome.marker_id
                );
                false
            }
        }
    }

    /// Forgets failures and downloads, e.g. after connectivity returns
    pub fn reset_session(&mut self) {
        self.failures.clear();
        self.ready.clear();
        self.in_flight.clear();
        self.cache.clear();
    }
}

impl Default for SpriteResolver {
    fn default() -> Self {
        Self::new(SpriteConfig::default())
    }
}

impl std::fmt::Debug for SpriteResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpriteResolver")
            .field("remote", &self.remote.len())
            .field("generated", &self.generated.len())
            .field("failures", &self.failures.len())
            .field("cached", &self.cache.len())
            .finish()
    }
}
