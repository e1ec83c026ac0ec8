//! Zoom-stable marker clustering.
//!
//! Points are projected to world pixels at a *stabilized* zoom (the camera
//! zoom floored to a bucket), grouped with an R-tree radius query, and then
//! post-processed so that no bucket ever stands for a single lone point:
//! orphans attach to a nearby cluster, pair up with each other, or become a
//! synthetic bucket. A final pass merges buckets that would visually overlap.

use crate::{
    core::geo::{self, LatLng, LatLngBounds, Point},
    data::{grouping::LocationGroup, marker::MarkerPoint},
    prelude::FxHasher,
    spatial::index::{SpatialIndex, SpatialItem},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::Hasher;

/// Input to the clustering engine: one location with its aggregate weight
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterPoint {
    pub member_ids: Vec<String>,
    pub coordinate: LatLng,
    pub weight: u32,
}

impl ClusterPoint {
    pub fn new(member_ids: Vec<String>, coordinate: LatLng, weight: u32) -> Self {
        Self {
            member_ids,
            coordinate,
            weight: weight.max(1),
        }
    }

    fn sort_key(&self) -> Option<&str> {
        self.member_ids.iter().map(String::as_str).min()
    }
}

impl From<&LocationGroup> for ClusterPoint {
    fn from(group: &LocationGroup) -> Self {
        Self::new(group.member_ids(), group.coordinate, group.weight())
    }
}

impl From<&MarkerPoint> for ClusterPoint {
    fn from(point: &MarkerPoint) -> Self {
        Self::new(
            vec![point.id.clone()],
            point.coordinate,
            point.effective_weight(),
        )
    }
}

/// An aggregated group of nearby points rendered as one count-bearing icon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterBucket {
    /// Order-independent hash of `member_ids`
    pub id: String,
    /// Weighted centroid of the members
    pub focus: LatLng,
    /// Where the icon is drawn, currently identical to `focus`
    pub display: LatLng,
    /// Sum of member weights
    pub count_raw: u32,
    /// Sorted member marker ids
    pub member_ids: Vec<String>,
    /// Extent of the member coordinates
    pub bounds: LatLngBounds,
    /// Built from a single isolated point
    pub synthetic: bool,
}

impl ClusterBucket {
    /// Count shown on the icon. A lone orphan still reads as a group of two.
    pub fn display_count(&self) -> u32 {
        self.count_raw.max(2)
    }

    pub fn contains(&self, marker_id: &str) -> bool {
        self.member_ids
            .binary_search_by(|id| id.as_str().cmp(marker_id))
            .is_ok()
    }
}

/// Stable id for a set of member ids. The input order does not matter.
pub fn stable_cluster_id(member_ids: &[String]) -> String {
    let mut sorted: Vec<&str> = member_ids.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut hasher = FxHasher::default();
    for id in sorted {
        hasher.write(id.as_bytes());
        hasher.write_u8(0xff);
    }
    format!("cluster-{:016x}", hasher.finish())
}

/// Configuration for clustering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Radius of the spatial-index neighbourhood query, in pixels
    pub radius_px: f64,
    /// Zooms are floored to multiples of this before clustering
    pub zoom_bucket_size: f64,
    /// Minimum number of locations that form a cluster in the first pass
    pub min_points: usize,
    /// Orphans within `radius_px * attach_factor` of a cluster join it
    pub attach_factor: f64,
    /// Remaining orphans within `radius_px * pair_factor` of each other pair up
    pub pair_factor: f64,
    /// Buckets closer than `radius_px * overlap_factor` are merged
    pub overlap_factor: f64,
    /// Above this many points the engine falls back to coarse grid bucketing
    pub max_indexed_points: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            radius_px: 60.0,
            zoom_bucket_size: 1.0,
            min_points: 2,
            attach_factor: 1.5,
            pair_factor: 2.0,
            overlap_factor: 0.75,
            max_indexed_points: 20_000,
        }
    }
}

impl ClusteringConfig {
    pub fn with_radius(mut self, radius_px: f64) -> Self {
        self.radius_px = radius_px;
        self
    }

    pub fn attach_threshold(&self) -> f64 {
        self.radius_px * self.attach_factor
    }

    pub fn pair_threshold(&self) -> f64 {
        self.radius_px * self.pair_factor
    }

    pub fn overlap_threshold(&self) -> f64 {
        self.radius_px * self.overlap_factor
    }

    /// Floors `zoom` to the configured bucket so pinch jitter does not reshuffle clusters
    pub fn stabilized_zoom(&self, zoom: f64) -> f64 {
        if !zoom.is_finite() {
            return 0.0;
        }
        let bucket = if self.zoom_bucket_size > 0.0 {
            self.zoom_bucket_size
        } else {
            1.0
        };
        ((zoom / bucket).floor() * bucket).max(0.0)
    }
}

/// Bucket under construction. `members` index into the sorted point list.
#[derive(Debug, Clone)]
struct WorkBucket {
    focus: LatLng,
    projected: Point,
    weight: u32,
    members: Vec<usize>,
    synthetic: bool,
}

impl WorkBucket {
    fn from_members(members: Vec<usize>, points: &[&ClusterPoint], zoom: f64) -> Self {
        let focus = geo::weighted_centroid(
            members
                .iter()
                .map(|&i| (&points[i].coordinate, points[i].weight as f64)),
        )
        .unwrap_or_default();
        let weight = members
            .iter()
            .map(|&i| points[i].weight)
            .fold(0, u32::saturating_add);
        Self {
            focus,
            projected: geo::project(&focus, zoom),
            weight,
            synthetic: members.len() < 2,
            members,
        }
    }

    fn absorb(&mut self, other: WorkBucket, zoom: f64) {
        let a = self.weight as f64;
        let b = other.weight as f64;
        let total = a + b;
        self.focus = LatLng::new(
            (self.focus.lat * a + other.focus.lat * b) / total,
            (self.focus.lng * a + other.focus.lng * b) / total,
        );
        self.projected = geo::project(&self.focus, zoom);
        self.weight = self.weight.saturating_add(other.weight);
        self.members.extend(other.members);
        self.synthetic = false;
    }

    fn into_bucket(self, points: &[&ClusterPoint]) -> ClusterBucket {
        let mut member_ids: Vec<String> = self
            .members
            .iter()
            .flat_map(|&i| points[i].member_ids.iter().cloned())
            .collect();
        member_ids.sort_unstable();
        member_ids.dedup();

        let bounds = LatLngBounds::from_points(self.members.iter().map(|&i| &points[i].coordinate))
            .unwrap_or_else(|| LatLngBounds::new(self.focus, self.focus));

        ClusterBucket {
            id: stable_cluster_id(&member_ids),
            focus: self.focus,
            display: self.focus,
            count_raw: self.weight,
            member_ids,
            bounds,
            synthetic: self.synthetic,
        }
    }
}

/// Pure clustering pass: same point set and same stabilized zoom give the same buckets.
pub fn cluster(
    points: &[ClusterPoint],
    zoom: f64,
    config: &ClusteringConfig,
) -> Vec<ClusterBucket> {
    let zoom = config.stabilized_zoom(zoom);

    let mut sorted: Vec<&ClusterPoint> = points
        .iter()
        .filter(|p| p.coordinate.is_finite() && !p.member_ids.is_empty())
        .collect();
    let dropped = points.len() - sorted.len();
    if dropped > 0 {
        log::trace!("clustering dropped {} points with unusable coordinates", dropped);
    }
    if sorted.is_empty() {
        return Vec::new();
    }
    sorted.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

    let mut buckets = if sorted.len() > config.max_indexed_points {
        log::warn!(
            "{} points exceed the index ceiling of {}, using grid buckets",
            sorted.len(),
            config.max_indexed_points
        );
        grid_buckets(&sorted, zoom, config)
    } else {
        index_buckets(&sorted, zoom, config)
    };

    merge_overlaps(&mut buckets, zoom, config.overlap_threshold());

    let mut out: Vec<ClusterBucket> = buckets
        .into_iter()
        .map(|bucket| bucket.into_bucket(&sorted))
        .collect();
    out.sort_by(|a, b| a.id.cmp(&b.id));

    log::debug!(
        "clustered {} points into {} buckets at zoom {}",
        sorted.len(),
        out.len(),
        zoom
    );
    out
}

fn index_buckets(
    points: &[&ClusterPoint],
    zoom: f64,
    config: &ClusteringConfig,
) -> Vec<WorkBucket> {
    let projected: Vec<Point> = points
        .iter()
        .map(|p| geo::project(&p.coordinate, zoom))
        .collect();
    let index = SpatialIndex::bulk_load(
        projected
            .iter()
            .enumerate()
            .map(|(slot, position)| SpatialItem::new(slot, *position, points[slot].weight))
            .collect(),
    );

    let min_points = config.min_points.max(2);
    let mut visited = vec![false; points.len()];
    let mut buckets = Vec::new();
    let mut orphans = Vec::new();

    for i in 0..points.len() {
        if visited[i] {
            continue;
        }
        visited[i] = true;

        let neighbours: Vec<usize> = index
            .query_radius(&projected[i], config.radius_px)
            .into_iter()
            .map(|item| item.slot)
            .filter(|&slot| !visited[slot])
            .collect();

        if neighbours.len() + 1 >= min_points {
            let mut members = Vec::with_capacity(neighbours.len() + 1);
            members.push(i);
            for slot in neighbours {
                visited[slot] = true;
                members.push(slot);
            }
            buckets.push(WorkBucket::from_members(members, points, zoom));
        } else {
            orphans.push(i);
        }
    }

    let orphans = attach_orphans(
        &mut buckets,
        orphans,
        &projected,
        points,
        zoom,
        config.attach_threshold(),
    );
    let (paired, leftovers) = pair_orphans(&orphans, &projected, config.pair_threshold());

    for (a, b) in paired {
        buckets.push(WorkBucket::from_members(vec![a, b], points, zoom));
    }
    for orphan in leftovers {
        buckets.push(WorkBucket::from_members(vec![orphan], points, zoom));
    }

    buckets
}

/// Moves each orphan into the nearest bucket within `threshold`. Returns the orphans left over.
fn attach_orphans(
    buckets: &mut [WorkBucket],
    orphans: Vec<usize>,
    projected: &[Point],
    points: &[&ClusterPoint],
    zoom: f64,
    threshold: f64,
) -> Vec<usize> {
    if buckets.is_empty() || threshold <= 0.0 {
        return orphans;
    }

    let mut remaining = Vec::new();
    for orphan in orphans {
        let position = projected[orphan];
        let nearest = buckets
            .iter()
            .enumerate()
            .map(|(i, bucket)| (i, bucket.projected.distance_to(&position)))
            .filter(|(_, d)| *d <= threshold)
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

        match nearest {
            Some((i, _)) => {
                let single = WorkBucket::from_members(vec![orphan], points, zoom);
                buckets[i].absorb(single, zoom);
            }
            None => remaining.push(orphan),
        }
    }
    remaining
}

/// Greedy nearest-first pairing of orphans within `threshold`
fn pair_orphans(
    orphans: &[usize],
    projected: &[Point],
    threshold: f64,
) -> (Vec<(usize, usize)>, Vec<usize>) {
    if orphans.len() < 2 || threshold <= 0.0 {
        return (Vec::new(), orphans.to_vec());
    }

    let index = SpatialIndex::bulk_load(
        orphans
            .iter()
            .map(|&slot| SpatialItem::new(slot, projected[slot], 1))
            .collect(),
    );

    let mut candidates: Vec<(f64, usize, usize)> = Vec::new();
    for &a in orphans {
        for item in index.query_radius(&projected[a], threshold) {
            let b = item.slot;
            if b > a {
                candidates.push((projected[a].distance_to(&projected[b]), a, b));
            }
        }
    }
    candidates.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)).then(x.2.cmp(&y.2)));

    let mut taken = crate::prelude::HashSet::default();
    let mut pairs = Vec::new();
    for (_, a, b) in candidates {
        if taken.contains(&a) || taken.contains(&b) {
            continue;
        }
        taken.insert(a);
        taken.insert(b);
        pairs.push((a, b));
    }

    let leftovers = orphans.iter().copied().filter(|o| !taken.contains(o)).collect();
    (pairs, leftovers)
}

/// Repeatedly merges the closest pair of buckets closer than `threshold` until none remain.
///
/// Quadratic per pass; fine for a few hundred buckets per viewport.
fn merge_overlaps(buckets: &mut Vec<WorkBucket>, zoom: f64, threshold: f64) {
    if threshold <= 0.0 {
        return;
    }

    let max_passes = buckets.len();
    for _ in 0..max_passes {
        let mut best: Option<(f64, usize, usize)> = None;
        for i in 0..buckets.len() {
            for j in (i + 1)..buckets.len() {
                let d = buckets[i].projected.distance_to(&buckets[j].projected);
                if d < threshold && best.map_or(true, |(bd, _, _)| d < bd) {
                    best = Some((d, i, j));
                }
            }
        }

        match best {
            Some((_, i, j)) => {
                let other = buckets.swap_remove(j);
                buckets[i].absorb(other, zoom);
            }
            None => break,
        }
    }
}

/// Coarse fallback for very large inputs: one bucket per grid cell of `radius_px`.
fn grid_buckets(points: &[&ClusterPoint], zoom: f64, config: &ClusteringConfig) -> Vec<WorkBucket> {
    let cell = config.radius_px.max(1.0);
    let mut grid: BTreeMap<(i64, i64), Vec<usize>> = BTreeMap::new();

    for (i, point) in points.iter().enumerate() {
        let p = geo::project(&point.coordinate, zoom);
        let key = ((p.x / cell).floor() as i64, (p.y / cell).floor() as i64);
        grid.entry(key).or_default().push(i);
    }

    grid.into_values()
        .map(|members| WorkBucket::from_members(members, points, zoom))
        .collect()
}

/// Clustering engine with a one-entry result cache.
///
/// Panning at a fixed zoom bucket reuses the previous buckets; culling runs on top.
#[derive(Debug, Default)]
pub struct Clustering {
    config: ClusteringConfig,
    cached: Option<(u64, Vec<ClusterBucket>)>,
}

impl Clustering {
    pub fn new(config: ClusteringConfig) -> Self {
        Self {
            config,
            cached: None,
        }
    }

    pub fn config(&self) -> &ClusteringConfig {
        &self.config
    }

    /// Update the clustering configuration
    pub fn set_config(&mut self, config: ClusteringConfig) {
        self.config = config;
        self.invalidate_cache();
    }

    pub fn invalidate_cache(&mut self) {
        self.cached = None;
    }

    /// Clusters `points` at `zoom`, reusing the cached result when neither changed
    pub fn get_clusters(&mut self, points: &[ClusterPoint], zoom: f64) -> Vec<ClusterBucket> {
        let signature = self.signature(points, zoom);
        if let Some((cached_signature, buckets)) = &self.cached {
            if *cached_signature == signature {
                return buckets.clone();
            }
        }

        let buckets = cluster(points, zoom, &self.config);
        self.cached = Some((signature, buckets.clone()));
        buckets
    }

    fn signature(&self, points: &[ClusterPoint], zoom: f64) -> u64 {
        let mut hasher = FxHasher::default();
        hasher.write_u64(self.config.stabilized_zoom(zoom).to_bits());
        hasher.write_usize(points.len());
        for point in points {
            for id in &point.member_ids {
                hasher.write(id.as_bytes());
            }
            hasher.write_u64(point.coordinate.lat.to_bits());
            hasher.write_u64(point.coordinate.lng.to_bits());
            hasher.write_u32(point.weight);
        }
        hasher.finish()
    }
}
