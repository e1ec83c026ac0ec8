//! Applied-filter store shared between screens.
//!
//! The store is an ordinary value handed to whoever needs it. Listeners are
//! registered explicitly and notified synchronously on every change.

use crate::{
    data::marker::{Category, MarkerPoint},
    prelude::HashSet,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The filters currently applied to the marker set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    /// `None` shows every category
    pub categories: Option<HashSet<Category>>,
    pub min_rating: Option<f64>,
    /// Free-text match against titles, case-insensitive
    pub query: Option<String>,
}

impl FilterState {
    pub fn is_empty(&self) -> bool {
        self.categories.is_none() && self.min_rating.is_none() && self.query.is_none()
    }

    pub fn matches(&self, point: &MarkerPoint) -> bool {
        if let Some(categories) = &self.categories {
            // Pre-grouped records stay visible whatever the category filter says
            if point.category != Category::Multi && !categories.contains(&point.category) {
                return false;
            }
        }

        if let Some(min) = self.min_rating {
            if point.normalized_rating().unwrap_or(0.0) < min {
                return false;
            }
        }

        if let Some(query) = &self.query {
            let needle = query.trim().to_lowercase();
            if !needle.is_empty() && !point.title.to_lowercase().contains(&needle) {
                return false;
            }
        }

        true
    }

    pub fn apply(&self, points: &[MarkerPoint]) -> Vec<MarkerPoint> {
        if self.is_empty() {
            return points.to_vec();
        }
        points.iter().filter(|p| self.matches(p)).cloned().collect()
    }
}

/// Handle returned by [`FilterStore::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&FilterState) + Send>;

/// Owner of the applied filter state
pub struct FilterStore {
    state: FilterState,
    version: u64,
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
}

impl FilterStore {
    pub fn new() -> Self {
        Self {
            state: FilterState::default(),
            version: 0,
            next_id: 0,
            listeners: Vec::new(),
        }
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    /// Bumped on every effective change
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&FilterState) + Send + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Replaces the whole state. Listeners are only notified when it actually changed.
    pub fn set(&mut self, state: FilterState) {
        if state == self.state {
            return;
        }
        self.state = state;
        self.version += 1;
        self.notify();
    }

    pub fn toggle_category(&mut self, category: Category) {
        let mut next = self.state.clone();
        let set = next
            .categories
            .get_or_insert_with(|| Category::ALL.iter().copied().collect());
        if !set.remove(&category) {
            set.insert(category);
        }
        if set.len() == Category::ALL.len() {
            next.categories = None;
        }
        self.set(next);
    }

    pub fn set_min_rating(&mut self, min_rating: Option<f64>) {
        let mut next = self.state.clone();
        next.min_rating = min_rating.filter(|r| r.is_finite());
        self.set(next);
    }

    pub fn set_query(&mut self, query: Option<String>) {
        let mut next = self.state.clone();
        next.query = query.filter(|q| !q.trim().is_empty());
        self.set(next);
    }

    pub fn clear(&mut self) {
        self.set(FilterState::default());
    }

    fn notify(&mut self) {
        log::trace!(
            "filter store v{} notifying {} listeners",
            self.version,
            self.listeners.len()
        );
        let state = &self.state;
        for (_, listener) in self.listeners.iter_mut() {
            listener(state);
        }
    }
}

impl Default for FilterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FilterStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterStore")
            .field("state", &self.state)
            .field("version", &self.version)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
