//! Resource states and aggregate state counts

use serde::{Deserialize, Serialize};

/// Lifecycle state of a resource record
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum ResourceState {
    /// Released, or never backed by a live object
    #[default]
    Unloaded,
    /// Constructed by its loader but not loaded yet (or the last load failed)
    Created,
    /// Successfully loaded
    Loaded,
}

impl ResourceState {
    /// Every state, in lifecycle order
    pub const ALL: [Self; 3] = [Self::Unloaded, Self::Created, Self::Loaded];
}

/// Number of resource records in each state.
///
/// Used for diagnostics overlays; merges across loaders, groups and the library.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    unloaded: usize,
    created: usize,
    loaded: usize,
}

impl StateCounts {
    /// Create empty counts
    #[must_use]
    pub const fn new() -> Self {
        Self {
            unloaded: 0,
            created: 0,
            loaded: 0,
        }
    }

    /// Count one record in the given state
    pub fn record(&mut self, state: ResourceState) {
        *self.slot_mut(state) += 1;
    }

    /// Number of records in the given state
    #[must_use]
    pub const fn get(&self, state: ResourceState) -> usize {
        match state {
            ResourceState::Unloaded => self.unloaded,
            ResourceState::Created => self.created,
            ResourceState::Loaded => self.loaded,
        }
    }

    /// Add another set of counts to this one
    pub fn merge(&mut self, other: &Self) {
        self.unloaded += other.unloaded;
        self.created += other.created;
        self.loaded += other.loaded;
    }

    /// Total number of records counted
    #[must_use]
    pub const fn total(&self) -> usize {
        self.unloaded + self.created + self.loaded
    }

    /// Iterate `(state, count)` pairs in lifecycle order
    pub fn iter(&self) -> impl Iterator<Item = (ResourceState, usize)> + '_ {
        ResourceState::ALL
            .into_iter()
            .map(move |state| (state, self.get(state)))
    }

    fn slot_mut(&mut self, state: ResourceState) -> &mut usize {
        match state {
            ResourceState::Unloaded => &mut self.unloaded,
            ResourceState::Created => &mut self.created,
            ResourceState::Loaded => &mut self.loaded,
        }
    }
}

impl FromIterator<ResourceState> for StateCounts {
    fn from_iter<I: IntoIterator<Item = ResourceState>>(iter: I) -> Self {
        let mut counts = Self::new();
        for state in iter {
            counts.record(state);
        }
        counts
    }
}

impl std::fmt::Display for StateCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} loaded, {} created, {} unloaded",
            self.loaded, self.created, self.unloaded
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_get() {
        let counts: StateCounts = [
            ResourceState::Created,
            ResourceState::Loaded,
            ResourceState::Loaded,
        ]
        .into_iter()
        .collect();

        assert_eq!(counts.get(ResourceState::Unloaded), 0);
        assert_eq!(counts.get(ResourceState::Created), 1);
        assert_eq!(counts.get(ResourceState::Loaded), 2);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_merge() {
        let mut a = StateCounts::new();
        a.record(ResourceState::Loaded);
        let mut b = StateCounts::new();
        b.record(ResourceState::Created);
        b.record(ResourceState::Loaded);

        a.merge(&b);
        let pairs: Vec<_> = a.iter().collect();
        assert_eq!(
            pairs,
            vec![
                (ResourceState::Unloaded, 0),
                (ResourceState::Created, 1),
                (ResourceState::Loaded, 2),
            ]
        );
    }

    #[test]
    fn test_serializes_for_overlay() {
        let mut counts = StateCounts::new();
        counts.record(ResourceState::Loaded);
        let json = serde_json::to_string(&counts).unwrap();
        assert_eq!(json, r#"{"unloaded":0,"created":0,"loaded":1}"#);
    }
}
