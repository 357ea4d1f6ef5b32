// ── Device set and diffing ──
//
// The last known state of the world, keyed by device id. Diffing a set
// against a fresh poll result is the single source of change events.

use std::collections::BTreeMap;

use crate::model::{Change, DeviceId, Light};

/// Id-keyed set of light snapshots. Never holds two lights with one id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSet {
    lights: BTreeMap<DeviceId, Light>,
}

impl DeviceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    pub fn get(&self, id: DeviceId) -> Option<&Light> {
        self.lights.get(&id)
    }

    pub fn contains(&self, id: DeviceId) -> bool {
        self.lights.contains_key(&id)
    }

    /// Lights in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Light> {
        self.lights.values()
    }

    pub fn to_vec(&self) -> Vec<Light> {
        self.lights.values().copied().collect()
    }

    /// Compare this set with a freshly polled collection.
    ///
    /// Duplicate ids in `incoming` resolve to the last occurrence. Returns
    /// the new set together with the changes that lead from `self` to it:
    /// every `Added`, then every `Updated`, then every `Removed`. Lights
    /// present in both with the same state produce nothing.
    pub fn diff<I>(&self, incoming: I) -> (DeviceSet, Vec<Change>)
    where
        I: IntoIterator<Item = Light>,
    {
        let next: DeviceSet = incoming.into_iter().collect();
        let mut changes = Vec::new();

        for light in next.iter() {
            if !self.contains(light.id) {
                changes.push(Change::Added(*light));
            }
        }
        for light in next.iter() {
            if self.get(light.id).is_some_and(|prev| prev != light) {
                changes.push(Change::Updated(*light));
            }
        }
        for id in self.lights.keys() {
            if !next.contains(*id) {
                changes.push(Change::Removed(*id));
            }
        }

        (next, changes)
    }

    /// Apply a batch of changes in order.
    pub fn apply(&mut self, changes: &[Change]) {
        for change in changes {
            match change {
                Change::Added(light) | Change::Updated(light) => {
                    self.lights.insert(light.id, *light);
                }
                Change::Removed(id) => {
                    self.lights.remove(id);
                }
            }
        }
    }

    /// One `Added` per member: what a newcomer needs to rebuild this set.
    pub fn baseline(&self) -> Vec<Change> {
        self.lights.values().copied().map(Change::Added).collect()
    }
}

impl FromIterator<Light> for DeviceSet {
    fn from_iter<I: IntoIterator<Item = Light>>(iter: I) -> Self {
        let mut lights = BTreeMap::new();
        for light in iter {
            lights.insert(light.id, light);
        }
        Self { lights }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LightState::{self, Off, On};
    use pretty_assertions::assert_eq;

    fn light(id: u32, state: LightState) -> Light {
        Light::new(DeviceId::new(id), state)
    }

    fn set(lights: &[(u32, LightState)]) -> DeviceSet {
        lights.iter().map(|&(id, state)| light(id, state)).collect()
    }

    /// Every set over ids 1..=3 where each id is absent, on, or off.
    fn all_small_sets() -> Vec<DeviceSet> {
        let options = [None, Some(On), Some(Off)];
        let mut sets = Vec::new();
        for a in options {
            for b in options {
                for c in options {
                    let members = [(1, a), (2, b), (3, c)];
                    sets.push(
                        members
                            .iter()
                            .filter_map(|&(id, state)| state.map(|s| light(id, s)))
                            .collect(),
                    );
                }
            }
        }
        sets
    }

    #[test]
    fn state_flip_is_single_update() {
        let prev = set(&[(1, Off), (2, On)]);
        let (next, changes) = prev.diff(set(&[(1, On), (2, On)]).to_vec());

        assert_eq!(changes, vec![Change::Updated(light(1, On))]);
        assert_eq!(next, set(&[(1, On), (2, On)]));
    }

    #[test]
    fn disappearance_is_removal() {
        let prev = set(&[(1, Off)]);
        let (next, changes) = prev.diff(Vec::new());

        assert_eq!(changes, vec![Change::Removed(DeviceId::new(1))]);
        assert!(next.is_empty());
    }

    #[test]
    fn first_poll_adds_everything() {
        let (_, changes) = DeviceSet::new().diff(vec![light(2, On), light(1, Off)]);
        assert_eq!(
            changes,
            vec![Change::Added(light(1, Off)), Change::Added(light(2, On))]
        );
    }

    #[test]
    fn duplicates_resolve_to_last_occurrence() {
        let (next, changes) = DeviceSet::new().diff(vec![light(4, On), light(4, Off)]);
        assert_eq!(next.len(), 1);
        assert_eq!(changes, vec![Change::Added(light(4, Off))]);
    }

    #[test]
    fn categories_are_ordered_added_updated_removed() {
        let prev = set(&[(1, On), (2, On)]);
        let (_, changes) = prev.diff(vec![light(3, On), light(2, Off)]);
        assert_eq!(
            changes,
            vec![
                Change::Added(light(3, On)),
                Change::Updated(light(2, Off)),
                Change::Removed(DeviceId::new(1)),
            ]
        );
    }

    #[test]
    fn diff_of_identical_sets_is_empty() {
        for s in all_small_sets() {
            let (next, changes) = s.diff(s.to_vec());
            assert!(changes.is_empty(), "diff({s:?}, same) = {changes:?}");
            assert_eq!(next, s);
        }
    }

    #[test]
    fn applying_diff_reproduces_target() {
        for prev in all_small_sets() {
            for target in all_small_sets() {
                let (next, changes) = prev.diff(target.to_vec());
                assert_eq!(next, target);

                let mut replayed = prev.clone();
                replayed.apply(&changes);
                assert_eq!(replayed, target, "from {prev:?} via {changes:?}");
            }
        }
    }

    #[test]
    fn one_event_per_changed_id() {
        for prev in all_small_sets() {
            for target in all_small_sets() {
                let (_, changes) = prev.diff(target.to_vec());
                let mut ids: Vec<DeviceId> = changes.iter().map(Change::id).collect();
                ids.sort();
                ids.dedup();
                assert_eq!(ids.len(), changes.len());

                let changed = (1..=3)
                    .map(DeviceId::new)
                    .filter(|id| prev.get(*id) != target.get(*id))
                    .count();
                assert_eq!(changes.len(), changed);
            }
        }
    }

    #[test]
    fn baseline_rebuilds_set() {
        let s = set(&[(1, On), (5, Off), (9, On)]);
        let mut rebuilt = DeviceSet::new();
        rebuilt.apply(&s.baseline());
        assert_eq!(rebuilt, s);
    }
}
