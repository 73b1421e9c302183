//! Incremental one-dimensional grouping.
//!
//! Data points are `(id, value)` pairs, typically a rank and its timing.
//! The engine keeps an ordered list of non-overlapping groups. Each new
//! point goes to the nearest group; if its arrival would pull the group's
//! mean and median more than 10% apart, the group is split at the point
//! instead and the point joins the closer half.

use crate::utils::config::MEAN_MEDIAN_DEVIATION;
use crate::utils::error::GroupingError;
use log::debug;

/// A data point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Member {
    pub id: usize,
    pub value: i64,
}

/// A run of similar values, sorted ascending
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    members: Vec<Member>,
    min: i64,
    max: i64,
    cached_sum: i64,
}

impl Group {
    fn new(member: Member) -> Self {
        Self {
            members: vec![member],
            min: member.value,
            max: member.value,
            cached_sum: member.value,
        }
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Element identifiers, ordered by value
    pub fn ids(&self) -> Vec<usize> {
        self.members.iter().map(|m| m.id).collect()
    }

    pub fn values(&self) -> Vec<i64> {
        self.members.iter().map(|m| m.value).collect()
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    pub fn cached_sum(&self) -> i64 {
        self.cached_sum
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn mean(&self) -> f64 {
        self.cached_sum as f64 / self.members.len().max(1) as f64
    }

    /// Insert after every member whose value is `<=` the new one
    fn insert(&mut self, member: Member) {
        let idx = self.members.partition_point(|m| m.value <= member.value);
        self.members.insert(idx, member);
        self.cached_sum += member.value;
        self.refresh_bounds();
    }

    fn refresh_bounds(&mut self) {
        if let (Some(first), Some(last)) = (self.members.first(), self.members.last()) {
            self.min = first.value;
            self.max = last.value;
        }
    }

    /// Move members `[at..]` into a new group
    fn split_off(&mut self, at: usize) -> Group {
        let moved = self.members.split_off(at);
        let moved_sum: i64 = moved.iter().map(|m| m.value).sum();
        self.cached_sum -= moved_sum;
        self.refresh_bounds();

        let mut group = Group {
            members: moved,
            min: 0,
            max: 0,
            cached_sum: moved_sum,
        };
        group.refresh_bounds();
        group
    }

    /// Distance from the value to the group's range, 0 inside it
    fn distance(&self, value: i64) -> i64 {
        if value >= self.max {
            value - self.max
        } else if value <= self.min {
            self.min - value
        } else {
            0
        }
    }

    fn mean_with(&self, value: i64) -> f64 {
        (self.cached_sum + value) as f64 / (self.members.len() + 1) as f64
    }

    /// Median of the group's values plus `value`, without inserting it
    fn median_with(&self, value: i64) -> f64 {
        let pos = self.members.partition_point(|m| m.value < value);
        let at = |j: usize| -> i64 {
            match j.cmp(&pos) {
                std::cmp::Ordering::Less => self.members[j].value,
                std::cmp::Ordering::Equal => value,
                std::cmp::Ordering::Greater => self.members[j - 1].value,
            }
        };

        let total = self.members.len() + 1;
        if total % 2 == 1 {
            at(total / 2) as f64
        } else {
            (at(total / 2 - 1) + at(total / 2)) as f64 / 2.0
        }
    }
}

/// Mean and median are within the allowed deviation of each other
fn affinity_is_okay(mean: f64, median: f64) -> bool {
    let (low, high) = if median > mean {
        (mean, median)
    } else {
        (median, mean)
    };
    high * (1.0 - MEAN_MEDIAN_DEVIATION) <= low
}

/// Ordered, non-overlapping groups of data points
#[derive(Debug, Clone, Default)]
pub struct Engine {
    groups: Vec<Group>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the point `(id, values[id])`
    ///
    /// **Public** - main entry point of the engine
    ///
    /// # Errors
    /// * `GroupingError::Internal` - `id` is out of range or no candidate
    ///   group can be located; the engine state is then unspecified
    pub fn add_datapoint(&mut self, id: usize, values: &[i64]) -> Result<(), GroupingError> {
        let value = *values.get(id).ok_or_else(|| {
            GroupingError::Internal(format!(
                "data point {} out of range ({} values)",
                id,
                values.len()
            ))
        })?;
        self.add_value(id, value)
    }

    /// Add a point whose value is given directly
    pub fn add_value(&mut self, id: usize, value: i64) -> Result<(), GroupingError> {
        let member = Member { id, value };
        match self.lookup_group(value)? {
            None => {
                debug!("No group found for {}, creating a new one", value);
                self.add_group(Group::new(member));
                Ok(())
            }
            Some(idx) => self.balance_with(idx, member),
        }
    }

    /// Current groups, ordered by value
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// More than one group means the values are not homogeneous
    pub fn has_outliers(&self) -> bool {
        self.groups.len() > 1
    }

    /// Index of the group most likely to accept the value
    ///
    /// **Private** - inside a group's range wins, then the boundary groups,
    /// then the closer of two neighbours (left on ties)
    fn lookup_group(&self, value: i64) -> Result<Option<usize>, GroupingError> {
        if self.groups.is_empty() {
            return Ok(None);
        }
        let last = self.groups.len() - 1;

        for (idx, group) in self.groups.iter().enumerate() {
            if group.min <= value && value <= group.max {
                return Ok(Some(idx));
            }
            if idx == last && value > group.max {
                return Ok(Some(idx));
            }
            if idx == 0 && value < group.min {
                return Ok(Some(idx));
            }
            if idx < last && group.max < value && self.groups[idx + 1].min > value {
                let left = group.distance(value);
                let right = self.groups[idx + 1].distance(value);
                return Ok(Some(if left <= right { idx } else { idx + 1 }));
            }
        }

        Err(GroupingError::Internal(format!(
            "unable to locate a group for value {}",
            value
        )))
    }

    /// Insert a standalone group before the first group ending above it
    fn add_group(&mut self, group: Group) {
        let idx = self
            .groups
            .iter()
            .position(|g| group.min < g.max)
            .unwrap_or(self.groups.len());
        debug!("Inserting group [{}, {}] at index {}", group.min, group.max, idx);
        self.groups.insert(idx, group);
    }

    fn balance_with(&mut self, idx: usize, member: Member) -> Result<(), GroupingError> {
        let group = self.groups.get_mut(idx).ok_or_else(|| {
            GroupingError::Internal(format!("group {} vanished", idx))
        })?;

        let mean = group.mean_with(member.value);
        let median = group.median_with(member.value);
        if affinity_is_okay(mean, median) {
            group.insert(member);
            return Ok(());
        }

        let split_at = group.members.partition_point(|m| m.value < member.value);
        if split_at == group.len() || split_at == 0 {
            debug!(
                "Value {} starts its own group next to [{}, {}]",
                member.value, group.min, group.max
            );
            self.add_group(Group::new(member));
            return Ok(());
        }

        debug!("Splitting group [{}, {}] at index {}", group.min, group.max, split_at);
        let right = group.split_off(split_at);
        let to_right = right.distance(member.value) < group.distance(member.value);
        self.groups.insert(idx + 1, right);

        let target = if to_right { idx + 1 } else { idx };
        let group = self.groups.get_mut(target).ok_or_else(|| {
            GroupingError::Internal(format!("split group {} vanished", target))
        })?;
        group.insert(member);
        Ok(())
    }
}

/// Group every value of a series, in index order
///
/// **Public** - convenience wrapper used by the timings analysis
pub fn group_values(values: &[i64]) -> Result<Engine, GroupingError> {
    let mut engine = Engine::new();
    for id in 0..values.len() {
        engine.add_datapoint(id, values)?;
    }
    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn group_contents(values: &[i64]) -> Vec<Vec<i64>> {
        group_values(values)
            .unwrap()
            .groups()
            .iter()
            .map(Group::values)
            .collect()
    }

    #[test]
    fn test_repeated_values_split_off() {
        assert_eq!(group_contents(&[1, 2, 3, 3, 3]), vec![vec![1, 2], vec![3, 3, 3]]);
    }

    #[test]
    fn test_homogeneous_values_stay_together() {
        assert_eq!(group_contents(&[1, 2, 3]), vec![vec![1, 2, 3]]);
        assert_eq!(group_contents(&[1, 2, 3, 5]), vec![vec![1, 2, 3, 5]]);
    }

    #[test]
    fn test_gap_creates_new_group() {
        assert_eq!(
            group_contents(&[1, 2, 3, 10, 11, 12]),
            vec![vec![1, 2, 3], vec![10, 11, 12]]
        );
    }

    #[test]
    fn test_three_clusters() {
        assert_eq!(
            group_contents(&[0, 1, 2, 5, 6, 7, 20, 30, 25]),
            vec![vec![0, 1, 2], vec![5, 6, 7], vec![20, 25, 30]]
        );
    }

    #[test]
    fn test_outlier_first() {
        assert_eq!(
            group_contents(&[100, 0, 1, 5, 6, 7, 20, 2, 30, 25]),
            vec![vec![0, 1, 2], vec![5, 6, 7], vec![20, 25, 30], vec![100]]
        );
    }

    #[test]
    fn test_low_value_gets_group_before() {
        assert_eq!(group_contents(&[10, 11, 12, 1]), vec![vec![1], vec![10, 11, 12]]);
    }

    #[test]
    fn test_equidistant_value_joins_left_group() {
        // 20 sits 10 away from both [10..10] and [30]
        assert_eq!(
            group_contents(&[10, 10, 10, 10, 10, 10, 10, 10, 10, 30, 20]),
            vec![vec![10, 10, 10, 10, 10, 10, 10, 10, 10, 20], vec![30]]
        );
    }

    #[test]
    fn test_ids_follow_values() {
        let engine = group_values(&[5, 1, 3]).unwrap();
        assert_eq!(engine.groups().len(), 1);
        assert_eq!(engine.groups()[0].ids(), vec![1, 2, 0]);
        assert_eq!(engine.groups()[0].cached_sum(), 9);
    }

    #[test]
    fn test_median_with_point() {
        let mut group = Group::new(Member { id: 0, value: 1 });
        group.insert(Member { id: 1, value: 2 });
        group.insert(Member { id: 2, value: 3 });
        assert_eq!(group.median_with(3), 2.5);
        assert_eq!(group.median_with(0), 1.5);
        assert_eq!(group.median_with(2), 2.0);
        group.insert(Member { id: 3, value: 3 });
        assert_eq!(group.median_with(3), 3.0);
        assert_eq!(group.median_with(-5), 2.0);
    }

    #[test]
    fn test_split_keeps_cached_sums() {
        let mut group = Group::new(Member { id: 0, value: 1 });
        for (id, value) in [(1, 2), (2, 7), (3, 9)] {
            group.insert(Member { id, value });
        }
        let right = group.split_off(2);
        assert_eq!((group.min(), group.max(), group.cached_sum()), (1, 2, 3));
        assert_eq!((right.min(), right.max(), right.cached_sum()), (7, 9, 16));
    }

    #[test]
    fn test_out_of_range_id() {
        let mut engine = Engine::new();
        assert!(matches!(
            engine.add_datapoint(3, &[1, 2]),
            Err(GroupingError::Internal(_))
        ));
    }
}
