use std::collections::HashMap;

use crate::BucketPolicy;

/// One hash table: bucket id → indices of the reference points in it.
///
/// Indices within a bucket are kept in insertion (ascending point) order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde_crate::Serialize, serde_crate::Deserialize),
    serde(crate = "serde_crate")
)]
pub struct HashTable {
    buckets: HashMap<usize, Vec<usize>>,
}

impl HashTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `point` to `bucket`. Returns `false` when the point was dropped
    /// because the bucket is full under [`BucketPolicy::Truncate`].
    pub fn insert(
        &mut self,
        bucket: usize,
        point: usize,
        bucket_size: usize,
        policy: BucketPolicy,
    ) -> bool {
        let entries = self.buckets.entry(bucket).or_default();
        if policy == BucketPolicy::Truncate && entries.len() >= bucket_size {
            return false;
        }
        entries.push(point);
        true
    }

    /// Points hashed to `bucket`; empty when the bucket was never filled.
    pub fn get(&self, bucket: usize) -> &[usize] {
        self.buckets.get(&bucket).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of non-empty buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Number of buckets holding more than `bucket_size` points.
    pub fn overflowing(&self, bucket_size: usize) -> usize {
        self.buckets.values().filter(|b| b.len() > bucket_size).count()
    }

    /// Size of the fullest bucket.
    pub fn largest_bucket(&self) -> usize {
        self.buckets.values().map(Vec::len).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soft_policy_grows_past_capacity() {
        let mut table = HashTable::new();
        for p in 0..5 {
            assert!(table.insert(7, p, 2, BucketPolicy::Soft));
        }
        assert_eq!(table.get(7), &[0, 1, 2, 3, 4]);
        assert_eq!(table.overflowing(2), 1);
        assert_eq!(table.largest_bucket(), 5);
    }

    #[test]
    fn test_truncate_policy_keeps_first_points() {
        let mut table = HashTable::new();
        let kept: Vec<bool> = (0..4).map(|p| table.insert(3, p, 2, BucketPolicy::Truncate)).collect();
        assert_eq!(kept, vec![true, true, false, false]);
        assert_eq!(table.get(3), &[0, 1]);
        assert_eq!(table.overflowing(2), 0);
    }

    #[test]
    fn test_missing_bucket_is_empty() {
        let table = HashTable::new();
        assert!(table.get(42).is_empty());
        assert!(table.is_empty());
    }
}
