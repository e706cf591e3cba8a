//! Stratified-by-period sampling for oversized datasets
//!
//! When a dataset exceeds the cap, every period keeps roughly its share of
//! the cap: `ceil(bucket_len * cap / total)` records, drawn from a random
//! permutation of the bucket. The total may overshoot the cap by at most one
//! record per period.

use std::collections::BTreeMap;

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

/// Caps a working set while keeping per-period proportions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sampler {
    cap: usize,
}

impl Sampler {
    pub fn new(cap: usize) -> Self {
        Self { cap }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Number of records a bucket of `bucket_len` keeps out of `total`
    pub fn share(&self, bucket_len: usize, total: usize) -> usize {
        if total == 0 {
            return 0;
        }
        let wanted = (bucket_len as u128 * self.cap as u128).div_ceil(total as u128);
        (wanted as usize).min(bucket_len)
    }

    /// Sample `records`, grouping by `period`.
    ///
    /// Returns every record, in input order, when the input fits in the cap.
    /// Otherwise buckets are visited in ascending period order and each
    /// contributes its share in permutation order.
    pub fn sample<'a, T, K, F, R>(&self, records: &'a [T], period: F, rng: &mut R) -> Vec<&'a T>
    where
        K: Ord,
        F: Fn(&T) -> K,
        R: Rng + ?Sized,
    {
        let total = records.len();
        if total <= self.cap {
            return records.iter().collect();
        }

        let mut buckets: BTreeMap<K, Vec<&'a T>> = BTreeMap::new();
        for record in records {
            buckets.entry(period(record)).or_default().push(record);
        }

        let mut sampled = Vec::with_capacity(self.cap + buckets.len());
        for bucket in buckets.values_mut() {
            let take = self.share(bucket.len(), total);
            let (chosen, _) = bucket.partial_shuffle(rng, take);
            sampled.extend(chosen.iter().copied());
        }

        debug!(
            total,
            cap = self.cap,
            periods = buckets.len(),
            sampled = sampled.len(),
            "stratified sample drawn"
        );
        sampled
    }
}
