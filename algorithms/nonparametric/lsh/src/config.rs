use crate::LshError;

pub const DEFAULT_TABLES: usize = 30;
pub const DEFAULT_PROJECTIONS: usize = 10;
pub const DEFAULT_SECOND_HASH_SIZE: usize = 99901;
pub const DEFAULT_BUCKET_SIZE: usize = 500;

/// What to do with a bucket that already holds `bucket_size` points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde_crate::Serialize, serde_crate::Deserialize),
    serde(crate = "serde_crate")
)]
pub enum BucketPolicy {
    /// `bucket_size` is advisory: buckets keep growing and overflow is only
    /// reported in the build log.
    #[default]
    Soft,
    /// Keep the first `bucket_size` points (in reference order) and drop the
    /// rest.
    Truncate,
}

/// Build-time parameters of an [`LshIndex`](crate::LshIndex).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde_crate::Serialize, serde_crate::Deserialize),
    serde(crate = "serde_crate")
)]
pub struct LshConfig {
    /// Number of hash tables.
    pub tables: usize,
    /// Number of projections per table.
    pub projections: usize,
    /// Bucket width `w`; `0.0` estimates it from the reference set.
    pub hash_width: f64,
    /// Modulus of the second-level hash, i.e. the number of buckets per table.
    pub second_hash_size: usize,
    pub bucket_size: usize,
    pub bucket_policy: BucketPolicy,
    /// `0` draws a fresh seed.
    pub seed: u64,
}

impl Default for LshConfig {
    fn default() -> Self {
        Self {
            tables: DEFAULT_TABLES,
            projections: DEFAULT_PROJECTIONS,
            hash_width: 0.0,
            second_hash_size: DEFAULT_SECOND_HASH_SIZE,
            bucket_size: DEFAULT_BUCKET_SIZE,
            bucket_policy: BucketPolicy::Soft,
            seed: 0,
        }
    }
}

impl LshConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tables(mut self, tables: usize) -> Self {
        self.tables = tables;
        self
    }

    pub fn with_projections(mut self, projections: usize) -> Self {
        self.projections = projections;
        self
    }

    pub fn with_hash_width(mut self, hash_width: f64) -> Self {
        self.hash_width = hash_width;
        self
    }

    pub fn with_second_hash_size(mut self, second_hash_size: usize) -> Self {
        self.second_hash_size = second_hash_size;
        self
    }

    pub fn with_bucket_size(mut self, bucket_size: usize) -> Self {
        self.bucket_size = bucket_size;
        self
    }

    pub fn with_bucket_policy(mut self, bucket_policy: BucketPolicy) -> Self {
        self.bucket_policy = bucket_policy;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), LshError> {
        if self.tables == 0 {
            return Err(LshError::InvalidConfig("tables must be positive".into()));
        }
        if self.projections == 0 {
            return Err(LshError::InvalidConfig("projections must be positive".into()));
        }
        if self.second_hash_size == 0 {
            return Err(LshError::InvalidConfig(
                "second_hash_size must be positive".into(),
            ));
        }
        if self.bucket_size == 0 {
            return Err(LshError::InvalidConfig("bucket_size must be positive".into()));
        }
        if !self.hash_width.is_finite() || self.hash_width < 0.0 {
            return Err(LshError::InvalidConfig(format!(
                "hash_width must be finite and non-negative, got {}",
                self.hash_width
            )));
        }
        Ok(())
    }
}
