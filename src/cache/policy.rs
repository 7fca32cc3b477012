//! Popularity-driven TTL policy.

/// `ttl(hits) = clamp(base * sqrt(hits), min, max)`, in whole seconds.
///
/// A fresh entry (one hit) keeps `base`; four hits double it; the curve
/// flattens so only heavily reused keys approach `max`. The Redis hit script
/// evaluates the same formula server-side and must be kept in step.
/// Ceiling for any configured TTL: one year.
pub const MAX_TTL_SECS: u64 = 365 * 24 * 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    base_secs: u64,
    min_secs: u64,
    max_secs: u64,
}

impl TtlPolicy {
    /// Requires `0 < min <= base <= max <= MAX_TTL_SECS`.
    pub fn new(base_secs: u64, min_secs: u64, max_secs: u64) -> Result<Self, String> {
        if min_secs == 0 {
            return Err("minimum TTL must be positive".to_string());
        }
        if !(min_secs <= base_secs && base_secs <= max_secs) {
            return Err(format!(
                "TTL bounds must satisfy min <= base <= max (got min={}, base={}, max={})",
                min_secs, base_secs, max_secs
            ));
        }
        if max_secs > MAX_TTL_SECS {
            return Err(format!(
                "maximum TTL must not exceed {} seconds (got {})",
                MAX_TTL_SECS, max_secs
            ));
        }
        Ok(Self {
            base_secs,
            min_secs,
            max_secs,
        })
    }

    pub fn base_secs(&self) -> u64 {
        self.base_secs
    }

    pub fn min_secs(&self) -> u64 {
        self.min_secs
    }

    pub fn max_secs(&self) -> u64 {
        self.max_secs
    }

    pub fn ttl_for(&self, hit_count: u64) -> u64 {
        let hits = hit_count.max(1) as f64;
        let scaled = (self.base_secs as f64 * hits.sqrt()).floor();
        // `as` saturates, so huge products land on u64::MAX and clamp to max.
        (scaled as u64).clamp(self.min_secs, self.max_secs)
    }
}

impl Default for TtlPolicy {
    /// 30 minutes base and floor, 7 days ceiling.
    fn default() -> Self {
        Self {
            base_secs: 1800,
            min_secs: 1800,
            max_secs: 604_800,
        }
    }
}
