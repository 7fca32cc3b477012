//! Shared daily word budget for providers with a free-tier quota.

use super::ProviderError;
use chrono::{Datelike, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

/// Word budget that resets at UTC midnight.
///
/// Day number and words used are packed into one `AtomicU64` (high and low
/// 32 bits) so a reservation, including a day rollover, is a single
/// compare-and-swap. Concurrent reservations can never overshoot the limit.
#[derive(Debug)]
pub struct DailyQuota {
    limit: u32,
    state: AtomicU64,
}

fn pack(day: u32, used: u32) -> u64 {
    ((day as u64) << 32) | used as u64
}

fn unpack(state: u64) -> (u32, u32) {
    ((state >> 32) as u32, state as u32)
}

fn today() -> u32 {
    Utc::now().date_naive().num_days_from_ce() as u32
}

/// Words billed for `text`; never zero.
pub fn word_count(text: &str) -> u32 {
    text.split_whitespace().count().max(1) as u32
}

impl DailyQuota {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            state: AtomicU64::new(pack(today(), 0)),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Reserve `words` from today's budget.
    pub fn try_consume(&self, words: u32) -> Result<(), ProviderError> {
        self.try_consume_on(today(), words)
    }

    /// Reserve `words` for one call. The words come back when the returned
    /// reservation is dropped without [`Reservation::commit`], which also
    /// covers a call future cancelled by a timeout or a client disconnect.
    pub fn reserve(&self, words: u32) -> Result<Reservation<'_>, ProviderError> {
        self.try_consume(words)?;
        Ok(Reservation {
            quota: self,
            words,
            committed: false,
        })
    }

    fn try_consume_on(&self, day: u32, words: u32) -> Result<(), ProviderError> {
        let limit = self.limit;
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                let (stored_day, used) = unpack(current);
                let used = if stored_day == day { used } else { 0 };
                let next = used.checked_add(words)?;
                (next <= limit).then(|| pack(day, next))
            })
            .map(|_| ())
            .map_err(|current| {
                let (_, used) = unpack(current);
                ProviderError::QuotaExceeded(format!(
                    "daily word budget exhausted ({} of {} used, {} requested)",
                    used, limit, words
                ))
            })
    }

    /// Return words reserved for a call that did not succeed.
    pub fn refund(&self, words: u32) {
        self.refund_on(today(), words)
    }

    fn refund_on(&self, day: u32, words: u32) {
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                let (stored_day, used) = unpack(current);
                // A reservation from yesterday is already forgotten.
                (stored_day == day).then(|| pack(day, used.saturating_sub(words)))
            });
    }

    /// Words still available today.
    pub fn remaining(&self) -> u32 {
        let (stored_day, used) = unpack(self.state.load(Ordering::Acquire));
        if stored_day == today() {
            self.limit.saturating_sub(used)
        } else {
            self.limit
        }
    }
}

/// Words held for an in-flight call.
#[derive(Debug)]
#[must_use = "dropping a reservation refunds it immediately"]
pub struct Reservation<'a> {
    quota: &'a DailyQuota,
    words: u32,
    committed: bool,
}

impl Reservation<'_> {
    /// Keep the words spent; the call succeeded.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.quota.refund(self.words);
        }
    }
}
