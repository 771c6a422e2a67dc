//! Per-fiscal-year memoization of rule sets
//!
//! Each fiscal year gets its own async lock. The first caller to take it fetches
//! from the [`RuleSource`]; concurrent callers for the same year queue on the lock
//! and find the populated slot once it is released. A failed fetch leaves the slot
//! empty, so the next caller fetches again. Empty slots are dropped once no caller
//! holds them; populated slots are never evicted.

use super::source::RuleSource;
use super::TaxRuleSet;
use crate::core::error::RuleSetUnavailable;
use crate::core::fiscal::FiscalYear;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

type Slot = Arc<Mutex<Option<Arc<TaxRuleSet>>>>;

pub struct RuleSetCache {
    source: Arc<dyn RuleSource>,
    slots: Mutex<HashMap<FiscalYear, Slot>>,
    timeout: Option<Duration>,
    hits: AtomicU64,
    fetches: AtomicU64,
    failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    /// Calls made to the rule source
    pub fetches: u64,
    pub failures: u64,
}

impl RuleSetCache {
    pub fn new(source: Arc<dyn RuleSource>) -> Self {
        RuleSetCache {
            source,
            slots: Mutex::new(HashMap::new()),
            timeout: None,
            hits: AtomicU64::new(0),
            fetches: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Give up resolving after `timeout`, including time spent waiting on
    /// another caller's fetch.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Rule set for `fiscal_year`, fetching and validating it on first use.
    pub async fn resolve(
        &self,
        fiscal_year: &FiscalYear,
    ) -> Result<Arc<TaxRuleSet>, RuleSetUnavailable> {
        match self.timeout {
            None => self.resolve_slot(fiscal_year).await,
            Some(timeout) => {
                match tokio::time::timeout(timeout, self.resolve_slot(fiscal_year)).await {
                    Ok(resolved) => resolved,
                    Err(_) => {
                        log::warn!("Timed out after {timeout:?} resolving rule set {fiscal_year}");
                        self.release_empty(fiscal_year).await;
                        Err(RuleSetUnavailable::Timeout {
                            fiscal_year: fiscal_year.clone(),
                            timeout,
                        })
                    }
                }
            }
        }
    }

    async fn resolve_slot(
        &self,
        fiscal_year: &FiscalYear,
    ) -> Result<Arc<TaxRuleSet>, RuleSetUnavailable> {
        let slot = {
            let mut slots = self.slots.lock().await;
            Arc::clone(slots.entry(fiscal_year.clone()).or_default())
        };

        let mut entry = slot.lock().await;
        if let Some(rules) = entry.as_ref() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            log::debug!("Rule set {fiscal_year} served from cache");
            return Ok(Arc::clone(rules));
        }

        self.fetches.fetch_add(1, Ordering::Relaxed);
        log::info!("Fetching rule set for fiscal year {fiscal_year}");
        let fetched = self
            .source
            .fetch(fiscal_year)
            .await
            .and_then(|rules| validated(fiscal_year, rules));
        let rules = match fetched {
            Ok(rules) => Arc::new(rules),
            Err(err) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                log::warn!("{err}");
                drop(entry);
                drop(slot);
                self.release_empty(fiscal_year).await;
                return Err(err);
            }
        };

        *entry = Some(Arc::clone(&rules));
        Ok(rules)
    }

    /// Remove the slot for `fiscal_year` if it is still empty and nobody else
    /// holds it. Callers queued on the slot keep it alive and retry the fetch.
    async fn release_empty(&self, fiscal_year: &FiscalYear) {
        let mut slots = self.slots.lock().await;
        let unused = slots.get(fiscal_year).is_some_and(|slot| {
            Arc::strong_count(slot) == 1 && slot.try_lock().is_ok_and(|entry| entry.is_none())
        });
        if unused {
            slots.remove(fiscal_year);
        }
    }

    /// Fiscal years with a populated slot
    pub async fn cached_years(&self) -> Vec<FiscalYear> {
        let slots: Vec<(FiscalYear, Slot)> = self
            .slots
            .lock()
            .await
            .iter()
            .map(|(year, slot)| (year.clone(), Arc::clone(slot)))
            .collect();

        let mut years = Vec::new();
        for (year, slot) in slots {
            if slot.lock().await.is_some() {
                years.push(year);
            }
        }
        years.sort();
        years
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

fn validated(fiscal_year: &FiscalYear, rules: TaxRuleSet) -> Result<TaxRuleSet, RuleSetUnavailable> {
    let problems = rules.problems();
    if problems.is_empty() {
        Ok(rules)
    } else {
        Err(RuleSetUnavailable::Malformed {
            fiscal_year: fiscal_year.clone(),
            problems,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::source::MemorySource;
    use crate::rules::tests::flat_rules;

    #[tokio::test]
    async fn second_resolve_is_a_hit() {
        let cache = RuleSetCache::new(Arc::new(MemorySource::new().with("T1", flat_rules())));
        let fy = FiscalYear::from("T1");

        let first = cache.resolve(&fy).await.unwrap();
        let second = cache.resolve(&fy).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                fetches: 1,
                failures: 0
            }
        );
        assert_eq!(cache.cached_years().await, vec![fy]);
    }

    #[tokio::test]
    async fn malformed_rules_are_rejected_and_not_cached() {
        let mut rules = flat_rules();
        rules.regimes.get_mut("flat").unwrap().slabs.clear();
        let cache = RuleSetCache::new(Arc::new(MemorySource::new().with("T1", rules)));
        let fy = FiscalYear::from("T1");

        for _ in 0..2 {
            let err = cache.resolve(&fy).await.unwrap_err();
            assert!(matches!(err, RuleSetUnavailable::Malformed { .. }));
        }
        assert_eq!(cache.stats().fetches, 2);
        assert_eq!(cache.stats().failures, 2);
        assert!(cache.cached_years().await.is_empty());
    }

    #[tokio::test]
    async fn missing_year_is_unavailable() {
        let cache = RuleSetCache::new(Arc::new(MemorySource::new()));
        let err = cache.resolve(&FiscalYear::from("T9")).await.unwrap_err();
        assert_eq!(err, RuleSetUnavailable::NotFound(FiscalYear::from("T9")));
    }

    #[tokio::test]
    async fn failed_years_leave_no_slot_behind() {
        let mut bad = flat_rules();
        bad.cess_rate = rust_decimal::Decimal::TWO;
        let cache = RuleSetCache::new(Arc::new(
            MemorySource::new().with("T1", flat_rules()).with("BAD", bad),
        ));

        for i in 0..1_000 {
            assert!(cache.resolve(&FiscalYear::new(format!("X{i}"))).await.is_err());
        }
        assert!(cache.resolve(&FiscalYear::from("BAD")).await.is_err());
        assert!(cache.slots.lock().await.is_empty());

        cache.resolve(&FiscalYear::from("T1")).await.unwrap();
        assert_eq!(cache.slots.lock().await.len(), 1);
        assert_eq!(cache.stats().failures, 1_001);
    }

    struct Stalled;

    #[async_trait::async_trait]
    impl RuleSource for Stalled {
        async fn fetch(&self, _: &FiscalYear) -> Result<TaxRuleSet, RuleSetUnavailable> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(flat_rules())
        }
    }

    #[tokio::test]
    async fn timed_out_year_leaves_no_slot_behind() {
        let cache = RuleSetCache::new(Arc::new(Stalled)).with_timeout(Duration::from_millis(10));
        for year in ["T1", "T2", "T3"] {
            let err = cache.resolve(&FiscalYear::from(year)).await.unwrap_err();
            assert!(matches!(err, RuleSetUnavailable::Timeout { .. }));
        }
        assert!(cache.slots.lock().await.is_empty());
    }
}
