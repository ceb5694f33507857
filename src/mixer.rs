//! Fair, diversity-capped selection of a country's final headlines.
//!
//! The mixer picks at most `limit_total` items from the pool with no domain
//! contributing more than `cap` items. It starts at `cap_floor` and only
//! raises the cap, one step at a time, when the feed cannot otherwise be
//! filled:
//!
//! 1. Bucket the pool by domain, newest first inside each bucket.
//! 2. Round-robin over the domains in a shuffled order, taking one item per
//!    visit until a domain is empty or hits the cap.
//! 3. Backfill from leftovers (newest first) without breaking the cap.
//! 4. Full, or cap already at `limit_total`: trim to the cap and return.
//!    Otherwise raise the cap and start again from the untouched buckets.
//!
//! A short result is not an error; it means supply ran out.

use crate::models::NewsItem;
use itertools::Itertools;
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::{debug, instrument};

/// Domain-capped round-robin selector.
#[derive(Debug, Clone, Copy)]
pub struct FairMixer {
    pub limit_total: usize,
    pub cap_floor: usize,
}

/// What the mixer selected and the cap it settled on.
#[derive(Debug, Clone)]
pub struct MixOutcome {
    pub items: Vec<NewsItem>,
    pub cap: usize,
}

impl FairMixer {
    /// A floor of zero is treated as one; a zero cap could never select anything.
    pub fn new(limit_total: usize, cap_floor: usize) -> Self {
        Self {
            limit_total,
            cap_floor: cap_floor.max(1),
        }
    }

    /// Select from `pool`. The shuffle only breaks ties between domains; no
    /// count or cap guarantee depends on it.
    #[instrument(level = "debug", skip_all, fields(pool = pool.len(), limit = self.limit_total))]
    pub fn mix<R: Rng + ?Sized>(&self, pool: &[NewsItem], rng: &mut R) -> MixOutcome {
        if self.limit_total == 0 || pool.is_empty() {
            return MixOutcome {
                items: Vec::new(),
                cap: self.cap_floor,
            };
        }

        let buckets = bucket_by_domain(pool);
        let supply: usize = buckets.values().map(Vec::len).sum();
        let mut cap = self.cap_floor;

        loop {
            let picked = self.attempt(&buckets, cap, rng);
            debug!(cap, picked = picked.len(), "Mix attempt");

            // Once every pool item is placed a higher cap cannot add anything.
            if picked.len() >= self.limit_total || cap >= self.limit_total || picked.len() == supply {
                let items = enforce_cap(picked, cap, self.limit_total);
                debug!(
                    cap,
                    selected = items.len(),
                    per_domain = ?items.iter().counts_by(|i| i.domain.clone()),
                    "Mix settled"
                );
                return MixOutcome { items, cap };
            }
            cap += 1;
        }
    }

    /// One round-robin pass plus backfill at a fixed cap, on a working copy.
    fn attempt<R: Rng + ?Sized>(
        &self,
        buckets: &BTreeMap<String, Vec<NewsItem>>,
        cap: usize,
        rng: &mut R,
    ) -> Vec<NewsItem> {
        let mut working: BTreeMap<&str, VecDeque<&NewsItem>> = buckets
            .iter()
            .map(|(domain, items)| (domain.as_str(), items.iter().collect()))
            .collect();
        let mut domains: Vec<&str> = working.keys().copied().collect();
        domains.shuffle(rng);

        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut picked: Vec<&NewsItem> = Vec::with_capacity(self.limit_total);
        let mut i = 0usize;

        while picked.len() < self.limit_total && !domains.is_empty() {
            let idx = i % domains.len();
            let domain = domains[idx];
            let Some(queue) = working.get_mut(domain) else {
                domains.remove(idx);
                continue;
            };
            let count = counts.entry(domain).or_insert(0);
            if *count < cap {
                if let Some(item) = queue.pop_front() {
                    picked.push(item);
                    *count += 1;
                }
            }
            if queue.is_empty() || *count >= cap {
                domains.remove(idx);
            } else {
                i += 1;
            }
        }

        if picked.len() < self.limit_total {
            let mut rest: Vec<&NewsItem> = working.values().flatten().copied().collect();
            rest.sort_by(|a, b| b.published_at.cmp(&a.published_at));
            for item in rest {
                if picked.len() >= self.limit_total {
                    break;
                }
                let count = counts.entry(item.domain.as_str()).or_insert(0);
                if *count >= cap {
                    continue;
                }
                picked.push(item);
                *count += 1;
            }
        }

        picked.into_iter().take(self.limit_total).cloned().collect()
    }
}

/// Group by domain; each bucket newest first, pool order kept on ties.
fn bucket_by_domain(pool: &[NewsItem]) -> BTreeMap<String, Vec<NewsItem>> {
    let mut buckets: BTreeMap<String, Vec<NewsItem>> = BTreeMap::new();
    for item in pool {
        buckets.entry(item.domain.clone()).or_default().push(item.clone());
    }
    for items in buckets.values_mut() {
        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    }
    buckets
}

/// Drop anything that would push a domain past `cap`, then cut to `limit`.
fn enforce_cap(picked: Vec<NewsItem>, cap: usize, limit: usize) -> Vec<NewsItem> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    picked
        .into_iter()
        .filter(|item| {
            let count = counts.entry(item.domain.clone()).or_insert(0);
            if *count >= cap {
                return false;
            }
            *count += 1;
            true
        })
        .take(limit)
        .collect()
}
