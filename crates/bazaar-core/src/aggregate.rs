//! # Aggregation Primitives
//!
//! Every report in [`crate::analytics`] is a composition of three operations:
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │   group_by   │ ──► │  rank_desc   │ ──► │    Lookup    │
//! │ key + sum of │     │ stable sort, │     │ join by id,  │
//! │ qty / amount │     │ then limit   │     │ placeholder  │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! Top products is `group_by(product) → rank_desc(quantity) → Lookup(product)`;
//! top customers is the same chain over sale headers keyed by customer.

use std::collections::HashMap;
use std::hash::Hash;

use crate::money::Money;

// =============================================================================
// Group By
// =============================================================================

/// What one row contributes to its bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Measure {
    pub quantity: i64,
    pub amount: Money,
}

impl Measure {
    pub fn amount(amount: Money) -> Self {
        Measure {
            quantity: 0,
            amount,
        }
    }

    pub fn quantity_and_amount(quantity: i64, amount: Money) -> Self {
        Measure { quantity, amount }
    }
}

/// The running totals of one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket<K> {
    pub key: K,
    /// Rows that fell into the bucket.
    pub count: i64,
    pub quantity: i64,
    pub amount: Money,
}

/// Groups rows by `key`, summing `measure` per group.
///
/// Buckets come back in first-seen order, so a later stable sort breaks ties
/// by scan order.
///
/// ```rust
/// use bazaar_core::aggregate::{group_by, Measure};
/// use bazaar_core::Money;
///
/// let rows = [("a", 2), ("b", 1), ("a", 3)];
/// let buckets = group_by(rows, |r| r.0, |r| Measure::quantity_and_amount(r.1, Money::zero()));
///
/// assert_eq!(buckets[0].key, "a");
/// assert_eq!(buckets[0].quantity, 5);
/// assert_eq!(buckets[0].count, 2);
/// assert_eq!(buckets[1].key, "b");
/// ```
pub fn group_by<R, K, FK, FM>(rows: impl IntoIterator<Item = R>, key: FK, measure: FM) -> Vec<Bucket<K>>
where
    K: Eq + Hash + Clone,
    FK: Fn(&R) -> K,
    FM: Fn(&R) -> Measure,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut buckets: Vec<Bucket<K>> = Vec::new();

    for row in rows {
        let k = key(&row);
        let m = measure(&row);

        let slot = *index.entry(k.clone()).or_insert_with(|| {
            buckets.push(Bucket {
                key: k,
                count: 0,
                quantity: 0,
                amount: Money::zero(),
            });
            buckets.len() - 1
        });

        let bucket = &mut buckets[slot];
        bucket.count += 1;
        bucket.quantity += m.quantity;
        bucket.amount += m.amount;
    }

    buckets
}

// =============================================================================
// Rank
// =============================================================================

/// Sorts descending by `by` (stable), then keeps the first `limit`.
///
/// A `limit` of zero is treated as one.
pub fn rank_desc<T, S, F>(mut items: Vec<T>, by: F, limit: usize) -> Vec<T>
where
    S: Ord,
    F: Fn(&T) -> S,
{
    items.sort_by(|a, b| by(b).cmp(&by(a)));
    items.truncate(limit.max(1));
    items
}

// =============================================================================
// Lookup
// =============================================================================

/// Join-by-id against a batch of resolved entities.
///
/// Missing ids are not an error: callers decide the placeholder.
#[derive(Debug, Clone)]
pub struct Lookup<V> {
    by_id: HashMap<String, V>,
}

impl<V> Lookup<V> {
    pub fn new(items: impl IntoIterator<Item = V>, id: impl Fn(&V) -> String) -> Self {
        Lookup {
            by_id: items.into_iter().map(|v| (id(&v), v)).collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&V> {
        self.by_id.get(id)
    }

    /// Resolves an optional reference; `None` and misses both yield `None`.
    pub fn resolve(&self, id: Option<&str>) -> Option<&V> {
        id.and_then(|id| self.by_id.get(id))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
