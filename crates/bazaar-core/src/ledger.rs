//! # Stock Ledger Rules
//!
//! Pure planning for stock mutations. Nothing here reads or writes a store:
//! callers hand in a consistent snapshot of the affected products and get back
//! either the complete list of new stock levels or the first violation.
//!
//! ## All-or-Nothing Planning
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Sale: 2 × A, 5 × B, 1 × A                                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DeltaBatch::accumulated()   A: −3, B: −5   (sorted by product id)      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  plan(batch, snapshot{A: 10, B: 4})                                     │
//! │       │                                                                 │
//! │       ├── A: 10 → 7   ok                                                │
//! │       └── B:  4 → −1  InsufficientStock { B, requested 5, available 4 } │
//! │                                                                         │
//! │  Result: Err. A is NOT written either.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The store adapter in `bazaar-db` takes the write lock on the rows first,
//! reads the snapshot inside the same transaction, calls [`plan`], and only then
//! writes. The same batch is therefore validated and applied under one
//! isolation boundary.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::types::{PurchaseItem, SaleItem};

// =============================================================================
// Deltas
// =============================================================================

/// A signed change to one product's stock counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockDelta {
    pub product_id: String,
    pub delta: i64,
}

impl StockDelta {
    pub fn new(product_id: impl Into<String>, delta: i64) -> Self {
        StockDelta {
            product_id: product_id.into(),
            delta,
        }
    }
}

/// Whether a batch is a fresh mutation or the undo of an earlier one.
///
/// Only changes which error a negative result produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    Apply,
    Reversal,
}

/// A set of deltas validated and applied as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DeltaBatch {
    pub kind: BatchKind,
    pub deltas: Vec<StockDelta>,
}

impl DeltaBatch {
    pub fn apply(deltas: Vec<StockDelta>) -> Self {
        DeltaBatch {
            kind: BatchKind::Apply,
            deltas,
        }
    }

    /// Stock increments for every purchase line.
    pub fn for_purchase(items: &[PurchaseItem]) -> Self {
        DeltaBatch::apply(
            items
                .iter()
                .map(|item| StockDelta::new(item.product_id.clone(), item.quantity))
                .collect(),
        )
    }

    /// Stock decrements for every sale line.
    pub fn for_sale(items: &[SaleItem]) -> Self {
        DeltaBatch::apply(
            items
                .iter()
                .map(|item| StockDelta::new(item.product_id.clone(), -item.quantity))
                .collect(),
        )
    }

    /// The exact negation of this batch.
    ///
    /// Reversing twice yields the original deltas with kind `Apply`.
    pub fn reversed(&self) -> Self {
        DeltaBatch {
            kind: match self.kind {
                BatchKind::Apply => BatchKind::Reversal,
                BatchKind::Reversal => BatchKind::Apply,
            },
            deltas: self
                .deltas
                .iter()
                .map(|d| StockDelta::new(d.product_id.clone(), -d.delta))
                .collect(),
        }
    }

    /// Net delta per product, ordered by product id, zero nets dropped.
    ///
    /// The ordering doubles as the lock order when a store needs one.
    pub fn accumulated(&self) -> Vec<StockDelta> {
        let mut net: BTreeMap<&str, i64> = BTreeMap::new();
        for d in &self.deltas {
            *net.entry(d.product_id.as_str()).or_insert(0) += d.delta;
        }

        net.into_iter()
            .filter(|(_, delta)| *delta != 0)
            .map(|(product_id, delta)| StockDelta::new(product_id, delta))
            .collect()
    }

    /// Distinct product ids touched by the batch, sorted.
    ///
    /// Includes products whose net delta is zero: they still have to exist.
    pub fn product_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.deltas.iter().map(|d| d.product_id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }
}

// =============================================================================
// Planning
// =============================================================================

/// The before/after stock of one product under a planned batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockLevel {
    pub product_id: String,
    pub before: i64,
    pub after: i64,
}

impl StockLevel {
    pub fn delta(&self) -> i64 {
        self.after - self.before
    }
}

/// Validates a whole batch against a snapshot of current stock.
///
/// ## Rules
/// - Every referenced product must be in the snapshot → `ProductNotFound`
/// - No product may end below zero:
///   - `Apply` batch → `InsufficientStock { requested, available }`
///   - `Reversal` batch → `ReversalConflict { required, available }`
/// - Checked in product-id order; the first violation wins and nothing is
///   planned
///
/// Products whose deltas cancel out are checked for existence but produce no
/// stock level.
///
/// ## Example
/// ```rust
/// use std::collections::HashMap;
/// use bazaar_core::ledger::{plan, DeltaBatch, StockDelta};
/// use bazaar_core::CoreError;
///
/// let snapshot = HashMap::from([("a".to_string(), 1)]);
/// let batch = DeltaBatch::apply(vec![StockDelta::new("a", -2)]);
///
/// assert!(matches!(
///     plan(&batch, &snapshot),
///     Err(CoreError::InsufficientStock { requested: 2, available: 1, .. })
/// ));
/// ```
pub fn plan(batch: &DeltaBatch, snapshot: &HashMap<String, i64>) -> CoreResult<Vec<StockLevel>> {
    for product_id in batch.product_ids() {
        if !snapshot.contains_key(&product_id) {
            return Err(CoreError::ProductNotFound { product_id });
        }
    }

    let mut levels = Vec::new();
    for StockDelta { product_id, delta } in batch.accumulated() {
        let before = snapshot.get(&product_id).copied().unwrap_or_default();
        let after = before + delta;

        if after < 0 {
            return Err(match batch.kind {
                BatchKind::Apply => CoreError::InsufficientStock {
                    product_id,
                    requested: -delta,
                    available: before,
                },
                BatchKind::Reversal => CoreError::ReversalConflict {
                    product_id,
                    required: -delta,
                    available: before,
                },
            });
        }

        levels.push(StockLevel {
            product_id,
            before,
            after,
        });
    }

    Ok(levels)
}

// =============================================================================
// Reconciliation
// =============================================================================

/// A product whose stored stock disagrees with its ledger history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockDiscrepancy {
    pub product_id: String,
    pub sku: String,
    pub stored: i64,
    /// `Σ purchased − Σ sold` over the surviving ledger entries.
    pub expected: i64,
}

/// Compares stored stock to `purchased − sold` for every product.
///
/// `stored` is `(product_id, sku, stock_quantity)`; the two maps hold the
/// summed line quantities per product id. Products absent from a map count
/// zero for it.
pub fn find_discrepancies(
    stored: &[(String, String, i64)],
    purchased: &HashMap<String, i64>,
    sold: &HashMap<String, i64>,
) -> Vec<StockDiscrepancy> {
    stored
        .iter()
        .filter_map(|(product_id, sku, stock)| {
            let expected = purchased.get(product_id).copied().unwrap_or(0)
                - sold.get(product_id).copied().unwrap_or(0);
            (expected != *stock).then(|| StockDiscrepancy {
                product_id: product_id.clone(),
                sku: sku.clone(),
                stored: *stock,
                expected,
            })
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(entries: &[(&str, i64)]) -> HashMap<String, i64> {
        entries
            .iter()
            .map(|(id, qty)| (id.to_string(), *qty))
            .collect()
    }

    #[test]
    fn test_accumulated_merges_and_sorts() {
        let batch = DeltaBatch::apply(vec![
            StockDelta::new("b", -5),
            StockDelta::new("a", -2),
            StockDelta::new("a", -1),
            StockDelta::new("c", 3),
            StockDelta::new("c", -3),
        ]);

        assert_eq!(
            batch.accumulated(),
            vec![StockDelta::new("a", -3), StockDelta::new("b", -5)]
        );
        assert_eq!(batch.product_ids(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_plan_applies_whole_batch() {
        let batch = DeltaBatch::apply(vec![StockDelta::new("a", -3), StockDelta::new("b", 4)]);
        let levels = plan(&batch, &snapshot(&[("a", 3), ("b", 0)])).unwrap();

        assert_eq!(
            levels,
            vec![
                StockLevel {
                    product_id: "a".to_string(),
                    before: 3,
                    after: 0
                },
                StockLevel {
                    product_id: "b".to_string(),
                    before: 0,
                    after: 4
                },
            ]
        );
        assert_eq!(levels[1].delta(), 4);
    }

    #[test]
    fn test_plan_rejects_batch_when_any_line_is_short() {
        let batch = DeltaBatch::apply(vec![StockDelta::new("a", -3), StockDelta::new("b", -5)]);
        let err = plan(&batch, &snapshot(&[("a", 10), ("b", 4)])).unwrap_err();

        assert_eq!(
            err,
            CoreError::InsufficientStock {
                product_id: "b".to_string(),
                requested: 5,
                available: 4,
            }
        );
    }

    #[test]
    fn test_plan_checks_accumulated_demand() {
        // Two lines of 3 against a stock of 5: each fits alone, not together.
        let batch = DeltaBatch::apply(vec![StockDelta::new("a", -3), StockDelta::new("a", -3)]);
        let err = plan(&batch, &snapshot(&[("a", 5)])).unwrap_err();

        assert!(matches!(
            err,
            CoreError::InsufficientStock {
                requested: 6,
                available: 5,
                ..
            }
        ));
    }

    #[test]
    fn test_plan_missing_product() {
        let batch = DeltaBatch::apply(vec![StockDelta::new("a", 2), StockDelta::new("ghost", 1)]);
        let err = plan(&batch, &snapshot(&[("a", 0)])).unwrap_err();
        assert_eq!(err, CoreError::product_not_found("ghost"));
    }

    #[test]
    fn test_plan_missing_product_even_when_net_zero() {
        let batch =
            DeltaBatch::apply(vec![StockDelta::new("ghost", 2), StockDelta::new("ghost", -2)]);
        assert!(matches!(
            plan(&batch, &snapshot(&[])),
            Err(CoreError::ProductNotFound { .. })
        ));
    }

    #[test]
    fn test_reversal_conflict_is_distinct() {
        // Purchased 10, then 8 sold elsewhere: reversing the purchase must fail.
        let purchase = DeltaBatch::apply(vec![StockDelta::new("a", 10)]);
        let reversal = purchase.reversed();
        assert_eq!(reversal.kind, BatchKind::Reversal);

        let err = plan(&reversal, &snapshot(&[("a", 2)])).unwrap_err();
        assert_eq!(
            err,
            CoreError::ReversalConflict {
                product_id: "a".to_string(),
                required: 10,
                available: 2,
            }
        );
    }

    #[test]
    fn test_reversed_twice_is_identity() {
        let batch = DeltaBatch::apply(vec![StockDelta::new("a", -2), StockDelta::new("b", 7)]);
        assert_eq!(batch.reversed().reversed(), batch);
    }

    #[test]
    fn test_find_discrepancies() {
        let stored = vec![
            ("a".to_string(), "A".to_string(), 7),
            ("b".to_string(), "B".to_string(), 3),
            ("c".to_string(), "C".to_string(), 0),
        ];
        let purchased = snapshot(&[("a", 10), ("b", 5)]);
        let sold = snapshot(&[("a", 3)]);

        let found = find_discrepancies(&stored, &purchased, &sold);
        assert_eq!(
            found,
            vec![StockDiscrepancy {
                product_id: "b".to_string(),
                sku: "B".to_string(),
                stored: 3,
                expected: 5,
            }]
        );
    }

    // =========================================================================
    // Property: stock always equals surviving purchases minus surviving sales
    // =========================================================================

    mod properties {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Purchase(i64),
            Sale(i64),
            DeletePurchase(usize),
            DeleteSale(usize),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (1i64..20).prop_map(Op::Purchase),
                (1i64..20).prop_map(Op::Sale),
                (0usize..8).prop_map(Op::DeletePurchase),
                (0usize..8).prop_map(Op::DeleteSale),
            ]
        }

        /// Applies a batch to the snapshot the way the store adapter does.
        fn commit(stock: &mut HashMap<String, i64>, batch: &DeltaBatch) -> CoreResult<()> {
            for level in plan(batch, stock)? {
                stock.insert(level.product_id, level.after);
            }
            Ok(())
        }

        proptest! {
            #[test]
            fn stock_matches_surviving_ledger(ops in proptest::collection::vec(op(), 0..60)) {
                let mut stock = HashMap::from([("p".to_string(), 0i64)]);
                let mut purchases: Vec<DeltaBatch> = Vec::new();
                let mut sales: Vec<DeltaBatch> = Vec::new();

                for op in ops {
                    match op {
                        Op::Purchase(qty) => {
                            let batch = DeltaBatch::apply(vec![StockDelta::new("p", qty)]);
                            if commit(&mut stock, &batch).is_ok() {
                                purchases.push(batch);
                            }
                        }
                        Op::Sale(qty) => {
                            let batch = DeltaBatch::apply(vec![StockDelta::new("p", -qty)]);
                            match commit(&mut stock, &batch) {
                                Ok(()) => sales.push(batch),
                                Err(err) => prop_assert!(
                                    matches!(err, CoreError::InsufficientStock { .. }),
                                    "unexpected error: {err:?}"
                                ),
                            }
                        }
                        Op::DeletePurchase(i) if i < purchases.len() => {
                            match commit(&mut stock, &purchases[i].reversed()) {
                                Ok(()) => {
                                    purchases.remove(i);
                                }
                                Err(err) => prop_assert!(
                                    matches!(err, CoreError::ReversalConflict { .. }),
                                    "unexpected error: {err:?}"
                                ),
                            }
                        }
                        Op::DeleteSale(i) if i < sales.len() => {
                            // Restoring stock never conflicts.
                            prop_assert!(commit(&mut stock, &sales[i].reversed()).is_ok());
                            sales.remove(i);
                        }
                        _ => {}
                    }

                    let on_hand = stock["p"];
                    let purchased: i64 = purchases.iter().map(|b| b.deltas[0].delta).sum();
                    let sold: i64 = sales.iter().map(|b| -b.deltas[0].delta).sum();
                    prop_assert!(on_hand >= 0);
                    prop_assert_eq!(on_hand, purchased - sold);
                }
            }

            #[test]
            fn failed_plan_never_reports_levels(
                stock_a in 0i64..10,
                stock_b in 0i64..10,
                take_a in 1i64..15,
                take_b in 1i64..15,
            ) {
                let snapshot = HashMap::from([
                    ("a".to_string(), stock_a),
                    ("b".to_string(), stock_b),
                ]);
                let batch = DeltaBatch::apply(vec![
                    StockDelta::new("a", -take_a),
                    StockDelta::new("b", -take_b),
                ]);

                match plan(&batch, &snapshot) {
                    Ok(levels) => {
                        prop_assert!(take_a <= stock_a && take_b <= stock_b);
                        prop_assert!(levels.iter().all(|l| l.after >= 0));
                    }
                    Err(CoreError::InsufficientStock { product_id, .. }) => {
                        // First violation in id order.
                        let expected = if take_a > stock_a { "a" } else { "b" };
                        prop_assert_eq!(product_id, expected);
                    }
                    Err(other) => prop_assert!(false, "unexpected error: {other:?}"),
                }
            }
        }
    }
}
