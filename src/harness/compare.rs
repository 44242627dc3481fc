//! Expected-versus-actual output comparison

use std::collections::BTreeMap;

use crate::schema::Table;
use crate::store::{Store, StoreResult};

/// Outcome of comparing produced outputs with expected tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    /// Every expected output was produced with identical rows
    Match,
    /// An expected output slot was not produced
    Missing { slot: String },
    /// The expected table for a slot no longer exists
    ExpectedTableMissing { slot: String, table_id: u64 },
    /// Rows of a slot differ from its expected table
    Mismatch { slot: String },
}

/// Compare `actual` against the tables named by `expected`.
///
/// Presence of every expected slot is checked before any rows are
/// compared. Rows are compared in slot order with exact structural
/// equality; row order matters.
pub fn compare_outputs(
    expected: &BTreeMap<String, u64>,
    actual: &BTreeMap<String, Table>,
    store: &dyn Store,
) -> StoreResult<Comparison> {
    if let Some(slot) = expected.keys().find(|slot| !actual.contains_key(*slot)) {
        return Ok(Comparison::Missing { slot: slot.clone() });
    }

    for (slot, table_id) in expected {
        let Some(expected_table) = store.get_table(*table_id)? else {
            return Ok(Comparison::ExpectedTableMissing {
                slot: slot.clone(),
                table_id: *table_id,
            });
        };
        if actual[slot].data != expected_table.data {
            return Ok(Comparison::Mismatch { slot: slot.clone() });
        }
    }
    Ok(Comparison::Match)
}
