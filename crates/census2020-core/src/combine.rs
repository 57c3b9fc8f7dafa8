//! Combine a jurisdiction's four parsed fragments into one wide table.
//!
//! Fragments are aligned positionally: each is stable-sorted by `LOGRECNO`
//! on its own, then the columns are concatenated (geo first, then parts 1-3
//! in order, each in schema order). Positional alignment is only correct if
//! every fragment carries the same set of join keys with no duplicates, so
//! that precondition is checked explicitly before any columns are stitched
//! together. A violation fails the combine instead of misaligning rows.
//!
//! The administrative columns repeated in every count fragment are dropped
//! from parts 1-3; the geographic header's copies are kept.

use std::{collections::HashSet, sync::Arc};

use arrow::{
    array::{Array, ArrayRef, AsArray, UInt32Array},
    compute::take_record_batch,
    datatypes::{DataType, FieldRef, Int64Type, Schema},
    error::ArrowError,
    record_batch::RecordBatch,
};
use snafu::prelude::*;
use tracing::debug;

use crate::schema::{ADMINISTRATIVE_COLUMNS, FragmentKind, JOIN_KEY};

/// Errors raised while combining fragments.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CombineError {
    /// A count fragment has a different number of rows than the geo header.
    #[snafu(display(
        "Row count mismatch in {fragment}: expected {expected} rows (geo), found {actual}"
    ))]
    RowCountMismatch {
        /// Row count of the geographic header.
        expected: usize,
        /// Row count of the offending fragment.
        actual: usize,
        /// Offending fragment.
        fragment: FragmentKind,
    },

    /// A fragment lacks a column the combiner needs.
    #[snafu(display("{fragment} table has no {column} column"))]
    MissingColumn {
        /// Fragment missing the column.
        fragment: FragmentKind,
        /// Name of the missing column.
        column: String,
    },

    /// The join key column is not a 64-bit integer column.
    #[snafu(display("{fragment} join key {JOIN_KEY} has type {data_type:?}, expected Int64"))]
    InvalidJoinKeyType {
        /// Fragment with the wrong key type.
        fragment: FragmentKind,
        /// Actual Arrow type.
        data_type: DataType,
    },

    /// A row has no join key.
    #[snafu(display("{fragment} row {row} has a null {JOIN_KEY}"))]
    NullJoinKey {
        /// Fragment with the null key.
        fragment: FragmentKind,
        /// 0-based row index in the unsorted input.
        row: usize,
    },

    /// A join key value appears more than once in one fragment.
    #[snafu(display("{fragment} has duplicate {JOIN_KEY} {key}"))]
    DuplicateJoinKey {
        /// Fragment with the duplicate.
        fragment: FragmentKind,
        /// Duplicated key value.
        key: i64,
    },

    /// A fragment's sorted key sequence diverges from the geo header's.
    #[snafu(display(
        "{fragment} {JOIN_KEY} set differs from geo at sorted row {row}: expected {expected}, found {actual}"
    ))]
    JoinKeyMismatch {
        /// Fragment whose keys diverge.
        fragment: FragmentKind,
        /// 0-based position in sorted order.
        row: usize,
        /// Geo key at that position.
        expected: i64,
        /// Fragment key at that position.
        actual: i64,
    },

    /// Two retained columns share a name.
    #[snafu(display("Combined table would contain column {name} twice"))]
    DuplicateColumn {
        /// Repeated column name.
        name: String,
    },

    /// Arrow failed while reordering or assembling the table.
    #[snafu(display("Arrow error while combining fragments: {source}"))]
    Arrow {
        /// Underlying Arrow error.
        source: ArrowError,
    },
}

/// Result alias for combine operations.
pub type CombineResult<T> = Result<T, CombineError>;

/// A fragment table sorted by join key, with its sorted keys.
struct SortedFragment {
    kind: FragmentKind,
    batch: RecordBatch,
    keys: Vec<i64>,
}

fn sort_by_join_key(kind: FragmentKind, batch: &RecordBatch) -> CombineResult<SortedFragment> {
    let column = batch.column_by_name(JOIN_KEY).context(MissingColumnSnafu {
        fragment: kind,
        column: JOIN_KEY,
    })?;

    let keys = column
        .as_primitive_opt::<Int64Type>()
        .context(InvalidJoinKeyTypeSnafu {
            fragment: kind,
            data_type: column.data_type().clone(),
        })?;

    if let Some(row) = (0..keys.len()).find(|&i| keys.is_null(i)) {
        return NullJoinKeySnafu {
            fragment: kind,
            row,
        }
        .fail();
    }

    // `sort_by_key` is stable: equal keys keep their input order.
    let values = keys.values();
    let mut order: Vec<u32> = (0..batch.num_rows() as u32).collect();
    order.sort_by_key(|&i| values[i as usize]);

    let sorted_keys: Vec<i64> = order.iter().map(|&i| values[i as usize]).collect();
    if let Some(pair) = sorted_keys.windows(2).find(|w| w[0] == w[1]) {
        return DuplicateJoinKeySnafu {
            fragment: kind,
            key: pair[0],
        }
        .fail();
    }

    let already_sorted = order.iter().enumerate().all(|(pos, &i)| pos == i as usize);
    let batch = if already_sorted {
        batch.clone()
    } else {
        take_record_batch(batch, &UInt32Array::from(order)).context(ArrowSnafu)?
    };

    Ok(SortedFragment {
        kind,
        batch,
        keys: sorted_keys,
    })
}

fn ensure_same_keys(geo: &SortedFragment, part: &SortedFragment) -> CombineResult<()> {
    let diverges = geo
        .keys
        .iter()
        .zip(&part.keys)
        .enumerate()
        .find(|(_, (g, p))| g != p);

    if let Some((row, (&expected, &actual))) = diverges {
        return JoinKeyMismatchSnafu {
            fragment: part.kind,
            row,
            expected,
            actual,
        }
        .fail();
    }
    Ok(())
}

/// Combine four fragment tables of one jurisdiction into one table.
///
/// The result has `geo.num_rows()` rows and the columns of `geo`, followed by
/// the non-administrative columns of `part1`, `part2` and `part3`.
pub fn combine(
    geo: &RecordBatch,
    part1: &RecordBatch,
    part2: &RecordBatch,
    part3: &RecordBatch,
) -> CombineResult<RecordBatch> {
    let expected = geo.num_rows();
    let parts = [
        (FragmentKind::Part1, part1),
        (FragmentKind::Part2, part2),
        (FragmentKind::Part3, part3),
    ];

    for (fragment, batch) in parts {
        ensure!(
            batch.num_rows() == expected,
            RowCountMismatchSnafu {
                expected,
                actual: batch.num_rows(),
                fragment,
            }
        );
    }

    let geo = sort_by_join_key(FragmentKind::Geo, geo)?;
    let parts = parts
        .into_iter()
        .map(|(kind, batch)| sort_by_join_key(kind, batch))
        .collect::<CombineResult<Vec<_>>>()?;

    for part in &parts {
        ensure_same_keys(&geo, part)?;
    }

    let mut fields: Vec<FieldRef> = Vec::new();
    let mut columns: Vec<ArrayRef> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    let mut push = |field: &FieldRef, column: &ArrayRef| -> CombineResult<()> {
        ensure!(
            seen.insert(field.name().clone()),
            DuplicateColumnSnafu {
                name: field.name().clone(),
            }
        );
        fields.push(Arc::clone(field));
        columns.push(Arc::clone(column));
        Ok(())
    };

    let geo_schema = geo.batch.schema();
    for (field, column) in geo_schema.fields().iter().zip(geo.batch.columns()) {
        push(field, column)?;
    }

    for part in &parts {
        let schema = part.batch.schema();
        for (field, column) in schema.fields().iter().zip(part.batch.columns()) {
            if ADMINISTRATIVE_COLUMNS.contains(&field.name().as_str()) {
                continue;
            }
            push(field, column)?;
        }
    }

    let combined =
        RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).context(ArrowSnafu)?;

    debug!(
        rows = combined.num_rows(),
        columns = combined.num_columns(),
        "combined fragments"
    );
    Ok(combined)
}
