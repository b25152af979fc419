//! Lookup tables with floor semantics.
//!
//! A query between two keys resolves to the greatest key that is `<=` the query. Queries
//! below the first key resolve to the first entry. Values are never interpolated.

use crate::error::{Result, RuleError};

fn floor_index<K: PartialOrd>(keys: &[K], q: &K) -> usize {
    keys.partition_point(|k| k <= q).saturating_sub(1)
}

fn check_sorted<K: PartialOrd>(keys: &[K], name: &str) -> Result<()> {
    if keys.windows(2).all(|w| w[0] <= w[1]) {
        Ok(())
    } else {
        Err(RuleError::Invalid(format!("{} keys are not ascending", name)))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Lookup1D<K, V> {
    key_name: String,
    keys: Vec<K>,
    values: Vec<V>,
}

impl<K: PartialOrd, V> Lookup1D<K, V> {
    pub fn new(key_name: impl Into<String>, keys: Vec<K>, values: Vec<V>) -> Result<Self> {
        let key_name = key_name.into();
        if keys.is_empty() || keys.len() != values.len() {
            return Err(RuleError::Invalid(format!(
                "{} table has {} keys and {} values",
                key_name,
                keys.len(),
                values.len()
            )));
        }
        check_sorted(&keys, &key_name)?;
        Ok(Self {
            key_name,
            keys,
            values,
        })
    }

    pub fn find(&self, key: &K) -> &V {
        &self.values[floor_index(&self.keys, key)]
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    pub fn values(&self) -> &[V] {
        &self.values
    }
}

/// Row-major 2-D table. `values[r][c]` belongs to `rows[r]`, `cols[c]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Lookup2D<R, C, V> {
    row_name: String,
    rows: Vec<R>,
    col_name: String,
    cols: Vec<C>,
    values: Vec<Vec<V>>,
}

impl<R: PartialOrd, C: PartialOrd, V> Lookup2D<R, C, V> {
    pub fn new(
        row_name: impl Into<String>,
        rows: Vec<R>,
        col_name: impl Into<String>,
        cols: Vec<C>,
        values: Vec<Vec<V>>,
    ) -> Result<Self> {
        let row_name = row_name.into();
        let col_name = col_name.into();
        check_shape(rows.len(), cols.len(), &values)?;
        check_sorted(&rows, &row_name)?;
        check_sorted(&cols, &col_name)?;
        Ok(Self {
            row_name,
            rows,
            col_name,
            cols,
            values,
        })
    }

    /// A one-cell table.
    pub fn single(
        row_name: impl Into<String>,
        row: R,
        col_name: impl Into<String>,
        col: C,
        value: V,
    ) -> Self {
        Self {
            row_name: row_name.into(),
            rows: vec![row],
            col_name: col_name.into(),
            cols: vec![col],
            values: vec![vec![value]],
        }
    }

    pub fn find(&self, row: &R, col: &C) -> &V {
        &self.values[floor_index(&self.rows, row)][floor_index(&self.cols, col)]
    }

    pub fn row_name(&self) -> &str {
        &self.row_name
    }

    pub fn col_name(&self) -> &str {
        &self.col_name
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn cols(&self) -> &[C] {
        &self.cols
    }

    pub fn values(&self) -> &[Vec<V>] {
        &self.values
    }
}

impl<R: Ord + Clone, C: Ord + Clone, V: Clone> Lookup2D<R, C, V> {
    /// Sorts both label axes and permutes the value matrix to match.
    /// Duplicate labels on an axis are rejected since exact lookups could not tell them apart.
    pub fn from_unsorted(
        row_name: impl Into<String>,
        rows: Vec<R>,
        col_name: impl Into<String>,
        cols: Vec<C>,
        values: Vec<Vec<V>>,
    ) -> Result<Self> {
        let row_name = row_name.into();
        let col_name = col_name.into();
        check_shape(rows.len(), cols.len(), &values)?;

        let mut row_order: Vec<usize> = (0..rows.len()).collect();
        row_order.sort_by(|&a, &b| rows[a].cmp(&rows[b]));
        let mut col_order: Vec<usize> = (0..cols.len()).collect();
        col_order.sort_by(|&a, &b| cols[a].cmp(&cols[b]));

        let sorted_rows: Vec<R> = row_order.iter().map(|&i| rows[i].clone()).collect();
        let sorted_cols: Vec<C> = col_order.iter().map(|&j| cols[j].clone()).collect();
        if sorted_rows.windows(2).any(|w| w[0] == w[1]) {
            return Err(RuleError::Invalid(format!("duplicate {} row label", row_name)));
        }
        if sorted_cols.windows(2).any(|w| w[0] == w[1]) {
            return Err(RuleError::Invalid(format!("duplicate {} column label", col_name)));
        }

        let permuted = row_order
            .iter()
            .map(|&i| col_order.iter().map(|&j| values[i][j].clone()).collect())
            .collect();

        Ok(Self {
            row_name,
            rows: sorted_rows,
            col_name,
            cols: sorted_cols,
            values: permuted,
        })
    }

    /// Exact-label lookup by binary search.
    pub fn get_exact(&self, row: &R, col: &C) -> Option<&V> {
        let r = self.rows.binary_search(row).ok()?;
        let c = self.cols.binary_search(col).ok()?;
        Some(&self.values[r][c])
    }
}

fn check_shape<V>(rows: usize, cols: usize, values: &[Vec<V>]) -> Result<()> {
    if rows == 0 || cols == 0 || values.len() != rows || values.iter().any(|r| r.len() != cols) {
        return Err(RuleError::Invalid(format!(
            "table shape does not match {} rows x {} columns",
            rows, cols
        )));
    }
    Ok(())
}
