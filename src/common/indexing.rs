//! Batched indexing into group/time/measure tensors
//!
//! Groups whose observation rows have different missingness patterns cannot
//! share one dense sub-problem, so every update and likelihood evaluation
//! first partitions groups (or `(group, time)` cells) by their set of valid
//! measures. Within a partition each item is still solved on its own, using
//! dense sub-matrices gathered with the partition's measure indices.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};
use ndarray::ArrayView1;
use smallvec::SmallVec;

use crate::filter::errors::FilterError;

/// Indices of the observed (non-NaN) measures of one observation row
pub type ValidIdx = SmallVec<[usize; 8]>;

/// Selector along one tensor axis
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Every index along the axis
    All,
    /// Explicit indices, in order
    Index(Vec<usize>),
}

impl Selector {
    /// Resolve against an axis of length `len`
    pub fn resolve(&self, len: usize, context: &str) -> Result<Vec<usize>, FilterError> {
        match self {
            Selector::All => Ok((0..len).collect()),
            Selector::Index(idx) => {
                if let Some(&bad) = idx.iter().find(|&&i| i >= len) {
                    return Err(FilterError::IndexOutOfRange {
                        context: context.to_string(),
                        index: bad,
                        len,
                    });
                }
                Ok(idx.clone())
            }
        }
    }
}

impl From<Vec<usize>> for Selector {
    fn from(idx: Vec<usize>) -> Self {
        Selector::Index(idx)
    }
}

impl From<&[usize]> for Selector {
    fn from(idx: &[usize]) -> Self {
        Selector::Index(idx.to_vec())
    }
}

/// Resolve group and time selectors into `(group, time)` cells
///
/// Two explicit index lists are paired elementwise and must have equal
/// length. If either axis is [`Selector::All`] the result is the cartesian
/// product, group-major.
pub fn pair_indices(
    group_sel: &Selector,
    time_sel: &Selector,
    num_groups: usize,
    num_times: usize,
) -> Result<Vec<(usize, usize)>, FilterError> {
    let groups = group_sel.resolve(num_groups, "group index")?;
    let times = time_sel.resolve(num_times, "time index")?;

    match (group_sel, time_sel) {
        (Selector::Index(_), Selector::Index(_)) => {
            if groups.len() != times.len() {
                return Err(FilterError::malformed(
                    "time_idx",
                    format!(
                        "group_idx has {} entries but time_idx has {}; explicit indices are paired",
                        groups.len(),
                        times.len()
                    ),
                ));
            }
            Ok(groups.into_iter().zip(times).collect())
        }
        _ => Ok(groups
            .iter()
            .flat_map(|&g| times.iter().map(move |&t| (g, t)))
            .collect()),
    }
}

/// Indices of the non-NaN entries in an observation row
pub fn which_valid(row: ArrayView1<'_, f64>) -> ValidIdx {
    row.iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .map(|(i, _)| i)
        .collect()
}

/// Gather the entries of a row at `idx` into a vector
#[inline]
pub fn select_elements(row: ArrayView1<'_, f64>, idx: &[usize]) -> DVector<f64> {
    DVector::from_iterator(idx.len(), idx.iter().map(|&i| row[i]))
}

/// Partition items by a key, preserving item order within each partition
///
/// Partitions are returned in key order so results are deterministic.
pub fn partition_by<T, K, F>(items: impl IntoIterator<Item = T>, key: F) -> Vec<(K, Vec<T>)>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    let mut map: BTreeMap<K, Vec<T>> = BTreeMap::new();
    for item in items {
        map.entry(key(&item)).or_default().push(item);
    }
    map.into_iter().collect()
}

/// Select rows of a matrix (e.g. `H[which_valid, :]`)
#[inline]
pub fn select_rows(matrix: &DMatrix<f64>, rows: &[usize]) -> DMatrix<f64> {
    matrix.select_rows(rows.iter())
}

/// Select a square block (e.g. `R[which_valid, which_valid]`)
#[inline]
pub fn select_square(matrix: &DMatrix<f64>, idx: &[usize]) -> DMatrix<f64> {
    matrix.select_rows(idx.iter()).select_columns(idx.iter())
}
