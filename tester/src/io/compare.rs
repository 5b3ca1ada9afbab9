//! Row-equality comparator over a reference and a target connection.

use anyhow::{Result, anyhow, bail};
use tracing::debug;

use crate::core::types::RowSet;
use crate::error::aggregate;
use crate::io::backend::{Comparator, Connection};

/// Runs statements on both connections and compares their rows, ignoring row order.
pub struct DualComparator<R, T> {
    reference: R,
    target: T,
    row_limit: usize,
}

impl<R: Connection, T: Connection> DualComparator<R, T> {
    pub fn new(reference: R, target: T, row_limit: usize) -> Self {
        Self {
            reference,
            target,
            row_limit,
        }
    }
}

impl<R: Connection, T: Connection> Comparator for DualComparator<R, T> {
    fn reference(&mut self) -> &mut dyn Connection {
        &mut self.reference
    }

    fn target(&mut self) -> &mut dyn Connection {
        &mut self.target
    }

    fn exec(&mut self, sql: &str) -> Result<()> {
        let reference = self.reference.execute_fetch(sql, self.row_limit, true);
        let target = self.target.execute_fetch(sql, self.row_limit, true);
        match (reference, target) {
            (Ok(reference), Ok(target)) => compare_rows(&reference, &target),
            (Err(reference), Err(target)) => aggregate(vec![
                reference.context("reference failed"),
                target.context("target failed"),
            ]),
            (Err(err), Ok(_)) => Err(err.context("reference failed while target succeeded")),
            (Ok(_), Err(err)) => Err(err.context("target failed while reference succeeded")),
        }
    }

    fn close(&mut self) -> Result<()> {
        debug!("closing comparator");
        Ok(())
    }
}

/// Compare two results as multisets of rows.
pub fn compare_rows(reference: &RowSet, target: &RowSet) -> Result<()> {
    if reference.rows.len() != target.rows.len() {
        bail!(
            "results differ: reference returned {} rows, target returned {} rows",
            reference.rows.len(),
            target.rows.len()
        );
    }
    let mut expected = reference.rows.clone();
    let mut actual = target.rows.clone();
    expected.sort();
    actual.sort();
    match expected.iter().zip(&actual).find(|(e, a)| e != a) {
        None => Ok(()),
        Some((e, a)) => Err(anyhow!(
            "results differ: reference row [{}], target row [{}]",
            e.join(", "),
            a.join(", ")
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(values: &[&[&str]]) -> RowSet {
        RowSet::new(
            values
                .iter()
                .map(|row| row.iter().map(|v| v.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn row_order_is_ignored() {
        let reference = rows(&[&["1", "a"], &["2", "b"]]);
        let target = rows(&[&["2", "b"], &["1", "a"]]);
        assert!(compare_rows(&reference, &target).is_ok());
    }

    #[test]
    fn differing_row_counts_fail() {
        let err = compare_rows(&rows(&[&["1"]]), &rows(&[])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "results differ: reference returned 1 rows, target returned 0 rows"
        );
    }

    #[test]
    fn differing_values_name_the_first_mismatch() {
        let err = compare_rows(&rows(&[&["1", "a"]]), &rows(&[&["1", "b"]])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "results differ: reference row [1, a], target row [1, b]"
        );
    }
}
