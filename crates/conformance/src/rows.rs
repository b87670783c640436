use std::collections::BTreeMap;
use std::fmt;

use acidcheck_query::Row;

/// Rows with their multiplicities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowMultiset {
    counts: BTreeMap<Row, usize>,
}

impl RowMultiset {
    pub fn new() -> Self {
        RowMultiset::default()
    }

    pub fn insert(&mut self, row: Row) {
        *self.counts.entry(row).or_insert(0) += 1;
    }

    pub fn count(&self, row: &Row) -> usize {
        self.counts.get(row).copied().unwrap_or(0)
    }

    /// Total number of rows, duplicates included.
    pub fn len(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Distinct rows with their counts, in row order.
    pub fn iter(&self) -> impl Iterator<Item = (&Row, usize)> {
        self.counts.iter().map(|(row, count)| (row, *count))
    }

    /// What `actual` lacks and what it has in excess, relative to `self`.
    pub fn diff(&self, actual: &RowMultiset) -> RowsDiff {
        let mut diff = RowsDiff::default();
        for (row, &expected) in &self.counts {
            let found = actual.count(row);
            if found < expected {
                diff.missing.insert(row.clone(), expected - found);
            }
        }
        for (row, &found) in &actual.counts {
            let expected = self.count(row);
            if found > expected {
                diff.unexpected.insert(row.clone(), found - expected);
            }
        }
        diff
    }
}

impl FromIterator<Row> for RowMultiset {
    fn from_iter<I: IntoIterator<Item = Row>>(iter: I) -> Self {
        let mut multiset = RowMultiset::new();
        for row in iter {
            multiset.insert(row);
        }
        multiset
    }
}

impl fmt::Display for RowMultiset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_counts(f, &self.counts)
    }
}

/// Per-row count differences between an expected and an actual multiset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowsDiff {
    pub missing: BTreeMap<Row, usize>,
    pub unexpected: BTreeMap<Row, usize>,
}

impl RowsDiff {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }
}

impl fmt::Display for RowsDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("missing ")?;
        write_counts(f, &self.missing)?;
        f.write_str(", unexpected ")?;
        write_counts(f, &self.unexpected)
    }
}

fn write_counts(f: &mut fmt::Formatter<'_>, counts: &BTreeMap<Row, usize>) -> fmt::Result {
    f.write_str("[")?;
    for (i, (row, count)) in counts.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", row)?;
        if *count > 1 {
            write!(f, " x{}", count)?;
        }
    }
    f.write_str("]")
}
