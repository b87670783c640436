use std::fmt;

// ──────────────────────────────────────────────
// CompactionKind
// ──────────────────────────────────────────────

/// The two mutually exclusive compaction kinds a transactional table supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompactionKind {
    /// Rewrites base and delta files into a new base.
    Major,
    /// Merges delta files without touching the base.
    Minor,
}

impl CompactionKind {
    /// Label used both in the `COMPACT` command and in the listing's `type` column.
    pub fn label(self) -> &'static str {
        match self {
            CompactionKind::Major => "MAJOR",
            CompactionKind::Minor => "MINOR",
        }
    }
}

impl fmt::Display for CompactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ──────────────────────────────────────────────
// CompactionTarget
// ──────────────────────────────────────────────

/// A table, optionally narrowed to one partition, that a compaction runs on.
///
/// Partition values are kept as SQL literals (`2`, `'2024-01-01'`) and are
/// rendered verbatim into the partition clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionTarget {
    table: String,
    partition: Vec<(String, String)>,
}

impl CompactionTarget {
    pub fn table(table: impl Into<String>) -> Self {
        CompactionTarget {
            table: table.into(),
            partition: Vec::new(),
        }
    }

    /// Add one `column=literal` pair to the partition spec.
    pub fn with_partition(mut self, column: impl Into<String>, literal: impl Into<String>) -> Self {
        self.partition.push((column.into(), literal.into()));
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn partition(&self) -> &[(String, String)] {
        &self.partition
    }

    /// `PARTITION (c1=v1, c2=v2)`, or `None` for a whole-table target.
    pub fn partition_clause(&self) -> Option<String> {
        if self.partition.is_empty() {
            return None;
        }
        let spec = self
            .partition
            .iter()
            .map(|(column, literal)| format!("{}={}", column, literal))
            .collect::<Vec<_>>()
            .join(", ");
        Some(format!("PARTITION ({})", spec))
    }

    /// The statement that asks the metastore to enqueue a compaction.
    pub fn compact_statement(&self, kind: CompactionKind) -> String {
        format!("ALTER TABLE {} COMPACT '{}'", self, kind.label())
    }
}

impl fmt::Display for CompactionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.partition_clause() {
            Some(clause) => write!(f, "{} {}", self.table, clause),
            None => f.write_str(&self.table),
        }
    }
}
