//! Collaborators the monitor drives: the compaction trigger and the status
//! listing. Both are synchronous; a call blocks until the engine answers.

use acidcheck_query::{QueryError, QueryExecutor, QueryResult};

use crate::{CompactionKind, CompactionTarget};

/// Issues the side-effecting command that enqueues a compaction.
///
/// Re-issuing the command for the same target is harmless, which is what
/// allows the whole trigger-and-wait sequence to be retried.
pub trait CompactionTrigger: Send + Sync {
    fn trigger_compaction(
        &self,
        target: &CompactionTarget,
        kind: CompactionKind,
    ) -> Result<(), QueryError>;
}

impl<T: CompactionTrigger + ?Sized> CompactionTrigger for &T {
    fn trigger_compaction(
        &self,
        target: &CompactionTarget,
        kind: CompactionKind,
    ) -> Result<(), QueryError> {
        (**self).trigger_compaction(target, kind)
    }
}

/// Produces the current compaction status listing.
///
/// The first row of the result holds the column headers; see
/// [`parse_status_listing`](crate::parse_status_listing).
pub trait StatusListing: Send + Sync {
    fn list_compactions(&self) -> Result<QueryResult, QueryError>;
}

impl<T: StatusListing + ?Sized> StatusListing for &T {
    fn list_compactions(&self) -> Result<QueryResult, QueryError> {
        (**self).list_compactions()
    }
}

// ──────────────────────────────────────────────
// HiveCompactions
// ──────────────────────────────────────────────

pub const SHOW_COMPACTIONS: &str = "SHOW COMPACTIONS";

/// Trigger and listing backed by a Hive query executor.
///
/// Compactions are enqueued with `ALTER TABLE ... COMPACT '<KIND>'` and
/// observed through `SHOW COMPACTIONS`.
#[derive(Debug, Clone)]
pub struct HiveCompactions<E> {
    executor: E,
}

impl<E: QueryExecutor> HiveCompactions<E> {
    pub fn new(executor: E) -> Self {
        HiveCompactions { executor }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }
}

impl<E: QueryExecutor> CompactionTrigger for HiveCompactions<E> {
    fn trigger_compaction(
        &self,
        target: &CompactionTarget,
        kind: CompactionKind,
    ) -> Result<(), QueryError> {
        let statement = target.compact_statement(kind);
        tracing::debug!(%statement, "Enqueuing compaction");
        self.executor.execute_query(&statement).map(|_| ())
    }
}

impl<E: QueryExecutor> StatusListing for HiveCompactions<E> {
    fn list_compactions(&self) -> Result<QueryResult, QueryError> {
        self.executor.execute_query(SHOW_COMPACTIONS)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use acidcheck_query::row;

    use super::*;

    #[derive(Default)]
    struct LoggingExecutor {
        statements: Mutex<Vec<String>>,
    }

    impl QueryExecutor for LoggingExecutor {
        fn execute_query(&self, sql: &str) -> Result<QueryResult, QueryError> {
            self.statements.lock().unwrap().push(sql.to_string());
            if sql == SHOW_COMPACTIONS {
                Ok(QueryResult::from_rows(vec![row!["table", "type", "state"]]))
            } else {
                Ok(QueryResult::empty())
            }
        }
    }

    #[test]
    fn trigger_and_listing_issue_hive_statements() {
        let hive = HiveCompactions::new(LoggingExecutor::default());
        let target = CompactionTarget::table("orders").with_partition("part_col", "2");

        hive.trigger_compaction(&target, CompactionKind::Minor).unwrap();
        let listing = hive.list_compactions().unwrap();

        assert_eq!(listing.row_count(), 1);
        assert_eq!(
            *hive.executor().statements.lock().unwrap(),
            vec![
                "ALTER TABLE orders PARTITION (part_col=2) COMPACT 'MINOR'".to_string(),
                "SHOW COMPACTIONS".to_string(),
            ]
        );
    }

    #[test]
    fn trigger_propagates_query_errors() {
        struct Unreachable;
        impl QueryExecutor for Unreachable {
            fn execute_query(&self, _sql: &str) -> Result<QueryResult, QueryError> {
                Err(QueryError::Connection("metastore down".to_string()))
            }
        }

        let hive = HiveCompactions::new(Unreachable);
        let err = hive
            .trigger_compaction(&CompactionTarget::table("t"), CompactionKind::Major)
            .unwrap_err();
        assert_eq!(err, QueryError::Connection("metastore down".to_string()));
    }
}
