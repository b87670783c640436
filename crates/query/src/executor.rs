use std::sync::Arc;

use crate::{QueryError, QueryResult};

/// A query engine that product tests can issue SQL against.
///
/// Execution is synchronous: the calling thread blocks until the engine
/// returns a complete result. Implementations must be shareable between
/// test threads, hence the `Send + Sync` bound.
pub trait QueryExecutor: Send + Sync {
    /// Execute a single statement and return its full result.
    ///
    /// Statements without a result set (DDL, `ALTER TABLE ... COMPACT`)
    /// return an empty [`QueryResult`].
    fn execute_query(&self, sql: &str) -> Result<QueryResult, QueryError>;
}

impl<T: QueryExecutor + ?Sized> QueryExecutor for &T {
    fn execute_query(&self, sql: &str) -> Result<QueryResult, QueryError> {
        (**self).execute_query(sql)
    }
}

impl<T: QueryExecutor + ?Sized> QueryExecutor for Box<T> {
    fn execute_query(&self, sql: &str) -> Result<QueryResult, QueryError> {
        (**self).execute_query(sql)
    }
}

impl<T: QueryExecutor + ?Sized> QueryExecutor for Arc<T> {
    fn execute_query(&self, sql: &str) -> Result<QueryResult, QueryError> {
        (**self).execute_query(sql)
    }
}
