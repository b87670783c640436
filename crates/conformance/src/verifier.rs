use std::collections::BTreeMap;

use acidcheck_query::{QueryError, QueryExecutor, Row};

use crate::rows::RowMultiset;

// ──────────────────────────────────────────────
// Request
// ──────────────────────────────────────────────

/// A filtered select and the rows both engines must return for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    query: String,
    predicate: String,
    expected: RowMultiset,
}

impl VerificationRequest {
    /// `query` is a select without a `WHERE` clause; `predicate` is
    /// appended as one.
    pub fn new(
        query: impl Into<String>,
        predicate: impl Into<String>,
        expected: impl IntoIterator<Item = Row>,
    ) -> Self {
        VerificationRequest {
            query: query.into(),
            predicate: predicate.into(),
            expected: expected.into_iter().collect(),
        }
    }

    pub fn full_query(&self) -> String {
        format!("{} WHERE {}", self.query, self.predicate)
    }

    pub fn expected(&self) -> &RowMultiset {
        &self.expected
    }
}

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("{backend} could not run `{query}`: {source}")]
    Query {
        backend: String,
        query: String,
        #[source]
        source: QueryError,
    },

    #[error(
        "{backend} returned unexpected rows for `{query}`: expected {expected}, got {actual}"
    )]
    Mismatch {
        backend: String,
        query: String,
        expected: RowMultiset,
        actual: RowMultiset,
        /// Expected rows the backend did not return, with how many were lacking.
        missing: BTreeMap<Row, usize>,
        /// Rows returned beyond their expected count.
        unexpected: BTreeMap<Row, usize>,
    },
}

impl VerificationError {
    pub fn backend(&self) -> &str {
        match self {
            VerificationError::Query { backend, .. } => backend,
            VerificationError::Mismatch { backend, .. } => backend,
        }
    }
}

// ──────────────────────────────────────────────
// Verifier
// ──────────────────────────────────────────────

/// A named query engine.
#[derive(Debug, Clone)]
pub struct Backend<E> {
    name: String,
    executor: E,
}

impl<E: QueryExecutor> Backend<E> {
    pub fn new(name: impl Into<String>, executor: E) -> Self {
        Backend {
            name: name.into(),
            executor,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    fn check(&self, query: &str, expected: &RowMultiset) -> Result<(), VerificationError> {
        let result = self
            .executor
            .execute_query(query)
            .map_err(|source| VerificationError::Query {
                backend: self.name.clone(),
                query: query.to_string(),
                source,
            })?;
        let actual: RowMultiset = result.into_rows().into_iter().collect();

        let diff = expected.diff(&actual);
        if diff.is_empty() {
            tracing::debug!(backend = %self.name, query, rows = actual.len(), "Rows match");
            return Ok(());
        }

        tracing::debug!(backend = %self.name, query, %diff, "Rows differ");
        Err(VerificationError::Mismatch {
            backend: self.name.clone(),
            query: query.to_string(),
            expected: expected.clone(),
            actual,
            missing: diff.missing,
            unexpected: diff.unexpected,
        })
    }
}

/// Runs each request on two engines, first then second, and requires both
/// to return exactly the expected multiset of rows.
#[derive(Debug, Clone)]
pub struct DualBackendVerifier<A, B> {
    first: Backend<A>,
    second: Backend<B>,
}

impl<A: QueryExecutor, B: QueryExecutor> DualBackendVerifier<A, B> {
    pub fn new(first: Backend<A>, second: Backend<B>) -> Self {
        DualBackendVerifier { first, second }
    }

    /// Conventional pairing: Trino first, then Hive.
    pub fn trino_and_hive(trino: A, hive: B) -> Self {
        Self::new(Backend::new("trino", trino), Backend::new("hive", hive))
    }

    pub fn first(&self) -> &Backend<A> {
        &self.first
    }

    pub fn second(&self) -> &Backend<B> {
        &self.second
    }

    /// Stops at the first backend that fails or diverges; the second
    /// backend is not queried if the first one does.
    pub fn verify(&self, request: &VerificationRequest) -> Result<(), VerificationError> {
        let query = request.full_query();
        self.first.check(&query, request.expected())?;
        self.second.check(&query, request.expected())
    }
}
