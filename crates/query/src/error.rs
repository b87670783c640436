/// Errors raised by a [`QueryExecutor`](crate::QueryExecutor).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// The engine accepted the connection but rejected or failed the statement.
    #[error("query failed: {message} (sql: {sql})")]
    Execution { sql: String, message: String },

    /// The engine could not be reached.
    #[error("connection error: {0}")]
    Connection(String),
}

impl QueryError {
    pub fn execution(sql: impl Into<String>, message: impl Into<String>) -> Self {
        QueryError::Execution {
            sql: sql.into(),
            message: message.into(),
        }
    }
}
