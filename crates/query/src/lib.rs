//! Query primitives shared by the acidcheck crates.
//!
//! Product tests talk to two engines (Trino and Hive) through the
//! [`QueryExecutor`] seam. Everything an executor returns is expressed with
//! the types in this crate: [`Value`] cells, [`Row`]s and a [`QueryResult`].

mod error;
mod executor;
mod result;
mod row;
mod value;

pub use error::QueryError;
pub use executor::QueryExecutor;
pub use result::QueryResult;
pub use row::Row;
pub use value::Value;

pub use rust_decimal::Decimal;
