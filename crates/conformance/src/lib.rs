//! Dual-backend result verification.
//!
//! Product tests read the same transactional table through two engines
//! (Trino and Hive) and must observe the same logical contents. Results are
//! compared as row multisets: order is ignored, duplicates are not.

mod rows;
mod verifier;

pub use rows::{RowMultiset, RowsDiff};
pub use verifier::{Backend, DualBackendVerifier, VerificationError, VerificationRequest};
