//! Error types for store materialization.
//!
//! The materializer is deliberately quiet: an unconfigured engine degrades
//! to pass-through, and writes aimed at sealed or unknown fields are
//! dropped. The conditions below are the two places where staying silent
//! would hide a real programming error.

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// The plain value graph handed to the materializer references itself.
    /// Materialization is strictly depth-first and would never terminate,
    /// so cycles are rejected up front. Acyclic sharing (the same record
    /// reachable along two paths) is fine.
    #[error("value graph contains a reference cycle")]
    CyclicValue,

    /// Returned by the strict configuration check when a required engine
    /// hook has not been registered. The default entry points never produce
    /// this; they pass values through instead.
    #[error("engine hook `{0}` is not registered")]
    MissingHook(&'static str),
}
