//! Weft Core
//!
//! This crate materializes deeply reactive stores from plain nested data.
//! It implements:
//!
//! - A dynamic value model (records, arrays, functions, opaque cells)
//! - The recursive store materializer and its pluggable engine contract
//! - Bundled reactive primitives (cells, memos, effects) behind that
//!   contract
//! - A dependency graph with topological change propagation
//!
//! The crate is designed to be used both as a native Rust library and,
//! behind the `python` feature, as a Python extension module via PyO3.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `store`: value model, record type, engine contract, materializer
//! - `reactive`: bundled cells, memos, effects, and runtime
//! - `graph`: dependency graph and change propagation
//!
//! # Example
//!
//! ```rust,ignore
//! use weft_core::reactive;
//! use weft_core::store::{Materializer, Obj, Value};
//!
//! let materializer = Materializer::new(reactive::engine());
//!
//! // Describe plain data, accessor fields included
//! let plain = Obj::new();
//! plain.define("x", Value::Int(2));
//! plain.define("y", Value::Int(3));
//! plain.define_getter("sum", |this| {
//!     let x = this.get("x").unwrap().as_i64().unwrap();
//!     let y = this.get("y").unwrap().as_i64().unwrap();
//!     Value::Int(x + y)
//! });
//!
//! // Materialize: every field is now backed by a reactive cell
//! let store = materializer.store(Value::Object(plain))?.into_object().unwrap();
//!
//! assert_eq!(store.get("sum"), Some(Value::Int(5)));
//! store.set("x", Value::Int(5))?;
//! assert_eq!(store.get("sum"), Some(Value::Int(8)));
//! ```

pub mod error;
pub mod graph;
pub mod reactive;
pub mod store;

pub use error::StoreError;

#[cfg(feature = "python")]
mod bindings;

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Python module definition.
///
/// This function is called by Python when importing the module.
/// It registers all Python-exposed types and functions.
#[cfg(feature = "python")]
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<bindings::Store>()?;

    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
