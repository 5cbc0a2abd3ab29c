//! Python Bindings
//!
//! A thin Python surface over the materializer: a `Store` class built
//! from a `dict`, with attribute-style reads and writes routed through
//! the bundled engine. Nested records come back wrapped in `Store`;
//! arrays are snapshotted into lists on the way out.

use pyo3::exceptions::{PyAttributeError, PyTypeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyBool, PyDict, PyList};

use crate::reactive;
use crate::store::{Arr, Materializer, Obj, Value};

/// Python-exposed store.
///
/// Construction materializes the given `dict` eagerly; every field read
/// or write afterwards goes through the backing cells.
#[pyclass(name = "Store")]
pub(crate) struct Store {
    node: Obj,
    materializer: Materializer,
}

#[pymethods]
impl Store {
    #[new]
    fn new(data: &Bound<'_, PyDict>) -> PyResult<Self> {
        let materializer = Materializer::new(reactive::engine());
        let plain = dict_to_record(data)?;
        let node = materializer
            .store(Value::Object(plain))
            .map_err(|err| PyValueError::new_err(err.to_string()))?
            .into_object()
            .ok_or_else(|| PyValueError::new_err("materialization did not yield a record"))?;
        Ok(Self { node, materializer })
    }

    fn __getattr__(&self, py: Python<'_>, name: &str) -> PyResult<PyObject> {
        match self.node.get(name) {
            Some(value) => value_to_py(py, &self.materializer, &value),
            None => Err(PyAttributeError::new_err(format!(
                "store has no field {name:?}"
            ))),
        }
    }

    fn __setattr__(&self, name: &str, value: Bound<'_, PyAny>) -> PyResult<()> {
        let value = py_to_value(&value)?;
        self.node
            .set(name, value)
            .map_err(|err| PyValueError::new_err(err.to_string()))
    }

    /// Enumerable field names, in declaration order.
    fn keys(&self) -> Vec<String> {
        self.node.keys()
    }

    fn __repr__(&self) -> String {
        format!("Store(fields={:?})", self.node.keys())
    }
}

fn dict_to_record(dict: &Bound<'_, PyDict>) -> PyResult<Obj> {
    let record = Obj::new();
    for (key, value) in dict.iter() {
        let key: String = key.extract()?;
        record.define(key, py_to_value(&value)?);
    }
    Ok(record)
}

fn py_to_value(any: &Bound<'_, PyAny>) -> PyResult<Value> {
    if any.is_none() {
        return Ok(Value::Null);
    }
    // bool subclasses int in Python; check it first.
    if any.is_instance_of::<PyBool>() {
        return Ok(Value::Bool(any.extract()?));
    }
    if let Ok(i) = any.extract::<i64>() {
        return Ok(Value::Int(i));
    }
    if let Ok(f) = any.extract::<f64>() {
        return Ok(Value::Float(f));
    }
    if let Ok(s) = any.extract::<String>() {
        return Ok(Value::Str(s));
    }
    if let Ok(list) = any.downcast::<PyList>() {
        let items = list
            .iter()
            .map(|item| py_to_value(&item))
            .collect::<PyResult<Vec<Value>>>()?;
        return Ok(Value::Array(Arr::from_vec(items)));
    }
    if let Ok(dict) = any.downcast::<PyDict>() {
        return Ok(Value::Object(dict_to_record(dict)?));
    }
    Err(PyTypeError::new_err(
        "unsupported value type for a store field",
    ))
}

fn value_to_py(py: Python<'_>, materializer: &Materializer, value: &Value) -> PyResult<PyObject> {
    match value {
        Value::Null => Ok(py.None()),
        Value::Bool(b) => Ok((*b).into_py(py)),
        Value::Int(i) => Ok((*i).into_py(py)),
        Value::Float(f) => Ok((*f).into_py(py)),
        Value::Str(s) => Ok(s.clone().into_py(py)),
        Value::Func(_) => Err(PyTypeError::new_err(
            "function-valued fields are not representable in Python",
        )),
        Value::Cell(handle) => match materializer.engine().get(handle) {
            Some(inner) => value_to_py(py, materializer, &inner),
            None => Ok(py.None()),
        },
        Value::Array(array) => {
            let items = array
                .snapshot()
                .iter()
                .map(|item| value_to_py(py, materializer, item))
                .collect::<PyResult<Vec<PyObject>>>()?;
            Ok(PyList::new_bound(py, items).into_py(py))
        }
        Value::Object(obj) => {
            let store = Store {
                node: obj.clone(),
                materializer: materializer.clone(),
            };
            Ok(Py::new(py, store)?.into_py(py))
        }
    }
}
