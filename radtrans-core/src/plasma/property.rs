//! Values and properties of the plasma graph.

use crate::atomic::AtomicData;
use crate::errors::{RadTransError, RadTransResult};
use ndarray::{Array1, Array2};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// A value stored in the plasma.
#[derive(Debug, Clone, PartialEq)]
pub enum PlasmaValue {
    Scalar(f64),
    /// One value per shell
    Shells(Array1<f64>),
    /// One row per species (element, ion, level, line or transition) and one column per shell
    Table(Array2<f64>),
}

impl PlasmaValue {
    fn kind(&self) -> &'static str {
        match self {
            PlasmaValue::Scalar(_) => "scalar",
            PlasmaValue::Shells(_) => "shells",
            PlasmaValue::Table(_) => "table",
        }
    }

    /// Number of shells covered by this value, if it is per shell.
    pub fn no_of_shells(&self) -> Option<usize> {
        match self {
            PlasmaValue::Scalar(_) => None,
            PlasmaValue::Shells(values) => Some(values.len()),
            PlasmaValue::Table(values) => Some(values.ncols()),
        }
    }
}

impl From<f64> for PlasmaValue {
    fn from(value: f64) -> Self {
        PlasmaValue::Scalar(value)
    }
}

impl From<Array1<f64>> for PlasmaValue {
    fn from(value: Array1<f64>) -> Self {
        PlasmaValue::Shells(value)
    }
}

impl From<Array2<f64>> for PlasmaValue {
    fn from(value: Array2<f64>) -> Self {
        PlasmaValue::Table(value)
    }
}

/// Values produced by a single property calculation, keyed by output name.
pub type PlasmaOutputs = HashMap<String, PlasmaValue>;

/// A node of the plasma graph.
///
/// A property declares the names it reads and the names it writes. The plasma
/// links every input to the property producing it and recomputes the property
/// whenever any of its inputs change.
pub trait PlasmaProperty: Debug + Send + Sync {
    /// Names of the values read by [`PlasmaProperty::calculate`]
    fn inputs(&self) -> Vec<String>;

    /// Names of the values returned by [`PlasmaProperty::calculate`]
    fn outputs(&self) -> Vec<String>;

    /// Computes every output from the current state.
    fn calculate(&self, state: &PlasmaState) -> RadTransResult<PlasmaOutputs>;

    /// Short name used in logs and graph diagrams.
    fn name(&self) -> String {
        let debug = format!("{:?}", self);
        debug
            .split(['{', ' ', '('])
            .next()
            .unwrap_or("UnknownProperty")
            .to_string()
    }
}

/// Current values of the plasma together with the atomic data they refer to.
#[derive(Debug, Clone)]
pub struct PlasmaState {
    values: HashMap<String, PlasmaValue>,
    atomic_data: Arc<AtomicData>,
}

impl PlasmaState {
    pub fn new(atomic_data: Arc<AtomicData>) -> Self {
        Self {
            values: HashMap::new(),
            atomic_data,
        }
    }

    pub fn atomic_data(&self) -> &AtomicData {
        &self.atomic_data
    }

    pub fn atomic_data_arc(&self) -> Arc<AtomicData> {
        Arc::clone(&self.atomic_data)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: PlasmaValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> RadTransResult<&PlasmaValue> {
        self.values
            .get(name)
            .ok_or_else(|| RadTransError::PlasmaValueMissing(name.to_string()))
    }

    pub fn get_scalar(&self, name: &str) -> RadTransResult<f64> {
        match self.get(name)? {
            PlasmaValue::Scalar(value) => Ok(*value),
            other => Err(wrong_kind(name, "scalar", other)),
        }
    }

    pub fn get_shells(&self, name: &str) -> RadTransResult<&Array1<f64>> {
        match self.get(name)? {
            PlasmaValue::Shells(values) => Ok(values),
            other => Err(wrong_kind(name, "shells", other)),
        }
    }

    pub fn get_table(&self, name: &str) -> RadTransResult<&Array2<f64>> {
        match self.get(name)? {
            PlasmaValue::Table(values) => Ok(values),
            other => Err(wrong_kind(name, "table", other)),
        }
    }

    /// Names of all values currently held, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }
}

fn wrong_kind(name: &str, expected: &str, found: &PlasmaValue) -> RadTransError {
    RadTransError::PlasmaShape {
        name: name.to_string(),
        expected: expected.to_string(),
        found: found.kind().to_string(),
    }
}

/// Checks that a table has the expected number of rows.
pub fn check_rows(name: &str, table: &Array2<f64>, rows: usize) -> RadTransResult<()> {
    if table.nrows() != rows {
        return Err(RadTransError::PlasmaShape {
            name: name.to_string(),
            expected: format!("{rows} rows"),
            found: format!("{} rows", table.nrows()),
        });
    }
    Ok(())
}
