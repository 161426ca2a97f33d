//! Runtime variables for template resolution.
//!
//! Variables form a tree of string-keyed maps. Maps are shared handles, so the
//! same map can appear at several places in the tree, including inside itself.
//! Every traversal tracks map identity along the current path and stops when a
//! map is revisited.

use parking_lot::RwLock;
use serde::ser::Error as _;
use serde::{Serialize, Serializer};
use serde_json::{Number, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::template::TemplateError;

/// Marker substituted for a value that refers back to itself.
pub const CYCLE_MARKER: &str = "[Object]";

/// A single runtime value.
#[derive(Debug, Clone)]
pub enum Variable {
    /// Explicitly set to "no value". Distinct from a path that does not exist.
    Undefined,
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<Variable>),
    Map(VarMap),
}

impl Variable {
    /// Text used when a placeholder resolves to this value.
    ///
    /// Scalars use their canonical form, `Null` and `Undefined` become the
    /// literal words `null` and `undefined`, and containers are rendered as
    /// compact JSON. A container that revisits one of its own maps renders as
    /// [`CYCLE_MARKER`].
    pub fn render(&self) -> String {
        match self {
            Variable::Undefined => "undefined".to_string(),
            Variable::Null => "null".to_string(),
            Variable::Bool(b) => b.to_string(),
            Variable::Number(n) => format_number(n),
            Variable::String(s) => s.clone(),
            Variable::List(_) | Variable::Map(_) => match self.to_json() {
                Some(value) => value.to_string(),
                None => CYCLE_MARKER.to_string(),
            },
        }
    }

    /// Convert to a JSON value. Returns `None` if the value contains a cycle.
    pub fn to_json(&self) -> Option<Value> {
        let mut path = HashSet::new();
        self.json_on_path(&mut path)
    }

    /// Whether any map reachable from this value refers back to itself.
    pub fn is_cyclic(&self) -> bool {
        self.to_json().is_none()
    }

    fn json_on_path(&self, path: &mut HashSet<usize>) -> Option<Value> {
        let value = match self {
            Variable::Undefined | Variable::Null => Value::Null,
            Variable::Bool(b) => Value::Bool(*b),
            Variable::Number(n) => Value::Number(n.clone()),
            Variable::String(s) => Value::String(s.clone()),
            Variable::List(items) => Value::Array(
                items
                    .iter()
                    .map(|item| item.json_on_path(path))
                    .collect::<Option<Vec<_>>>()?,
            ),
            Variable::Map(map) => {
                if !path.insert(map.id()) {
                    return None;
                }
                let mut object = serde_json::Map::new();
                for (key, child) in map.entries() {
                    // Undefined members are dropped, as a JSON encoder would.
                    if matches!(child, Variable::Undefined) {
                        continue;
                    }
                    object.insert(key, child.json_on_path(path)?);
                }
                path.remove(&map.id());
                Value::Object(object)
            }
        };
        Some(value)
    }
}

/// Integral floats print as plain digits (`3`, `1000000000000000`) up to 1e21;
/// past that, and for fractions, the JSON form is kept.
fn format_number(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.is_finite() && f.fract() == 0.0 && f.abs() < 1e21 => {
            format!("{}", f)
        }
        _ => n.to_string(),
    }
}

impl Serialize for Variable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.to_json() {
            Some(value) => value.serialize(serializer),
            None => Err(S::Error::custom("circular reference in variable map")),
        }
    }
}

impl From<Value> for Variable {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Variable::Null,
            Value::Bool(b) => Variable::Bool(b),
            Value::Number(n) => Variable::Number(n),
            Value::String(s) => Variable::String(s),
            Value::Array(items) => Variable::List(items.into_iter().map(Variable::from).collect()),
            Value::Object(object) => {
                let map = VarMap::new();
                for (key, child) in object {
                    map.insert(key, Variable::from(child));
                }
                Variable::Map(map)
            }
        }
    }
}

impl From<&str> for Variable {
    fn from(s: &str) -> Self {
        Variable::String(s.to_string())
    }
}

impl From<String> for Variable {
    fn from(s: String) -> Self {
        Variable::String(s)
    }
}

impl From<bool> for Variable {
    fn from(b: bool) -> Self {
        Variable::Bool(b)
    }
}

impl From<i64> for Variable {
    fn from(n: i64) -> Self {
        Variable::Number(n.into())
    }
}

impl From<u64> for Variable {
    fn from(n: u64) -> Self {
        Variable::Number(n.into())
    }
}

impl From<i32> for Variable {
    fn from(n: i32) -> Self {
        Variable::Number(n.into())
    }
}

impl From<f64> for Variable {
    fn from(f: f64) -> Self {
        Number::from_f64(f)
            .map(Variable::Number)
            .unwrap_or(Variable::Null)
    }
}

impl From<VarMap> for Variable {
    fn from(map: VarMap) -> Self {
        Variable::Map(map)
    }
}

impl From<Vec<Variable>> for Variable {
    fn from(items: Vec<Variable>) -> Self {
        Variable::List(items)
    }
}

/// A shared, string-keyed map of variables.
///
/// Cloning a `VarMap` clones the handle, not the contents. Two handles are the
/// same map when [`VarMap::ptr_eq`] holds.
///
/// Handles are strong references, so a map that contains itself (directly or
/// through other maps) is never freed. Break the cycle with
/// [`VarMap::remove`] once the variables are no longer needed.
#[derive(Clone, Default)]
pub struct VarMap(Arc<RwLock<BTreeMap<String, Variable>>>);

impl VarMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous one for the key.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Variable>) -> Option<Variable> {
        self.0.write().insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<Variable> {
        self.0.read().get(key).cloned()
    }

    pub fn remove(&self, key: &str) -> Option<Variable> {
        self.0.write().remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.read().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    pub fn ptr_eq(&self, other: &VarMap) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Snapshot of the entries. The lock is released before the caller
    /// descends into children, so a map nested in itself is never re-locked.
    fn entries(&self) -> Vec<(String, Variable)> {
        self.0
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for VarMap {
    // Keys only: a derived impl would recurse forever on a cyclic map.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VarMap").field("keys", &self.keys()).finish()
    }
}

/// The variables available to one resolution call.
#[derive(Debug, Clone, Default)]
pub struct VariableSet {
    root: VarMap,
}

impl VariableSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a variable set from a JSON object.
    pub fn from_json(value: Value) -> Result<Self, TemplateError> {
        match Variable::from(value) {
            Variable::Map(root) => Ok(Self { root }),
            other => Err(TemplateError::InvalidVariables(format!(
                "expected an object at the top level, found {}",
                kind_name(&other)
            ))),
        }
    }

    /// Parse a variable set from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, TemplateError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_json(value)
    }

    /// Builder-style insert.
    pub fn with(self, key: impl Into<String>, value: impl Into<Variable>) -> Self {
        self.root.insert(key, value);
        self
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<Variable>) -> Option<Variable> {
        self.root.insert(key, value)
    }

    pub fn root(&self) -> &VarMap {
        &self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Walk a dotted path (`user.experience`) one segment at a time.
    ///
    /// Returns `None` when any segment is missing or the walk reaches a
    /// non-map before the last segment. A leaf explicitly set to `Null` or
    /// `Undefined` is returned as such.
    pub fn lookup(&self, path: &str) -> Option<Variable> {
        let mut current = Variable::Map(self.root.clone());
        for segment in path.split('.') {
            current = match current {
                Variable::Map(map) => map.get(segment)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

impl Serialize for VariableSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Variable::Map(self.root.clone()).serialize(serializer)
    }
}

fn kind_name(value: &Variable) -> &'static str {
    match value {
        Variable::Undefined => "undefined",
        Variable::Null => "null",
        Variable::Bool(_) => "a boolean",
        Variable::Number(_) => "a number",
        Variable::String(_) => "a string",
        Variable::List(_) => "an array",
        Variable::Map(_) => "an object",
    }
}
