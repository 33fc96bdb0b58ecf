// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Values stored in the key-value tree.
//!
//! [`Value`] is the scalar form that backends persist. [`Item`] is the write
//! form, which may additionally be a nested mapping that gets copied key by
//! key into the tree. [`NodeEntry`] is what a backend hands back on reads.

use std::collections::BTreeMap;

use strum::Display;

use crate::datatypes::SerializedObject;

/// Identifies a mapping node inside a storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeId {
    /// The root mapping of the backend.
    Root,
    /// Any nested mapping.
    Id(i64),
}

impl NodeId {
    /// Row id for SQL parents; `None` for the root.
    pub fn as_parent(self) -> Option<i64> {
        match self {
            NodeId::Root => None,
            NodeId::Id(id) => Some(id),
        }
    }
}

/// Kinds of data a backend can hold, used to describe backend capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    Str,
    Bytes,
    List,
    Object,
    Mapping,
}

/// Every backend has to handle these kinds, natively or by transcoding.
pub const BASIC_SUPPORTED_KINDS: &[ValueKind] = &[
    ValueKind::Null,
    ValueKind::Bool,
    ValueKind::Int,
    ValueKind::Float,
    ValueKind::Str,
    ValueKind::Bytes,
    ValueKind::Mapping,
];

/// A scalar value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// Sequences come back as lists; they are never mutated in place.
    List(Vec<Value>),
    /// A registered custom datatype in packed form.
    Object(SerializedObject),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::Str,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::List(_) => ValueKind::List,
            Value::Object(_) => ValueKind::Object,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Floats, and ints widened to float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&SerializedObject> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Bytes(b) => {
                write!(f, "0x")?;
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Object(o) => write!(f, "<{} ({} bytes)>", o.type_name, o.data.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<SerializedObject> for Value {
    fn from(v: SerializedObject) -> Self {
        Value::Object(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Write form: a scalar or a nested mapping copied into the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Value(Value),
    Mapping(BTreeMap<String, Item>),
}

impl Item {
    /// An empty mapping.
    pub fn empty_mapping() -> Self {
        Item::Mapping(BTreeMap::new())
    }

    /// Builds a mapping from key/item pairs.
    pub fn mapping<K, I>(entries: impl IntoIterator<Item = (K, I)>) -> Self
    where
        K: Into<String>,
        I: Into<Item>,
    {
        Item::Mapping(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<Value> for Item {
    fn from(v: Value) -> Self {
        Item::Value(v)
    }
}

impl From<BTreeMap<String, Item>> for Item {
    fn from(v: BTreeMap<String, Item>) -> Self {
        Item::Mapping(v)
    }
}

macro_rules! item_from_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Item {
                fn from(v: $ty) -> Self {
                    Item::Value(Value::from(v))
                }
            }
        )*
    };
}

item_from_scalar!(bool, i64, i32, f64, &str, String, Vec<u8>, &[u8], SerializedObject);

/// What a backend returns for a child key.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEntry {
    Value(Value),
    Mapping(NodeId),
}
