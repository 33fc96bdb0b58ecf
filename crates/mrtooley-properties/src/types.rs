// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Property identifiers, kinds and creation specs.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use strum::Display;

use mrtooley_core::{MrTooleyError, Value};

/// Arena id of a property. Valid for the lifetime of its tree only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyId(pub(crate) u64);

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Direction of a property relative to the tool that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum PType {
    /// Set by users or by a linked source.
    Input,
    /// Set by the owning tool only.
    Output,
    /// Computed on read by a closure, optionally polled.
    Function,
    /// Holds nested properties.
    Dict,
}

impl PType {
    pub fn is_source(self) -> bool {
        matches!(self, PType::Output | PType::Function)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum DataType {
    Bool,
    Integer,
    Float,
    String,
    Bytes,
    Enum,
    Dict,
}

/// Allowed values with display labels.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValuePool(Vec<(Value, String)>);

impl ValuePool {
    pub fn new<V, L>(entries: impl IntoIterator<Item = (V, L)>) -> Self
    where
        V: Into<Value>,
        L: Into<String>,
    {
        Self(
            entries
                .into_iter()
                .map(|(v, l)| (v.into(), l.into()))
                .collect(),
        )
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.0.iter().any(|(v, _)| v == value)
    }

    pub fn value_for_label(&self, label: &str) -> Option<&Value> {
        self.0.iter().find(|(_, l)| l == label).map(|(v, _)| v)
    }

    pub fn label_for(&self, value: &Value) -> Option<&str> {
        self.0
            .iter()
            .find(|(v, _)| v == value)
            .map(|(_, l)| l.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Value, String)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Closure behind a [`PType::Function`] property.
pub type PropertyFn = Arc<dyn Fn() -> Result<Value, MrTooleyError> + Send + Sync>;

/// Poll limits of a function property.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollLimits {
    pub min: Duration,
    /// `None` means "read once, do not poll".
    pub default: Option<Duration>,
}

/// Everything needed to create a property.
#[derive(Clone)]
pub struct PropertySpec {
    pub(crate) ptype: PType,
    pub(crate) datatype: DataType,
    pub(crate) default: Value,
    pub(crate) pool: Option<ValuePool>,
    pub(crate) description: String,
    pub(crate) persistent: bool,
    pub(crate) float_precision: u32,
    pub(crate) poll: Option<PollLimits>,
    pub(crate) function: Option<PropertyFn>,
}

impl fmt::Debug for PropertySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertySpec")
            .field("ptype", &self.ptype)
            .field("datatype", &self.datatype)
            .field("default", &self.default)
            .field("persistent", &self.persistent)
            .finish_non_exhaustive()
    }
}

/// Digits after the decimal point unless configured otherwise.
pub const DEFAULT_FLOAT_PRECISION: u32 = 2;

/// Most digits an `f64` can carry after the decimal point.
pub const MAX_FLOAT_PRECISION: u32 = 15;

impl PropertySpec {
    fn base(ptype: PType, datatype: DataType, default: Value) -> Self {
        Self {
            ptype,
            datatype,
            default,
            pool: None,
            description: String::new(),
            persistent: true,
            float_precision: DEFAULT_FLOAT_PRECISION,
            poll: None,
            function: None,
        }
    }

    pub fn input(datatype: DataType, default: impl Into<Value>) -> Self {
        Self::base(PType::Input, datatype, default.into())
    }

    pub fn output(datatype: DataType, default: impl Into<Value>) -> Self {
        Self::base(PType::Output, datatype, default.into())
    }

    /// A computed property. `min` bounds the poll interval from below and
    /// `default` is the interval used until the user changes it.
    pub fn function<F>(datatype: DataType, min: Duration, default: Option<Duration>, f: F) -> Self
    where
        F: Fn() -> Result<Value, MrTooleyError> + Send + Sync + 'static,
    {
        let mut spec = Self::base(PType::Function, datatype, Value::Null);
        spec.persistent = false;
        spec.poll = Some(PollLimits { min, default });
        spec.function = Some(Arc::new(f));
        spec
    }

    pub fn dict() -> Self {
        let mut spec = Self::base(PType::Dict, DataType::Dict, Value::Null);
        spec.persistent = false;
        spec
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn pool(mut self, pool: ValuePool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Keeps the value in memory only.
    pub fn transient(mut self) -> Self {
        self.persistent = false;
        self
    }

    pub fn float_precision(mut self, digits: u32) -> Self {
        self.float_precision = digits;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), MrTooleyError> {
        let err = |msg: &str| Err(MrTooleyError::Property(msg.to_string()));
        if (self.ptype == PType::Dict) != (self.datatype == DataType::Dict) {
            return err("dict properties need both PType::Dict and DataType::Dict");
        }
        if self.ptype == PType::Function && self.function.is_none() {
            return err("function properties need a closure");
        }
        if self.datatype == DataType::Enum {
            match &self.pool {
                None => return err("enum properties need a value pool"),
                Some(pool) if !pool.contains(&self.default) => {
                    return err("enum default must be a pool value");
                }
                Some(_) => {}
            }
        }
        if self.float_precision > MAX_FLOAT_PRECISION {
            return err("float precision is above the maximum");
        }
        if let Some(PollLimits {
            min,
            default: Some(default),
        }) = self.poll
            && default < min
        {
            return err("default poll interval is below the minimum");
        }
        Ok(())
    }
}

/// Change notifications, delivered over a broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyEvent {
    /// A value was written, changed or not.
    Updated(PropertyId),
    /// A value was written and differs from the previous one.
    UpdatedAndChanged(PropertyId),
    /// A property was added to or removed from the dict at this path.
    /// `None` is the root dict.
    DictChanged(Option<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_lookup_both_ways() {
        let pool = ValuePool::new([(0, "off"), (1, "on")]);
        assert_eq!(pool.value_for_label("on"), Some(&Value::Int(1)));
        assert_eq!(pool.label_for(&Value::Int(0)), Some("off"));
        assert!(!pool.contains(&Value::Int(2)));
    }

    #[test]
    fn spec_validation() {
        assert!(PropertySpec::input(DataType::Enum, 0).validate().is_err());
        assert!(
            PropertySpec::input(DataType::Enum, 5)
                .pool(ValuePool::new([(0, "a")]))
                .validate()
                .is_err()
        );
        assert!(PropertySpec::input(DataType::Dict, Value::Null).validate().is_err());
        assert!(
            PropertySpec::function(
                DataType::Integer,
                Duration::from_secs(5),
                Some(Duration::from_secs(1)),
                || Ok(Value::Int(1))
            )
            .validate()
            .is_err()
        );
        assert!(PropertySpec::dict().validate().is_ok());
    }

    #[test]
    fn function_and_dict_are_never_persistent() {
        assert!(!PropertySpec::dict().persistent);
        let f = PropertySpec::function(DataType::Bool, Duration::ZERO, None, || Ok(true.into()));
        assert!(!f.persistent);
    }
}
