// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory property arena.
//!
//! The tree never touches storage itself. Writes that must reach the
//! settings mapping are queued as [`SettingOp`]s and value saves are queued
//! with a deadline; [`crate::PropertyStore`] drains both.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, warn};

use mrtooley_core::path::{PATH_SEP, validate_key};
use mrtooley_core::{MrTooleyError, Value};

use crate::types::{
    DataType, MAX_FLOAT_PRECISION, PType, PropertyEvent, PropertyId, PropertySpec,
};

pub(crate) const VALUES_NS: &str = "values";
pub(crate) const LINK_NS: &str = "linked_to";
pub(crate) const INTERVAL_NS: &str = "interval";
pub(crate) const FLOAT_PREC_NS: &str = "float_prec";

/// Default delay between a change and its save.
pub const DEFAULT_SAVE_DELAY: Duration = Duration::from_secs(5);

const EVENT_CAPACITY: usize = 256;
const ROOT: PropertyId = PropertyId(0);

pub(crate) fn setting_key(namespace: &str, path: &str) -> String {
    format!("{namespace}{PATH_SEP}{path}")
}

/// A pending write to the settings mapping.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SettingOp {
    Set(String, Value),
    Delete(String),
}

/// Settings read back for one property during load.
#[derive(Debug, Default, Clone)]
pub(crate) struct StoredSettings {
    pub value: Option<Value>,
    pub link: Option<String>,
    pub interval: Option<Value>,
    pub float_precision: Option<Value>,
}

/// Snapshot of one property for display.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyInfo {
    pub id: PropertyId,
    pub path: String,
    pub ptype: PType,
    pub datatype: DataType,
    pub value: Value,
    pub description: String,
    pub persistent: bool,
    pub loaded: bool,
    pub linked_to: Option<String>,
    pub poll_interval: Option<Duration>,
    pub float_precision: Option<u32>,
}

struct Node {
    key: String,
    path: String,
    parent: Option<PropertyId>,
    spec: PropertySpec,
    value: Value,
    loaded: bool,
    children: BTreeMap<String, PropertyId>,
    source: Option<PropertyId>,
    destinations: Vec<PropertyId>,
    float_precision: u32,
    poll_interval: Option<Duration>,
    value_time: Option<Instant>,
}

impl Node {
    fn ptype(&self) -> PType {
        self.spec.ptype
    }
}

/// Property dicts and properties addressed by [`PropertyId`].
pub struct PropertyTree {
    nodes: BTreeMap<PropertyId, Node>,
    next_id: u64,
    loaded: bool,
    events: broadcast::Sender<PropertyEvent>,
    save_delay: Duration,
    saves: BTreeMap<PropertyId, Instant>,
    ops: Vec<SettingOp>,
    pending_links: Vec<(PropertyId, String)>,
    poll_service: Vec<PropertyId>,
    poll_pointer: usize,
}

impl std::fmt::Debug for PropertyTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyTree")
            .field("properties", &(self.nodes.len() - 1))
            .field("loaded", &self.loaded)
            .field("pending_saves", &self.saves.len())
            .finish_non_exhaustive()
    }
}

impl Default for PropertyTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Rounds half to even, like the property values users see in tools.
fn round_to(value: f64, digits: u32) -> f64 {
    let scale = 10f64.powi(digits.min(MAX_FLOAT_PRECISION) as i32);
    (value * scale).round_ties_even() / scale
}

fn coerce(spec: &PropertySpec, precision: u32, value: Value) -> Result<Value, MrTooleyError> {
    let value = match (spec.datatype, value) {
        (_, Value::Null) if spec.datatype != DataType::Enum => return Ok(Value::Null),
        (DataType::Integer, Value::Float(f)) => Value::Int(f.round_ties_even() as i64),
        (DataType::Integer, v @ Value::Int(_)) => v,
        (DataType::Float, Value::Int(i)) => Value::Float(round_to(i as f64, precision)),
        (DataType::Float, Value::Float(f)) => Value::Float(round_to(f, precision)),
        (DataType::Bool, v @ Value::Bool(_)) => v,
        (DataType::String, v @ Value::Str(_)) => v,
        (DataType::Bytes, v @ Value::Bytes(_)) => v,
        (DataType::Enum, Value::Str(label))
            if spec
                .pool
                .as_ref()
                .is_some_and(|p| p.value_for_label(&label).is_some()) =>
        {
            spec.pool
                .as_ref()
                .and_then(|p| p.value_for_label(&label))
                .cloned()
                .unwrap_or(Value::Null)
        }
        (DataType::Enum, v) => v,
        (DataType::Dict, _) => {
            return Err(MrTooleyError::Property("dicts hold no value".into()));
        }
        (datatype, v) => {
            return Err(MrTooleyError::UnsupportedType(format!(
                "{:?} for a {datatype} property",
                v.kind()
            )));
        }
    };
    if let Some(pool) = &spec.pool
        && !pool.contains(&value)
    {
        return Err(MrTooleyError::Property(format!(
            "{value:?} is not in the value pool"
        )));
    }
    Ok(value)
}

impl PropertyTree {
    pub fn new() -> Self {
        Self::with_save_delay(DEFAULT_SAVE_DELAY)
    }

    pub fn with_save_delay(save_delay: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let root = Node {
            key: String::new(),
            path: String::new(),
            parent: None,
            spec: PropertySpec::dict(),
            value: Value::Null,
            loaded: true,
            children: BTreeMap::new(),
            source: None,
            destinations: Vec::new(),
            float_precision: 0,
            poll_interval: None,
            value_time: None,
        };
        Self {
            nodes: BTreeMap::from([(ROOT, root)]),
            next_id: 1,
            loaded: false,
            events,
            save_delay,
            saves: BTreeMap::new(),
            ops: Vec::new(),
            pending_links: Vec::new(),
            poll_service: Vec::new(),
            poll_pointer: 0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PropertyEvent> {
        self.events.subscribe()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn root(&self) -> PropertyId {
        ROOT
    }

    fn emit(&self, event: PropertyEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn node(&self, id: PropertyId) -> Result<&Node, MrTooleyError> {
        self.nodes
            .get(&id)
            .ok_or_else(|| MrTooleyError::Property(format!("stale property id {id}")))
    }

    fn node_mut(&mut self, id: PropertyId) -> Result<&mut Node, MrTooleyError> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| MrTooleyError::Property(format!("stale property id {id}")))
    }

    fn dict_path(&self, id: PropertyId) -> Option<String> {
        (id != ROOT)
            .then(|| self.nodes.get(&id).map(|n| n.path.clone()))
            .flatten()
    }

    /// Adds `key` under the dict at `parent` (`""` is the root).
    pub fn add(
        &mut self,
        parent: &str,
        key: &str,
        spec: PropertySpec,
    ) -> Result<PropertyId, MrTooleyError> {
        validate_key(key)?;
        spec.validate()?;
        let parent_id = self.get(parent)?;
        let parent_node = self.node(parent_id)?;
        if parent_node.ptype() != PType::Dict {
            return Err(MrTooleyError::Property(format!(
                "'{}' is not a property dict",
                parent_node.path
            )));
        }
        if parent_node.children.contains_key(key) {
            return Err(MrTooleyError::Property(format!(
                "property '{key}' already exists in '{}'",
                parent_node.path
            )));
        }
        let path = if parent_id == ROOT {
            key.to_string()
        } else {
            format!("{}{PATH_SEP}{key}", parent_node.path)
        };

        let value = if spec.ptype == PType::Dict {
            Value::Null
        } else {
            coerce(&spec, spec.float_precision, spec.default.clone()).map_err(|e| {
                MrTooleyError::Property(format!("invalid default for '{path}': {e}"))
            })?
        };
        let id = PropertyId(self.next_id);
        self.next_id += 1;
        let is_dict = spec.ptype == PType::Dict;
        let float_precision = spec.float_precision;
        self.nodes.insert(
            id,
            Node {
                key: key.to_string(),
                path,
                parent: Some(parent_id),
                spec,
                value,
                // Dicts have nothing to load.
                loaded: is_dict,
                children: BTreeMap::new(),
                source: None,
                destinations: Vec::new(),
                float_precision,
                poll_interval: None,
                value_time: None,
            },
        );
        self.node_mut(parent_id)?
            .children
            .insert(key.to_string(), id);
        self.emit(PropertyEvent::DictChanged(self.dict_path(parent_id)));
        Ok(id)
    }

    /// Resolves `a/b/c` from the root. `""` is the root itself.
    pub fn get(&self, path: &str) -> Result<PropertyId, MrTooleyError> {
        self.get_from(ROOT, path)
    }

    /// Resolves `path` relative to `dict`. A leading `/` starts at the root.
    pub fn get_from(&self, dict: PropertyId, path: &str) -> Result<PropertyId, MrTooleyError> {
        let (mut current, path) = match path.strip_prefix(PATH_SEP) {
            Some(rest) => (ROOT, rest),
            None => (dict, path),
        };
        self.node(current)?;
        if path.is_empty() {
            return Ok(current);
        }
        for segment in path.split(PATH_SEP) {
            let node = self.node(current)?;
            current = *node.children.get(segment).ok_or_else(|| {
                MrTooleyError::Property(format!("no property '{path}'"))
            })?;
        }
        Ok(current)
    }

    pub fn path_of(&self, id: PropertyId) -> Option<&str> {
        self.nodes.get(&id).map(|n| n.path.as_str())
    }

    pub fn info(&self, path: &str) -> Result<PropertyInfo, MrTooleyError> {
        let id = self.get(path)?;
        let node = self.node(id)?;
        Ok(PropertyInfo {
            id,
            path: node.path.clone(),
            ptype: node.ptype(),
            datatype: node.spec.datatype,
            value: node.value.clone(),
            description: node.spec.description.clone(),
            persistent: node.spec.persistent,
            loaded: node.loaded,
            linked_to: node
                .source
                .and_then(|s| self.path_of(s))
                .map(str::to_string),
            poll_interval: node.poll_interval,
            float_precision: (node.spec.datatype == DataType::Float)
                .then_some(node.float_precision),
        })
    }

    /// Keys of the dict at `path`, sorted.
    pub fn children(&self, path: &str) -> Result<Vec<String>, MrTooleyError> {
        let node = self.node(self.get(path)?)?;
        Ok(node.children.keys().cloned().collect())
    }

    /// Every property path, depth first in key order.
    pub fn paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack: Vec<PropertyId> = self.nodes[&ROOT].children.values().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            out.push(node.path.clone());
            stack.extend(node.children.values().rev().copied());
        }
        out
    }

    fn subtree(&self, id: PropertyId) -> Vec<PropertyId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(node.children.values().copied());
                out.push(id);
            }
        }
        out
    }

    fn detach_source(&mut self, dest: PropertyId) {
        let Some(node) = self.nodes.get_mut(&dest) else {
            return;
        };
        if let Some(source) = node.source.take()
            && let Some(src) = self.nodes.get_mut(&source)
        {
            src.destinations.retain(|d| *d != dest);
        }
    }

    /// Removes the property or dict at `path` and everything below it.
    /// Persisted settings are left in place.
    pub fn remove(&mut self, path: &str) -> Result<(), MrTooleyError> {
        let id = self.get(path)?;
        if id == ROOT {
            return Err(MrTooleyError::Property("the root dict cannot be removed".into()));
        }
        let (parent, key) = {
            let node = self.node(id)?;
            (node.parent.unwrap_or(ROOT), node.key.clone())
        };
        let removed = self.subtree(id);
        for &rid in &removed {
            self.detach_source(rid);
            let dests = std::mem::take(&mut self.node_mut(rid)?.destinations);
            for dest in dests {
                if let Some(node) = self.nodes.get_mut(&dest) {
                    node.source = None;
                }
            }
        }
        for rid in &removed {
            self.nodes.remove(rid);
            self.saves.remove(rid);
        }
        self.poll_service.retain(|p| !removed.contains(p));
        self.pending_links.retain(|(p, _)| !removed.contains(p));
        self.node_mut(parent)?.children.remove(&key);
        debug!(path, count = removed.len(), "removed properties");
        self.emit(PropertyEvent::DictChanged(self.dict_path(parent)));
        Ok(())
    }

    fn store(&mut self, id: PropertyId, value: Value, now: Instant) -> Result<(), MrTooleyError> {
        let save_at = now + self.save_delay;
        let node = self.node_mut(id)?;
        let value = coerce(&node.spec, node.float_precision, value)
            .map_err(|e| MrTooleyError::Property(format!("'{}': {e}", node.path)))?;
        let changed = node.value != value;
        node.value = value.clone();
        let persistent = node.spec.persistent;
        let destinations = if node.ptype().is_source() {
            node.destinations.clone()
        } else {
            Vec::new()
        };
        if persistent && changed {
            self.saves.entry(id).or_insert(save_at);
        }
        self.emit(PropertyEvent::Updated(id));
        if changed {
            self.emit(PropertyEvent::UpdatedAndChanged(id));
        }
        for dest in destinations {
            if let Err(e) = self.store(dest, value.clone(), now) {
                warn!(error = %e, "could not propagate linked value");
            }
        }
        Ok(())
    }

    /// Sets an input. A linked input is unlinked first.
    pub fn set_value(&mut self, path: &str, value: Value, now: Instant) -> Result<(), MrTooleyError> {
        let id = self.get(path)?;
        let node = self.node(id)?;
        match node.ptype() {
            PType::Input => {}
            PType::Output => {
                return Err(MrTooleyError::Property(format!(
                    "'{path}' is an output; only its tool may set it"
                )));
            }
            PType::Function => {
                return Err(MrTooleyError::Property(format!(
                    "'{path}' is a function and cannot be set"
                )));
            }
            PType::Dict => {
                return Err(MrTooleyError::Property(format!("'{path}' is a dict")));
            }
        }
        if !node.loaded {
            debug!(path, "ignoring value set before load");
            return Ok(());
        }
        if node.source.is_some() {
            let key = setting_key(LINK_NS, &node.path);
            self.detach_source(id);
            self.ops.push(SettingOp::Delete(key));
        }
        self.store(id, value, now)
    }

    /// Sets an output from its owning tool.
    pub fn set_output(&mut self, path: &str, value: Value, now: Instant) -> Result<(), MrTooleyError> {
        let id = self.get(path)?;
        let node = self.node(id)?;
        if node.ptype() != PType::Output {
            return Err(MrTooleyError::Property(format!(
                "'{path}' is a {}, not an output",
                node.ptype()
            )));
        }
        if !node.loaded {
            debug!(path, "ignoring output set before load");
            return Ok(());
        }
        self.store(id, value, now)
    }

    fn connect(&mut self, source: PropertyId, dest: PropertyId, now: Instant) -> Result<(), MrTooleyError> {
        self.detach_source(dest);
        self.node_mut(dest)?.source = Some(source);
        let src = self.node_mut(source)?;
        if !src.destinations.contains(&dest) {
            src.destinations.push(dest);
        }
        let current = src.value.clone();
        if !current.is_null() {
            self.store(dest, current, now)?;
        }
        Ok(())
    }

    /// Links an output or function with an input, in either order.
    pub fn link(&mut self, a: &str, b: &str, now: Instant) -> Result<(), MrTooleyError> {
        let a_id = self.get(a)?;
        let b_id = self.get(b)?;
        let (a_type, b_type) = (self.node(a_id)?.ptype(), self.node(b_id)?.ptype());
        let (source, dest) = match (a_type, b_type) {
            (PType::Dict, _) | (_, PType::Dict) => {
                return Err(MrTooleyError::Property("property dicts cannot be linked".into()));
            }
            (PType::Input, t) if t.is_source() => (b_id, a_id),
            (t, PType::Input) if t.is_source() => (a_id, b_id),
            (a_type, b_type) => {
                return Err(MrTooleyError::Property(format!(
                    "cannot link a {a_type} with a {b_type}"
                )));
            }
        };
        self.connect(source, dest, now)?;
        let source_path = self.node(source)?.path.clone();
        let dest_path = self.node(dest)?.path.clone();
        debug!(source = %source_path, dest = %dest_path, "linked properties");
        self.ops
            .push(SettingOp::Set(setting_key(LINK_NS, &dest_path), Value::Str(source_path)));
        Ok(())
    }

    pub fn unlink(&mut self, path: &str) -> Result<(), MrTooleyError> {
        let id = self.get(path)?;
        let node = self.node(id)?;
        if node.ptype() != PType::Input {
            return Err(MrTooleyError::Property(format!(
                "'{path}' is a {}; only inputs can be unlinked",
                node.ptype()
            )));
        }
        if node.source.is_none() {
            return Ok(());
        }
        let key = setting_key(LINK_NS, &node.path);
        self.detach_source(id);
        self.ops.push(SettingOp::Delete(key));
        Ok(())
    }

    /// Calls a function property unless its cached value is still fresh.
    fn refresh(&mut self, id: PropertyId, now: Instant) -> Result<(), MrTooleyError> {
        let node = self.node_mut(id)?;
        if let (Some(interval), Some(at)) = (node.poll_interval, node.value_time)
            && now < at + interval
        {
            return Ok(());
        }
        let function = node
            .spec
            .function
            .clone()
            .ok_or_else(|| MrTooleyError::Property(format!("'{}' has no closure", node.path)))?;
        node.value_time = Some(now);
        let value = function()?;
        self.store(id, value, now)
    }

    /// Current value. Function properties are refreshed first.
    pub fn read(&mut self, path: &str, now: Instant) -> Result<Value, MrTooleyError> {
        let id = self.get(path)?;
        match self.node(id)?.ptype() {
            PType::Dict => return Err(MrTooleyError::Property(format!("'{path}' is a dict"))),
            PType::Function => {
                if let Err(e) = self.refresh(id, now) {
                    warn!(path, error = %e, "property function failed, keeping cached value");
                }
            }
            PType::Input | PType::Output => {}
        }
        Ok(self.node(id)?.value.clone())
    }

    fn apply_poll_interval(
        &mut self,
        id: PropertyId,
        interval: Option<Duration>,
    ) -> Result<(), MrTooleyError> {
        let interval = interval.filter(|d| !d.is_zero());
        let node = self.node_mut(id)?;
        let limits = node.spec.poll.ok_or_else(|| {
            MrTooleyError::Property(format!("'{}' is not a function property", node.path))
        })?;
        if let Some(d) = interval
            && d < limits.min
        {
            return Err(MrTooleyError::Property(format!(
                "poll interval {d:?} for '{}' is below the minimum {:?}",
                node.path, limits.min
            )));
        }
        node.poll_interval = interval;
        let key = setting_key(INTERVAL_NS, &node.path);
        self.ops.push(if interval == limits.default {
            SettingOp::Delete(key)
        } else {
            SettingOp::Set(key, interval.map_or(Value::Null, |d| Value::Float(d.as_secs_f64())))
        });
        // Disabled polling still gets one read from the poller.
        if !self.poll_service.contains(&id) {
            self.poll_service.push(id);
        }
        Ok(())
    }

    /// `None` or zero disables polling.
    pub fn set_poll_interval(
        &mut self,
        path: &str,
        interval: Option<Duration>,
    ) -> Result<(), MrTooleyError> {
        let id = self.get(path)?;
        self.apply_poll_interval(id, interval)
    }

    pub fn set_float_precision(&mut self, path: &str, digits: u32) -> Result<(), MrTooleyError> {
        let id = self.get(path)?;
        let node = self.node_mut(id)?;
        if node.spec.datatype != DataType::Float {
            return Err(MrTooleyError::Property(format!(
                "'{path}' is a {} property; precision applies to floats",
                node.spec.datatype
            )));
        }
        if digits > MAX_FLOAT_PRECISION {
            return Err(MrTooleyError::Property(format!(
                "precision {digits} for '{path}' is above the maximum {MAX_FLOAT_PRECISION}"
            )));
        }
        node.float_precision = digits;
        let key = setting_key(FLOAT_PREC_NS, &node.path);
        let op = if digits == node.spec.float_precision {
            SettingOp::Delete(key)
        } else {
            SettingOp::Set(key, Value::Int(i64::from(digits)))
        };
        self.ops.push(op);
        Ok(())
    }

    /// Properties that still need their settings read, in creation order.
    pub(crate) fn unloaded(&self) -> Vec<(PropertyId, String)> {
        self.nodes
            .iter()
            .filter(|(_, n)| !n.loaded)
            .map(|(id, n)| (*id, n.path.clone()))
            .collect()
    }

    pub(crate) fn needs_float_precision(&self, id: PropertyId) -> bool {
        self.nodes
            .get(&id)
            .is_some_and(|n| n.spec.datatype == DataType::Float)
    }

    pub(crate) fn mark_loaded(&mut self) {
        self.loaded = true;
    }

    /// Applies settings read from storage and marks the property loaded.
    pub(crate) fn apply_loaded(&mut self, id: PropertyId, stored: StoredSettings) -> Result<(), MrTooleyError> {
        let mut ops = Vec::new();
        let mut events = Vec::new();
        let node = self.node_mut(id)?;
        node.loaded = true;
        let path = node.path.clone();
        let ptype = node.ptype();

        if node.spec.datatype == DataType::Float
            && let Some(raw) = stored.float_precision
        {
            match raw
                .as_i64()
                .and_then(|p| u32::try_from(p).ok())
                .filter(|p| *p <= MAX_FLOAT_PRECISION)
            {
                Some(p) => {
                    node.float_precision = p;
                    if p == node.spec.float_precision {
                        ops.push(SettingOp::Delete(setting_key(FLOAT_PREC_NS, &path)));
                    }
                }
                None => {
                    warn!(path = %path, value = ?raw, "ignoring invalid float precision");
                    ops.push(SettingOp::Delete(setting_key(FLOAT_PREC_NS, &path)));
                }
            }
        }

        if matches!(ptype, PType::Input | PType::Output)
            && node.spec.persistent
            && let Some(raw) = stored.value
        {
            match coerce(&node.spec, node.float_precision, raw) {
                Ok(value) => {
                    events.push(PropertyEvent::Updated(id));
                    if node.value != value {
                        events.push(PropertyEvent::UpdatedAndChanged(id));
                    }
                    node.value = value;
                }
                Err(e) => warn!(path = %path, error = %e, "stored value rejected, using default"),
            }
        }
        let default_interval = node.spec.poll.and_then(|p| p.default);

        self.ops.extend(ops);
        for event in events {
            self.emit(event);
        }
        match ptype {
            PType::Input => {
                if let Some(source) = stored.link {
                    self.pending_links.push((id, source));
                }
            }
            PType::Function => {
                let interval = match stored.interval {
                    None => default_interval,
                    Some(Value::Null) => None,
                    Some(raw) => match raw.as_f64().map(Duration::try_from_secs_f64) {
                        Some(Ok(interval)) => Some(interval),
                        _ => {
                            warn!(path = %path, value = ?raw, "ignoring invalid poll interval");
                            default_interval
                        }
                    },
                };
                if let Err(e) = self.apply_poll_interval(id, interval) {
                    warn!(path = %path, error = %e, "stored poll interval rejected, using default");
                    self.apply_poll_interval(id, default_interval)?;
                }
            }
            PType::Output | PType::Dict => {}
        }
        Ok(())
    }

    /// Connects links read during load. Returns how many were broken.
    pub(crate) fn resolve_links(&mut self, now: Instant) -> usize {
        let mut broken = 0;
        for (dest, source_path) in std::mem::take(&mut self.pending_links) {
            let Some(dest_path) = self.path_of(dest).map(str::to_string) else {
                continue;
            };
            let source = self
                .get(source_path.trim_start_matches(PATH_SEP))
                .ok()
                .filter(|s| self.nodes.get(s).is_some_and(|n| n.ptype().is_source()));
            match source {
                Some(source) => {
                    if let Err(e) = self.connect(source, dest, now) {
                        warn!(dest = %dest_path, error = %e, "could not restore link");
                    }
                }
                None => {
                    warn!(
                        dest = %dest_path,
                        source = %source_path,
                        "linked property does not exist, removing link"
                    );
                    self.ops.push(SettingOp::Delete(setting_key(LINK_NS, &dest_path)));
                    broken += 1;
                }
            }
        }
        broken
    }

    pub(crate) fn take_ops(&mut self) -> Vec<SettingOp> {
        std::mem::take(&mut self.ops)
    }

    fn saved_entry(&self, id: PropertyId) -> Option<(String, Value)> {
        self.nodes
            .get(&id)
            .map(|n| (setting_key(VALUES_NS, &n.path), n.value.clone()))
    }

    /// Values whose save deadline has passed.
    pub(crate) fn take_due_saves(&mut self, now: Instant) -> Vec<(String, Value)> {
        let due: Vec<PropertyId> = self
            .saves
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(id, _)| *id)
            .collect();
        let mut out = Vec::with_capacity(due.len());
        for id in due {
            self.saves.remove(&id);
            out.extend(self.saved_entry(id));
        }
        out
    }

    pub(crate) fn take_all_saves(&mut self) -> Vec<(String, Value)> {
        let all = std::mem::take(&mut self.saves);
        all.into_keys().filter_map(|id| self.saved_entry(id)).collect()
    }

    pub fn pending_saves(&self) -> usize {
        self.saves.len()
    }

    /// Polls the next function in round-robin order. Functions without a
    /// poll interval leave the rotation after one read, failing ones after
    /// their first error.
    pub fn poll_next(&mut self, now: Instant) -> Option<PropertyId> {
        if self.poll_service.is_empty() {
            return None;
        }
        if self.poll_pointer >= self.poll_service.len() {
            self.poll_pointer = 0;
        }
        let id = self.poll_service[self.poll_pointer];
        let Some(node) = self.nodes.get(&id) else {
            self.poll_service.remove(self.poll_pointer);
            return None;
        };
        if !node.loaded {
            self.poll_pointer += 1;
            return None;
        }
        match self.refresh(id, now) {
            Ok(()) => {
                if self.nodes.get(&id).is_some_and(|n| n.poll_interval.is_none()) {
                    self.poll_service.remove(self.poll_pointer);
                } else {
                    self.poll_pointer += 1;
                }
            }
            Err(e) => {
                warn!(path = self.path_of(id).unwrap_or_default(), error = %e, "polling stopped for failing property");
                self.poll_service.remove(self.poll_pointer);
            }
        }
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI64, Ordering};

    use super::*;
    use crate::types::{DEFAULT_FLOAT_PRECISION, ValuePool};

    fn loaded_tree() -> PropertyTree {
        let mut tree = PropertyTree::new();
        tree.add("", "dev", PropertySpec::dict()).unwrap();
        tree.add("dev", "gain", PropertySpec::input(DataType::Float, 1.0)).unwrap();
        tree.add("dev", "count", PropertySpec::input(DataType::Integer, 0)).unwrap();
        tree.add("dev", "level", PropertySpec::output(DataType::Float, 0.0)).unwrap();
        tree.add(
            "dev",
            "mode",
            PropertySpec::input(DataType::Enum, 0).pool(ValuePool::new([(0, "auto"), (1, "manual")])),
        )
        .unwrap();
        load_all(&mut tree);
        tree
    }

    fn load_all(tree: &mut PropertyTree) {
        for (id, _) in tree.unloaded() {
            tree.apply_loaded(id, StoredSettings::default()).unwrap();
        }
        tree.mark_loaded();
        tree.resolve_links(Instant::now());
    }

    #[test]
    fn add_validates_keys_and_duplicates() {
        let mut tree = PropertyTree::new();
        assert!(tree.add("", "bad key", PropertySpec::dict()).is_err());
        tree.add("", "ok", PropertySpec::dict()).unwrap();
        let err = tree.add("", "ok", PropertySpec::dict()).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        tree.add("ok", "x", PropertySpec::input(DataType::Bool, false)).unwrap();
        assert!(tree.add("ok/x", "y", PropertySpec::dict()).is_err());
    }

    #[test]
    fn lookup_and_paths() {
        let tree = loaded_tree();
        let dev = tree.get("dev").unwrap();
        let gain = tree.get("dev/gain").unwrap();
        assert_eq!(tree.get_from(dev, "gain").unwrap(), gain);
        assert_eq!(tree.get_from(dev, "/dev/gain").unwrap(), gain);
        assert!(tree.get_from(dev, "dev/gain").is_err());
        assert_eq!(
            tree.paths(),
            vec!["dev", "dev/count", "dev/gain", "dev/level", "dev/mode"]
        );
    }

    #[test]
    fn coercion_rules() {
        let mut tree = loaded_tree();
        let now = Instant::now();
        tree.set_value("dev/count", Value::Float(2.5), now).unwrap();
        assert_eq!(tree.read("dev/count", now).unwrap(), Value::Int(2));
        tree.set_value("dev/gain", Value::Int(3), now).unwrap();
        assert_eq!(tree.read("dev/gain", now).unwrap(), Value::Float(3.0));
        tree.set_value("dev/gain", Value::Float(1.23456), now).unwrap();
        assert_eq!(tree.read("dev/gain", now).unwrap(), Value::Float(1.23));
        tree.set_value("dev/mode", "manual".into(), now).unwrap();
        assert_eq!(tree.read("dev/mode", now).unwrap(), Value::Int(1));
        assert!(tree.set_value("dev/mode", Value::Int(7), now).is_err());
        assert!(tree.set_value("dev/count", "ten".into(), now).is_err());
    }

    #[test]
    fn ptype_rules_for_set() {
        let mut tree = loaded_tree();
        let now = Instant::now();
        assert!(tree.set_value("dev/level", Value::Float(1.0), now).is_err());
        assert!(tree.set_value("dev", Value::Null, now).is_err());
        tree.set_output("dev/level", Value::Float(0.5), now).unwrap();
        assert!(tree.set_output("dev/gain", Value::Float(0.5), now).is_err());
    }

    #[test]
    fn set_before_load_is_ignored() {
        let mut tree = PropertyTree::new();
        tree.add("", "x", PropertySpec::input(DataType::Integer, 1)).unwrap();
        tree.set_value("x", Value::Int(5), Instant::now()).unwrap();
        assert_eq!(tree.info("x").unwrap().value, Value::Int(1));
        assert_eq!(tree.pending_saves(), 0);
    }

    #[test]
    fn events_fire_on_set() {
        let mut tree = loaded_tree();
        let mut rx = tree.subscribe();
        let id = tree.get("dev/count").unwrap();
        let now = Instant::now();
        tree.set_value("dev/count", Value::Int(4), now).unwrap();
        tree.set_value("dev/count", Value::Int(4), now).unwrap();
        assert_eq!(rx.try_recv().unwrap(), PropertyEvent::Updated(id));
        assert_eq!(rx.try_recv().unwrap(), PropertyEvent::UpdatedAndChanged(id));
        assert_eq!(rx.try_recv().unwrap(), PropertyEvent::Updated(id));
        assert!(rx.try_recv().is_err());

        tree.add("dev", "extra", PropertySpec::dict()).unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            PropertyEvent::DictChanged(Some("dev".into()))
        );
        tree.remove("dev").unwrap();
        assert_eq!(rx.try_recv().unwrap(), PropertyEvent::DictChanged(None));
    }

    #[test]
    fn links_propagate_and_unlink_on_set() {
        let mut tree = loaded_tree();
        let now = Instant::now();
        tree.link("dev/gain", "dev/level", now).unwrap();
        assert_eq!(
            tree.take_ops(),
            vec![SettingOp::Set("linked_to/dev/gain".into(), "dev/level".into())]
        );
        tree.set_output("dev/level", Value::Float(0.75), now).unwrap();
        assert_eq!(tree.read("dev/gain", now).unwrap(), Value::Float(0.75));
        assert_eq!(tree.info("dev/gain").unwrap().linked_to.as_deref(), Some("dev/level"));

        tree.set_value("dev/gain", Value::Float(2.0), now).unwrap();
        assert_eq!(tree.take_ops(), vec![SettingOp::Delete("linked_to/dev/gain".into())]);
        tree.set_output("dev/level", Value::Float(0.1), now).unwrap();
        assert_eq!(tree.read("dev/gain", now).unwrap(), Value::Float(2.0));
    }

    #[test]
    fn link_rejects_bad_pairs() {
        let mut tree = loaded_tree();
        let now = Instant::now();
        assert!(tree.link("dev/gain", "dev/count", now).is_err());
        assert!(tree.link("dev", "dev/gain", now).is_err());
        tree.add("dev", "other", PropertySpec::output(DataType::Float, 0.0)).unwrap();
        assert!(tree.link("dev/level", "dev/other", now).is_err());
        // Unlinking a not linked input is fine, unlinking an output is not.
        tree.unlink("dev/gain").unwrap();
        assert!(tree.take_ops().is_empty());
        assert!(tree.unlink("dev/level").is_err());
    }

    #[test]
    fn function_reads_are_cached_within_interval() {
        let calls = Arc::new(AtomicI64::new(0));
        let counter = calls.clone();
        let mut tree = PropertyTree::new();
        tree.add(
            "",
            "ticks",
            PropertySpec::function(
                DataType::Integer,
                Duration::from_secs(1),
                Some(Duration::from_secs(10)),
                move || Ok(Value::Int(counter.fetch_add(1, Ordering::SeqCst) + 1)),
            ),
        )
        .unwrap();
        load_all(&mut tree);
        let t0 = Instant::now();
        assert_eq!(tree.read("ticks", t0).unwrap(), Value::Int(1));
        assert_eq!(tree.read("ticks", t0 + Duration::from_secs(5)).unwrap(), Value::Int(1));
        assert_eq!(tree.read("ticks", t0 + Duration::from_secs(10)).unwrap(), Value::Int(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failing_function_keeps_cached_value() {
        let fail = Arc::new(AtomicI64::new(0));
        let flag = fail.clone();
        let mut tree = PropertyTree::new();
        tree.add(
            "",
            "f",
            PropertySpec::function(DataType::Integer, Duration::ZERO, None, move || {
                if flag.load(Ordering::SeqCst) == 1 {
                    Err(MrTooleyError::Internal("sensor gone".into()))
                } else {
                    Ok(Value::Int(42))
                }
            }),
        )
        .unwrap();
        load_all(&mut tree);
        let now = Instant::now();
        assert_eq!(tree.read("f", now).unwrap(), Value::Int(42));
        fail.store(1, Ordering::SeqCst);
        assert_eq!(tree.read("f", now).unwrap(), Value::Int(42));
    }

    #[test]
    fn poll_interval_rules() {
        let mut tree = PropertyTree::new();
        tree.add(
            "",
            "f",
            PropertySpec::function(
                DataType::Integer,
                Duration::from_secs(2),
                Some(Duration::from_secs(5)),
                || Ok(Value::Int(1)),
            ),
        )
        .unwrap();
        load_all(&mut tree);
        tree.take_ops();

        assert!(tree.set_poll_interval("f", Some(Duration::from_secs(1))).is_err());
        tree.set_poll_interval("f", Some(Duration::from_secs(3))).unwrap();
        assert_eq!(
            tree.take_ops(),
            vec![SettingOp::Set("interval/f".into(), Value::Float(3.0))]
        );
        tree.set_poll_interval("f", Some(Duration::from_secs(5))).unwrap();
        assert_eq!(tree.take_ops(), vec![SettingOp::Delete("interval/f".into())]);
        tree.set_poll_interval("f", Some(Duration::ZERO)).unwrap();
        assert_eq!(tree.info("f").unwrap().poll_interval, None);
        assert_eq!(tree.take_ops(), vec![SettingOp::Set("interval/f".into(), Value::Null)]);

        // Disabled polling still reads once, then leaves the rotation.
        let id = tree.get("f").unwrap();
        assert_eq!(tree.poll_next(Instant::now()), Some(id));
        assert_eq!(tree.poll_next(Instant::now()), None);
    }

    #[test]
    fn poller_round_robins() {
        let mut tree = PropertyTree::new();
        for key in ["a", "b"] {
            tree.add(
                "",
                key,
                PropertySpec::function(
                    DataType::Bool,
                    Duration::ZERO,
                    Some(Duration::from_secs(1)),
                    || Ok(true.into()),
                ),
            )
            .unwrap();
        }
        load_all(&mut tree);
        let (a, b) = (tree.get("a").unwrap(), tree.get("b").unwrap());
        let now = Instant::now();
        assert_eq!(tree.poll_next(now), Some(a));
        assert_eq!(tree.poll_next(now), Some(b));
        assert_eq!(tree.poll_next(now), Some(a));
    }

    #[test]
    fn save_deadlines() {
        let mut tree = PropertyTree::with_save_delay(Duration::from_secs(5));
        tree.add("", "p", PropertySpec::input(DataType::Integer, 0)).unwrap();
        tree.add("", "t", PropertySpec::input(DataType::Integer, 0).transient()).unwrap();
        load_all(&mut tree);
        let t0 = Instant::now();
        tree.set_value("p", Value::Int(1), t0).unwrap();
        tree.set_value("t", Value::Int(1), t0).unwrap();
        assert_eq!(tree.pending_saves(), 1);
        assert!(tree.take_due_saves(t0 + Duration::from_secs(4)).is_empty());
        assert_eq!(
            tree.take_due_saves(t0 + Duration::from_secs(5)),
            vec![("values/p".to_string(), Value::Int(1))]
        );
        assert_eq!(tree.pending_saves(), 0);
    }

    #[test]
    fn stored_settings_are_applied() {
        let mut tree = PropertyTree::new();
        let gain = tree.add("", "gain", PropertySpec::input(DataType::Float, 1.0)).unwrap();
        tree.add("", "src", PropertySpec::output(DataType::Float, 0.5)).unwrap();
        tree.apply_loaded(
            gain,
            StoredSettings {
                value: Some(Value::Float(3.14159)),
                link: Some("src".into()),
                float_precision: Some(Value::Int(2)),
                interval: None,
            },
        )
        .unwrap();
        assert_eq!(
            tree.take_ops(),
            vec![SettingOp::Delete("float_prec/gain".into())]
        );
        assert_eq!(tree.info("gain").unwrap().value, Value::Float(3.14));
        load_all(&mut tree);
        assert_eq!(tree.info("gain").unwrap().linked_to.as_deref(), Some("src"));
        assert_eq!(tree.info("gain").unwrap().value, Value::Float(0.5));
    }

    #[tracing_test::traced_test]
    #[test]
    fn out_of_range_interval_falls_back_to_default() {
        let mut tree = PropertyTree::new();
        let f = tree
            .add(
                "",
                "f",
                PropertySpec::function(
                    DataType::Integer,
                    Duration::from_secs(1),
                    Some(Duration::from_secs(5)),
                    || Ok(Value::Int(1)),
                ),
            )
            .unwrap();
        tree.apply_loaded(
            f,
            StoredSettings {
                interval: Some(Value::Float(1e300)),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(tree.info("f").unwrap().poll_interval, Some(Duration::from_secs(5)));
        assert!(logs_contain("ignoring invalid poll interval"));
    }

    #[test]
    fn precision_is_bounded() {
        let mut tree = PropertyTree::new();
        let gain = tree.add("", "gain", PropertySpec::input(DataType::Float, 1.0)).unwrap();
        tree.apply_loaded(
            gain,
            StoredSettings {
                float_precision: Some(Value::Int(400)),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(tree.info("gain").unwrap().float_precision, Some(DEFAULT_FLOAT_PRECISION));
        assert!(tree.set_float_precision("gain", u32::MAX).is_err());
        tree.set_float_precision("gain", MAX_FLOAT_PRECISION).unwrap();
        tree.set_value("gain", Value::Float(0.1), Instant::now()).unwrap();
        assert_eq!(tree.info("gain").unwrap().value, Value::Float(0.1));

        let spec = PropertySpec::input(DataType::Float, 0.0).float_precision(309);
        assert!(tree.add("", "wide", spec).is_err());
    }

    #[tracing_test::traced_test]
    #[test]
    fn broken_links_are_dropped() {
        let mut tree = PropertyTree::new();
        let x = tree.add("", "x", PropertySpec::input(DataType::Integer, 0)).unwrap();
        tree.apply_loaded(
            x,
            StoredSettings {
                link: Some("gone/away".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(tree.resolve_links(Instant::now()), 1);
        assert_eq!(tree.take_ops(), vec![SettingOp::Delete("linked_to/x".into())]);
        assert!(logs_contain("linked property does not exist"));
    }

    #[test]
    fn remove_drops_links_and_pending_saves() {
        let mut tree = loaded_tree();
        let now = Instant::now();
        tree.link("dev/level", "dev/gain", now).unwrap();
        tree.set_value("dev/count", Value::Int(9), now).unwrap();
        tree.add("", "keep", PropertySpec::input(DataType::Float, 0.0)).unwrap();
        tree.remove("dev").unwrap();
        assert!(tree.get("dev/gain").is_err());
        assert_eq!(tree.paths(), vec!["keep"]);
        assert_eq!(tree.pending_saves(), 0);
        assert!(tree.remove("").is_err());
    }
}
