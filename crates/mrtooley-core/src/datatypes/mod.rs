// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Custom datatypes that can be stored in the key-value tree.
//!
//! A datatype implements [`Serializable`] and is stored as a
//! [`SerializedObject`]: its type name plus its raw bytes. The packed wire form
//! is `type_name::data`. Backends keep objects opaque; the [`Serializer`]
//! registry decides which type names may be loaded back.

pub mod mac;

use std::collections::HashSet;

use crate::error::MrTooleyError;

pub use mac::MacAddress;

/// Separator between type name and payload in the packed form.
pub const CLASS_DATA_SEP: &[u8] = b"::";

/// A datatype with a stable name and a byte representation.
pub trait Serializable: Sized {
    /// Globally unique name recorded next to the payload.
    const TYPE_NAME: &'static str;

    fn to_bytes(&self) -> Vec<u8>;

    fn from_bytes(bytes: &[u8]) -> Result<Self, MrTooleyError>;
}

/// A datatype instance in storable form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SerializedObject {
    pub type_name: String,
    pub data: Vec<u8>,
}

impl SerializedObject {
    /// Packs into `type_name::data`.
    pub fn to_packed(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.type_name.len() + CLASS_DATA_SEP.len() + self.data.len());
        out.extend_from_slice(self.type_name.as_bytes());
        out.extend_from_slice(CLASS_DATA_SEP);
        out.extend_from_slice(&self.data);
        out
    }

    /// Splits a packed object at the first separator.
    pub fn from_packed(packed: &[u8]) -> Result<Self, MrTooleyError> {
        let pos = packed
            .windows(CLASS_DATA_SEP.len())
            .position(|w| w == CLASS_DATA_SEP)
            .ok_or_else(|| MrTooleyError::Serializer("missing type separator".to_string()))?;
        let type_name = std::str::from_utf8(&packed[..pos])
            .map_err(|e| MrTooleyError::Serializer(format!("type name is not utf-8: {e}")))?;
        Ok(Self {
            type_name: type_name.to_string(),
            data: packed[pos + CLASS_DATA_SEP.len()..].to_vec(),
        })
    }
}

/// Registry of datatypes allowed to be decoded from storage.
#[derive(Debug, Clone, Default)]
pub struct Serializer {
    known: HashSet<&'static str>,
}

impl Serializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the datatypes shipped in this crate.
    pub fn with_builtin() -> Self {
        let mut s = Self::new();
        s.register::<MacAddress>();
        s
    }

    pub fn register<T: Serializable>(&mut self) {
        self.known.insert(T::TYPE_NAME);
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.known.contains(type_name)
    }

    pub fn pack<T: Serializable>(value: &T) -> SerializedObject {
        SerializedObject {
            type_name: T::TYPE_NAME.to_string(),
            data: value.to_bytes(),
        }
    }

    /// Decodes an object as `T`, failing if it was stored as a different type.
    pub fn unpack_as<T: Serializable>(obj: &SerializedObject) -> Result<T, MrTooleyError> {
        if obj.type_name != T::TYPE_NAME {
            return Err(MrTooleyError::Serializer(format!(
                "expected {}, found {}",
                T::TYPE_NAME,
                obj.type_name
            )));
        }
        T::from_bytes(&obj.data)
    }

    /// Rejects objects whose datatype is not registered.
    pub fn check(&self, obj: &SerializedObject) -> Result<(), MrTooleyError> {
        if self.is_registered(&obj.type_name) {
            Ok(())
        } else {
            Err(MrTooleyError::ClassNotFound(obj.type_name.clone()))
        }
    }
}
