// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! MAC address datatype.

use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer as SerdeSerializer};

use super::Serializable;
use crate::error::MrTooleyError;

/// A 6-byte MAC address with an optional vendor name.
///
/// The vendor is informational; equality and hashing only look at the bytes.
#[derive(Debug, Clone)]
pub struct MacAddress {
    bytes: [u8; 6],
    vendor: Option<String>,
}

impl MacAddress {
    pub fn from_bytes_array(bytes: [u8; 6]) -> Self {
        Self {
            bytes,
            vendor: None,
        }
    }

    /// Parses `D8:44:89:C9:B7:C8`, `d8-44-89-c9-b7-c8` or `d84489c9b7c8`.
    pub fn parse(input: &str) -> Result<Self, MrTooleyError> {
        let hex: String = input
            .trim()
            .to_uppercase()
            .chars()
            .filter(|c| *c != ':' && *c != '-')
            .collect();
        if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(MrTooleyError::Parse(
                "MAC address is required to consist of 12 hex characters".to_string(),
            ));
        }
        let mut bytes = [0u8; 6];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|e| MrTooleyError::Parse(format!("invalid MAC address {input}: {e}")))?;
        }
        Ok(Self::from_bytes_array(bytes))
    }

    /// Builds from a byte slice of exactly 6 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, MrTooleyError> {
        let arr: [u8; 6] = bytes.try_into().map_err(|_| {
            MrTooleyError::Parse("MAC address in bytes requires size of 6".to_string())
        })?;
        Ok(Self::from_bytes_array(arr))
    }

    #[must_use]
    pub fn with_vendor(mut self, vendor: Option<String>) -> Self {
        self.vendor = vendor;
        self
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.bytes
    }

    pub fn vendor(&self) -> Option<&str> {
        self.vendor.as_deref()
    }

    /// Uppercase hex pairs joined by `sep`.
    pub fn as_human(&self, sep: &str) -> String {
        self.bytes
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(sep)
    }
}

impl PartialEq for MacAddress {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for MacAddress {}

impl PartialEq<str> for MacAddress {
    fn eq(&self, other: &str) -> bool {
        MacAddress::parse(other).is_ok_and(|m| m.bytes == self.bytes)
    }
}

impl PartialEq<&str> for MacAddress {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl Hash for MacAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl std::fmt::Display for MacAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_human(":"))
    }
}

impl FromStr for MacAddress {
    type Err = MrTooleyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serializable for MacAddress {
    const TYPE_NAME: &'static str = "mrtooley.network.MACAddress";

    fn to_bytes(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, MrTooleyError> {
        Self::from_slice(bytes)
    }
}

impl Serialize for MacAddress {
    fn serialize<S: SerdeSerializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_human(":"))
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        MacAddress::parse(&s).map_err(serde::de::Error::custom)
    }
}
