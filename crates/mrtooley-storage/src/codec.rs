// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON encoding of stored values.
//!
//! JSON has no byte strings and no custom types, so both are wrapped in a
//! single-key object whose value is the latin-1 reading of the bytes:
//!
//! ```json
//! {"\\BYTES": "\u0001\u0002"}
//! {"\\OBJECT": "mrtooley.network.MACAddress::..."}
//! ```

use mrtooley_core::{MrTooleyError, SerializedObject, Serializer, Value};
use serde_json::{Map, Number, Value as Json};

pub const BYTES_TAG: &str = "\\BYTES";
pub const OBJECT_TAG: &str = "\\OBJECT";

/// Maps each byte to the char with the same code point.
pub fn latin1_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Inverse of [`latin1_encode`]. Fails on chars above U+00FF.
pub fn latin1_decode(text: &str) -> Result<Vec<u8>, MrTooleyError> {
    text.chars()
        .map(|c| {
            u8::try_from(u32::from(c))
                .map_err(|_| MrTooleyError::Parse(format!("char {c:?} is not latin-1")))
        })
        .collect()
}

/// Encodes a scalar. Fails on non-finite floats, which have no JSON form.
pub fn encode_value(value: &Value) -> Result<Json, MrTooleyError> {
    Ok(match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::Number((*i).into()),
        Value::Float(f) => Json::Number(encode_float(*f)?),
        Value::Str(s) => Json::String(s.clone()),
        Value::Bytes(b) => tagged(BYTES_TAG, latin1_encode(b)),
        Value::List(items) => {
            Json::Array(items.iter().map(encode_value).collect::<Result<_, _>>()?)
        }
        Value::Object(obj) => tagged(OBJECT_TAG, latin1_encode(&obj.to_packed())),
    })
}

pub fn encode_float(f: f64) -> Result<Number, MrTooleyError> {
    Number::from_f64(f).ok_or_else(|| {
        MrTooleyError::UnsupportedType(format!("float {f} cannot be stored as JSON"))
    })
}

fn tagged(tag: &str, payload: String) -> Json {
    let mut map = Map::with_capacity(1);
    map.insert(tag.to_string(), Json::String(payload));
    Json::Object(map)
}

/// A decoded JSON node: a scalar, or an untagged object that becomes a mapping.
#[derive(Debug)]
pub enum Decoded {
    Value(Value),
    Mapping(Map<String, Json>),
}

/// Decodes one JSON node. Objects are checked against `serializer`.
pub fn decode_node(json: Json, serializer: &Serializer) -> Result<Decoded, MrTooleyError> {
    match json {
        Json::Object(map) => match tag_of(&map) {
            Some(_) => decode_tagged(&map, serializer).map(Decoded::Value),
            None => Ok(Decoded::Mapping(map)),
        },
        other => decode_scalar(other, serializer).map(Decoded::Value),
    }
}

/// Decodes a node that must not be a mapping, such as a list element.
pub fn decode_value(json: Json, serializer: &Serializer) -> Result<Value, MrTooleyError> {
    match decode_node(json, serializer)? {
        Decoded::Value(v) => Ok(v),
        Decoded::Mapping(_) => Err(MrTooleyError::UnsupportedType(
            "mapping inside a list".to_string(),
        )),
    }
}

fn tag_of(map: &Map<String, Json>) -> Option<&str> {
    if map.len() != 1 {
        return None;
    }
    map.keys()
        .next()
        .map(String::as_str)
        .filter(|k| *k == BYTES_TAG || *k == OBJECT_TAG)
}

fn decode_tagged(map: &Map<String, Json>, serializer: &Serializer) -> Result<Value, MrTooleyError> {
    let (tag, payload) = map
        .iter()
        .next()
        .ok_or_else(|| MrTooleyError::Internal("empty tagged object".to_string()))?;
    let Json::String(payload) = payload else {
        return Err(MrTooleyError::Parse(format!("{tag} payload must be a string")));
    };
    let bytes = latin1_decode(payload)?;
    if tag == BYTES_TAG {
        return Ok(Value::Bytes(bytes));
    }
    let obj = SerializedObject::from_packed(&bytes)?;
    serializer.check(&obj)?;
    Ok(Value::Object(obj))
}

fn decode_scalar(json: Json, serializer: &Serializer) -> Result<Value, MrTooleyError> {
    Ok(match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().ok_or_else(|| {
                MrTooleyError::UnsupportedType(format!("number {n} out of range"))
            })?),
        },
        Json::String(s) => Value::Str(s),
        Json::Array(items) => Value::List(
            items
                .into_iter()
                .map(|item| decode_value(item, serializer))
                .collect::<Result<_, _>>()?,
        ),
        Json::Object(_) => {
            return Err(MrTooleyError::Internal(
                "objects are decoded by decode_node".to_string(),
            ));
        }
    })
}
