//! Shape-tagged encoding of cached repository results.
//!
//! Every entry records whether it holds a single entity or an ordered sequence. Decoding
//! checks the tag before touching the data, so asking for one row from a multi-row entry
//! fails with [`CacheError::TypeMismatch`] instead of returning partial data.

use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::server::error::cache::CacheError;

/// Shape of a cached entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    One,
    Many,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::One => f.write_str("single entity"),
            Shape::Many => f.write_str("entity sequence"),
        }
    }
}

#[derive(Serialize)]
struct EntryRef<'a, T: ?Sized> {
    shape: Shape,
    data: &'a T,
}

#[derive(Deserialize)]
struct Entry {
    shape: Shape,
    data: serde_json::Value,
}

pub fn encode_one<T: Serialize>(value: &T) -> Result<Vec<u8>, CacheError> {
    encode(Shape::One, value)
}

pub fn encode_many<T: Serialize>(values: &[T]) -> Result<Vec<u8>, CacheError> {
    encode(Shape::Many, values)
}

pub fn decode_one<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CacheError> {
    decode(Shape::One, bytes)
}

pub fn decode_many<T: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<T>, CacheError> {
    decode(Shape::Many, bytes)
}

fn encode<T: Serialize + ?Sized>(shape: Shape, data: &T) -> Result<Vec<u8>, CacheError> {
    serde_json::to_vec(&EntryRef { shape, data }).map_err(|e| CacheError::Encode(e.to_string()))
}

fn decode<T: DeserializeOwned>(expected: Shape, bytes: &[u8]) -> Result<T, CacheError> {
    let entry: Entry =
        serde_json::from_slice(bytes).map_err(|e| CacheError::Decode(e.to_string()))?;

    if entry.shape != expected {
        return Err(CacheError::TypeMismatch {
            expected,
            found: entry.shape,
        });
    }

    serde_json::from_value(entry.data).map_err(|e| CacheError::Decode(e.to_string()))
}
