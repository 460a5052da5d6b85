//! Cached value encoding.
//!
//! Values are JSON. Two sentinels mark results that carry no JSON body:
//! a keyed lookup that found nothing, and a list lookup that returned no
//! rows. Both start with a NUL byte, which valid JSON text never does, so a
//! sentinel cannot collide with a serialized record.

use serde::{de::DeserializeOwned, Serialize};

use super::errors::{CacheError, CacheResult};

/// Cached absence of a record.
pub const ABSENT_MARKER: &[u8] = b"\x00sirius:absent";

/// Cached empty list.
pub const EMPTY_LIST_MARKER: &[u8] = b"\x00sirius:empty-list";

/// Decoded value of a keyed lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordEntry<T> {
    Present(T),
    Absent,
}

pub fn encode_record<T: Serialize>(value: Option<&T>) -> CacheResult<Vec<u8>> {
    match value {
        Some(record) => serde_json::to_vec(record)
            .map_err(|e| CacheError::SerializationError(e.to_string())),
        None => Ok(ABSENT_MARKER.to_vec()),
    }
}

/// Decode a keyed-lookup value. The list sentinel is not valid here.
pub fn decode_record<T: DeserializeOwned>(bytes: &[u8]) -> CacheResult<RecordEntry<T>> {
    if bytes == ABSENT_MARKER {
        return Ok(RecordEntry::Absent);
    }
    if bytes == EMPTY_LIST_MARKER {
        return Err(CacheError::SerializationError(
            "list sentinel stored under a record key".to_string(),
        ));
    }
    serde_json::from_slice(bytes)
        .map(RecordEntry::Present)
        .map_err(|e| CacheError::SerializationError(e.to_string()))
}

pub fn encode_list<T: Serialize>(values: &[T]) -> CacheResult<Vec<u8>> {
    if values.is_empty() {
        return Ok(EMPTY_LIST_MARKER.to_vec());
    }
    serde_json::to_vec(values).map_err(|e| CacheError::SerializationError(e.to_string()))
}

/// Decode a list value. The absence sentinel is not valid here.
pub fn decode_list<T: DeserializeOwned>(bytes: &[u8]) -> CacheResult<Vec<T>> {
    if bytes == EMPTY_LIST_MARKER {
        return Ok(Vec::new());
    }
    if bytes == ABSENT_MARKER {
        return Err(CacheError::SerializationError(
            "absence sentinel stored under a list key".to_string(),
        ));
    }
    serde_json::from_slice(bytes).map_err(|e| CacheError::SerializationError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sirius_core::{Dish, DishCategory, DishId};

    fn dish() -> Dish {
        Dish {
            id: DishId::new(1),
            category: DishCategory::Salad,
            name: "Цезарь".to_string(),
            description: String::new(),
            price: 420.0,
        }
    }

    #[test]
    fn test_sentinels_are_distinct_and_not_json() {
        assert_ne!(ABSENT_MARKER, EMPTY_LIST_MARKER);
        assert!(serde_json::from_slice::<serde_json::Value>(ABSENT_MARKER).is_err());
        assert!(serde_json::from_slice::<serde_json::Value>(EMPTY_LIST_MARKER).is_err());
    }

    #[test]
    fn test_record_encoding() {
        let bytes = encode_record(Some(&dish())).unwrap();
        assert_eq!(decode_record::<Dish>(&bytes).unwrap(), RecordEntry::Present(dish()));

        let absent = encode_record::<Dish>(None).unwrap();
        assert_eq!(absent, ABSENT_MARKER);
        assert_eq!(decode_record::<Dish>(&absent).unwrap(), RecordEntry::Absent);
    }

    #[test]
    fn test_empty_list_uses_its_own_sentinel() {
        let bytes = encode_list::<Dish>(&[]).unwrap();
        assert_eq!(bytes, EMPTY_LIST_MARKER);
        assert!(decode_list::<Dish>(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_wrong_sentinel_is_corrupt() {
        assert!(decode_list::<Dish>(ABSENT_MARKER).is_err());
        assert!(decode_record::<Dish>(EMPTY_LIST_MARKER).is_err());
    }

    #[test]
    fn test_garbage_is_corrupt() {
        assert!(decode_record::<Dish>(b"{not json").is_err());
        assert!(decode_list::<Dish>(b"{\"id\":1}").is_err());
    }
}
