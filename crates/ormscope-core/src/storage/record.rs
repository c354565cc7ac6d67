//! Row encoding for the reference store.

use ormscope_proto::Value;
use rkyv::{Archive, Deserialize, Serialize};

use crate::error::StoreError;

/// One stored column.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct StoredField {
    /// Column name.
    pub name: String,
    /// Column value.
    pub value: Value,
}

/// A stored row, archived with rkyv.
#[derive(Debug, Clone, PartialEq, Default, Archive, Serialize, Deserialize)]
pub struct StoredRow {
    /// Columns in declaration order.
    pub fields: Vec<StoredField>,
}

impl StoredRow {
    /// Build a row from `(name, value)` pairs.
    pub fn from_fields(fields: &[(String, Value)]) -> Self {
        Self {
            fields: fields
                .iter()
                .map(|(name, value)| StoredField {
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect(),
        }
    }

    /// Convert into `(name, value)` pairs.
    pub fn into_fields(self) -> Vec<(String, Value)> {
        self.fields.into_iter().map(|f| (f.name, f.value)).collect()
    }

    /// Serialize the row to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoreError> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Deserialize a row from bytes using rkyv.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        // sled hands out unaligned buffers.
        let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(bytes.len());
        aligned.extend_from_slice(bytes);
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned)
            .map_err(|e| StoreError::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_roundtrip() {
        let fields = vec![
            ("id".to_string(), Value::Int64(1)),
            ("username".to_string(), Value::from("escape'd")),
            ("companyId".to_string(), Value::Null),
        ];
        let bytes = StoredRow::from_fields(&fields).to_bytes().unwrap();
        let decoded = StoredRow::from_bytes(&bytes).unwrap();

        assert_eq!(decoded.into_fields(), fields);
    }

    #[test]
    fn test_garbage_rejected() {
        let err = StoredRow::from_bytes(&[0xff, 0x01, 0x02]).unwrap_err();
        assert!(matches!(err, StoreError::Deserialization(_)));
    }
}
