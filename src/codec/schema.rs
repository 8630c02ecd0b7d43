//! Fixed-width account schemas
//!
//! An [`AccountSchema`] is an ordered list of named fields with fixed widths.
//! Encoding concatenates the fields in declaration order (integers
//! little-endian, byte arrays verbatim), so the encoded size is known before
//! the account is allocated. The layout is not self-describing: producer and
//! consumer must agree on the schema out of band, exactly as an on-chain
//! program and an off-chain reader do.

use std::collections::BTreeMap;
use std::fmt;

use super::errors::LayoutError;

/// Width class of a single field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    U8,
    U32,
    U64,
    /// 32-byte array (addresses, hashes)
    Bytes32,
}

impl FieldType {
    /// Encoded width in bytes
    pub const fn width(self) -> usize {
        match self {
            FieldType::U8 => 1,
            FieldType::U32 => 4,
            FieldType::U64 => 8,
            FieldType::Bytes32 => 32,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::U8 => "u8",
            FieldType::U32 => "u32",
            FieldType::U64 => "u64",
            FieldType::Bytes32 => "[u8; 32]",
        };
        f.write_str(name)
    }
}

/// A named field in a schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub ty: FieldType,
}

impl FieldDef {
    pub const fn new(name: &'static str, ty: FieldType) -> Self {
        Self { name, ty }
    }
}

/// A decoded field value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    U8(u8),
    U32(u32),
    U64(u64),
    Bytes(Vec<u8>),
}

impl FieldValue {
    fn type_name(&self) -> &'static str {
        match self {
            FieldValue::U8(_) => "u8",
            FieldValue::U32(_) => "u32",
            FieldValue::U64(_) => "u64",
            FieldValue::Bytes(_) => "bytes",
        }
    }
}

/// Field values keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldValues {
    values: BTreeMap<String, FieldValue>,
}

impl FieldValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) -> Option<FieldValue> {
        self.values.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    fn require(&self, schema: &'static str, name: &str) -> Result<&FieldValue, LayoutError> {
        self.values.get(name).ok_or_else(|| LayoutError::MissingField {
            schema,
            field: name.to_string(),
        })
    }

    pub fn u8(&self, schema: &'static str, name: &str) -> Result<u8, LayoutError> {
        match self.require(schema, name)? {
            FieldValue::U8(v) => Ok(*v),
            other => Err(LayoutError::type_mismatch(schema, name, FieldType::U8, other.type_name())),
        }
    }

    pub fn u32(&self, schema: &'static str, name: &str) -> Result<u32, LayoutError> {
        match self.require(schema, name)? {
            FieldValue::U32(v) => Ok(*v),
            other => Err(LayoutError::type_mismatch(schema, name, FieldType::U32, other.type_name())),
        }
    }

    pub fn u64(&self, schema: &'static str, name: &str) -> Result<u64, LayoutError> {
        match self.require(schema, name)? {
            FieldValue::U64(v) => Ok(*v),
            other => Err(LayoutError::type_mismatch(schema, name, FieldType::U64, other.type_name())),
        }
    }

    pub fn bytes32(&self, schema: &'static str, name: &str) -> Result<[u8; 32], LayoutError> {
        match self.require(schema, name)? {
            FieldValue::Bytes(bytes) => {
                <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| LayoutError::WidthMismatch {
                    schema,
                    field: name.to_string(),
                    expected: 32,
                    actual: bytes.len(),
                })
            }
            other => Err(LayoutError::type_mismatch(schema, name, FieldType::Bytes32, other.type_name())),
        }
    }
}

/// Ordered, fixed-width layout for one account kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountSchema {
    name: &'static str,
    fields: &'static [FieldDef],
}

impl AccountSchema {
    pub const fn new(name: &'static str, fields: &'static [FieldDef]) -> Self {
        Self { name, fields }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn fields(&self) -> &'static [FieldDef] {
        self.fields
    }

    /// Total encoded size, the sum of all field widths
    pub const fn size(&self) -> usize {
        let mut total = 0;
        let mut i = 0;
        while i < self.fields.len() {
            total += self.fields[i].ty.width();
            i += 1;
        }
        total
    }

    /// Byte offset of a field within the encoded layout
    pub fn offset_of(&self, field: &str) -> Option<usize> {
        let mut offset = 0;
        for def in self.fields {
            if def.name == field {
                return Some(offset);
            }
            offset += def.ty.width();
        }
        None
    }

    /// Encode `values` into exactly [`size`](Self::size) bytes
    pub fn encode(&self, values: &FieldValues) -> Result<Vec<u8>, LayoutError> {
        if let Some(unknown) = values
            .names()
            .find(|name| !self.fields.iter().any(|def| def.name == *name))
        {
            return Err(LayoutError::UnknownField {
                schema: self.name,
                field: unknown.to_string(),
            });
        }

        let mut out = Vec::with_capacity(self.size());
        for def in self.fields {
            match def.ty {
                FieldType::U8 => out.push(values.u8(self.name, def.name)?),
                FieldType::U32 => out.extend_from_slice(&values.u32(self.name, def.name)?.to_le_bytes()),
                FieldType::U64 => out.extend_from_slice(&values.u64(self.name, def.name)?.to_le_bytes()),
                FieldType::Bytes32 => out.extend_from_slice(&values.bytes32(self.name, def.name)?),
            }
        }
        debug_assert_eq!(out.len(), self.size());
        Ok(out)
    }

    /// Decode exactly [`size`](Self::size) bytes into field values
    pub fn decode(&self, bytes: &[u8]) -> Result<FieldValues, LayoutError> {
        if bytes.len() != self.size() {
            return Err(LayoutError::SizeMismatch {
                schema: self.name,
                expected: self.size(),
                actual: bytes.len(),
            });
        }

        let mut values = FieldValues::new();
        let mut rest = bytes;
        for def in self.fields {
            let (chunk, tail) = rest.split_at(def.ty.width());
            rest = tail;
            let value = match def.ty {
                FieldType::U8 => FieldValue::U8(chunk[0]),
                FieldType::U32 => FieldValue::U32(u32::from_le_bytes(fixed(chunk))),
                FieldType::U64 => FieldValue::U64(u64::from_le_bytes(fixed(chunk))),
                FieldType::Bytes32 => FieldValue::Bytes(chunk.to_vec()),
            };
            values.insert(def.name, value);
        }
        Ok(values)
    }
}

// Callers slice by the declared width, so the conversion cannot fail
fn fixed<const N: usize>(chunk: &[u8]) -> [u8; N] {
    let mut buf = [0u8; N];
    buf.copy_from_slice(chunk);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAIR: AccountSchema = AccountSchema::new(
        "pair",
        &[
            FieldDef::new("flag", FieldType::U8),
            FieldDef::new("key", FieldType::Bytes32),
            FieldDef::new("amount", FieldType::U64),
        ],
    );

    fn pair_values(amount: u64) -> FieldValues {
        FieldValues::new()
            .with("flag", FieldValue::U8(1))
            .with("key", FieldValue::Bytes(vec![7u8; 32]))
            .with("amount", FieldValue::U64(amount))
    }

    #[test]
    fn test_size_is_sum_of_widths() {
        assert_eq!(PAIR.size(), 1 + 32 + 8);
        assert_eq!(PAIR.offset_of("flag"), Some(0));
        assert_eq!(PAIR.offset_of("key"), Some(1));
        assert_eq!(PAIR.offset_of("amount"), Some(33));
        assert_eq!(PAIR.offset_of("missing"), None);
    }

    #[test]
    fn test_encode_layout_is_little_endian_in_declaration_order() {
        let bytes = PAIR.encode(&pair_values(0x0102_0304_0506_0708)).unwrap();
        assert_eq!(bytes.len(), PAIR.size());
        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[1..33], &[7u8; 32]);
        assert_eq!(&bytes[33..], &[8, 7, 6, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_decode_reverses_encode() {
        let values = pair_values(42);
        let bytes = PAIR.encode(&values).unwrap();
        assert_eq!(PAIR.decode(&bytes).unwrap(), values);
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let err = PAIR.decode(&[0u8; 40]).unwrap_err();
        assert!(matches!(
            err,
            LayoutError::SizeMismatch { expected: 41, actual: 40, .. }
        ));
        assert!(PAIR.decode(&[0u8; 42]).is_err());
    }

    #[test]
    fn test_encode_rejects_short_byte_array() {
        let values = pair_values(1).with("key", FieldValue::Bytes(vec![1u8; 31]));
        let err = PAIR.encode(&values).unwrap_err();
        assert!(matches!(
            err,
            LayoutError::WidthMismatch { expected: 32, actual: 31, .. }
        ));
    }

    #[test]
    fn test_encode_rejects_missing_wrong_typed_and_unknown_fields() {
        let missing = FieldValues::new().with("flag", FieldValue::U8(1));
        assert!(matches!(
            PAIR.encode(&missing),
            Err(LayoutError::MissingField { .. })
        ));

        let wrong = pair_values(1).with("amount", FieldValue::U32(1));
        assert!(matches!(
            PAIR.encode(&wrong),
            Err(LayoutError::TypeMismatch { .. })
        ));

        let extra = pair_values(1).with("bogus", FieldValue::U8(0));
        assert!(matches!(
            PAIR.encode(&extra),
            Err(LayoutError::UnknownField { .. })
        ));
    }
}
