use thiserror::Error;

use super::schema::FieldType;

/// Layout violations raised by the schema codec
///
/// Layout errors mean producer and consumer disagree about an account's
/// binary shape. They are never retryable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("{schema}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        schema: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{schema}: missing field `{field}`")]
    MissingField { schema: &'static str, field: String },

    #[error("{schema}: field `{field}` is not declared by the schema")]
    UnknownField { schema: &'static str, field: String },

    #[error("{schema}: field `{field}` expects {expected}, got {actual}")]
    TypeMismatch {
        schema: &'static str,
        field: String,
        expected: FieldType,
        actual: &'static str,
    },

    #[error("{schema}: field `{field}` must be {expected} bytes, got {actual}")]
    WidthMismatch {
        schema: &'static str,
        field: String,
        expected: usize,
        actual: usize,
    },

    /// Payload bytes that do not start with a known discriminant
    #[error("{schema}: unknown discriminant {discriminant}")]
    UnknownDiscriminant { schema: &'static str, discriminant: u8 },

    #[error("{schema}: empty payload")]
    EmptyPayload { schema: &'static str },
}

impl LayoutError {
    pub(crate) fn type_mismatch(
        schema: &'static str,
        field: &str,
        expected: FieldType,
        actual: &'static str,
    ) -> Self {
        Self::TypeMismatch {
            schema,
            field: field.to_string(),
            expected,
            actual,
        }
    }

    /// Name of the schema the error was raised for
    pub fn schema(&self) -> &'static str {
        match self {
            Self::SizeMismatch { schema, .. }
            | Self::MissingField { schema, .. }
            | Self::UnknownField { schema, .. }
            | Self::TypeMismatch { schema, .. }
            | Self::WidthMismatch { schema, .. }
            | Self::UnknownDiscriminant { schema, .. }
            | Self::EmptyPayload { schema } => schema,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LayoutError::SizeMismatch {
            schema: "escrow",
            expected: 105,
            actual: 104,
        };
        assert_eq!(err.to_string(), "escrow: expected 105 bytes, got 104");
        assert_eq!(err.schema(), "escrow");

        let err = LayoutError::type_mismatch("counter", "counter", FieldType::U32, "u64");
        assert_eq!(err.to_string(), "counter: field `counter` expects u32, got u64");
    }
}
