//! The self-describing value graph the codec carries.

use serde::{Deserialize, Serialize};

/// One call argument (or result).
///
/// The graph covers what user code actually passes across endpoints:
/// primitives, collections, dense numeric arrays, plain records, and
/// functions (which travel as extracted source). [`PayloadValue::Stream`]
/// stands in for values bound to live process state — generators and open
/// file handles — which can be *described* but never encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PayloadValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<PayloadValue>),
    /// Ordered string-keyed map; order is preserved through transport.
    Map(Vec<(String, PayloadValue)>),
    /// Dense numeric array, kept flat for cheap encode of large tensors.
    F64Array(Vec<f64>),
    /// A user-defined type with ordinary fields.
    Record {
        type_name: String,
        fields: Vec<(String, PayloadValue)>,
    },
    /// A function or closure, carried as source.
    Function { name: String, source: String },
    /// A live handle (generator, open file). Present so callers get a
    /// precise error instead of a corrupted payload.
    Stream { descriptor: String },
}

impl PayloadValue {
    /// Depth-first search for the first value that cannot be encoded.
    /// Returns its human-readable description.
    pub fn first_unencodable(&self) -> Option<String> {
        match self {
            PayloadValue::Stream { descriptor } => Some(descriptor.clone()),
            PayloadValue::List(items) => items.iter().find_map(|v| v.first_unencodable()),
            PayloadValue::Map(entries) | PayloadValue::Record { fields: entries, .. } => {
                entries.iter().find_map(|(_, v)| v.first_unencodable())
            }
            _ => None,
        }
    }

    /// Convenience for tests and stub assembly.
    pub fn str(s: impl Into<String>) -> Self {
        PayloadValue::Str(s.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_values_are_encodable() {
        assert!(PayloadValue::Int(7).first_unencodable().is_none());
        assert!(PayloadValue::Str("x".into()).first_unencodable().is_none());
    }

    #[test]
    fn stream_is_found_at_any_depth() {
        let nested = PayloadValue::Record {
            type_name: "Holder".into(),
            fields: vec![(
                "inner".into(),
                PayloadValue::List(vec![PayloadValue::Stream {
                    descriptor: "generator".into(),
                }]),
            )],
        };
        assert_eq!(nested.first_unencodable().as_deref(), Some("generator"));
    }
}
