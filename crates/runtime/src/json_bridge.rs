//! Conversions between plain JSON values and the codec's value graph.
//!
//! Requests declare their serialization format. The `json` format carries
//! arguments as ordinary JSON; these helpers lift them into
//! [`PayloadValue`]s for dispatch and lower results back down.

use serde_json::{Map, Number, Value};

use flash_codec::PayloadValue;
use flash_domain::{Error, Result};

/// JSON → value graph. Lossless for everything JSON can express.
pub fn from_json(value: &Value) -> PayloadValue {
    match value {
        Value::Null => PayloadValue::Null,
        Value::Bool(b) => PayloadValue::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                PayloadValue::Int(i)
            } else {
                PayloadValue::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => PayloadValue::Str(s.clone()),
        Value::Array(items) => PayloadValue::List(items.iter().map(from_json).collect()),
        Value::Object(map) => PayloadValue::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), from_json(v)))
                .collect(),
        ),
    }
}

/// Value graph → JSON. Fails for values JSON cannot carry (bytes, streams,
/// functions).
pub fn to_json(value: &PayloadValue) -> Result<Value> {
    Ok(match value {
        PayloadValue::Null => Value::Null,
        PayloadValue::Bool(b) => Value::Bool(*b),
        PayloadValue::Int(i) => Value::Number((*i).into()),
        PayloadValue::Float(f) => Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        PayloadValue::Str(s) => Value::String(s.clone()),
        PayloadValue::List(items) => {
            Value::Array(items.iter().map(to_json).collect::<Result<_>>()?)
        }
        PayloadValue::F64Array(items) => Value::Array(
            items
                .iter()
                .map(|f| {
                    Number::from_f64(*f)
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                })
                .collect(),
        ),
        PayloadValue::Map(entries) => {
            let mut map = Map::new();
            for (k, v) in entries {
                map.insert(k.clone(), to_json(v)?);
            }
            Value::Object(map)
        }
        PayloadValue::Record { type_name, fields } => {
            let mut map = Map::new();
            for (k, v) in fields {
                map.insert(k.clone(), to_json(v)?);
            }
            let _ = type_name;
            Value::Object(map)
        }
        PayloadValue::Function { name, .. } => {
            return Err(Error::Serialization(format!(
                "function '{name}' has no JSON form"
            )))
        }
        PayloadValue::Bytes(_) | PayloadValue::Stream { .. } => {
            return Err(Error::Serialization(
                "value has no JSON form; use the binary serialization format".into(),
            ))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_round_trip() {
        let original = json!({"a": 1, "b": [true, null, "x"], "c": 2.5});
        let lifted = from_json(&original);
        assert_eq!(to_json(&lifted).unwrap(), original);
    }

    #[test]
    fn bytes_have_no_json_form() {
        assert!(to_json(&PayloadValue::Bytes(vec![1, 2])).is_err());
    }

    #[test]
    fn integers_stay_integers() {
        match from_json(&json!(7)) {
            PayloadValue::Int(7) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }
}
