use crate::value::{CodecError, Value};
use serde_json::Value as JsonValue;

// Front matter arrives as JSON. Only strings, numbers and homogeneous
// arrays of those have a tagged representation.
impl TryFrom<&JsonValue> for Value {
    type Error = CodecError;

    fn try_from(json: &JsonValue) -> Result<Self, Self::Error> {
        match json {
            JsonValue::String(s) => Ok(Self::Text(s.clone())),
            JsonValue::Number(n) => Ok(number(n)),
            JsonValue::Array(items) => array(items),
            JsonValue::Null => Err(unsupported("null")),
            JsonValue::Bool(_) => Err(unsupported("bool")),
            JsonValue::Object(_) => Err(unsupported("object")),
        }
    }
}

fn number(n: &serde_json::Number) -> Value {
    if let Some(v) = n.as_i64() {
        Value::I64(v)
    } else if let Some(v) = n.as_u64() {
        Value::U64(v)
    } else {
        Value::F64(n.as_f64().unwrap_or(f64::NAN))
    }
}

fn array(items: &[JsonValue]) -> Result<Value, CodecError> {
    if items.iter().all(JsonValue::is_string) {
        let strings = items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect();

        return Ok(Value::Strings(strings));
    }

    let values = items
        .iter()
        .map(|item| match item {
            JsonValue::Number(n) => Ok(number(n)),
            JsonValue::String(_) => Err(unsupported("mixed array")),
            JsonValue::Array(_) => Err(unsupported("nested array")),
            JsonValue::Null => Err(unsupported("array of null")),
            JsonValue::Bool(_) => Err(unsupported("array of bool")),
            JsonValue::Object(_) => Err(unsupported("array of object")),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let first = values.first().map(Value::tag);
    if values.iter().all(|v| Some(v.tag()) == first) {
        return Ok(Value::List(values));
    }

    // JSON has one number type; a float anywhere widens the whole array
    if items.iter().any(|item| item.as_f64().is_some() && !item.is_i64() && !item.is_u64()) {
        let floats = items
            .iter()
            .filter_map(JsonValue::as_f64)
            .map(Value::F64)
            .collect();

        return Ok(Value::List(floats));
    }

    Err(unsupported("mixed numeric array"))
}

fn unsupported(kind: &str) -> CodecError {
    CodecError::UnsupportedType {
        kind: kind.to_string(),
    }
}
