use serde_json::Value;

use crate::{
    extract::{ParamKind, ParamValue, json_type_name},
    upload::{self, UploadError, UploadedFile, UploadedImage},
};

#[derive(Debug, thiserror::Error)]
pub enum CoerceError {
    #[error("cannot convert {value} ({from}) to {to}")]
    Convert {
        value: String,
        from: &'static str,
        to: ParamKind,
    },
    #[error(transparent)]
    Upload(#[from] UploadError),
}

fn convert_error(value: &Value, to: ParamKind) -> CoerceError {
    let mut value_text = value.to_string();
    if value_text.len() > 60 {
        let cut = value_text
            .char_indices()
            .nth(57)
            .map_or(value_text.len(), |(index, _)| index);
        value_text.truncate(cut);
        value_text.push_str("...");
    }
    CoerceError::Convert {
        value: value_text,
        from: if upload::is_upload(value) {
            "file upload"
        } else {
            json_type_name(value)
        },
        to,
    }
}

/// One-element lists are how some transports deliver single form values.
pub fn flatten_singleton(value: Value) -> Value {
    match value {
        Value::Array(mut items) if items.len() == 1 => items.remove(0),
        other => other,
    }
}

const TRUE_WORDS: &[&str] = &["true", "on", "1", "yes"];
const FALSE_WORDS: &[&str] = &["false", "off", "0", "", "no"];

/// Coerce a raw request value to the declared kind of its parameter.
pub fn coerce(value: Value, kind: ParamKind) -> Result<ParamValue, CoerceError> {
    if upload::is_upload(&value) {
        return coerce_upload(&value, kind);
    }

    let coerced = match kind {
        ParamKind::Json => value,
        ParamKind::Text => match value {
            Value::String(_) => value,
            Value::Null => return Err(convert_error(&value, kind)),
            other => Value::String(other.to_string()),
        },
        ParamKind::Integer => coerce_integer(&value).ok_or_else(|| convert_error(&value, kind))?,
        ParamKind::Float => coerce_float(&value).ok_or_else(|| convert_error(&value, kind))?,
        ParamKind::Boolean => coerce_bool(&value).ok_or_else(|| convert_error(&value, kind))?,
        ParamKind::Bytes => {
            return match value {
                Value::String(text) => Ok(ParamValue::Bytes(text.into_bytes())),
                Value::Array(items) => items
                    .iter()
                    .map(|item| item.as_u64().and_then(|byte| u8::try_from(byte).ok()))
                    .collect::<Option<Vec<u8>>>()
                    .map(ParamValue::Bytes)
                    .ok_or_else(|| convert_error(&Value::Array(items.clone()), kind)),
                other => Err(convert_error(&other, kind)),
            };
        }
        ParamKind::State | ParamKind::File | ParamKind::Image => {
            return Err(convert_error(&value, kind));
        }
    };

    Ok(ParamValue::Json(coerced))
}

fn coerce_upload(envelope: &Value, kind: ParamKind) -> Result<ParamValue, CoerceError> {
    let file = UploadedFile::from_envelope(envelope)?;
    Ok(match kind {
        ParamKind::Bytes => ParamValue::Bytes(file.content),
        ParamKind::Text => ParamValue::Json(Value::String(file.into_text()?)),
        ParamKind::File => ParamValue::File(file),
        ParamKind::Json => ParamValue::Json(file.to_json()),
        ParamKind::Image => ParamValue::Image(UploadedImage::open(file)?),
        ParamKind::State | ParamKind::Integer | ParamKind::Float | ParamKind::Boolean => {
            return Err(convert_error(envelope, kind));
        }
    })
}

fn coerce_integer(value: &Value) -> Option<Value> {
    match value {
        Value::Number(number) if number.is_i64() || number.is_u64() => Some(value.clone()),
        Value::Number(number) => number
            .as_f64()
            .filter(|float| float.fract() == 0.0)
            .map(|float| Value::from(float as i64)),
        Value::Bool(flag) => Some(Value::from(i64::from(*flag))),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<i64>()
                .map(Value::from)
                .or_else(|_| text.parse::<u64>().map(Value::from))
                .ok()
        }
        _ => None,
    }
}

fn coerce_float(value: &Value) -> Option<Value> {
    let float = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    serde_json::Number::from_f64(float).map(Value::Number)
}

fn coerce_bool(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(_) => Some(value.clone()),
        Value::Null => Some(Value::Bool(false)),
        Value::Number(number) => number.as_f64().map(|float| Value::Bool(float != 0.0)),
        Value::String(text) => {
            let text = text.trim().to_lowercase();
            if TRUE_WORDS.contains(&text.as_str()) {
                Some(Value::Bool(true))
            } else if FALSE_WORDS.contains(&text.as_str()) {
                Some(Value::Bool(false))
            } else {
                None
            }
        }
        _ => None,
    }
}
