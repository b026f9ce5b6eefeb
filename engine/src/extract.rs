//! Typed route parameters.
//!
//! Each parameter of a route function implements [`FromParam`]; the router
//! coerces the raw form value to the parameter's [`ParamKind`] and the
//! extractor turns the coerced [`ParamValue`] into the Rust type.

use std::{fmt, ops::Deref};

use drafter_core::StateSnapshot;
use serde::de::DeserializeOwned;

use crate::upload::{UploadedFile, UploadedImage};

/// Declared type of a route parameter, as seen by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    State,
    Text,
    Integer,
    Float,
    Boolean,
    Bytes,
    File,
    Image,
    /// Any JSON value.
    Json,
}

impl ParamKind {
    pub fn name(self) -> &'static str {
        match self {
            ParamKind::State => "state",
            ParamKind::Text => "str",
            ParamKind::Integer => "int",
            ParamKind::Float => "float",
            ParamKind::Boolean => "bool",
            ParamKind::Bytes => "bytes",
            ParamKind::File => "file",
            ParamKind::Image => "image",
            ParamKind::Json => "json",
        }
    }

    /// Kinds whose form values may arrive wrapped in a one-element list.
    pub fn is_scalar(self) -> bool {
        !matches!(self, ParamKind::State | ParamKind::Json)
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value already coerced to the kind of the parameter it is bound to.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Json(serde_json::Value),
    Bytes(Vec<u8>),
    File(UploadedFile),
    Image(UploadedImage),
    State(StateSnapshot),
}

impl ParamValue {
    fn describe(&self) -> &'static str {
        match self {
            ParamValue::Json(value) => json_type_name(value),
            ParamValue::Bytes(_) => "bytes",
            ParamValue::File(_) => "file",
            ParamValue::Image(_) => "image",
            ParamValue::State(_) => "state",
        }
    }
}

pub(crate) fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(number) if number.is_f64() => "float",
        serde_json::Value::Number(_) => "int",
        serde_json::Value::String(_) => "str",
        serde_json::Value::Array(_) => "list",
        serde_json::Value::Object(_) => "dict",
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("missing value")]
    Missing,
    #[error("expected {expected}, got {found}")]
    Unexpected {
        expected: ParamKind,
        found: &'static str,
    },
    #[error("{value} does not fit in {target}")]
    OutOfRange { value: String, target: &'static str },
    #[error("cannot decode into {target}: {source}")]
    Decode {
        target: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

pub trait FromParam: Sized {
    const KIND: ParamKind;

    /// Whether a missing value is acceptable.
    const OPTIONAL: bool = false;

    fn from_param(value: Option<ParamValue>) -> Result<Self, ExtractError>;
}

fn required(value: Option<ParamValue>) -> Result<ParamValue, ExtractError> {
    value.ok_or(ExtractError::Missing)
}

fn unexpected(expected: ParamKind, value: &ParamValue) -> ExtractError {
    ExtractError::Unexpected {
        expected,
        found: value.describe(),
    }
}

/// The current site state, restored from its snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct State<S>(pub S);

impl<S> State<S> {
    pub fn into_inner(self) -> S {
        self.0
    }
}

impl<S> Deref for State<S> {
    type Target = S;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S: DeserializeOwned> FromParam for State<S> {
    const KIND: ParamKind = ParamKind::State;

    fn from_param(value: Option<ParamValue>) -> Result<Self, ExtractError> {
        match required(value)? {
            ParamValue::State(snapshot) => {
                snapshot
                    .restore()
                    .map(State)
                    .map_err(|source| ExtractError::Decode {
                        target: std::any::type_name::<S>(),
                        source,
                    })
            }
            other => Err(unexpected(ParamKind::State, &other)),
        }
    }
}

/// Any deserializable value, decoded from the JSON form of the parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Json<T>(pub T);

impl<T: DeserializeOwned> FromParam for Json<T> {
    const KIND: ParamKind = ParamKind::Json;

    fn from_param(value: Option<ParamValue>) -> Result<Self, ExtractError> {
        let value = serde_json::Value::from_param(value)?;
        serde_json::from_value(value)
            .map(Json)
            .map_err(|source| ExtractError::Decode {
                target: std::any::type_name::<T>(),
                source,
            })
    }
}

impl FromParam for serde_json::Value {
    const KIND: ParamKind = ParamKind::Json;

    fn from_param(value: Option<ParamValue>) -> Result<Self, ExtractError> {
        match required(value)? {
            ParamValue::Json(value) => Ok(value),
            ParamValue::State(snapshot) => Ok(snapshot.value),
            ParamValue::File(file) => Ok(file.to_json()),
            other => Err(unexpected(ParamKind::Json, &other)),
        }
    }
}

impl FromParam for String {
    const KIND: ParamKind = ParamKind::Text;

    fn from_param(value: Option<ParamValue>) -> Result<Self, ExtractError> {
        match required(value)? {
            ParamValue::Json(serde_json::Value::String(text)) => Ok(text),
            other => Err(unexpected(ParamKind::Text, &other)),
        }
    }
}

macro_rules! integer_param {
    ($($ty:ty),+) => {
        $(
            impl FromParam for $ty {
                const KIND: ParamKind = ParamKind::Integer;

                fn from_param(value: Option<ParamValue>) -> Result<Self, ExtractError> {
                    let value = required(value)?;
                    let ParamValue::Json(serde_json::Value::Number(number)) = &value else {
                        return Err(unexpected(ParamKind::Integer, &value));
                    };
                    let out_of_range = || ExtractError::OutOfRange {
                        value: number.to_string(),
                        target: stringify!($ty),
                    };
                    match (number.as_i64(), number.as_u64()) {
                        (Some(signed), _) => <$ty>::try_from(signed).map_err(|_| out_of_range()),
                        (None, Some(unsigned)) => <$ty>::try_from(unsigned).map_err(|_| out_of_range()),
                        (None, None) => Err(unexpected(ParamKind::Integer, &value)),
                    }
                }
            }
        )+
    };
}

integer_param!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl FromParam for f64 {
    const KIND: ParamKind = ParamKind::Float;

    fn from_param(value: Option<ParamValue>) -> Result<Self, ExtractError> {
        let value = required(value)?;
        match &value {
            ParamValue::Json(serde_json::Value::Number(number)) => number
                .as_f64()
                .ok_or_else(|| unexpected(ParamKind::Float, &value)),
            _ => Err(unexpected(ParamKind::Float, &value)),
        }
    }
}

impl FromParam for f32 {
    const KIND: ParamKind = ParamKind::Float;

    fn from_param(value: Option<ParamValue>) -> Result<Self, ExtractError> {
        f64::from_param(value).map(|value| value as f32)
    }
}

/// An absent checkbox reads as `false`.
impl FromParam for bool {
    const KIND: ParamKind = ParamKind::Boolean;
    const OPTIONAL: bool = true;

    fn from_param(value: Option<ParamValue>) -> Result<Self, ExtractError> {
        match value {
            None => Ok(false),
            Some(ParamValue::Json(serde_json::Value::Bool(flag))) => Ok(flag),
            Some(other) => Err(unexpected(ParamKind::Boolean, &other)),
        }
    }
}

impl FromParam for Vec<u8> {
    const KIND: ParamKind = ParamKind::Bytes;

    fn from_param(value: Option<ParamValue>) -> Result<Self, ExtractError> {
        match required(value)? {
            ParamValue::Bytes(bytes) => Ok(bytes),
            other => Err(unexpected(ParamKind::Bytes, &other)),
        }
    }
}

impl FromParam for UploadedFile {
    const KIND: ParamKind = ParamKind::File;

    fn from_param(value: Option<ParamValue>) -> Result<Self, ExtractError> {
        match required(value)? {
            ParamValue::File(file) => Ok(file),
            other => Err(unexpected(ParamKind::File, &other)),
        }
    }
}

impl FromParam for UploadedImage {
    const KIND: ParamKind = ParamKind::Image;

    fn from_param(value: Option<ParamValue>) -> Result<Self, ExtractError> {
        match required(value)? {
            ParamValue::Image(image) => Ok(image),
            other => Err(unexpected(ParamKind::Image, &other)),
        }
    }
}

impl<T: FromParam> FromParam for Option<T> {
    const KIND: ParamKind = T::KIND;
    const OPTIONAL: bool = true;

    fn from_param(value: Option<ParamValue>) -> Result<Self, ExtractError> {
        match value {
            None => Ok(None),
            Some(value) => T::from_param(Some(value)).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Bank {
        balance: i64,
    }

    #[test]
    fn test_state_restores_snapshot() {
        let snapshot = StateSnapshot::capture(&Bank { balance: 100 }).unwrap();
        let State(bank) = State::<Bank>::from_param(Some(ParamValue::State(snapshot))).unwrap();
        assert_eq!(bank, Bank { balance: 100 });
    }

    #[test]
    fn test_integer_range_checked() {
        let error = u8::from_param(Some(ParamValue::Json(json!(300)))).unwrap_err();
        assert!(matches!(error, ExtractError::OutOfRange { target: "u8", .. }));
        assert_eq!(i64::from_param(Some(ParamValue::Json(json!(-3)))).unwrap(), -3);
    }

    #[test]
    fn test_missing_bool_is_false() {
        assert!(!bool::from_param(None).unwrap());
    }

    #[test]
    fn test_missing_required_value() {
        assert!(matches!(String::from_param(None), Err(ExtractError::Missing)));
        assert_eq!(Option::<String>::from_param(None).unwrap(), None);
    }

    #[test]
    fn test_json_extractor_decodes() {
        let value = ParamValue::Json(json!({"balance": 5}));
        let Json(bank) = Json::<Bank>::from_param(Some(value)).unwrap();
        assert_eq!(bank.balance, 5);
    }

    #[test]
    fn test_wrong_kind_names_both_types() {
        let error = String::from_param(Some(ParamValue::Bytes(vec![1]))).unwrap_err();
        assert_eq!(error.to_string(), "expected str, got bytes");
    }
}
