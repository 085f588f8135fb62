//! Value coercion and kind inference

use crate::record::sanitize_name;
use crate::schema::{ScalarKind, ValueKind};
use crate::statement::{Literal, ObjectTerm};
use serde_json::Value;

/// Coerce a JSON value to `scalar`. `None` means the value does not fit.
pub fn coerce(value: &Value, scalar: ScalarKind) -> Option<ObjectTerm> {
    match scalar {
        ScalarKind::String | ScalarKind::Default | ScalarKind::Geo | ScalarKind::Password => {
            Some(ObjectTerm::string(value_text(value)))
        }
        ScalarKind::Int => coerce_int(value).map(|i| ObjectTerm::Literal(Literal::Int(i))),
        ScalarKind::Float => coerce_float(value).map(|x| ObjectTerm::Literal(Literal::Float(x))),
        ScalarKind::Bool => coerce_bool(value).map(|b| ObjectTerm::Literal(Literal::Bool(b))),
        ScalarKind::DateTime => match value {
            Value::String(s) if !s.trim().is_empty() => {
                Some(ObjectTerm::Literal(Literal::DateTime(s.trim().to_string())))
            }
            _ => None,
        },
        ScalarKind::Uid => match value {
            Value::String(s) => Some(ObjectTerm::Node(sanitize_name(s))),
            Value::Number(n) => Some(ObjectTerm::Node(n.to_string())),
            _ => None,
        },
    }
}

/// Text rendering used for string-typed emission: strings verbatim, other
/// scalars via their JSON form, objects and arrays as JSON text.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

fn integral(x: f64) -> Option<i64> {
    if x.is_finite() && x.fract() == 0.0 && x >= i64::MIN as f64 && x <= i64::MAX as f64 {
        Some(x as i64)
    } else {
        None
    }
}

fn coerce_float(value: &Value) -> Option<f64> {
    let x = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    x.is_finite().then_some(x)
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn infer_scalar(value: &Value) -> ScalarKind {
    match value {
        Value::Bool(_) => ScalarKind::Bool,
        Value::Number(n) if n.is_i64() => ScalarKind::Int,
        Value::Number(_) => ScalarKind::Float,
        _ => ScalarKind::String,
    }
}

/// Infer a kind for an undeclared field from its present values.
///
/// Lists of mixed kinds become lists of strings.
pub fn infer_kind(values: &[&Value], list: bool) -> ValueKind {
    let mut kinds = values.iter().map(|v| infer_scalar(v));
    let first = kinds.next().unwrap_or(ScalarKind::String);
    let scalar = if kinds.all(|k| k == first) {
        first
    } else {
        ScalarKind::String
    };
    ValueKind { scalar, list }
}
