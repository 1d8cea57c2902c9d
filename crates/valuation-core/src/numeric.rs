/// Numeric helpers shared by every stage of the valuation pipeline.
///
/// Intermediate figures that may be missing are carried as `Option<f64>` and
/// never as NaN sentinels. Non-finite floats are converted to `None` as soon as
/// they appear, and to JSON `null` at the serialization boundary.
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Clamp `x` into `[lo, hi]`. NaN input returns `lo`.
pub fn clamp(x: f64, lo: f64, hi: f64) -> f64 {
    if x.is_nan() {
        return lo;
    }
    x.max(lo).min(hi)
}

/// `Some(x)` when `x` is a finite real, otherwise `None`.
pub fn finite(x: f64) -> Option<f64> {
    if x.is_finite() {
        Some(x)
    } else {
        None
    }
}

/// Coerce a loosely-typed provider value into a finite real.
///
/// Accepts JSON numbers and numeric strings; everything else is `None`.
pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().and_then(finite),
        Value::String(s) => s.trim().parse::<f64>().ok().and_then(finite),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Coerce to a finite real, returning `default` on null, non-numeric or
/// non-finite input. Never fails.
pub fn safe_number(value: Option<&Value>, default: f64) -> f64 {
    value.and_then(coerce_number).unwrap_or(default)
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    finite(data.iter().sum::<f64>() / data.len() as f64)
}

/// Compound annual growth rate between `oldest` and `recent` over `periods`.
///
/// `None` when the base is not positive or there is no elapsed period. A
/// non-positive `recent` value is reported as a total loss (-100%).
pub fn cagr(recent: f64, oldest: f64, periods: usize) -> Option<f64> {
    if periods == 0 || !(oldest > 0.0) || !recent.is_finite() {
        return None;
    }
    if recent <= 0.0 {
        return Some(-1.0);
    }
    finite((recent / oldest).powf(1.0 / periods as f64) - 1.0)
}

/// Serialize an `f64` field, writing `null` for NaN or infinity.
pub fn serialize_finite<S: Serializer>(x: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    match finite(*x) {
        Some(v) => serializer.serialize_some(&v),
        None => serializer.serialize_none(),
    }
}

/// Serialize a float sequence, writing `null` for each non-finite entry.
pub fn serialize_finite_seq<S: Serializer>(xs: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
    let cleaned: Vec<Option<f64>> = xs.iter().map(|x| finite(*x)).collect();
    cleaned.serialize(serializer)
}

/// Convert any serializable value to JSON with every non-finite float mapped to
/// `null`, recursively. This is the last step before a result leaves the engine.
pub fn clean_for_output<T: Serialize>(value: &T) -> Value {
    match serde_json::to_value(value) {
        Ok(v) => clean_value(v),
        Err(_) => Value::Null,
    }
}

fn clean_value(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(clean_value).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter().map(|(k, v)| (k, clean_value(v))).collect(),
        ),
        Value::Number(n) => match n.as_f64() {
            Some(f) if !f.is_finite() => Value::Null,
            _ => Value::Number(n),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_safe_number() {
        assert_eq!(safe_number(None, 5.0), 5.0);
        assert_eq!(safe_number(Some(&json!("abc")), 5.0), 5.0);
        assert_eq!(safe_number(Some(&json!(3.2)), 5.0), 3.2);
        assert_eq!(safe_number(Some(&json!(null)), 5.0), 5.0);
        assert_eq!(safe_number(Some(&json!(" 1.5 ")), 5.0), 1.5);
        assert_eq!(safe_number(Some(&json!({"raw": 1.0})), 5.0), 5.0);
    }

    #[test]
    fn test_clamp_handles_nan() {
        assert_eq!(clamp(0.5, 0.0, 1.0), 0.5);
        assert_eq!(clamp(2.0, 0.0, 1.0), 1.0);
        assert_eq!(clamp(-2.0, 0.0, 1.0), 0.0);
        assert_eq!(clamp(f64::NAN, 0.2, 3.0), 0.2);
    }

    #[test]
    fn test_cagr() {
        let g = cagr(121.0, 100.0, 2).unwrap();
        assert!((g - 0.10).abs() < 1e-12);
        assert!(cagr(100.0, 0.0, 2).is_none());
        assert!(cagr(100.0, 50.0, 0).is_none());
        assert_eq!(cagr(-10.0, 50.0, 3), Some(-1.0));
    }

    #[test]
    fn test_mean() {
        assert!(mean(&[]).is_none());
        assert!((mean(&[1.0, 2.0, 3.0]).unwrap() - 2.0).abs() < 1e-12);
    }

    #[derive(Serialize)]
    struct Sample {
        #[serde(serialize_with = "serialize_finite")]
        value: f64,
        #[serde(serialize_with = "serialize_finite_seq")]
        path: Vec<f64>,
        nested: Vec<Option<f64>>,
    }

    #[test]
    fn test_clean_for_output_nulls_non_finite() {
        let sample = Sample {
            value: f64::NAN,
            path: vec![1.0, f64::INFINITY],
            nested: vec![Some(f64::NEG_INFINITY), Some(2.0), None],
        };
        let out = clean_for_output(&sample);
        assert_eq!(out["value"], Value::Null);
        assert_eq!(out["path"], json!([1.0, null]));
        assert_eq!(out["nested"], json!([null, 2.0, null]));
    }
}
