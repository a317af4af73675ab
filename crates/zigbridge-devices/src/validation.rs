//! Type and range checks applied after every transform.

use zigbridge_core::{Value, ValueType};

/// Check a normalized value against its declared type and inclusive range.
///
/// Out-of-range values are reported, never clamped.
pub fn check(value: &Value, value_type: ValueType, range: Option<(f64, f64)>) -> Result<(), String> {
    if !value_type.accepts(value) {
        return Err(format!(
            "expected {}, got {}",
            value_type.name(),
            value.type_name()
        ));
    }

    if let (Some((min, max)), Some(v)) = (range, value.as_f64()) {
        if !v.is_finite() || v < min || v > max {
            return Err(format!("{} outside [{}, {}]", v, min, max));
        }
    }

    Ok(())
}

/// [`check`], then coerce to the declared type's representation.
pub fn conform(value: Value, value_type: ValueType, range: Option<(f64, f64)>) -> Result<Value, String> {
    check(&value, value_type, range)?;
    Ok(value_type.coerce(value))
}

/// Round to a fixed number of decimals.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Extract a number from a value, with a readable error.
pub fn number(value: &Value) -> Result<f64, String> {
    match value {
        Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        other => other
            .as_f64()
            .ok_or_else(|| format!("expected a number, got {}", other.type_name())),
    }
}

/// A number in `[0, 1]`.
pub fn unit_interval(value: &Value) -> Result<f64, String> {
    let v = number(value)?;
    if !(0.0..=1.0).contains(&v) {
        return Err(format!("{} outside [0, 1]", v));
    }
    Ok(v)
}

/// Map `[0, 1]` onto `[0, scale]` and round.
pub fn scale_unit(value: &Value, scale: f64) -> Result<f64, String> {
    Ok((unit_interval(value)? * scale).round())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_is_inclusive() {
        assert!(check(&Value::Float(100.0), ValueType::Float, Some((0.0, 100.0))).is_ok());
        assert!(check(&Value::Float(0.0), ValueType::Float, Some((0.0, 100.0))).is_ok());
        assert!(check(&Value::Float(150.0), ValueType::Float, Some((0.0, 100.0))).is_err());
    }

    #[test]
    fn test_type_mismatch() {
        let err = check(&Value::String("on".into()), ValueType::Bool, None).unwrap_err();
        assert_eq!(err, "expected bool, got string");
    }

    #[test]
    fn test_nan_rejected() {
        assert!(check(&Value::Float(f64::NAN), ValueType::Float, Some((0.0, 1.0))).is_err());
    }

    #[test]
    fn test_conform_coerces_after_check() {
        assert_eq!(
            conform(Value::Integer(100), ValueType::Float, Some((0.0, 100.0))),
            Ok(Value::Float(100.0))
        );
        assert!(conform(Value::Integer(101), ValueType::Float, Some((0.0, 100.0))).is_err());
    }

    #[test]
    fn test_scale_unit() {
        assert_eq!(scale_unit(&Value::Float(0.5), 254.0), Ok(127.0));
        assert!(scale_unit(&Value::Float(1.2), 254.0).is_err());
        assert_eq!(round_to(21.456, 1), 21.5);
    }
}
