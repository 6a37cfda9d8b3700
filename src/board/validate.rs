//! Field rules for client input.
//!
//! Everything here runs before a transaction is opened. Names are trimmed and
//! measured in Unicode scalar values; the trimmed value is what gets stored.
//! Positions are type-checked (integer, not negative) but never range-checked:
//! out-of-range positions are clamped by the services.

use serde_json::Value;
use uuid::Uuid;

use crate::errors::{BoardError, BoardResult};

pub const BOARD_NAME_MAX: usize = 50;
pub const COLUMN_NAME_MAX: usize = 20;
pub const COLOR_MAX: usize = 20;
pub const TASK_NAME_MAX: usize = 120;
pub const SUBTASK_NAME_MAX: usize = 120;
pub const DESCRIPTION_MAX: usize = 2000;

fn bounded_name(field: &'static str, value: &str, max: usize) -> BoardResult<String> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if len == 0 || len > max {
        return Err(BoardError::validation(
            field,
            format!("must be between 1 and {} characters", max),
        ));
    }
    Ok(trimmed.to_string())
}

pub fn board_name(value: &str) -> BoardResult<String> {
    bounded_name("name", value, BOARD_NAME_MAX)
}

pub fn column_name(value: &str) -> BoardResult<String> {
    bounded_name("name", value, COLUMN_NAME_MAX)
}

pub fn color(value: &str) -> BoardResult<String> {
    bounded_name("color", value, COLOR_MAX)
}

pub fn task_name(value: &str) -> BoardResult<String> {
    bounded_name("name", value, TASK_NAME_MAX)
}

pub fn subtask_name(value: &str) -> BoardResult<String> {
    bounded_name("subtasks", value, SUBTASK_NAME_MAX)
}

/// Absent descriptions are stored as the empty string.
pub fn description(value: Option<&str>) -> BoardResult<String> {
    let trimmed = value.unwrap_or_default().trim();
    if trimmed.chars().count() > DESCRIPTION_MAX {
        return Err(BoardError::validation(
            "description",
            format!("must be at most {} characters", DESCRIPTION_MAX),
        ));
    }
    Ok(trimmed.to_string())
}

/// A field the wire format marks optional but the operation requires.
pub fn required<T>(field: &'static str, value: Option<T>) -> BoardResult<T> {
    value.ok_or_else(|| BoardError::validation(field, "is required"))
}

/// Reject the batch if two names collide, ignoring case.
pub fn unique_names<'a>(
    field: &'static str,
    names: impl IntoIterator<Item = &'a str>,
) -> BoardResult<()> {
    let mut seen = std::collections::HashSet::new();
    for name in names {
        if !seen.insert(name.to_lowercase()) {
            return Err(BoardError::validation(
                field,
                format!("duplicate name '{}'", name),
            ));
        }
    }
    Ok(())
}

pub fn uuid(field: &'static str, raw: &str) -> BoardResult<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| BoardError::validation(field, format!("'{}' is not a valid id", raw)))
}

/// Type-check a JSON position. Integral numbers (including `2.0`) are
/// accepted; fractions, negatives, strings, booleans and the like are not.
/// Integers too large for `i64` saturate; the services clamp them anyway.
pub fn position(field: &'static str, value: &Value) -> BoardResult<i64> {
    let invalid = || BoardError::validation(field, "must be a non-negative integer");
    let Value::Number(number) = value else {
        return Err(invalid());
    };

    if let Some(signed) = number.as_i64() {
        return non_negative(field, signed);
    }
    if number.as_u64().is_some() {
        return Ok(i64::MAX);
    }
    match number.as_f64() {
        Some(float) if float.fract() == 0.0 && float >= 0.0 => {
            if float >= i64::MAX as f64 {
                Ok(i64::MAX)
            } else {
                Ok(float as i64)
            }
        }
        _ => Err(invalid()),
    }
}

/// Sign check for positions that arrive already typed.
pub fn non_negative(field: &'static str, position: i64) -> BoardResult<i64> {
    if position < 0 {
        Err(BoardError::validation(field, "must be a non-negative integer"))
    } else {
        Ok(position)
    }
}
