//! Shared range-validation helpers used by the section validators.

use std::fmt::Display;

fn push_out_of_range<T: Display>(errors: &mut Vec<String>, name: &str, value: T, min: T, max: T) {
    errors.push(format!("{name} = {value} is out of range [{min}, {max}]"));
}

/// Push an error if `value` is outside `[min, max]`.
pub(crate) fn validate_range(errors: &mut Vec<String>, name: &str, value: u32, min: u32, max: u32) {
    if !(min..=max).contains(&value) {
        push_out_of_range(errors, name, value, min, max);
    }
}

/// Float variant. NaN is always out of range.
pub(crate) fn validate_range_f64(
    errors: &mut Vec<String>,
    name: &str,
    value: f64,
    min: f64,
    max: f64,
) {
    if !(min..=max).contains(&value) {
        push_out_of_range(errors, name, value, min, max);
    }
}
