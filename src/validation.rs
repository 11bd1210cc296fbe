//! Validation helpers shared by configuration types.

use crate::error::{CollectorError, CollectorResult};
use std::fmt::Display;
use std::ops::RangeInclusive;

/// Log levels accepted in configuration files.
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Checks that `value` lies in `range`, naming the field in the error.
///
/// A NaN never lies in any range.
///
/// # Errors
///
/// `InvalidArgument` describing the field, the value and the accepted range.
pub fn check_range<T>(field: &str, value: T, range: RangeInclusive<T>) -> CollectorResult<()>
where
    T: PartialOrd + Display,
{
    if range.contains(&value) {
        Ok(())
    } else {
        Err(CollectorError::InvalidArgument(format!(
            "{field} = {value} is outside {}..={}",
            range.start(),
            range.end()
        )))
    }
}

/// Checks a log level name, case-insensitively.
pub fn check_log_level(level: &str) -> CollectorResult<()> {
    if LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        Err(CollectorError::InvalidArgument(format!(
            "invalid log level '{level}', must be one of: {}",
            LOG_LEVELS.join(", ")
        )))
    }
}
