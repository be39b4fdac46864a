//! Value validators shared by the instrument drivers.
//!
//! The generic helpers reject a value before any command reaches the transport. The
//! mode-dependent ranges of the parameter analyzer live here as well so that channels
//! and sweep variables resolve their limits the same way.

use std::fmt::{self, Debug, Display};

use crate::error::ScpiError;
use crate::agilent4156::{Mode, ScpiToken};

/// Closed numeric interval `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Stretch both bounds by `factor`; sweep steps and offsets may span twice the
    /// value range in either sign.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            min: self.min * factor,
            max: self.max * factor,
        }
    }

    /// Return `value` unchanged if it lies inside the range.
    pub fn check(&self, value: f64, what: &str) -> Result<f64, ScpiError> {
        strict_range(value, *self).map_err(|_| {
            ScpiError::Validation(format!("{what} {value} is not in range {self}"))
        })
    }
}

impl Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

const VOLTAGE_RANGE: Range = Range::new(-200.0, 200.0);
const CURRENT_RANGE: Range = Range::new(-1.0, 1.0);

fn not_in_iv_mode(mode: Option<Mode>) -> ScpiError {
    let described = mode.map_or_else(|| "undefined".to_string(), |m| m.as_scpi().to_string());
    ScpiError::Configuration(format!(
        "channel is not in V or I mode (mode: {described}); it may be disabled"
    ))
}

/// Legal range of a forced value for a channel in `mode`.
pub fn valid_value_range(mode: Option<Mode>) -> Result<Range, ScpiError> {
    match mode {
        Some(Mode::Voltage) => Ok(VOLTAGE_RANGE),
        Some(Mode::Current) => Ok(CURRENT_RANGE),
        other => Err(not_in_iv_mode(other)),
    }
}

/// Legal compliance range for a channel in `mode`.
///
/// A voltage-forcing channel is limited by a current compliance and vice versa, so this
/// is the inverse of [`valid_value_range`].
pub fn valid_compliance_range(mode: Option<Mode>) -> Result<Range, ScpiError> {
    match mode {
        Some(Mode::Current) => Ok(VOLTAGE_RANGE),
        Some(Mode::Voltage) => Ok(CURRENT_RANGE),
        other => Err(not_in_iv_mode(other)),
    }
}

pub fn strict_range(value: f64, range: Range) -> Result<f64, ScpiError> {
    if value.is_finite() && range.contains(value) {
        Ok(value)
    } else {
        Err(ScpiError::Validation(format!(
            "value {value} is not in range {range}"
        )))
    }
}

pub fn strict_discrete_set<T>(value: T, values: &[T]) -> Result<T, ScpiError>
where
    T: PartialEq + Debug,
{
    if values.contains(&value) {
        Ok(value)
    } else {
        Err(ScpiError::Validation(format!(
            "value {value:?} is not in the discrete set {values:?}"
        )))
    }
}

/// Smallest member of `values` that is not below `value`, or the largest member when
/// `value` exceeds all of them.
pub fn truncated_discrete_set(value: f64, values: &[f64]) -> Result<f64, ScpiError> {
    if !value.is_finite() {
        return Err(ScpiError::Validation(format!("value {value} is not finite")));
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
        .iter()
        .copied()
        .find(|&v| value <= v)
        .or_else(|| sorted.last().copied())
        .ok_or_else(|| ScpiError::Validation("empty discrete set".to_string()))
}
