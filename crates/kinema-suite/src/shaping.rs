//! Reward shaping.
//!
//! [`tolerance`] maps a scalar to `[0, 1]`: exactly 1 inside `bounds`,
//! falling off outside them over `margin` according to a [`Sigmoid`].

use std::error::Error;
use std::fmt;

use kinema_core::HookError;

/// Fall-off shape outside the bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sigmoid {
    /// `1 - d` for scaled distance `d`, zero beyond 1.
    Linear,
    /// `1 - d²`, zero beyond 1.
    Quadratic,
    /// `exp(-d²/2)`; never reaches zero.
    Gaussian,
}

/// Parameters of [`tolerance`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tolerance {
    /// Inclusive `(lower, upper)` range with value 1.
    pub bounds: (f64, f64),
    /// Distance outside the bounds at which the value equals
    /// `value_at_margin`. Zero gives a step function.
    pub margin: f64,
    /// Fall-off shape.
    pub sigmoid: Sigmoid,
    /// Value at exactly `margin` outside the bounds.
    pub value_at_margin: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            bounds: (0.0, 0.0),
            margin: 0.0,
            sigmoid: Sigmoid::Gaussian,
            value_at_margin: 0.1,
        }
    }
}

impl Tolerance {
    /// Bounds only; a step function until `margin` is set.
    pub fn within(lower: f64, upper: f64) -> Self {
        Self {
            bounds: (lower, upper),
            ..Self::default()
        }
    }

    /// Builder-style: set the margin, sigmoid, and value at margin.
    pub fn falloff(mut self, margin: f64, sigmoid: Sigmoid, value_at_margin: f64) -> Self {
        self.margin = margin;
        self.sigmoid = sigmoid;
        self.value_at_margin = value_at_margin;
        self
    }
}

/// Invalid [`Tolerance`] parameters.
#[derive(Clone, Debug, PartialEq)]
pub enum ShapingError {
    /// `lower > upper`.
    InvalidBounds {
        /// Lower bound.
        lower: f64,
        /// Upper bound.
        upper: f64,
    },
    /// Margin is negative or NaN.
    InvalidMargin {
        /// The margin.
        margin: f64,
    },
    /// `value_at_margin` is outside the range the sigmoid accepts:
    /// `[0, 1)` for linear and quadratic, `(0, 1)` for gaussian.
    InvalidValueAtMargin {
        /// The value.
        value: f64,
        /// The sigmoid it was paired with.
        sigmoid: Sigmoid,
    },
}

impl fmt::Display for ShapingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBounds { lower, upper } => {
                write!(f, "lower bound {lower} exceeds upper bound {upper}")
            }
            Self::InvalidMargin { margin } => {
                write!(f, "margin must be non-negative, got {margin}")
            }
            Self::InvalidValueAtMargin { value, sigmoid } => {
                write!(f, "value_at_margin {value} out of range for {sigmoid:?}")
            }
        }
    }
}

impl Error for ShapingError {}

impl From<ShapingError> for HookError {
    fn from(e: ShapingError) -> Self {
        HookError::failed(e.to_string())
    }
}

/// `x` shaped by `params`, in `[0, 1]`.
///
/// # Errors
///
/// [`ShapingError`] if the parameters are inconsistent. The check runs
/// on every call; parameters are usually constants.
///
/// # Examples
///
/// ```
/// use kinema_suite::shaping::{tolerance, Sigmoid, Tolerance};
///
/// let near = Tolerance::within(0.0, 0.5).falloff(5.0, Sigmoid::Linear, 0.0);
/// assert_eq!(tolerance(0.3, &near).unwrap(), 1.0);
/// assert!((tolerance(3.0, &near).unwrap() - 0.5).abs() < 1e-12);
/// assert_eq!(tolerance(6.0, &near).unwrap(), 0.0);
/// ```
pub fn tolerance(x: f64, params: &Tolerance) -> Result<f64, ShapingError> {
    let (lower, upper) = params.bounds;
    if lower > upper {
        return Err(ShapingError::InvalidBounds { lower, upper });
    }
    if params.margin.is_nan() || params.margin < 0.0 {
        return Err(ShapingError::InvalidMargin {
            margin: params.margin,
        });
    }
    let v = params.value_at_margin;
    let valid = match params.sigmoid {
        Sigmoid::Linear | Sigmoid::Quadratic => (0.0..1.0).contains(&v),
        Sigmoid::Gaussian => v > 0.0 && v < 1.0,
    };
    if !valid {
        return Err(ShapingError::InvalidValueAtMargin {
            value: v,
            sigmoid: params.sigmoid,
        });
    }

    let in_bounds = lower <= x && x <= upper;
    if in_bounds {
        return Ok(1.0);
    }
    if params.margin == 0.0 {
        return Ok(0.0);
    }
    let distance = if x < lower { lower - x } else { x - upper };
    let d = distance / params.margin;
    Ok(sigmoid(d, v, params.sigmoid))
}

/// Sigmoid of `d >= 0` scaled so that `sigmoid(1) == value_at_1`.
fn sigmoid(d: f64, value_at_1: f64, kind: Sigmoid) -> f64 {
    match kind {
        Sigmoid::Linear => {
            let scaled = d * (1.0 - value_at_1);
            if scaled < 1.0 {
                1.0 - scaled
            } else {
                0.0
            }
        }
        Sigmoid::Quadratic => {
            let scaled = d * (1.0 - value_at_1).sqrt();
            if scaled < 1.0 {
                1.0 - scaled * scaled
            } else {
                0.0
            }
        }
        Sigmoid::Gaussian => {
            let scale = (-2.0 * value_at_1.ln()).sqrt();
            (-0.5 * (d * scale).powi(2)).exp()
        }
    }
}
