//! Frame geometry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Width:height ratio of a video frame.
///
/// Parsed from `W:H` (the form FFprobe reports display aspect ratios in),
/// `W/H`, or a positive decimal such as `1.7778`. Both terms must be non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    /// Widescreen (16:9)
    pub const WIDESCREEN: AspectRatio = AspectRatio {
        width: 16,
        height: 9,
    };

    /// Create a new aspect ratio, rejecting zero terms.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self { width, height })
    }

    /// Convert a decimal ratio to the nearest `W:H` at four decimal places.
    pub fn from_decimal(value: f64) -> Option<Self> {
        if !value.is_finite() || value <= 0.0 {
            return None;
        }
        let scaled = (value * DECIMAL_SCALE as f64).round();
        if scaled < 1.0 || scaled > u32::MAX as f64 {
            return None;
        }
        let width = scaled as u32;
        let divisor = gcd(width, DECIMAL_SCALE);
        Self::new(width / divisor, DECIMAL_SCALE / divisor)
    }
}

/// Denominator used when converting a decimal ratio.
const DECIMAL_SCALE: u32 = 10_000;

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl FromStr for AspectRatio {
    type Err = AspectRatioParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let Some((width, height)) = s.split_once(':').or_else(|| s.split_once('/')) else {
            return match s.parse::<f64>() {
                Ok(value) => AspectRatio::from_decimal(value).ok_or(AspectRatioParseError::ZeroValue),
                Err(_) => Err(AspectRatioParseError::InvalidFormat(s.to_string())),
            };
        };

        let width: u32 = width
            .trim()
            .parse()
            .map_err(|_| AspectRatioParseError::InvalidNumber(width.to_string()))?;
        let height: u32 = height
            .trim()
            .parse()
            .map_err(|_| AspectRatioParseError::InvalidNumber(height.to_string()))?;

        AspectRatio::new(width, height).ok_or(AspectRatioParseError::ZeroValue)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AspectRatioParseError {
    #[error("Invalid aspect ratio format: {0}, expected 'W:H' or a decimal")]
    InvalidFormat(String),
    #[error("Invalid number in aspect ratio: {0}")]
    InvalidNumber(String),
    #[error("Aspect ratio must be positive")]
    ZeroValue,
}
