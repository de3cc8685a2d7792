//! The floating-point type exchanged with the engine.
//!
//! The engine is compiled with either `f32` or `f64` as its numeric type. The
//! host asks once, at [`Runtime`](crate::Runtime) construction, and uses the
//! answer for every buffer it hands across the boundary afterwards.

use std::fmt;

use polars::prelude::DataType;

use crate::error::BitBoostError;

/// Float representation shared by the host and the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericType {
    /// 4-byte IEEE float.
    F32,
    /// 8-byte IEEE float.
    F64,
}

impl NumericType {
    /// Selects the exchange type from the byte width the engine reports.
    ///
    /// # Errors
    ///
    /// Returns [`BitBoostError::RuntimeInit`] for any width other than 4 or 8.
    /// This only happens with an incompatible engine build and is fatal.
    pub fn from_width(width: i32) -> Result<Self, BitBoostError> {
        match width {
            4 => Ok(NumericType::F32),
            8 => Ok(NumericType::F64),
            other => Err(BitBoostError::RuntimeInit(format!(
                "engine reports unsupported float width of {other} bytes (expected 4 or 8)"
            ))),
        }
    }

    /// Byte width of one element.
    #[must_use]
    pub fn width(&self) -> usize {
        match self {
            NumericType::F32 => 4,
            NumericType::F64 => 8,
        }
    }

    /// The polars dtype a column must have to cross the boundary.
    #[must_use]
    pub fn dtype(&self) -> DataType {
        match self {
            NumericType::F32 => DataType::Float32,
            NumericType::F64 => DataType::Float64,
        }
    }
}

impl fmt::Display for NumericType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericType::F32 => write!(f, "f32"),
            NumericType::F64 => write!(f, "f64"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_width() {
        assert_eq!(NumericType::from_width(4).unwrap(), NumericType::F32);
        assert_eq!(NumericType::from_width(8).unwrap(), NumericType::F64);
    }

    #[test]
    fn test_from_width_rejects_other_sizes() {
        for width in [0, 2, 16, -4] {
            let err = NumericType::from_width(width).unwrap_err();
            assert!(matches!(err, BitBoostError::RuntimeInit(_)));
        }
    }

    #[test]
    fn test_width_and_dtype_agree() {
        assert_eq!(NumericType::F32.width(), std::mem::size_of::<f32>());
        assert_eq!(NumericType::F64.width(), std::mem::size_of::<f64>());
        assert_eq!(NumericType::F32.dtype(), DataType::Float32);
        assert_eq!(NumericType::F64.dtype(), DataType::Float64);
    }
}
