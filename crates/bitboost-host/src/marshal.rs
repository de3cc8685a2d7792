//! Conversion of host columns into engine-compatible buffers.
//!
//! A polars [`Series`] can be split over several chunks, so it is not
//! necessarily one contiguous allocation. The engine reads a single pointer
//! per column, which means:
//!
//! - A single-chunk column is borrowed as-is (no copy).
//! - A multi-chunk column is copied into an owned scratch buffer.
//!
//! The buffer only lives for the duration of the boundary call. The engine
//! copies the data on its side before returning.
//!
//! No casting happens here: a column whose dtype is not the exchange dtype is
//! rejected, as are columns containing nulls.

use std::borrow::Cow;

use polars::prelude::*;

use crate::engine::ExchangeSlice;
use crate::error::BitBoostError;
use crate::numeric::NumericType;

/// One column, contiguous and in the exchange numeric type.
#[derive(Debug, Clone)]
pub enum ExchangeBuffer<'a> {
    /// Column of 4-byte floats.
    F32(Cow<'a, [f32]>),
    /// Column of 8-byte floats.
    F64(Cow<'a, [f64]>),
}

impl ExchangeBuffer<'_> {
    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            ExchangeBuffer::F32(values) => values.len(),
            ExchangeBuffer::F64(values) => values.len(),
        }
    }

    /// Returns `true` if the buffer has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the buffer points into the source column.
    #[must_use]
    pub fn is_borrowed(&self) -> bool {
        matches!(
            self,
            ExchangeBuffer::F32(Cow::Borrowed(_)) | ExchangeBuffer::F64(Cow::Borrowed(_))
        )
    }

    /// View suitable for a boundary call.
    #[must_use]
    pub fn as_slice(&self) -> ExchangeSlice<'_> {
        match self {
            ExchangeBuffer::F32(values) => ExchangeSlice::F32(values),
            ExchangeBuffer::F64(values) => ExchangeSlice::F64(values),
        }
    }
}

/// Produces a contiguous buffer of `numeric` values from `series`.
///
/// # Errors
///
/// Returns [`BitBoostError::InvalidData`] if the dtype of `series` is not the
/// exchange dtype, or if the column contains nulls.
pub fn exchange_buffer(
    series: &Series,
    numeric: NumericType,
) -> Result<ExchangeBuffer<'_>, BitBoostError> {
    let expected = numeric.dtype();
    if series.dtype() != &expected {
        return Err(BitBoostError::InvalidData(format!(
            "column '{}' has dtype {}, the engine exchanges {}",
            series.name(),
            series.dtype(),
            expected
        )));
    }

    if series.null_count() > 0 {
        return Err(BitBoostError::InvalidData(format!(
            "column '{}' contains {} null values",
            series.name(),
            series.null_count()
        )));
    }

    let buffer = match numeric {
        NumericType::F32 => ExchangeBuffer::F32(contiguous(series.f32()?)),
        NumericType::F64 => ExchangeBuffer::F64(contiguous(series.f64()?)),
    };
    Ok(buffer)
}

/// Borrows a single-chunk array, copies a chunked one.
fn contiguous<T>(ca: &ChunkedArray<T>) -> Cow<'_, [T::Native]>
where
    T: PolarsNumericType,
{
    match ca.cont_slice() {
        Ok(values) => Cow::Borrowed(values),
        Err(_) => Cow::Owned(ca.into_no_null_iter().collect()),
    }
}
