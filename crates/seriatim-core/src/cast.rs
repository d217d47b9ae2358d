//! Checked numeric casts.
//!
//! Narrowing conversions that must not wrap go through [`safe_cast`], so a
//! value which does not fit surfaces as [`Error::Overflow`] instead of
//! truncating.

use crate::error::{Error, Result};

/// Converts between integral types, failing with [`Error::Overflow`] when
/// the value does not fit in the target type.
///
/// # Errors
///
/// Returns [`Error::Overflow`] if `value` is not representable as `T`.
pub fn safe_cast<T, U>(value: U) -> Result<T>
where
    T: TryFrom<U>,
    U: Copy + std::fmt::Display,
{
    T::try_from(value).map_err(|_| Error::overflow(format!("value {value} out of range for cast")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cast_in_range() {
        let v: u32 = safe_cast(41_i64).unwrap();
        assert_eq!(v, 41);
        let v: i8 = safe_cast(-128_i64).unwrap();
        assert_eq!(v, -128);
    }

    #[test]
    fn test_cast_out_of_range() {
        let r: Result<u8> = safe_cast(256_i64);
        assert!(matches!(r, Err(Error::Overflow(_))));
        let r: Result<u64> = safe_cast(-1_i32);
        assert!(matches!(r, Err(Error::Overflow(_))));
    }

    #[test]
    fn test_cast_widening_always_succeeds() {
        let v: i128 = safe_cast(i64::MAX).unwrap();
        assert_eq!(v, i128::from(i64::MAX));
    }
}
