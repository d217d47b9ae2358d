//! Kronecker packing of exponent vectors.
//!
//! A vector of `m` signed exponents is folded into a single `i64` code by
//! mixed-radix evaluation: dimension `m` gets `63 / m` bits per exponent,
//! giving the symmetric per-dimension bound `M(m) = 2^(63/m - 1) - 1` and
//! radix `R = 2 M + 1`. Codes are additive, `encode(a) + encode(b) =
//! encode(a + b)`, whenever the componentwise sum stays within bounds; the
//! multiplication kernel relies on exactly this to multiply monomials with
//! one machine addition.

use seriatim_core::{Error, Result};

/// Largest number of exponents that can be packed into one code.
///
/// At 32 dimensions a slot would get a single bit, leaving no room for a
/// nonzero exponent.
pub const MAX_DIMENSION: usize = 31;

#[derive(Clone, Copy)]
struct Limit {
    bound: i64,
    h_max: i64,
}

const LIMITS: [Limit; MAX_DIMENSION + 1] = build_limits();

// From impls are not const-callable, so the widening conversions here
// have to be `as` casts.
#[allow(clippy::cast_possible_truncation, clippy::cast_lossless)]
const fn build_limits() -> [Limit; MAX_DIMENSION + 1] {
    let mut table = [Limit { bound: 0, h_max: 0 }; MAX_DIMENSION + 1];
    let mut m = 1usize;
    while m <= MAX_DIMENSION {
        let bits = (63 / m) as u32;
        let bound = (1i64 << (bits - 1)) - 1;
        let radix = 2 * bound as i128 + 1;
        let mut power: i128 = 1;
        let mut i = 0;
        while i < m {
            power *= radix;
            i += 1;
        }
        let h_max = ((power - 1) / 2) as i64;
        table[m] = Limit { bound, h_max };
        m += 1;
    }
    table
}

fn check_dimension(dimension: usize) -> Result<()> {
    if dimension > MAX_DIMENSION {
        return Err(Error::invalid_argument(format!(
            "cannot pack {dimension} exponents, the limit is {MAX_DIMENSION}"
        )));
    }
    Ok(())
}

/// Symmetric per-exponent bound `M(m)` for the given dimension.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `dimension` exceeds
/// [`MAX_DIMENSION`].
pub fn bound(dimension: usize) -> Result<i64> {
    check_dimension(dimension)?;
    Ok(LIMITS[dimension].bound)
}

/// Largest representable code magnitude for the given dimension.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `dimension` exceeds
/// [`MAX_DIMENSION`].
pub fn code_bound(dimension: usize) -> Result<i64> {
    check_dimension(dimension)?;
    Ok(LIMITS[dimension].h_max)
}

/// Packs a vector of exponents into a single code.
///
/// The empty vector encodes to `0`.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if there are more than
/// [`MAX_DIMENSION`] exponents, or [`Error::Overflow`] if any exponent
/// falls outside `±M(m)`.
pub fn encode(exponents: &[i64]) -> Result<i64> {
    let m = exponents.len();
    check_dimension(m)?;
    if m == 0 {
        return Ok(0);
    }
    let lim = LIMITS[m];
    let radix = 2 * lim.bound + 1;
    let mut code: i64 = 0;
    let mut shift: i64 = 1;
    for (i, &e) in exponents.iter().enumerate() {
        if e < -lim.bound || e > lim.bound {
            return Err(Error::overflow(format!(
                "exponent {e} at position {i} outside the packing bound ±{}",
                lim.bound
            )));
        }
        code += e * shift;
        if i + 1 < m {
            shift *= radix;
        }
    }
    Ok(code)
}

/// Unpacks `code` into `out.len()` exponents.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `out` is longer than
/// [`MAX_DIMENSION`], or [`Error::Overflow`] if the code magnitude exceeds
/// the bound for this dimension.
pub fn decode_into(code: i64, out: &mut [i64]) -> Result<()> {
    let m = out.len();
    check_dimension(m)?;
    let lim = LIMITS[m];
    if code < -lim.h_max || code > lim.h_max {
        return Err(Error::overflow(format!(
            "code {code} outside the representable range ±{} for dimension {m}",
            lim.h_max
        )));
    }
    if m == 0 {
        return Ok(());
    }
    let radix = 2 * lim.bound + 1;
    let mut w = code + lim.h_max;
    for slot in out.iter_mut() {
        *slot = w % radix - lim.bound;
        w /= radix;
    }
    Ok(())
}

/// Unpacks `code` into a fresh vector of `dimension` exponents.
///
/// # Errors
///
/// Same conditions as [`decode_into`].
pub fn decode(code: i64, dimension: usize) -> Result<Vec<i64>> {
    let mut out = vec![0i64; dimension];
    decode_into(code, &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_vector() {
        assert_eq!(encode(&[]).unwrap(), 0);
        assert_eq!(decode(0, 0).unwrap(), Vec::<i64>::new());
        assert!(decode(1, 0).is_err());
    }

    #[test]
    fn test_round_trip_small() {
        for dims in 1..=4usize {
            let v: Vec<i64> = (0..dims).map(|i| i as i64 - 1).collect();
            let code = encode(&v).unwrap();
            assert_eq!(decode(code, dims).unwrap(), v);
        }
    }

    #[test]
    fn test_round_trip_at_bounds() {
        for dims in [1usize, 2, 3, 7, 15, 31] {
            let m = bound(dims).unwrap();
            let lo: Vec<i64> = vec![-m; dims];
            let hi: Vec<i64> = vec![m; dims];
            assert_eq!(decode(encode(&lo).unwrap(), dims).unwrap(), lo);
            assert_eq!(decode(encode(&hi).unwrap(), dims).unwrap(), hi);
            assert_eq!(encode(&hi).unwrap(), code_bound(dims).unwrap());
            assert_eq!(encode(&lo).unwrap(), -code_bound(dims).unwrap());
        }
    }

    #[test]
    fn test_known_bounds() {
        assert_eq!(bound(1).unwrap(), (1i64 << 62) - 1);
        assert_eq!(bound(2).unwrap(), (1i64 << 30) - 1);
        assert_eq!(bound(3).unwrap(), (1i64 << 20) - 1);
        assert_eq!(bound(31).unwrap(), 1);
    }

    #[test]
    fn test_out_of_bounds_exponent() {
        let m = bound(2).unwrap();
        assert!(matches!(encode(&[m + 1, 0]), Err(Error::Overflow(_))));
        assert!(matches!(encode(&[0, -m - 1]), Err(Error::Overflow(_))));
        assert!(encode(&[m, -m]).is_ok());
    }

    #[test]
    fn test_dimension_limit() {
        let v = vec![0i64; MAX_DIMENSION + 1];
        assert!(matches!(encode(&v), Err(Error::InvalidArgument(_))));
        let v = vec![0i64; MAX_DIMENSION];
        assert_eq!(encode(&v).unwrap(), 0);
    }

    #[test]
    fn test_code_out_of_range_on_decode() {
        let h = code_bound(2).unwrap();
        assert!(decode(h, 2).is_ok());
        assert!(matches!(decode(h + 1, 2), Err(Error::Overflow(_))));
        assert!(matches!(decode(-h - 1, 2), Err(Error::Overflow(_))));
    }

    #[test]
    fn test_codes_are_additive() {
        let a = [3i64, -2, 5];
        let b = [-1i64, 4, 2];
        let sum: Vec<i64> = a.iter().zip(&b).map(|(x, y)| x + y).collect();
        assert_eq!(
            encode(&a).unwrap() + encode(&b).unwrap(),
            encode(&sum).unwrap()
        );
    }

    #[test]
    fn test_distinct_vectors_distinct_codes() {
        let mut seen = std::collections::HashSet::new();
        for x in -3i64..=3 {
            for y in -3i64..=3 {
                assert!(seen.insert(encode(&[x, y]).unwrap()));
            }
        }
    }
}
