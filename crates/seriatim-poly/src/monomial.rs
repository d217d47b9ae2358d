//! Monomial keys and terms.
//!
//! A series picks one key representation at construction and keeps it for
//! life: either an explicit exponent vector, or a single `i64` Kronecker
//! code. The representation is carried in the value itself as an enum
//! variant, and every series guarantees all its keys share one variant, so
//! the multiplication engine matches on the kind exactly once per run.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;
use seriatim_core::{Error, Result};
use smallvec::SmallVec;

use crate::kronecker;

/// Exponent storage for vector keys; up to four variables live inline.
pub type ExponentVec = SmallVec<[i64; 4]>;

/// The key representation of a series.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyKind {
    /// Exponents stored as an explicit vector, one slot per symbol.
    Vector,
    /// Exponents packed into a single signed 64-bit Kronecker code.
    Packed,
}

/// The exponents of one term, in the representation of its series.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Monomial {
    /// Explicit exponent vector.
    Vector(ExponentVec),
    /// Kronecker-packed exponents.
    Packed(i64),
}

impl Monomial {
    /// Builds a key of the requested representation from raw exponents.
    ///
    /// # Errors
    ///
    /// For packed keys, propagates the packing errors of
    /// [`kronecker::encode`].
    pub fn from_exponents(kind: KeyKind, exponents: &[i64]) -> Result<Self> {
        match kind {
            KeyKind::Vector => Ok(Monomial::Vector(exponents.iter().copied().collect())),
            KeyKind::Packed => Ok(Monomial::Packed(kronecker::encode(exponents)?)),
        }
    }

    /// The representation this key uses.
    #[must_use]
    pub fn kind(&self) -> KeyKind {
        match self {
            Monomial::Vector(_) => KeyKind::Vector,
            Monomial::Packed(_) => KeyKind::Packed,
        }
    }

    /// The packed code, if this is a packed key.
    #[must_use]
    pub fn packed_code(&self) -> Option<i64> {
        match self {
            Monomial::Vector(_) => None,
            Monomial::Packed(code) => Some(*code),
        }
    }

    /// Writes the exponents into `out`, whose length fixes the dimension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if a vector key's length differs
    /// from `out.len()`, or the unpacking errors of
    /// [`kronecker::decode_into`] for packed keys.
    pub fn unpack_into(&self, out: &mut [i64]) -> Result<()> {
        match self {
            Monomial::Vector(v) => {
                if v.len() != out.len() {
                    return Err(Error::invalid_argument(format!(
                        "key has {} exponents, expected {}",
                        v.len(),
                        out.len()
                    )));
                }
                out.copy_from_slice(v);
                Ok(())
            }
            Monomial::Packed(code) => kronecker::decode_into(*code, out),
        }
    }

    /// Returns the exponents as a fresh vector.
    ///
    /// # Errors
    ///
    /// Same conditions as [`unpack_into`](Monomial::unpack_into).
    pub fn exponents(&self, dimension: usize) -> Result<ExponentVec> {
        let mut out: ExponentVec = SmallVec::from_elem(0, dimension);
        self.unpack_into(&mut out)?;
        Ok(out)
    }

    /// Multiplies two keys by adding exponents.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the kinds or lengths differ,
    /// or [`Error::Overflow`] if an exponent sum leaves `i64` range. Packed
    /// sums are range-checked against the dimension bound by the caller,
    /// which knows the dimension; here only `i64` wrap is rejected.
    pub fn mul(&self, rhs: &Monomial) -> Result<Monomial> {
        match (self, rhs) {
            (Monomial::Vector(a), Monomial::Vector(b)) => {
                if a.len() != b.len() {
                    return Err(Error::invalid_argument(format!(
                        "cannot multiply keys of {} and {} exponents",
                        a.len(),
                        b.len()
                    )));
                }
                let mut out = ExponentVec::with_capacity(a.len());
                for (x, y) in a.iter().zip(b.iter()) {
                    let sum = x.checked_add(*y).ok_or_else(|| {
                        Error::overflow(format!("exponent sum {x} + {y} overflows"))
                    })?;
                    out.push(sum);
                }
                Ok(Monomial::Vector(out))
            }
            (Monomial::Packed(a), Monomial::Packed(b)) => {
                let sum = a
                    .checked_add(*b)
                    .ok_or_else(|| Error::overflow(format!("code sum {a} + {b} overflows")))?;
                Ok(Monomial::Packed(sum))
            }
            _ => Err(Error::invalid_argument(
                "cannot multiply keys of different representations",
            )),
        }
    }

    /// Total degree: the sum of all exponents.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Overflow`] if the sum leaves `i64` range, plus the
    /// unpacking conditions of [`unpack_into`](Monomial::unpack_into).
    pub fn degree(&self, dimension: usize) -> Result<i64> {
        let exponents = self.exponents(dimension)?;
        let mut total = 0i64;
        for e in exponents {
            total = total
                .checked_add(e)
                .ok_or_else(|| Error::overflow("degree sum overflows"))?;
        }
        Ok(total)
    }

    /// Partial degree: the sum of the exponents at the given positions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if a position is out of range,
    /// [`Error::Overflow`] on sum overflow, plus the unpacking conditions
    /// of [`unpack_into`](Monomial::unpack_into).
    pub fn partial_degree(&self, positions: &[usize], dimension: usize) -> Result<i64> {
        let exponents = self.exponents(dimension)?;
        let mut total = 0i64;
        for &p in positions {
            let e = exponents.get(p).ok_or_else(|| {
                Error::invalid_argument(format!("position {p} out of range for {dimension} symbols"))
            })?;
            total = total
                .checked_add(*e)
                .ok_or_else(|| Error::overflow("degree sum overflows"))?;
        }
        Ok(total)
    }

    /// Returns `true` if every exponent is zero.
    #[must_use]
    pub fn is_unitary(&self) -> bool {
        match self {
            Monomial::Vector(v) => v.iter().all(|&e| e == 0),
            Monomial::Packed(code) => *code == 0,
        }
    }

    /// The hash a term table buckets this key by.
    ///
    /// Packed keys hash to their own code so that the bucket of a product
    /// key is the sum of the factors' buckets modulo the table size.
    #[allow(clippy::cast_sign_loss)]
    pub(crate) fn table_hash(&self) -> u64 {
        match self {
            Monomial::Vector(v) => {
                let mut hasher = FxHasher::default();
                v.hash(&mut hasher);
                hasher.finish()
            }
            Monomial::Packed(code) => *code as u64,
        }
    }
}

/// One term of a series: a key and its coefficient.
#[derive(Clone, Debug, PartialEq)]
pub struct Term<C> {
    /// The monomial key.
    pub key: Monomial,
    /// The coefficient multiplying the monomial.
    pub coefficient: C,
}

impl<C> Term<C> {
    /// Bundles a key and coefficient.
    pub fn new(key: Monomial, coefficient: C) -> Self {
        Term { key, coefficient }
    }
}
