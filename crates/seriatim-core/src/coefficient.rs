//! The coefficient capability trait.
//!
//! The multiplication engine needs very little from a coefficient type:
//! a zero, a zero test, in-place addition and a multiply. Everything else
//! (display, ordering, conversions) stays on the concrete type. The fused
//! [`multiply_accumulate`](Coefficient::multiply_accumulate) hook lets
//! big-integer coefficients skip the temporary product allocation on the
//! multiplication hot path.

/// Operations a type must provide to serve as a series coefficient.
pub trait Coefficient: Clone + PartialEq + std::fmt::Debug + Send + Sync + 'static {
    /// The additive identity.
    fn zero() -> Self;

    /// Returns `true` if the value equals [`zero`](Coefficient::zero).
    fn is_zero(&self) -> bool;

    /// `self += rhs`.
    fn add_assign_ref(&mut self, rhs: &Self);

    /// Returns `a * b`.
    fn mul_refs(a: &Self, b: &Self) -> Self;

    /// `self += a * b`.
    ///
    /// The default multiplies then adds; types with a cheaper fused path
    /// should override it.
    fn multiply_accumulate(&mut self, a: &Self, b: &Self) {
        self.add_assign_ref(&Self::mul_refs(a, b));
    }
}

macro_rules! impl_coefficient_integral {
    ($($t:ty),* $(,)?) => {$(
        impl Coefficient for $t {
            fn zero() -> Self {
                0
            }

            fn is_zero(&self) -> bool {
                *self == 0
            }

            fn add_assign_ref(&mut self, rhs: &Self) {
                *self += *rhs;
            }

            fn mul_refs(a: &Self, b: &Self) -> Self {
                *a * *b
            }
        }
    )*};
}

macro_rules! impl_coefficient_float {
    ($($t:ty),* $(,)?) => {$(
        impl Coefficient for $t {
            fn zero() -> Self {
                0.0
            }

            fn is_zero(&self) -> bool {
                *self == 0.0
            }

            fn add_assign_ref(&mut self, rhs: &Self) {
                *self += *rhs;
            }

            fn mul_refs(a: &Self, b: &Self) -> Self {
                *a * *b
            }
        }
    )*};
}

impl_coefficient_integral!(i8, i16, i32, i64, i128, u8, u16, u32, u64, u128);
impl_coefficient_float!(f32, f64);
