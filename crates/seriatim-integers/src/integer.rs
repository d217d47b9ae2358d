//! Arbitrary-precision signed integers.
//!
//! [`Int`] stores a sign and a little-endian magnitude of 64-bit limbs.
//! Values with up to two limbs live inline; only larger magnitudes touch
//! the heap. The type carries a fused multiply-accumulate used by the
//! series multiplication kernel, which accumulates limb products directly
//! into the target without allocating a temporary.
//!
//! Invariants: the magnitude never has trailing zero limbs, and the sign
//! is `0` exactly when the magnitude is empty.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use seriatim_core::{Coefficient, Error};
use smallvec::{smallvec, SmallVec};

type Limbs = SmallVec<[u64; 2]>;

/// A signed arbitrary-precision integer.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Int {
    sign: i8,
    mag: Limbs,
}

#[allow(clippy::cast_possible_truncation)]
fn split(x: u128) -> (u64, u64) {
    (x as u64, (x >> 64) as u64)
}

fn trim(mag: &mut Limbs) {
    while mag.last() == Some(&0) {
        mag.pop();
    }
}

fn cmp_mag(a: &[u64], b: &[u64]) -> Ordering {
    match a.len().cmp(&b.len()) {
        Ordering::Equal => {}
        ord => return ord,
    }
    for (x, y) in a.iter().rev().zip(b.iter().rev()) {
        match x.cmp(y) {
            Ordering::Equal => {}
            ord => return ord,
        }
    }
    Ordering::Equal
}

fn add_mag(a: &[u64], b: &[u64]) -> Limbs {
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    let mut out = Limbs::with_capacity(long.len() + 1);
    let mut carry = 0u64;
    for (i, &limb) in long.iter().enumerate() {
        let mut sum = u128::from(limb) + u128::from(carry);
        if i < short.len() {
            sum += u128::from(short[i]);
        }
        let (lo, hi) = split(sum);
        out.push(lo);
        carry = hi;
    }
    if carry != 0 {
        out.push(carry);
    }
    out
}

// Requires |a| >= |b|.
fn sub_mag(a: &[u64], b: &[u64]) -> Limbs {
    let mut out = Limbs::with_capacity(a.len());
    let mut borrow = 0u64;
    for (i, &limb) in a.iter().enumerate() {
        let bi = if i < b.len() { b[i] } else { 0 };
        let (d1, o1) = limb.overflowing_sub(bi);
        let (d2, o2) = d1.overflowing_sub(borrow);
        out.push(d2);
        borrow = u64::from(o1 || o2);
    }
    trim(&mut out);
    out
}

fn mul_mag(a: &[u64], b: &[u64]) -> Limbs {
    if a.is_empty() || b.is_empty() {
        return Limbs::new();
    }
    let mut out: Limbs = smallvec![0u64; a.len() + b.len()];
    for (i, &ai) in a.iter().enumerate() {
        if ai == 0 {
            continue;
        }
        let mut carry = 0u64;
        for (j, &bj) in b.iter().enumerate() {
            let t =
                u128::from(ai) * u128::from(bj) + u128::from(out[i + j]) + u128::from(carry);
            let (lo, hi) = split(t);
            out[i + j] = lo;
            carry = hi;
        }
        let mut k = i + b.len();
        while carry != 0 {
            let t = u128::from(out[k]) + u128::from(carry);
            let (lo, hi) = split(t);
            out[k] = lo;
            carry = hi;
            k += 1;
        }
    }
    trim(&mut out);
    out
}

// acc += a * b, growing acc as needed.
fn add_mul_mag(acc: &mut Limbs, a: &[u64], b: &[u64]) {
    let need = a.len() + b.len();
    if acc.len() < need {
        acc.resize(need, 0);
    }
    for (i, &ai) in a.iter().enumerate() {
        if ai == 0 {
            continue;
        }
        let mut carry = 0u64;
        for (j, &bj) in b.iter().enumerate() {
            let t =
                u128::from(ai) * u128::from(bj) + u128::from(acc[i + j]) + u128::from(carry);
            let (lo, hi) = split(t);
            acc[i + j] = lo;
            carry = hi;
        }
        let mut k = i + b.len();
        while carry != 0 {
            if k == acc.len() {
                acc.push(0);
            }
            let t = u128::from(acc[k]) + u128::from(carry);
            let (lo, hi) = split(t);
            acc[k] = lo;
            carry = hi;
            k += 1;
        }
    }
    trim(acc);
}

#[allow(clippy::cast_possible_truncation)]
fn divmod_small(mag: &[u64], d: u64) -> (Limbs, u64) {
    let mut quot = Limbs::from_slice(mag);
    let mut rem = 0u64;
    for limb in quot.iter_mut().rev() {
        let cur = (u128::from(rem) << 64) | u128::from(*limb);
        *limb = (cur / u128::from(d)) as u64;
        rem = (cur % u128::from(d)) as u64;
    }
    trim(&mut quot);
    (quot, rem)
}

fn mul_small(mag: &mut Limbs, m: u64) {
    let mut carry = 0u64;
    for limb in mag.iter_mut() {
        let t = u128::from(*limb) * u128::from(m) + u128::from(carry);
        let (lo, hi) = split(t);
        *limb = lo;
        carry = hi;
    }
    if carry != 0 {
        mag.push(carry);
    }
    trim(mag);
}

fn add_small(mag: &mut Limbs, a: u64) {
    let mut carry = a;
    for limb in mag.iter_mut() {
        let (sum, overflow) = limb.overflowing_add(carry);
        *limb = sum;
        carry = u64::from(overflow);
        if carry == 0 {
            return;
        }
    }
    if carry != 0 {
        mag.push(carry);
    }
}

fn add_signed(lhs: &Int, rhs_sign: i8, rhs_mag: &[u64]) -> Int {
    if lhs.sign == 0 {
        return Int {
            sign: rhs_sign,
            mag: Limbs::from_slice(rhs_mag),
        };
    }
    if rhs_sign == 0 {
        return lhs.clone();
    }
    if lhs.sign == rhs_sign {
        return Int {
            sign: lhs.sign,
            mag: add_mag(&lhs.mag, rhs_mag),
        };
    }
    match cmp_mag(&lhs.mag, rhs_mag) {
        Ordering::Equal => Int::default(),
        Ordering::Greater => Int {
            sign: lhs.sign,
            mag: sub_mag(&lhs.mag, rhs_mag),
        },
        Ordering::Less => Int {
            sign: rhs_sign,
            mag: sub_mag(rhs_mag, &lhs.mag),
        },
    }
}

fn mul_signed(a: &Int, b: &Int) -> Int {
    let sign = a.sign * b.sign;
    if sign == 0 {
        return Int::default();
    }
    Int {
        sign,
        mag: mul_mag(&a.mag, &b.mag),
    }
}

impl Int {
    /// Creates an integer from a machine value.
    pub fn new(value: i64) -> Self {
        Int::from(value)
    }

    fn from_u128_mag(sign: i8, value: u128) -> Self {
        let (lo, hi) = split(value);
        let mut mag: Limbs = smallvec![lo, hi];
        trim(&mut mag);
        let sign = if mag.is_empty() { 0 } else { sign };
        Int { sign, mag }
    }

    /// Returns `-1`, `0` or `1` according to the sign of the value.
    #[must_use]
    pub fn signum(&self) -> i8 {
        self.sign
    }

    /// Returns `true` if the value is strictly negative.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.sign < 0
    }

    /// Converts to `i64` if the value fits.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn to_i64(&self) -> Option<i64> {
        match self.sign {
            0 => Some(0),
            _ if self.mag.len() > 1 => None,
            1 => i64::try_from(self.mag[0]).ok(),
            _ => {
                let limb = self.mag[0];
                if limb <= 1u64 << 63 {
                    Some(limb.wrapping_neg() as i64)
                } else {
                    None
                }
            }
        }
    }

    /// Number of bits in the magnitude; zero for the value zero.
    #[must_use]
    pub fn bit_len(&self) -> usize {
        match self.mag.last() {
            None => 0,
            Some(top) => (self.mag.len() - 1) * 64 + (64 - top.leading_zeros() as usize),
        }
    }
}

macro_rules! impl_from_signed {
    ($($t:ty),* $(,)?) => {$(
        impl From<$t> for Int {
            #[allow(clippy::cast_possible_truncation)]
            fn from(value: $t) -> Self {
                let v = i128::from(value);
                Int::from_u128_mag(v.signum() as i8, v.unsigned_abs())
            }
        }
    )*};
}

macro_rules! impl_from_unsigned {
    ($($t:ty),* $(,)?) => {$(
        impl From<$t> for Int {
            fn from(value: $t) -> Self {
                Int::from_u128_mag(1, u128::from(value))
            }
        }
    )*};
}

impl_from_signed!(i8, i16, i32, i64);
impl_from_unsigned!(u8, u16, u32, u64);

impl From<usize> for Int {
    #[allow(clippy::cast_lossless)]
    fn from(value: usize) -> Self {
        Int::from_u128_mag(1, value as u128)
    }
}

impl From<isize> for Int {
    #[allow(clippy::cast_lossless, clippy::cast_possible_truncation)]
    fn from(value: isize) -> Self {
        Int::from_u128_mag(value.signum() as i8, value.unsigned_abs() as u128)
    }
}

impl From<i128> for Int {
    #[allow(clippy::cast_possible_truncation)]
    fn from(value: i128) -> Self {
        Int::from_u128_mag(value.signum() as i8, value.unsigned_abs())
    }
}

impl From<u128> for Int {
    fn from(value: u128) -> Self {
        Int::from_u128_mag(1, value)
    }
}

impl FromStr for Int {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        const POW10: [u64; 20] = {
            let mut t = [1u64; 20];
            let mut i = 1;
            while i < 20 {
                t[i] = t[i - 1] * 10;
                i += 1;
            }
            t
        };
        let (neg, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::invalid_argument(format!(
                "invalid integer literal '{s}'"
            )));
        }
        let mut mag = Limbs::new();
        for chunk in digits.as_bytes().chunks(19) {
            let v = chunk
                .iter()
                .fold(0u64, |acc, &b| acc * 10 + u64::from(b - b'0'));
            mul_small(&mut mag, POW10[chunk.len()]);
            add_small(&mut mag, v);
        }
        trim(&mut mag);
        let sign = if mag.is_empty() {
            0
        } else if neg {
            -1
        } else {
            1
        };
        Ok(Int { sign, mag })
    }
}

impl PartialOrd for Int {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Int {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.sign.cmp(&other.sign) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match self.sign {
            0 => Ordering::Equal,
            1 => cmp_mag(&self.mag, &other.mag),
            _ => cmp_mag(&other.mag, &self.mag),
        }
    }
}

impl std::ops::Add<&Int> for &Int {
    type Output = Int;

    fn add(self, rhs: &Int) -> Int {
        add_signed(self, rhs.sign, &rhs.mag)
    }
}

impl std::ops::Add for Int {
    type Output = Int;

    fn add(self, rhs: Int) -> Int {
        &self + &rhs
    }
}

impl std::ops::Add<&Int> for Int {
    type Output = Int;

    fn add(self, rhs: &Int) -> Int {
        &self + rhs
    }
}

impl std::ops::Add<Int> for &Int {
    type Output = Int;

    fn add(self, rhs: Int) -> Int {
        self + &rhs
    }
}

impl std::ops::AddAssign<&Int> for Int {
    fn add_assign(&mut self, rhs: &Int) {
        *self = add_signed(self, rhs.sign, &rhs.mag);
    }
}

impl std::ops::AddAssign for Int {
    fn add_assign(&mut self, rhs: Int) {
        *self += &rhs;
    }
}

impl std::ops::Sub<&Int> for &Int {
    type Output = Int;

    fn sub(self, rhs: &Int) -> Int {
        add_signed(self, -rhs.sign, &rhs.mag)
    }
}

impl std::ops::Sub for Int {
    type Output = Int;

    fn sub(self, rhs: Int) -> Int {
        &self - &rhs
    }
}

impl std::ops::Sub<&Int> for Int {
    type Output = Int;

    fn sub(self, rhs: &Int) -> Int {
        &self - rhs
    }
}

impl std::ops::Sub<Int> for &Int {
    type Output = Int;

    fn sub(self, rhs: Int) -> Int {
        self - &rhs
    }
}

impl std::ops::SubAssign<&Int> for Int {
    fn sub_assign(&mut self, rhs: &Int) {
        *self = add_signed(self, -rhs.sign, &rhs.mag);
    }
}

impl std::ops::SubAssign for Int {
    fn sub_assign(&mut self, rhs: Int) {
        *self -= &rhs;
    }
}

impl std::ops::Mul<&Int> for &Int {
    type Output = Int;

    fn mul(self, rhs: &Int) -> Int {
        mul_signed(self, rhs)
    }
}

impl std::ops::Mul for Int {
    type Output = Int;

    fn mul(self, rhs: Int) -> Int {
        &self * &rhs
    }
}

impl std::ops::Mul<&Int> for Int {
    type Output = Int;

    fn mul(self, rhs: &Int) -> Int {
        &self * rhs
    }
}

impl std::ops::Mul<Int> for &Int {
    type Output = Int;

    fn mul(self, rhs: Int) -> Int {
        self * &rhs
    }
}

impl std::ops::Neg for Int {
    type Output = Int;

    fn neg(mut self) -> Int {
        self.sign = -self.sign;
        self
    }
}

impl std::ops::Neg for &Int {
    type Output = Int;

    fn neg(self) -> Int {
        Int {
            sign: -self.sign,
            mag: self.mag.clone(),
        }
    }
}

impl num_traits::Zero for Int {
    fn zero() -> Self {
        Int::default()
    }

    fn is_zero(&self) -> bool {
        self.sign == 0
    }
}

impl num_traits::One for Int {
    fn one() -> Self {
        Int::from(1u8)
    }
}

impl Coefficient for Int {
    fn zero() -> Self {
        Int::default()
    }

    fn is_zero(&self) -> bool {
        self.sign == 0
    }

    fn add_assign_ref(&mut self, rhs: &Self) {
        *self += rhs;
    }

    fn mul_refs(a: &Self, b: &Self) -> Self {
        mul_signed(a, b)
    }

    fn multiply_accumulate(&mut self, a: &Self, b: &Self) {
        let prod_sign = a.sign * b.sign;
        if prod_sign == 0 {
            return;
        }
        if self.sign == 0 {
            self.sign = prod_sign;
            self.mag = mul_mag(&a.mag, &b.mag);
        } else if self.sign == prod_sign {
            add_mul_mag(&mut self.mag, &a.mag, &b.mag);
        } else {
            let mag = mul_mag(&a.mag, &b.mag);
            *self = add_signed(self, prod_sign, &mag);
        }
    }
}

impl fmt::Display for Int {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const CHUNK: u64 = 10_000_000_000_000_000_000;
        if self.sign == 0 {
            return f.write_str("0");
        }
        let mut chunks = Vec::new();
        let mut mag = self.mag.clone();
        while !mag.is_empty() {
            let (q, r) = divmod_small(&mag, CHUNK);
            chunks.push(r);
            mag = q;
        }
        let mut s = String::new();
        if self.sign < 0 {
            s.push('-');
        }
        for (i, c) in chunks.iter().rev().enumerate() {
            if i == 0 {
                s.push_str(&c.to_string());
            } else {
                s.push_str(&format!("{c:019}"));
            }
        }
        f.write_str(&s)
    }
}

impl fmt::Debug for Int {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Int({self})")
    }
}
