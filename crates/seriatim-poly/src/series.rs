//! Sparse polynomial series.
//!
//! A [`Series`] is a hash table of terms over a fixed, sorted symbol set,
//! with one key representation chosen at construction. Inserting through
//! the public API accumulates coefficients for equal keys and drops terms
//! that cancel to zero, so a series never stores an ignorable term.

use seriatim_core::{Coefficient, Error, Result, SymbolSet};

use crate::kronecker;
use crate::monomial::{KeyKind, Monomial, Term};
use crate::multiplier;
use crate::table::TermTable;
use crate::truncation::{self, TruncationPolicy};

/// A sparse series: a symbol set, a key representation and a term table.
#[derive(Clone, Debug)]
pub struct Series<C> {
    symbols: SymbolSet,
    kind: KeyKind,
    table: TermTable<C>,
}

impl<C: Coefficient> Series<C> {
    /// Creates an empty series over `symbols` with the given key
    /// representation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if a packed series is requested
    /// for more symbols than fit in one code.
    pub fn new(kind: KeyKind, symbols: SymbolSet) -> Result<Self> {
        if kind == KeyKind::Packed && symbols.len() > kronecker::MAX_DIMENSION {
            return Err(Error::invalid_argument(format!(
                "cannot pack {} symbols, the limit is {}",
                symbols.len(),
                kronecker::MAX_DIMENSION
            )));
        }
        Ok(Series {
            symbols,
            kind,
            table: TermTable::new(),
        })
    }

    pub(crate) fn from_parts(kind: KeyKind, symbols: SymbolSet, table: TermTable<C>) -> Self {
        Series {
            symbols,
            kind,
            table,
        }
    }

    /// The symbol set of the series.
    #[must_use]
    pub fn symbols(&self) -> &SymbolSet {
        &self.symbols
    }

    /// The key representation of the series.
    #[must_use]
    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    /// Number of stored terms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the series has no terms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Iterates over the stored terms in table order.
    pub fn iter(&self) -> impl Iterator<Item = &Term<C>> {
        self.table.iter()
    }

    pub(crate) fn table(&self) -> &TermTable<C> {
        &self.table
    }

    /// Inserts one term given as raw exponents, accumulating into an
    /// existing term with the same key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the exponent count differs
    /// from the symbol count, or [`Error::Overflow`] if a packed exponent
    /// is out of bounds.
    pub fn insert(&mut self, exponents: &[i64], coefficient: C) -> Result<()> {
        if exponents.len() != self.symbols.len() {
            return Err(Error::invalid_argument(format!(
                "got {} exponents for the {} symbols of {}",
                exponents.len(),
                self.symbols.len(),
                self.symbols
            )));
        }
        let key = Monomial::from_exponents(self.kind, exponents)?;
        self.table.insert_or_accumulate(key, coefficient);
        Ok(())
    }

    /// Inserts a prebuilt term after validating it against this series.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the key's representation or
    /// dimension does not match the series, or [`Error::Overflow`] for a
    /// packed code out of range.
    pub fn insert_term(&mut self, term: Term<C>) -> Result<()> {
        match &term.key {
            Monomial::Vector(v) => {
                if self.kind != KeyKind::Vector {
                    return Err(Error::invalid_argument(
                        "vector key inserted into a packed series",
                    ));
                }
                if v.len() != self.symbols.len() {
                    return Err(Error::invalid_argument(format!(
                        "key has {} exponents, the series has {} symbols",
                        v.len(),
                        self.symbols.len()
                    )));
                }
            }
            Monomial::Packed(code) => {
                if self.kind != KeyKind::Packed {
                    return Err(Error::invalid_argument(
                        "packed key inserted into a vector series",
                    ));
                }
                let h_max = kronecker::code_bound(self.symbols.len())?;
                if *code < -h_max || *code > h_max {
                    return Err(Error::overflow(format!(
                        "code {code} out of range for {} symbols",
                        self.symbols.len()
                    )));
                }
            }
        }
        self.table.insert_or_accumulate(term.key, term.coefficient);
        Ok(())
    }

    /// Looks up the coefficient of the term with the given exponents.
    ///
    /// # Errors
    ///
    /// Same validation as [`insert`](Series::insert).
    pub fn get(&self, exponents: &[i64]) -> Result<Option<&C>> {
        if exponents.len() != self.symbols.len() {
            return Err(Error::invalid_argument(format!(
                "got {} exponents for the {} symbols of {}",
                exponents.len(),
                self.symbols.len(),
                self.symbols
            )));
        }
        let key = Monomial::from_exponents(self.kind, exponents)?;
        Ok(self.table.get(&key))
    }

    /// Widens the symbol set to the union with `extra`, re-encoding every
    /// stored term. Symbols already present keep their exponents; new
    /// symbols get exponent zero.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the union no longer fits a
    /// packed representation, or [`Error::Overflow`] if an exponent falls
    /// outside the tighter packing bound of the larger dimension.
    pub fn extend_symbols(&mut self, extra: &SymbolSet) -> Result<()> {
        let target = self.symbols.merge(extra);
        if target == self.symbols {
            return Ok(());
        }
        if self.kind == KeyKind::Packed && target.len() > kronecker::MAX_DIMENSION {
            return Err(Error::invalid_argument(format!(
                "cannot pack {} symbols, the limit is {}",
                target.len(),
                kronecker::MAX_DIMENSION
            )));
        }
        let map = self.symbols.extension_map(&target)?;
        let old_dim = self.symbols.len();
        let new_dim = target.len();
        let mut rebuilt = TermTable::new();
        rebuilt.rehash(self.table.bucket_count());
        let mut old_exps = vec![0i64; old_dim];
        let mut new_exps = vec![0i64; new_dim];
        for term in self.table.iter() {
            term.key.unpack_into(&mut old_exps)?;
            new_exps.iter_mut().for_each(|e| *e = 0);
            for (&src, &dst) in old_exps.iter().zip(&map) {
                new_exps[dst] = src;
            }
            let key = Monomial::from_exponents(self.kind, &new_exps)?;
            rebuilt.insert_or_accumulate(key, term.coefficient.clone());
        }
        self.symbols = target;
        self.table = rebuilt;
        Ok(())
    }

    /// Largest total degree among the stored terms, or `None` for an empty
    /// series.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Overflow`] if a term's degree sum leaves `i64`
    /// range.
    pub fn total_degree(&self) -> Result<Option<i64>> {
        let dim = self.symbols.len();
        let mut best: Option<i64> = None;
        for term in self.table.iter() {
            let d = term.key.degree(dim)?;
            best = Some(best.map_or(d, |b| b.max(d)));
        }
        Ok(best)
    }

    /// Largest degree in the named symbols among the stored terms, or
    /// `None` for an empty series. Unknown names contribute nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Overflow`] on degree sum overflow.
    pub fn partial_degree<S: AsRef<str>>(&self, names: &[S]) -> Result<Option<i64>> {
        let positions = self.symbols.positions(names);
        let dim = self.symbols.len();
        let mut best: Option<i64> = None;
        for term in self.table.iter() {
            let d = term.key.partial_degree(&positions, dim)?;
            best = Some(best.map_or(d, |b| b.max(d)));
        }
        Ok(best)
    }

    /// Multiplies two series under the process-wide truncation policy.
    ///
    /// # Errors
    ///
    /// See [`multiply_untruncated`](Series::multiply_untruncated); with a
    /// partial policy active, resolution of the policy's symbols can also
    /// fail.
    pub fn multiply(&self, rhs: &Series<C>) -> Result<Series<C>> {
        let (policy, _) = truncation::snapshot();
        multiplier::multiply(self, rhs, &policy)
    }

    /// Multiplies two series, keeping every product term.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the operands use different
    /// key representations, or [`Error::Overflow`] if a product exponent
    /// would leave the packing bounds of the merged symbol set.
    pub fn multiply_untruncated(&self, rhs: &Series<C>) -> Result<Series<C>> {
        multiplier::multiply(self, rhs, &TruncationPolicy::Disabled)
    }

    /// Multiplies two series, dropping product terms with total degree
    /// above `limit`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`multiply_untruncated`](Series::multiply_untruncated).
    pub fn multiply_truncated(&self, rhs: &Series<C>, limit: i64) -> Result<Series<C>> {
        multiplier::multiply(self, rhs, &TruncationPolicy::Total(limit))
    }

    /// Multiplies two series, dropping product terms whose degree in the
    /// named symbols exceeds `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty name list, plus the
    /// conditions of [`multiply_untruncated`](Series::multiply_untruncated).
    pub fn multiply_truncated_partial<S: AsRef<str>>(
        &self,
        rhs: &Series<C>,
        limit: i64,
        names: &[S],
    ) -> Result<Series<C>> {
        if names.is_empty() {
            return Err(Error::invalid_argument(
                "partial truncation needs at least one symbol",
            ));
        }
        let names: Vec<String> = names.iter().map(|s| s.as_ref().to_string()).collect();
        multiplier::multiply(self, rhs, &TruncationPolicy::Partial(limit, names))
    }
}

impl<C: Coefficient> PartialEq for Series<C> {
    fn eq(&self, other: &Self) -> bool {
        self.symbols == other.symbols
            && self.kind == other.kind
            && self.table.len() == other.table.len()
            && self
                .table
                .iter()
                .all(|t| other.table.get(&t.key) == Some(&t.coefficient))
    }
}

impl<C: Coefficient + std::fmt::Display> std::fmt::Display for Series<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.table.is_empty() {
            return f.write_str("0");
        }
        let mut terms: Vec<&Term<C>> = self.table.iter().collect();
        terms.sort_by(|a, b| a.key.cmp(&b.key));
        let dim = self.symbols.len();
        for (i, term) in terms.iter().enumerate() {
            if i > 0 {
                f.write_str(" + ")?;
            }
            write!(f, "{}", term.coefficient)?;
            let Ok(exps) = term.key.exponents(dim) else {
                continue;
            };
            for (pos, &e) in exps.iter().enumerate() {
                if e == 0 {
                    continue;
                }
                let name = self.symbols.get(pos).unwrap_or("?");
                if e == 1 {
                    write!(f, "*{name}")?;
                } else {
                    write!(f, "*{name}^{e}")?;
                }
            }
        }
        Ok(())
    }
}
