//! Ordered symbol sets.
//!
//! A [`SymbolSet`] names the variables of a series. Symbols are kept sorted
//! and unique so that a monomial's exponent vector can be addressed by
//! position and two series can merge their variables deterministically.

use crate::error::{Error, Result};

/// A sorted, duplicate-free set of variable names.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SymbolSet {
    names: Vec<String>,
}

impl SymbolSet {
    /// Creates an empty symbol set.
    pub fn new() -> Self {
        SymbolSet { names: Vec::new() }
    }

    /// Creates a symbol set from a list of names, sorting and removing
    /// duplicates.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        names.sort_unstable();
        names.dedup();
        SymbolSet { names }
    }

    /// Number of symbols in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if the set contains no symbols.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Returns the name at position `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Returns the position of `name`, if present.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.binary_search_by(|n| n.as_str().cmp(name)).ok()
    }

    /// Returns `true` if `name` belongs to the set.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Iterates over the names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Returns the union of two symbol sets.
    #[must_use]
    pub fn merge(&self, other: &SymbolSet) -> SymbolSet {
        let mut names = Vec::with_capacity(self.names.len() + other.names.len());
        let (mut i, mut j) = (0, 0);
        while i < self.names.len() && j < other.names.len() {
            match self.names[i].cmp(&other.names[j]) {
                std::cmp::Ordering::Less => {
                    names.push(self.names[i].clone());
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    names.push(other.names[j].clone());
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    names.push(self.names[i].clone());
                    i += 1;
                    j += 1;
                }
            }
        }
        names.extend_from_slice(&self.names[i..]);
        names.extend_from_slice(&other.names[j..]);
        SymbolSet { names }
    }

    /// For each symbol of `self`, its position inside `superset`.
    ///
    /// Used when a series is re-encoded after its symbol set grows: the map
    /// tells where each old exponent lands in the widened vector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `superset` is missing one of
    /// this set's symbols.
    pub fn extension_map(&self, superset: &SymbolSet) -> Result<Vec<usize>> {
        self.names
            .iter()
            .map(|n| {
                superset.index_of(n).ok_or_else(|| {
                    Error::invalid_argument(format!("symbol '{n}' missing from extended set"))
                })
            })
            .collect()
    }

    /// Sorted positions of the given names within this set. Names that do
    /// not belong to the set are ignored.
    #[must_use]
    pub fn positions<S: AsRef<str>>(&self, names: &[S]) -> Vec<usize> {
        let mut out: Vec<usize> = names
            .iter()
            .filter_map(|n| self.index_of(n.as_ref()))
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}

impl std::fmt::Display for SymbolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, n) in self.names.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{n}")?;
        }
        write!(f, "}}")
    }
}
