//! The hash table a series stores its terms in.
//!
//! Open addressing with linear probing over a power-of-two bucket array.
//! Packed keys hash to their own code, so for them the bucket index is the
//! code reduced modulo the bucket count; the multiplication kernel leans on
//! the resulting additivity to precompute which zone of the table each
//! term product lands in. Deletion is by backward shift, keeping probe
//! chains gap-free without tombstones.
//!
//! Occupancy never exceeds three quarters of the buckets; inserts that
//! would cross the bound double the table first.

use seriatim_core::Coefficient;

use crate::monomial::{Monomial, Term};

const MIN_BUCKETS: usize = 16;
const LOAD_NUM: usize = 3;
const LOAD_DEN: usize = 4;

/// Hash table of terms keyed by monomial.
#[derive(Clone, Debug)]
pub struct TermTable<C> {
    buckets: Vec<Option<Term<C>>>,
    len: usize,
}

impl<C> Default for TermTable<C> {
    fn default() -> Self {
        TermTable {
            buckets: Vec::new(),
            len: 0,
        }
    }
}

impl<C: Coefficient> TermTable<C> {
    /// Creates an empty table with no buckets.
    pub fn new() -> Self {
        TermTable::default()
    }

    /// Number of stored terms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the table holds no terms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of buckets; always zero or a power of two.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn mask(&self) -> usize {
        self.buckets.len().wrapping_sub(1)
    }

    /// The bucket `key` hashes to; zero for a bucketless table.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn bucket_of(&self, key: &Monomial) -> usize {
        if self.buckets.is_empty() {
            return 0;
        }
        (key.table_hash() as usize) & self.mask()
    }

    /// Grows the bucket array to at least `min_buckets`, rounded up to a
    /// power of two, re-placing every stored term. Never shrinks.
    pub fn rehash(&mut self, min_buckets: usize) {
        let target = min_buckets.max(MIN_BUCKETS).next_power_of_two();
        if target <= self.buckets.len() {
            return;
        }
        let old = std::mem::replace(&mut self.buckets, vec![None; target]);
        self.len = 0;
        for term in old.into_iter().flatten() {
            self.place_new(term);
        }
    }

    fn grow_for(&mut self, additional: usize) {
        let needed = self.len + additional;
        if self.buckets.is_empty() || needed * LOAD_DEN > self.buckets.len() * LOAD_NUM {
            let target = ((needed * LOAD_DEN).div_ceil(LOAD_NUM)).max(self.buckets.len() * 2);
            self.rehash(target);
        }
    }

    // Probe chains are never full: occupancy stays under the load bound,
    // so every probe run hits an empty bucket.
    fn find_index(&self, key: &Monomial) -> Option<usize> {
        if self.buckets.is_empty() {
            return None;
        }
        let mask = self.mask();
        let mut i = self.bucket_of(key);
        while let Some(term) = &self.buckets[i] {
            if term.key == *key {
                return Some(i);
            }
            i = (i + 1) & mask;
        }
        None
    }

    fn place_new(&mut self, term: Term<C>) {
        let mask = self.mask();
        let mut i = self.bucket_of(&term.key);
        while self.buckets[i].is_some() {
            i = (i + 1) & mask;
        }
        self.buckets[i] = Some(term);
        self.len += 1;
    }

    /// Looks up the stored term for `key`.
    #[must_use]
    pub fn find(&self, key: &Monomial) -> Option<&Term<C>> {
        self.find_index(key).and_then(|i| self.buckets[i].as_ref())
    }

    /// Looks up the coefficient stored for `key`.
    #[must_use]
    pub fn get(&self, key: &Monomial) -> Option<&C> {
        self.find(key).map(|t| &t.coefficient)
    }

    /// Inserts a term, accumulating into an existing entry for the same
    /// key. An accumulation that cancels to zero removes the entry; a new
    /// zero coefficient is ignored.
    pub fn insert_or_accumulate(&mut self, key: Monomial, coefficient: C) {
        if let Some(i) = self.find_index(&key) {
            if let Some(term) = self.buckets[i].as_mut() {
                term.coefficient.add_assign_ref(&coefficient);
                if term.coefficient.is_zero() {
                    self.delete_at(i);
                }
            }
            return;
        }
        if coefficient.is_zero() {
            return;
        }
        self.grow_for(1);
        self.place_new(Term::new(key, coefficient));
    }

    /// Accumulates without the zero checks of
    /// [`insert_or_accumulate`](TermTable::insert_or_accumulate).
    ///
    /// Entries cancelled to zero stay in the table until
    /// [`sanitise`](TermTable::sanitise) runs; the multiplication kernel
    /// batches that cleanup to the end of a run.
    pub(crate) fn raw_accumulate(&mut self, key: Monomial, coefficient: C) {
        if let Some(i) = self.find_index(&key) {
            if let Some(term) = self.buckets[i].as_mut() {
                term.coefficient.add_assign_ref(&coefficient);
            }
            return;
        }
        self.grow_for(1);
        self.place_new(Term::new(key, coefficient));
    }

    /// Fused multiply-accumulate: adds `a * b` to the entry for `key`,
    /// creating it if absent. Raw semantics, like
    /// [`raw_accumulate`](TermTable::raw_accumulate).
    pub(crate) fn fma_accumulate(&mut self, key: Monomial, a: &C, b: &C) {
        if let Some(i) = self.find_index(&key) {
            if let Some(term) = self.buckets[i].as_mut() {
                term.coefficient.multiply_accumulate(a, b);
            }
            return;
        }
        self.grow_for(1);
        self.place_new(Term::new(key, C::mul_refs(a, b)));
    }

    /// Removes every zero-coefficient entry and restores the term count.
    pub fn sanitise(&mut self) {
        for i in 0..self.buckets.len() {
            while let Some(term) = &self.buckets[i] {
                if term.coefficient.is_zero() {
                    self.delete_at(i);
                } else {
                    break;
                }
            }
        }
        debug_assert_eq!(self.len, self.buckets.iter().flatten().count());
    }

    fn delete_at(&mut self, index: usize) {
        self.buckets[index] = None;
        self.len -= 1;
        let mask = self.mask();
        let mut hole = index;
        let mut j = (index + 1) & mask;
        while let Some(term) = &self.buckets[j] {
            let ideal = self.bucket_of(&term.key);
            // Shift back exactly when the hole sits between the term's
            // ideal bucket and its current one, cyclically.
            if (j.wrapping_sub(ideal) & mask) >= (j.wrapping_sub(hole) & mask) {
                self.buckets.swap(hole, j);
                hole = j;
            }
            j = (j + 1) & mask;
        }
    }

    /// Iterates over the stored terms in bucket order.
    pub fn iter(&self) -> impl Iterator<Item = &Term<C>> {
        self.buckets.iter().flatten()
    }

    /// Drops every term, keeping the bucket allocation.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            *bucket = None;
        }
        self.len = 0;
    }

    /// Detaches the bucket array, leaving the table empty.
    ///
    /// The multiplication kernel splits the detached array into zones that
    /// worker threads fill independently.
    pub(crate) fn take_buckets(&mut self) -> Vec<Option<Term<C>>> {
        self.len = 0;
        std::mem::take(&mut self.buckets)
    }

    /// Reattaches a bucket array produced by stitching zones back together.
    ///
    /// The array must be the takeaway of [`take_buckets`] with terms placed
    /// on valid probe chains; the term count is recomputed here.
    pub(crate) fn adopt_buckets(&mut self, buckets: Vec<Option<Term<C>>>) {
        self.len = buckets.iter().flatten().count();
        self.buckets = buckets;
    }
}

impl<'a, C: Coefficient> IntoIterator for &'a TermTable<C> {
    type Item = &'a Term<C>;
    type IntoIter = std::iter::Flatten<std::slice::Iter<'a, Option<Term<C>>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.buckets.iter().flatten()
    }
}
