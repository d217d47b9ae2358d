//! The series multiplication engine.
//!
//! Three execution paths share one entry point. Vector-keyed series and
//! every truncated product run through a blocked schoolbook loop over a
//! single hash table. Untruncated packed products instead exploit the
//! identity hash of Kronecker codes: the bucket of a product term is the
//! sum of the factors' buckets modulo the table size, so the output table
//! can be split into disjoint bucket zones and filled by several pool
//! workers without locking a single bucket twice.
//!
//! Output sizes are estimated up front with a randomised birthday-paradox
//! probe so the output table is allocated once instead of growing through
//! a cascade of rehashes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hashbrown::HashSet;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use seriatim_core::{settings, Coefficient, Error, Result, SymbolSet};
use seriatim_integers::Int;
use seriatim_pool::{self as pool, FutureList};
use tracing::debug;

use crate::kronecker;
use crate::monomial::{KeyKind, Monomial, Term};
use crate::series::Series;
use crate::table::TermTable;
use crate::truncation::TruncationPolicy;

/// Zones per pool worker in the packed multi-threaded path. More zones
/// than workers smooths out imbalance between zone populations.
const ZONES_PER_THREAD: usize = 10;

/// Trials of the output size estimator.
const ESTIMATE_TRIALS: usize = 15;

/// Safety factor applied to the birthday-paradox collision estimate.
const ESTIMATE_MULTIPLIER: u128 = 2;

/// Operand sizes below this run minmax and degree scans serially.
const PARALLEL_THRESHOLD: usize = 4096;

/// Multiplies two series under the given truncation policy.
///
/// Symbol sets are merged automatically; operands are extended to the
/// merged set before any term is touched. An empty operand, or a merged
/// symbol set with no symbols at all, short-circuits to an empty result.
pub(crate) fn multiply<C: Coefficient>(
    lhs: &Series<C>,
    rhs: &Series<C>,
    policy: &TruncationPolicy,
) -> Result<Series<C>> {
    if lhs.kind() != rhs.kind() {
        return Err(Error::invalid_argument(
            "cannot multiply series with different key representations",
        ));
    }
    let kind = lhs.kind();
    let symbols = lhs.symbols().merge(rhs.symbols());
    if lhs.is_empty() || rhs.is_empty() || symbols.is_empty() {
        return Series::new(kind, symbols);
    }
    let aligned = |s: &Series<C>| -> Result<Vec<Term<C>>> {
        if s.symbols() == &symbols {
            Ok(s.iter().cloned().collect())
        } else {
            let mut extended = s.clone();
            extended.extend_symbols(&symbols)?;
            Ok(extended.iter().cloned().collect())
        }
    };
    let terms_l = aligned(lhs)?;
    let terms_r = aligned(rhs)?;
    // The first operand of the engine is the larger one.
    let (v1, v2) = if terms_l.len() >= terms_r.len() {
        (terms_l, terms_r)
    } else {
        (terms_r, terms_l)
    };
    let work = v1.len() as u128 * v2.len() as u128;
    let n_threads = pool::use_threads(work, u128::from(settings::min_work_per_thread()));
    debug!(
        size1 = v1.len(),
        size2 = v2.len(),
        threads = n_threads,
        kind = ?kind,
        "multiplying series"
    );
    let engine = Multiplier {
        kind,
        symbols,
        v1,
        v2,
        n_threads,
    };
    engine.run(policy)
}

/// Per-term limits on how much of `v2` each `v1` term may multiply.
///
/// `v2` is ordered so that eligible partners form a prefix; the limit is
/// the length of that prefix.
#[derive(Clone)]
enum Limits {
    /// No truncation: the whole of `v2`.
    All(usize),
    /// Truncation: a per-`v1`-term prefix length.
    PerTerm(Arc<Vec<usize>>),
}

impl Limits {
    fn get(&self, i: usize) -> usize {
        match self {
            Limits::All(n) => *n,
            Limits::PerTerm(limits) => limits[i],
        }
    }
}

/// One unit of multiplication work: `v1[i]` times `v2[start..end]`.
#[derive(Clone, Copy, Debug)]
struct Task {
    i: usize,
    start: usize,
    end: usize,
}

/// A contiguous run of output buckets owned by one worker at a time.
struct ZoneSlot<C> {
    /// First bucket index of the zone in the full table.
    base: usize,
    /// The zone's buckets, moved out of the table for the parallel phase.
    chunk: Vec<Option<Term<C>>>,
    /// Terms whose probe sequence left the zone; merged serially later.
    spill: Vec<Term<C>>,
}

/// Shared state of the multi-threaded packed path.
struct ZoneCtx<C: Coefficient> {
    v1: Vec<(i64, C)>,
    v2: Vec<(i64, C)>,
    /// Per-zone task lists, sorted by first output bucket.
    tasks: Vec<Vec<Task>>,
    zones: Vec<Mutex<ZoneSlot<C>>>,
    /// Claim flags; the first worker to swap one owns the zone.
    flags: Vec<AtomicBool>,
    mask: usize,
    n_zones: usize,
    zones_per_thread: usize,
}

struct Multiplier<C: Coefficient> {
    kind: KeyKind,
    symbols: SymbolSet,
    v1: Vec<Term<C>>,
    v2: Vec<Term<C>>,
    n_threads: usize,
}

impl<C: Coefficient> Multiplier<C> {
    fn run(mut self, policy: &TruncationPolicy) -> Result<Series<C>> {
        if self.kind == KeyKind::Packed {
            self.check_packed_bounds()?;
        }
        let table = match policy {
            TruncationPolicy::Disabled => match self.kind {
                KeyKind::Packed => self.untruncated_kronecker()?,
                KeyKind::Vector => {
                    let limits = Limits::All(self.v2.len());
                    self.plain_multiplication(&limits)?
                }
            },
            TruncationPolicy::Total(limit) => self.truncated_multiplication(*limit, None)?,
            TruncationPolicy::Partial(limit, names) => {
                let positions = self.symbols.positions(names);
                self.truncated_multiplication(*limit, Some(positions))?
            }
        };
        Ok(Series::from_parts(self.kind, self.symbols, table))
    }

    /// Rejects operand pairs whose product exponents could leave the
    /// packing range of the merged dimension.
    ///
    /// Checked per dimension on the sum of the operands' exponent ranges,
    /// carried in `Int` so the check itself cannot wrap.
    fn check_packed_bounds(&self) -> Result<()> {
        let dim = self.symbols.len();
        let bound = Int::from(kronecker::bound(dim)?);
        let neg_bound = -bound.clone();
        let (min1, max1) = minmax_exponents(&self.v1, dim)?;
        let (min2, max2) = minmax_exponents(&self.v2, dim)?;
        for d in 0..dim {
            let lo = Int::from(min1[d]) + Int::from(min2[d]);
            let hi = Int::from(max1[d]) + Int::from(max2[d]);
            if lo < neg_bound || hi > bound {
                return Err(Error::overflow(format!(
                    "product exponent range [{lo}, {hi}] of symbol '{}' exceeds the packing bound {bound}",
                    self.symbols.get(d).unwrap_or("?")
                )));
            }
        }
        Ok(())
    }

    /// The blocked schoolbook path: every product pair visited directly,
    /// tiled so both operand windows stay cache resident.
    fn plain_multiplication(&mut self, limits: &Limits) -> Result<TermTable<C>> {
        let mut table = TermTable::new();
        let threshold = settings::estimate_threshold() as u128;
        let work = self.v1.len() as u128 * self.v2.len() as u128;
        if work >= threshold * threshold {
            let v1 = Arc::new(std::mem::take(&mut self.v1));
            let v2 = Arc::new(std::mem::take(&mut self.v2));
            let estimate = estimate_output_size(&v1, &v2, limits, self.n_threads)?;
            debug!(estimate, "presizing output table");
            table.rehash(buckets_for(estimate));
            self.v1 = unwrap_arc(v1);
            self.v2 = unwrap_arc(v2);
        }
        self.blocked_multiplication(&mut table, limits)?;
        table.sanitise();
        Ok(table)
    }

    fn blocked_multiplication(&self, table: &mut TermTable<C>, limits: &Limits) -> Result<()> {
        let bsize = settings::multiplication_block_size();
        let size1 = self.v1.len();
        let size2 = self.v2.len();
        let nblocks1 = size1 / bsize;
        let nblocks2 = size2 / bsize;
        for n1 in 0..=nblocks1 {
            let i_start = n1 * bsize;
            let i_end = if n1 == nblocks1 { size1 } else { i_start + bsize };
            for n2 in 0..=nblocks2 {
                let j_start = n2 * bsize;
                let j_end = if n2 == nblocks2 { size2 } else { j_start + bsize };
                for i in i_start..i_end {
                    let term1 = &self.v1[i];
                    let limit = limits.get(i).min(j_end);
                    for term2 in self.v2.get(j_start..limit).unwrap_or(&[]) {
                        let key = term1.key.mul(&term2.key)?;
                        table.fma_accumulate(key, &term1.coefficient, &term2.coefficient);
                    }
                }
            }
        }
        Ok(())
    }

    /// The truncated path: degree vectors are computed for both operands,
    /// `v2` is sorted by ascending degree, and each `v1` term's partner
    /// range shrinks to the prefix of `v2` that cannot exceed the limit.
    fn truncated_multiplication(
        &mut self,
        limit: i64,
        positions: Option<Vec<usize>>,
    ) -> Result<TermTable<C>> {
        let dim = self.symbols.len();
        let degree_of = |key: &Monomial| -> Result<i64> {
            match &positions {
                Some(p) => key.partial_degree(p, dim),
                None => key.degree(dim),
            }
        };
        let d1 = degrees(&self.v1, &degree_of)?;
        let d2 = degrees(&self.v2, &degree_of)?;
        let mut pairs: Vec<(i64, Term<C>)> =
            d2.into_iter().zip(std::mem::take(&mut self.v2)).collect();
        pairs.sort_by_key(|pair| pair.0);
        let (d2, v2): (Vec<i64>, Vec<Term<C>>) = pairs.into_iter().unzip();
        self.v2 = v2;
        let mut limits = Vec::with_capacity(d1.len());
        for &degree1 in &d1 {
            let headroom = limit.checked_sub(degree1).ok_or_else(|| {
                Error::overflow("truncation degree comparison overflows".to_string())
            })?;
            limits.push(d2.partition_point(|&d| d <= headroom));
        }
        self.plain_multiplication(&Limits::PerTerm(Arc::new(limits)))
    }

    /// The untruncated packed path. Small single-threaded products fall
    /// back to the blocked loop; everything else estimates the output
    /// size, allocates the table once, and runs the zone-split kernel.
    fn untruncated_kronecker(&mut self) -> Result<TermTable<C>> {
        let threshold = settings::estimate_threshold() as u128;
        let work = self.v1.len() as u128 * self.v2.len() as u128;
        if work < threshold * threshold && self.n_threads == 1 {
            let limits = Limits::All(self.v2.len());
            return self.plain_multiplication(&limits);
        }
        let limits = Limits::All(self.v2.len());
        let v1 = Arc::new(std::mem::take(&mut self.v1));
        let v2 = Arc::new(std::mem::take(&mut self.v2));
        let estimate = estimate_output_size(&v1, &v2, &limits, self.n_threads)?;
        debug!(estimate, threads = self.n_threads, "packed multiplication");
        let mut table = TermTable::new();
        table.rehash(buckets_for(estimate));
        let v1 = packed_view(unwrap_arc(v1))?;
        let v2 = packed_view(unwrap_arc(v2))?;
        self.sparse_kronecker(table, v1, v2)
    }

    /// Consumes sorted packed operands into `table`.
    ///
    /// Both operands are sorted by home bucket so that tasks write the
    /// table in roughly ascending bucket order. Multi-threaded runs split
    /// the bucket array into zones; the tasks of a zone produce only
    /// codes homed inside it, so workers never contend on a bucket.
    fn sparse_kronecker(
        &self,
        mut table: TermTable<C>,
        mut v1: Vec<(i64, C)>,
        mut v2: Vec<(i64, C)>,
    ) -> Result<TermTable<C>> {
        let bucket_count = table.bucket_count();
        let mask = bucket_count - 1;
        let block_size = settings::multiplication_block_size();
        v1.sort_by_key(|t| home_bucket(t.0, mask));
        v2.sort_by_key(|t| home_bucket(t.0, mask));

        if self.n_threads == 1 {
            let mut tasks = Vec::with_capacity(v1.len());
            for i in 0..v1.len() {
                split_push(&mut tasks, i, 0, v2.len(), block_size);
            }
            tasks.sort_by_key(|t| {
                home_bucket(v1[t.i].0, mask) + home_bucket(v2[t.start].0, mask)
            });
            for task in tasks {
                let (code1, ref coeff1) = v1[task.i];
                for &(code2, ref coeff2) in &v2[task.start..task.end] {
                    table.fma_accumulate(Monomial::Packed(code1 + code2), coeff1, coeff2);
                }
            }
            table.sanitise();
            return Ok(table);
        }

        let n_threads = self.n_threads;
        let n_zones = n_threads * ZONES_PER_THREAD;
        let buckets_per_zone = bucket_count / n_zones;
        debug!(n_zones, buckets_per_zone, "zone-split multiplication");

        // Per-worker task generation on the pool; worker t emits the task
        // lists of its own zones, in zone order.
        let v1 = Arc::new(v1);
        let v2 = Arc::new(v2);
        let mut filler_futures = Vec::with_capacity(n_threads);
        for t in 0..n_threads {
            let v1 = Arc::clone(&v1);
            let v2 = Arc::clone(&v2);
            filler_futures.push(pool::enqueue(t, move || -> Vec<Vec<Task>> {
                let mut zones = Vec::with_capacity(ZONES_PER_THREAD);
                for n in 0..ZONES_PER_THREAD {
                    let a = t * buckets_per_zone * ZONES_PER_THREAD + n * buckets_per_zone;
                    let b = if t == n_threads - 1 && n == ZONES_PER_THREAD - 1 {
                        bucket_count
                    } else {
                        a + buckets_per_zone
                    };
                    zones.push(fill_zone_tasks(&v1, &v2, mask, a, b, block_size));
                }
                zones
            })?);
        }
        for future in &filler_futures {
            future.wait();
        }
        let mut tasks: Vec<Vec<Task>> = Vec::with_capacity(n_zones);
        let mut first_error = None;
        for future in filler_futures {
            match future.get() {
                Ok(mut zone_tasks) => tasks.append(&mut zone_tasks),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        // Split the bucket array into per-zone chunks, last zone taking
        // the remainder.
        let mut buckets = table.take_buckets();
        let mut chunks = Vec::with_capacity(n_zones);
        for z in (0..n_zones).rev() {
            chunks.push(buckets.split_off(z * buckets_per_zone));
        }
        chunks.reverse();
        let zones: Vec<Mutex<ZoneSlot<C>>> = chunks
            .into_iter()
            .enumerate()
            .map(|(z, chunk)| {
                Mutex::new(ZoneSlot {
                    base: z * buckets_per_zone,
                    chunk,
                    spill: Vec::new(),
                })
            })
            .collect();
        let flags = (0..n_zones).map(|_| AtomicBool::new(false)).collect();
        let ctx = Arc::new(ZoneCtx {
            v1: unwrap_arc(v1),
            v2: unwrap_arc(v2),
            tasks,
            zones,
            flags,
            mask,
            n_zones,
            zones_per_thread: ZONES_PER_THREAD,
        });

        let mut futures = FutureList::new();
        for t in 0..n_threads {
            let ctx = Arc::clone(&ctx);
            futures.push(pool::enqueue(t, move || zone_worker(&ctx, t))?);
        }
        futures.get_all()?;

        let ctx = Arc::try_unwrap(ctx)
            .map_err(|_| Error::TaskFailure("zone state still shared after drain".to_string()))?;
        let mut buckets = Vec::with_capacity(bucket_count);
        let mut spills = Vec::new();
        for slot in ctx.zones {
            let slot = slot.into_inner();
            buckets.extend(slot.chunk);
            spills.extend(slot.spill);
        }
        table.adopt_buckets(buckets);
        for term in spills {
            table.raw_accumulate(term.key, term.coefficient);
        }
        table.sanitise();
        Ok(table)
    }
}

/// The bucket a packed code lands in, for a power-of-two table.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn home_bucket(code: i64, mask: usize) -> usize {
    (code as u64 as usize) & mask
}

/// Buckets needed to hold `estimate` terms below the table's load factor.
fn buckets_for(estimate: u128) -> usize {
    let capped = estimate.min(u128::from(u32::MAX));
    let capped = usize::try_from(capped).unwrap_or(usize::MAX);
    (capped / 3) * 4 + 4
}

fn unwrap_arc<T: Clone>(arc: Arc<T>) -> T {
    Arc::try_unwrap(arc).unwrap_or_else(|shared| (*shared).clone())
}

/// Strips packed terms down to `(code, coefficient)` pairs for the
/// Kronecker kernel's hot loops.
fn packed_view<C: Coefficient>(terms: Vec<Term<C>>) -> Result<Vec<(i64, C)>> {
    terms
        .into_iter()
        .map(|term| match term.key {
            Monomial::Packed(code) => Ok((code, term.coefficient)),
            Monomial::Vector(_) => Err(Error::invalid_argument(
                "vector key in the packed multiplication path",
            )),
        })
        .collect()
}

/// Splits `v1[i] * v2[start..end]` into tasks of at most `block_size`
/// partners each.
fn split_push(tasks: &mut Vec<Task>, i: usize, mut start: usize, end: usize, block_size: usize) {
    while end - start > block_size {
        tasks.push(Task {
            i,
            start,
            end: start + block_size,
        });
        start += block_size;
    }
    if start != end {
        tasks.push(Task { i, start, end });
    }
}

/// First index in `v2[first..last]` whose home bucket reaches `zone_bucket`
/// when shifted by the `v1` term's bucket `ib`. Returns `0` when the shift
/// alone already passes the zone start.
fn lower_bound<C>(
    v2: &[(i64, C)],
    first: usize,
    last: usize,
    zone_bucket: usize,
    ib: usize,
    mask: usize,
) -> usize {
    if zone_bucket < ib {
        return 0;
    }
    let want = zone_bucket - ib;
    let mut lo = first;
    let mut hi = last;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if home_bucket(v2[mid].0, mask) < want {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Builds the sorted task list of one zone of buckets `[a, b)`.
///
/// A product's bucket is `(ib + jb) mod n` with both addends below `n`,
/// so the sum lies in `[0, 2n)`: the first batch collects products whose
/// raw sum lands in `[a, b)`, the second those wrapping into
/// `[a + n, b + n)`. Within a batch the eligible `v2` indices of each
/// `v1` term form one contiguous range of the bucket-sorted `v2`.
fn fill_zone_tasks<C>(
    v1: &[(i64, C)],
    v2: &[(i64, C)],
    mask: usize,
    a: usize,
    b: usize,
    block_size: usize,
) -> Vec<Task> {
    let mut tasks = Vec::new();
    let n = mask + 1;
    let size2 = v2.len();
    for batch in 0..2 {
        let (za, zb) = if batch == 0 { (a, b) } else { (a + n, b + n) };
        for (i, term1) in v1.iter().enumerate() {
            let ib = home_bucket(term1.0, mask);
            let start = lower_bound(v2, 0, size2, za, ib, mask);
            let end = lower_bound(v2, start, size2, zb, ib, mask);
            // v1 is bucket-sorted: once a term's products all pass the
            // zone without wrapping, so do every later term's.
            if start == 0 && end == 0 {
                break;
            }
            if start < end {
                split_push(&mut tasks, i, start, end, block_size);
            }
        }
    }
    tasks.sort_by_key(|t| home_bucket(v1[t.i].0, mask) + home_bucket(v2[t.start].0, mask));
    tasks
}

/// One pool worker of the zone-split kernel: starts at its own zones and
/// walks the ring, claiming any zone not yet taken.
fn zone_worker<C: Coefficient>(ctx: &Arc<ZoneCtx<C>>, thread_idx: usize) {
    let start = thread_idx * ctx.zones_per_thread;
    let mut z = start;
    loop {
        if !ctx.flags[z].swap(true, Ordering::SeqCst) {
            consume_zone(ctx, z);
        }
        z = (z + 1) % ctx.n_zones;
        if z == start {
            break;
        }
    }
}

/// Runs every task of one zone against its bucket chunk.
///
/// Probing is linear and confined to the chunk; a probe that would step
/// past the chunk end goes to the spill list instead of touching the
/// next zone's buckets.
fn consume_zone<C: Coefficient>(ctx: &ZoneCtx<C>, zone: usize) {
    let mut slot = ctx.zones[zone].lock();
    let slot = &mut *slot;
    for task in &ctx.tasks[zone] {
        let (code1, ref coeff1) = ctx.v1[task.i];
        for &(code2, ref coeff2) in &ctx.v2[task.start..task.end] {
            let code = code1 + code2;
            let local = home_bucket(code, ctx.mask) - slot.base;
            let mut placed = false;
            let mut k = local;
            while k < slot.chunk.len() {
                match &mut slot.chunk[k] {
                    Some(term) => {
                        if term.key == Monomial::Packed(code) {
                            term.coefficient.multiply_accumulate(coeff1, coeff2);
                            placed = true;
                            break;
                        }
                        k += 1;
                    }
                    empty => {
                        *empty = Some(Term::new(
                            Monomial::Packed(code),
                            C::mul_refs(coeff1, coeff2),
                        ));
                        placed = true;
                        break;
                    }
                }
            }
            if !placed {
                slot.spill
                    .push(Term::new(Monomial::Packed(code), C::mul_refs(coeff1, coeff2)));
            }
        }
    }
}

/// Estimates the number of distinct terms of the product.
///
/// Randomised probe: each trial walks `v1` in a random order,
/// multiplying every term by one random eligible partner, and stops at
/// the first repeated product key. By the birthday paradox the number of
/// distinct keys grows with the square of the stop count. A trial that
/// never repeats has visited every product it can, so its count of
/// eligible pairs is used directly. Trials are seeded by their global
/// trial number, which makes the estimate independent of how many
/// workers share them.
fn estimate_output_size<C: Coefficient>(
    v1: &Arc<Vec<Term<C>>>,
    v2: &Arc<Vec<Term<C>>>,
    limits: &Limits,
    n_threads: usize,
) -> Result<u128> {
    let size1 = v1.len();
    let size2 = v2.len();
    if size1 == 0 || size2 == 0 {
        return Ok(1);
    }
    if size1 == 1 || size2 == 1 {
        return Ok(size1 as u128 * size2 as u128);
    }
    let n_workers = n_threads.clamp(1, ESTIMATE_TRIALS);
    let trials_per_worker = ESTIMATE_TRIALS / n_workers;
    let total = Arc::new(Mutex::new(0u128));
    let mut futures = Vec::with_capacity(n_workers);
    for w in 0..n_workers {
        let trials = if w == n_workers - 1 {
            ESTIMATE_TRIALS - trials_per_worker * w
        } else {
            trials_per_worker
        };
        let v1 = Arc::clone(v1);
        let v2 = Arc::clone(v2);
        let limits = limits.clone();
        let total = Arc::clone(&total);
        futures.push(pool::enqueue(w, move || -> Result<()> {
            let mut local = 0u128;
            for n in 0..trials {
                let trial = trials_per_worker * w + n;
                local += estimate_trial(&v1, &v2, &limits, trial as u64)?;
            }
            *total.lock() += local;
            Ok(())
        })?);
    }
    for future in &futures {
        future.wait();
    }
    let mut first_error = None;
    for future in futures {
        match future.get() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                first_error.get_or_insert(e);
            }
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    if let Some(e) = first_error {
        return Err(e);
    }
    let sum = *total.lock();
    Ok((sum / ESTIMATE_TRIALS as u128).max(1))
}

fn estimate_trial<C: Coefficient>(
    v1: &[Term<C>],
    v2: &[Term<C>],
    limits: &Limits,
    trial: u64,
) -> Result<u128> {
    let mut rng = ChaCha8Rng::seed_from_u64(trial);
    let mut order: Vec<usize> = (0..v1.len()).collect();
    order.shuffle(&mut rng);
    let mut seen: HashSet<Monomial> = HashSet::with_capacity(64);
    let mut count = 0u128;
    let mut eligible = 0u128;
    let mut repeated = false;
    for &i in &order {
        let limit = limits.get(i);
        if limit == 0 {
            continue;
        }
        eligible += limit as u128;
        let j = rng.gen_range(0..limit);
        let key = v1[i].key.mul(&v2[j].key)?;
        if !seen.insert(key) {
            repeated = true;
            break;
        }
        count += 1;
    }
    let trial_estimate = if repeated {
        ESTIMATE_MULTIPLIER * count * count
    } else {
        eligible
    };
    Ok(trial_estimate.max(1))
}

/// Per-dimension exponent minima and maxima of an operand.
fn minmax_exponents<C: Coefficient>(terms: &[Term<C>], dim: usize) -> Result<(Vec<i64>, Vec<i64>)> {
    let fold_chunk = |chunk: &[Term<C>]| -> Result<(Vec<i64>, Vec<i64>)> {
        let mut mins = vec![i64::MAX; dim];
        let mut maxs = vec![i64::MIN; dim];
        let mut buf = vec![0i64; dim];
        for term in chunk {
            term.key.unpack_into(&mut buf)?;
            for ((lo, hi), &e) in mins.iter_mut().zip(maxs.iter_mut()).zip(&buf) {
                *lo = (*lo).min(e);
                *hi = (*hi).max(e);
            }
        }
        Ok((mins, maxs))
    };
    if terms.len() < PARALLEL_THRESHOLD {
        return fold_chunk(terms);
    }
    let parts: Vec<(Vec<i64>, Vec<i64>)> = terms
        .par_chunks(PARALLEL_THRESHOLD)
        .map(fold_chunk)
        .collect::<Result<_>>()?;
    let mut mins = vec![i64::MAX; dim];
    let mut maxs = vec![i64::MIN; dim];
    for (part_mins, part_maxs) in parts {
        for ((lo, hi), (part_lo, part_hi)) in mins
            .iter_mut()
            .zip(maxs.iter_mut())
            .zip(part_mins.into_iter().zip(part_maxs))
        {
            *lo = (*lo).min(part_lo);
            *hi = (*hi).max(part_hi);
        }
    }
    Ok((mins, maxs))
}

/// Degrees of every term, parallel above the scan threshold.
fn degrees<C, F>(terms: &[Term<C>], degree_of: &F) -> Result<Vec<i64>>
where
    C: Coefficient,
    F: Fn(&Monomial) -> Result<i64> + Sync,
{
    if terms.len() < PARALLEL_THRESHOLD {
        terms.iter().map(|t| degree_of(&t.key)).collect()
    } else {
        terms.par_iter().map(|t| degree_of(&t.key)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packed(pairs: &[(&[i64], i64)], symbols: &[&str]) -> Series<i64> {
        let mut s = Series::new(KeyKind::Packed, SymbolSet::from_names(symbols.iter().copied()))
            .unwrap();
        for (exps, c) in pairs {
            s.insert(exps, *c).unwrap();
        }
        s
    }

    fn vector(pairs: &[(&[i64], i64)], symbols: &[&str]) -> Series<i64> {
        let mut s = Series::new(KeyKind::Vector, SymbolSet::from_names(symbols.iter().copied()))
            .unwrap();
        for (exps, c) in pairs {
            s.insert(exps, *c).unwrap();
        }
        s
    }

    #[test]
    fn test_binomial_product_both_kinds() {
        // (1 + x)(1 - x) = 1 - x^2
        let builders: [fn(&[(&[i64], i64)], &[&str]) -> Series<i64>; 2] = [packed, vector];
        for build in builders {
            let a = build(&[(&[0], 1), (&[1], 1)], &["x"]);
            let b = build(&[(&[0], 1), (&[1], -1)], &["x"]);
            let p = a.multiply_untruncated(&b).unwrap();
            assert_eq!(p.len(), 2);
            assert_eq!(p.get(&[0]).unwrap(), Some(&1));
            assert_eq!(p.get(&[1]).unwrap(), None);
            assert_eq!(p.get(&[2]).unwrap(), Some(&-1));
        }
    }

    #[test]
    fn test_symbol_sets_merge() {
        let a = packed(&[(&[1], 2)], &["x"]);
        let b = packed(&[(&[1], 3)], &["y"]);
        let p = a.multiply_untruncated(&b).unwrap();
        assert_eq!(p.symbols().len(), 2);
        assert_eq!(p.get(&[1, 1]).unwrap(), Some(&6));
    }

    #[test]
    fn test_empty_operand_gives_empty_product() {
        let a = packed(&[(&[1], 2)], &["x"]);
        let empty = packed(&[], &["x"]);
        let p = a.multiply_untruncated(&empty).unwrap();
        assert!(p.is_empty());
        assert_eq!(p.symbols().len(), 1);
    }

    #[test]
    fn test_no_symbols_gives_empty_product() {
        // Constants over an empty symbol set multiply to nothing.
        let a = packed(&[(&[], 5)], &[]);
        let b = packed(&[(&[], 7)], &[]);
        let p = a.multiply_untruncated(&b).unwrap();
        assert!(p.is_empty());
        assert!(p.symbols().is_empty());
    }

    #[test]
    fn test_mixed_kinds_rejected() {
        let a = packed(&[(&[1], 1)], &["x"]);
        let b = vector(&[(&[1], 1)], &["x"]);
        assert!(matches!(
            a.multiply_untruncated(&b),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_commutativity() {
        let a = packed(&[(&[0, 1], 3), (&[2, 0], -1), (&[1, 1], 4)], &["x", "y"]);
        let b = packed(&[(&[1, 0], 2), (&[0, 2], 5)], &["x", "y"]);
        assert_eq!(
            a.multiply_untruncated(&b).unwrap(),
            b.multiply_untruncated(&a).unwrap()
        );
    }

    #[test]
    fn test_cancellation_drops_terms() {
        // (x + y)(x - y) = x^2 - y^2, the xy terms cancel.
        let a = vector(&[(&[1, 0], 1), (&[0, 1], 1)], &["x", "y"]);
        let b = vector(&[(&[1, 0], 1), (&[0, 1], -1)], &["x", "y"]);
        let p = a.multiply_untruncated(&b).unwrap();
        assert_eq!(p.len(), 2);
        assert_eq!(p.get(&[2, 0]).unwrap(), Some(&1));
        assert_eq!(p.get(&[0, 2]).unwrap(), Some(&-1));
        assert_eq!(p.get(&[1, 1]).unwrap(), None);
    }

    #[test]
    fn test_truncated_total_degree() {
        // (1 + x + x^2 + x^3)^2, truncated at degree 3.
        let a = packed(&[(&[0], 1), (&[1], 1), (&[2], 1), (&[3], 1)], &["x"]);
        let full = a.multiply_untruncated(&a).unwrap();
        let cut = a.multiply_truncated(&a, 3).unwrap();
        assert_eq!(cut.len(), 4);
        for e in 0..=3i64 {
            assert_eq!(cut.get(&[e]).unwrap(), full.get(&[e]).unwrap());
        }
        assert_eq!(cut.get(&[4]).unwrap(), None);
    }

    #[test]
    fn test_truncated_negative_limit_empties() {
        let a = packed(&[(&[0], 1), (&[1], 1)], &["x"]);
        let p = a.multiply_truncated(&a, -1).unwrap();
        assert!(p.is_empty());
    }

    #[test]
    fn test_truncated_partial_degree() {
        // Limit the y-degree to 1: y^2 terms disappear, x is unlimited.
        let a = packed(&[(&[0, 1], 1), (&[3, 0], 1)], &["x", "y"]);
        let p = a.multiply_truncated_partial(&a, 1, &["y"]).unwrap();
        assert_eq!(p.get(&[0, 2]).unwrap(), None);
        assert_eq!(p.get(&[3, 1]).unwrap(), Some(&2));
        assert_eq!(p.get(&[6, 0]).unwrap(), Some(&1));
    }

    #[test]
    fn test_truncation_matches_filtered_product() {
        let a = packed(
            &[(&[0, 2], 3), (&[1, 1], -2), (&[2, 0], 1), (&[1, 0], 7)],
            &["x", "y"],
        );
        let b = packed(&[(&[0, 1], 1), (&[2, 1], -5), (&[0, 0], 2)], &["x", "y"]);
        let full = a.multiply_untruncated(&b).unwrap();
        for limit in -1..=6 {
            let cut = a.multiply_truncated(&b, limit).unwrap();
            let mut expected =
                Series::new(KeyKind::Packed, full.symbols().clone()).unwrap();
            for term in full.iter() {
                if term.key.degree(2).unwrap() <= limit {
                    expected.insert_term(term.clone()).unwrap();
                }
            }
            assert_eq!(cut, expected);
        }
    }

    #[test]
    fn test_packed_bounds_overflow() {
        let bound = kronecker::bound(2).unwrap();
        let a = packed(&[(&[bound, 0], 1)], &["x", "y"]);
        let b = packed(&[(&[1, 0], 1)], &["x", "y"]);
        assert!(matches!(
            a.multiply_untruncated(&b),
            Err(Error::Overflow(_))
        ));
    }

    #[test]
    fn test_bounds_accept_extremes() {
        // Sitting exactly on the bound is fine.
        let bound = kronecker::bound(1).unwrap();
        let a = packed(&[(&[bound - 1], 1)], &["x"]);
        let b = packed(&[(&[1], 1)], &["x"]);
        let p = a.multiply_untruncated(&b).unwrap();
        assert_eq!(p.get(&[bound]).unwrap(), Some(&1));
    }

    #[test]
    fn test_dense_product_through_estimator() {
        // 300 x 300 terms clears the estimation threshold; coefficients of
        // (sum of x^i for i < 300)^2 count the pairs summing to each power.
        let n = 300i64;
        let mut a =
            Series::new(KeyKind::Packed, SymbolSet::from_names(["x"])).unwrap();
        for i in 0..n {
            a.insert(&[i], 1i64).unwrap();
        }
        let p = a.multiply_untruncated(&a).unwrap();
        assert_eq!(p.len() as i64, 2 * n - 1);
        for k in [0, 1, n - 1, n, 2 * n - 2] {
            let expected = (k.min(2 * n - 2 - k) + 1).min(n);
            assert_eq!(p.get(&[k]).unwrap(), Some(&expected), "power {k}");
        }
    }

    #[test]
    fn test_large_product_exercises_zone_kernel() {
        // 800 x 800 products clear the per-thread work bound when the pool
        // has more than one worker; with exact coefficients the result is
        // identical on every path.
        let n = 800i64;
        let mut a =
            Series::new(KeyKind::Packed, SymbolSet::from_names(["x"])).unwrap();
        for i in 0..n {
            a.insert(&[i], 1i64).unwrap();
        }
        let p = a.multiply_untruncated(&a).unwrap();
        assert_eq!(p.len() as i64, 2 * n - 1);
        for k in [0, 799, 800, 1598] {
            let expected = (k.min(2 * n - 2 - k) + 1).min(n);
            assert_eq!(p.get(&[k]).unwrap(), Some(&expected), "power {k}");
        }
    }

    #[test]
    fn test_sparse_multivariate_product() {
        let a = packed(
            &[(&[1, 0, 0], 1), (&[0, 1, 0], 1), (&[0, 0, 1], 1)],
            &["x", "y", "z"],
        );
        let p = a.multiply_untruncated(&a).unwrap();
        assert_eq!(p.len(), 6);
        assert_eq!(p.get(&[2, 0, 0]).unwrap(), Some(&1));
        assert_eq!(p.get(&[1, 1, 0]).unwrap(), Some(&2));
        assert_eq!(p.get(&[0, 1, 1]).unwrap(), Some(&2));
    }

    #[test]
    fn test_estimate_is_worker_count_independent() {
        let mut a =
            Series::new(KeyKind::Packed, SymbolSet::from_names(["x"])).unwrap();
        for i in 0..250i64 {
            a.insert(&[i * 3], 1i64).unwrap();
        }
        let v1: Arc<Vec<Term<i64>>> = Arc::new(a.iter().cloned().collect());
        let v2 = Arc::clone(&v1);
        let limits = Limits::All(v1.len());
        let serial = estimate_output_size(&v1, &v2, &limits, 1).unwrap();
        let spread = estimate_output_size(&v1, &v2, &limits, pool::size()).unwrap();
        assert_eq!(serial, spread);
        assert!(serial >= 1);
    }

    #[test]
    fn test_one_term_operand_estimate() {
        let v1: Arc<Vec<Term<i64>>> =
            Arc::new(vec![Term::new(Monomial::Packed(3), 2i64)]);
        let v2: Arc<Vec<Term<i64>>> = Arc::new(vec![
            Term::new(Monomial::Packed(1), 1i64),
            Term::new(Monomial::Packed(2), 1i64),
        ]);
        let estimate = estimate_output_size(&v1, &v2, &Limits::All(2), 1).unwrap();
        assert_eq!(estimate, 2);
    }

    #[test]
    fn test_split_push_blocks() {
        let mut tasks = Vec::new();
        split_push(&mut tasks, 7, 0, 600, 256);
        assert_eq!(tasks.len(), 3);
        assert_eq!((tasks[0].start, tasks[0].end), (0, 256));
        assert_eq!((tasks[1].start, tasks[1].end), (256, 512));
        assert_eq!((tasks[2].start, tasks[2].end), (512, 600));
        tasks.clear();
        split_push(&mut tasks, 0, 10, 10, 256);
        assert!(tasks.is_empty());
    }

    #[test]
    fn test_zone_tasks_cover_all_products() {
        // Every (i, j) pair must appear in exactly one zone's tasks.
        let v1: Vec<(i64, i64)> = (0..40).map(|i| (i * 7 - 100, 1)).collect();
        let v2: Vec<(i64, i64)> = (0..23).map(|j| (j * 11 - 50, 1)).collect();
        let mask = 63usize;
        let mut v1 = v1;
        let mut v2 = v2;
        v1.sort_by_key(|t| home_bucket(t.0, mask));
        v2.sort_by_key(|t| home_bucket(t.0, mask));
        let n_zones = 4;
        let per_zone = (mask + 1) / n_zones;
        let mut seen = std::collections::HashMap::new();
        for z in 0..n_zones {
            let a = z * per_zone;
            let b = if z == n_zones - 1 { mask + 1 } else { a + per_zone };
            for task in fill_zone_tasks(&v1, &v2, mask, a, b, 8) {
                for j in task.start..task.end {
                    *seen.entry((task.i, j)).or_insert(0u32) += 1;
                    let bucket = home_bucket(v1[task.i].0 + v2[j].0, mask);
                    assert!(bucket >= a && bucket < b, "bucket outside its zone");
                }
            }
        }
        assert_eq!(seen.len(), v1.len() * v2.len());
        assert!(seen.values().all(|&c| c == 1));
    }

    #[test]
    fn test_vector_kind_skips_packing_bounds() {
        // Vector keys carry exponents a packed series could never hold.
        let huge = i64::MAX / 4;
        let a = vector(&[(&[huge], 1)], &["x"]);
        let p = a.multiply_untruncated(&a).unwrap();
        assert_eq!(p.get(&[huge * 2]).unwrap(), Some(&1));
    }
}
