//! Global degree-truncation policy.
//!
//! Truncation is configured process-wide: the active policy applies to
//! every subsequent [`Series::multiply`](crate::series::Series::multiply)
//! call. A multiplication snapshots the policy once on entry and never
//! looks at the registry again, so concurrent policy changes affect later
//! runs only. The generation counter bumps on every effective change,
//! letting cached degree data be invalidated cheaply.

use parking_lot::Mutex;
use seriatim_core::{Error, Result};

/// Degree truncation applied during series multiplication.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TruncationPolicy {
    /// Keep every term of the product.
    Disabled,
    /// Drop product terms whose total degree exceeds the limit.
    Total(i64),
    /// Drop product terms whose degree in the named symbols exceeds the
    /// limit.
    Partial(i64, Vec<String>),
}

struct Registry {
    policy: TruncationPolicy,
    generation: u64,
}

static REGISTRY: Mutex<Registry> = Mutex::new(Registry {
    policy: TruncationPolicy::Disabled,
    generation: 0,
});

/// Returns the active policy.
pub fn policy() -> TruncationPolicy {
    REGISTRY.lock().policy.clone()
}

/// Returns the current policy generation.
///
/// The generation changes exactly when the policy changes.
pub fn generation() -> u64 {
    REGISTRY.lock().generation
}

/// Returns the active policy together with its generation, read atomically.
pub fn snapshot() -> (TruncationPolicy, u64) {
    let registry = REGISTRY.lock();
    (registry.policy.clone(), registry.generation)
}

/// Installs a new policy. Setting the already-active policy is a no-op and
/// does not bump the generation.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for a partial policy with an empty
/// symbol list.
pub fn set_policy(policy: TruncationPolicy) -> Result<()> {
    if let TruncationPolicy::Partial(_, names) = &policy {
        if names.is_empty() {
            return Err(Error::invalid_argument(
                "partial truncation needs at least one symbol",
            ));
        }
    }
    let mut registry = REGISTRY.lock();
    if registry.policy != policy {
        registry.policy = policy;
        registry.generation += 1;
    }
    Ok(())
}

/// Truncates subsequent multiplications to the given total degree.
///
/// # Errors
///
/// Never fails; the `Result` mirrors the other policy setters.
pub fn truncate_degree(limit: i64) -> Result<()> {
    set_policy(TruncationPolicy::Total(limit))
}

/// Truncates subsequent multiplications to the given degree in the named
/// symbols.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `names` is empty.
pub fn truncate_partial_degree<S: Into<String>>(
    limit: i64,
    names: impl IntoIterator<Item = S>,
) -> Result<()> {
    set_policy(TruncationPolicy::Partial(
        limit,
        names.into_iter().map(Into::into).collect(),
    ))
}

/// Removes any active truncation.
pub fn disable_truncation() {
    // Disabled is always a valid policy.
    let _ = set_policy(TruncationPolicy::Disabled);
}

#[cfg(test)]
mod tests {
    use super::*;

    // The registry is process-global, so every scenario runs in one test.
    #[test]
    fn test_registry_behaviour() {
        disable_truncation();
        let start = generation();

        truncate_degree(5).unwrap();
        assert_eq!(policy(), TruncationPolicy::Total(5));
        assert_eq!(generation(), start + 1);

        // Same policy again: no generation bump.
        truncate_degree(5).unwrap();
        assert_eq!(generation(), start + 1);

        truncate_partial_degree(3, ["x"]).unwrap();
        let (p, g) = snapshot();
        assert_eq!(p, TruncationPolicy::Partial(3, vec!["x".to_string()]));
        assert_eq!(g, start + 2);

        assert!(matches!(
            truncate_partial_degree(3, Vec::<String>::new()),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(generation(), start + 2);

        disable_truncation();
        assert_eq!(policy(), TruncationPolicy::Disabled);
        assert_eq!(generation(), start + 3);
    }
}
