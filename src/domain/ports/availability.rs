use async_trait::async_trait;

/// Port for the binary-acquisition oracle.
///
/// Answers whether a browser binary can be obtained for a value of the
/// search space. Implementations may be network-bound; they must be
/// idempotent. Failures are reported as "not available".
#[async_trait]
pub trait AvailabilityOracle<T>: Send + Sync {
    async fn is_available(&self, value: &T) -> bool;
}

/// Adapts a plain predicate into an [`AvailabilityOracle`].
///
/// # Examples
///
/// ```
/// use bci::domain::ports::FnAvailability;
///
/// let oracle = FnAvailability::new(|position: &u64| position % 2 == 0);
/// ```
pub struct FnAvailability<F> {
    predicate: F,
}

impl<F> FnAvailability<F> {
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

#[async_trait]
impl<T, F> AvailabilityOracle<T> for FnAvailability<F>
where
    T: Sync,
    F: Fn(&T) -> bool + Send + Sync,
{
    async fn is_available(&self, value: &T) -> bool {
        (self.predicate)(value)
    }
}
