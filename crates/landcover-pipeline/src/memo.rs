use std::sync::OnceLock;

/// A workflow node whose value is computed on first request and kept.
///
/// Failed evaluations are not cached: the next request runs the stage again.
#[derive(Debug)]
pub struct Memo<T> {
    cell: OnceLock<T>,
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self { cell: OnceLock::new() }
    }
}

impl<T> Memo<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached value, without evaluating.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    #[must_use]
    pub fn is_evaluated(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Return the cached value or compute, cache and return it.
    ///
    /// # Errors
    ///
    /// Returns whatever `compute` returns on failure.
    pub fn get_or_try_init<E>(&self, compute: impl FnOnce() -> Result<T, E>) -> Result<&T, E> {
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }
        let value = compute()?;
        Ok(self.cell.get_or_init(|| value))
    }
}
