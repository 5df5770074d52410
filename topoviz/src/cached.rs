use crate::errors::Result;

/// A lazily computed value that can be invalidated.
///
/// Starts out `Stale`. Reading a stale value computes it and moves to `Fresh`; invalidating moves
/// back to `Stale`. Nothing is recomputed eagerly.
///
#[derive(Clone, Debug)]
pub(crate) enum Cached<T> {
    Stale,
    Fresh(T),
}

impl<T> Default for Cached<T> {
    fn default() -> Self {
        Self::Stale
    }
}

impl<T> Cached<T> {
    #[cfg(test)]
    pub(crate) fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }

    pub(crate) fn invalidate(&mut self) {
        *self = Self::Stale;
    }

    /// Get the cached value, computing it first with `compute` if stale.
    ///
    /// If `compute` fails the cache stays stale.
    ///
    pub(crate) fn get_or_try_insert_with<F>(&mut self, compute: F) -> Result<&T>
    where
        F: FnOnce() -> Result<T>,
    {
        if let Self::Stale = self {
            *self = Self::Fresh(compute()?);
        }

        match self {
            Self::Fresh(value) => Ok(value),
            Self::Stale => unreachable!("cache was just filled"),
        }
    }
}
