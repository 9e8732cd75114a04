//! Time-gated cache for source working fields
//!
//! Source modules evaluated several times per step (once per Runge-Kutta
//! stage, once for the time-step constraint) keep derived fields in a
//! [`Memo`]. The cached value is recomputed only when the requested time
//! differs from the last evaluated one, or the time is exactly zero, or the
//! memo was never filled.

/// Cached value tagged with the time it was computed for
#[derive(Debug, Clone, PartialEq)]
pub struct Memo<T> {
    last_time: Option<f64>,
    value: T,
}

impl<T> Memo<T> {
    /// Wrap an initial (not yet valid) value
    pub fn new(value: T) -> Self {
        Self { last_time: None, value }
    }

    /// Recompute predicate: `time != last_time || time == 0`
    pub fn is_stale(&self, time: f64) -> bool {
        match self.last_time {
            None => true,
            Some(last) => time != last || time == 0.0,
        }
    }

    /// Run `update` on the cached value if stale for `time`
    ///
    /// Returns whether a recompute happened. A failed update leaves the memo
    /// stale.
    pub fn refresh<E, F>(&mut self, time: f64, update: F) -> Result<bool, E>
    where
        F: FnOnce(&mut T) -> Result<(), E>,
    {
        if !self.is_stale(time) {
            return Ok(false);
        }
        self.last_time = None;
        update(&mut self.value)?;
        self.last_time = Some(time);
        Ok(true)
    }

    /// Forget the last evaluation time
    pub fn invalidate(&mut self) {
        self.last_time = None;
    }

    pub fn last_time(&self) -> Option<f64> {
        self.last_time
    }

    pub fn get(&self) -> &T {
        &self.value
    }
}
