//! Single-slot in-flight guard for the application boundary.
//!
//! A second request while one is running is refused, not queued. The permit
//! clears the slot on drop, including on early return or panic.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::BackupError;

#[derive(Debug, Default)]
pub struct InFlightGuard {
    busy: AtomicBool,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot, or `None` if a permit is already live.
    pub fn try_acquire(&self) -> Option<InFlightPermit<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightPermit { guard: self })
    }

    /// Run `f` holding the slot; `BackupError::Busy` if it was taken.
    pub fn run<T>(
        &self,
        f: impl FnOnce() -> Result<T, BackupError>,
    ) -> Result<T, BackupError> {
        let _permit = self.try_acquire().ok_or(BackupError::Busy)?;
        f()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct InFlightPermit<'a> {
    guard: &'a InFlightGuard,
}

impl Drop for InFlightPermit<'_> {
    fn drop(&mut self) {
        self.guard.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_refused_while_held() {
        let g = InFlightGuard::new();
        let p = g.try_acquire().unwrap();
        assert!(g.is_busy());
        assert!(g.try_acquire().is_none());
        drop(p);
        assert!(!g.is_busy());
        assert!(g.try_acquire().is_some());
    }

    #[test]
    fn run_reports_busy() {
        let g = InFlightGuard::new();
        let nested = g.run(|| Ok(g.run(|| Ok(1)).unwrap_err())).unwrap();
        assert!(matches!(nested, BackupError::Busy));
        assert!(!g.is_busy());
    }

    #[test]
    fn slot_released_after_error() {
        let g = InFlightGuard::new();
        let r: Result<(), _> = g.run(|| Err(BackupError::Api("down".into())));
        assert!(r.is_err());
        assert!(!g.is_busy());
    }
}
