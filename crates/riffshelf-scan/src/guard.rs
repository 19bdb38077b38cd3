//! Single-flight guard for scan runs.

use std::sync::atomic::{AtomicBool, Ordering};

use riffshelf_core::ScanError;

/// Holds the "scan in progress" flag for the lifetime of one run.
///
/// The flag is released in `Drop`, so every exit path clears it: normal
/// return, `?` propagation, cancellation and unwinding.
#[derive(Debug)]
pub struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    /// Set the flag, failing with [`ScanError::ScannerBusy`] if it is already set.
    pub fn acquire(flag: &'a AtomicBool) -> Result<Self, ScanError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ScanError::ScannerBusy)?;
        Ok(Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails() {
        let flag = AtomicBool::new(false);
        let guard = BusyGuard::acquire(&flag).unwrap();
        assert!(flag.load(Ordering::Acquire));
        assert!(matches!(
            BusyGuard::acquire(&flag),
            Err(ScanError::ScannerBusy)
        ));
        drop(guard);
        assert!(!flag.load(Ordering::Acquire));
        assert!(BusyGuard::acquire(&flag).is_ok());
    }

    #[test]
    fn test_released_on_error_path() {
        fn failing_run(flag: &AtomicBool) -> Result<(), ScanError> {
            let _guard = BusyGuard::acquire(flag)?;
            Err(ScanError::Other {
                message: "injected".into(),
            })
        }

        let flag = AtomicBool::new(false);
        assert!(failing_run(&flag).is_err());
        assert!(!flag.load(Ordering::Acquire));
    }

    #[test]
    fn test_released_on_panic() {
        let flag = AtomicBool::new(false);
        let result = std::panic::catch_unwind(|| {
            let _guard = BusyGuard::acquire(&flag).unwrap();
            panic!("injected");
        });
        assert!(result.is_err());
        assert!(!flag.load(Ordering::Acquire));
    }
}
