//! Runtime configuration.
//!
//! Two independent switches live here:
//!
//! - The kernel mode, a process-wide setting choosing whether elementwise loops
//!   may be split across the rayon pool. Stored in an `AtomicU8`, so it can be
//!   flipped at any time from any thread.
//! - The grad mode, a per-thread flag controlling whether operations record
//!   themselves into the graph. Graphs never cross threads, so neither does
//!   this flag.
//!
//! # Example
//!
//! ```
//! use tapegrad::config::{no_grad, is_grad_enabled, set_kernel, Kernel};
//!
//! set_kernel(Kernel::Serial);
//! assert!(is_grad_enabled());
//! no_grad(|| assert!(!is_grad_enabled()));
//! set_kernel(Kernel::Parallel);
//! ```

use core::cell::Cell;
use core::convert::TryFrom;
use core::sync::atomic::{AtomicU8, Ordering};

/// Minimum element count before a parallel kernel is worth the fork/join.
pub const PARALLEL_THRESHOLD: usize = 1 << 14;

/// How elementwise loops are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Kernel {
    /// Plain iterators on the calling thread.
    Serial = 0,
    /// Rayon parallel iterators for buffers above [`PARALLEL_THRESHOLD`] (default).
    #[default]
    Parallel,
}

impl TryFrom<u8> for Kernel {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Serial),
            1 => Ok(Self::Parallel),
            _ => Err(()),
        }
    }
}

static GLOBAL_KERNEL: AtomicU8 = AtomicU8::new(Kernel::Parallel as u8);

/// Sets the kernel mode for all subsequent operations.
pub fn set_kernel(k: Kernel) {
    log::debug!("kernel mode set to {k:?}");
    GLOBAL_KERNEL.store(k as u8, Ordering::Release);
}

/// Returns the active kernel mode, defaulting to [`Kernel::Parallel`] on a
/// corrupt value.
pub fn get_kernel() -> Kernel {
    Kernel::try_from(GLOBAL_KERNEL.load(Ordering::Acquire)).unwrap_or_default()
}

thread_local! {
    static GRAD_ENABLED: Cell<bool> = const { Cell::new(true) };
}

/// Whether operations on this thread currently record into the graph.
pub fn is_grad_enabled() -> bool {
    GRAD_ENABLED.with(Cell::get)
}

/// Sets the grad mode for this thread and returns the previous mode.
pub fn set_grad_enabled(enabled: bool) -> bool {
    GRAD_ENABLED.with(|flag| flag.replace(enabled))
}

/// Disables graph recording until dropped, then restores the previous mode.
#[derive(Debug)]
#[must_use = "grad mode is restored as soon as the guard is dropped"]
pub struct NoGradGuard {
    prev: bool,
}

impl NoGradGuard {
    /// Turns recording off on this thread.
    pub fn new() -> Self {
        Self {
            prev: set_grad_enabled(false),
        }
    }
}

impl Default for NoGradGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for NoGradGuard {
    fn drop(&mut self) {
        set_grad_enabled(self.prev);
    }
}

/// Runs `f` with graph recording disabled.
///
/// Values produced inside are constants: no creator, no gradient tracking.
pub fn no_grad<R>(f: impl FnOnce() -> R) -> R {
    let _guard = NoGradGuard::new();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_restores_previous_mode() {
        assert!(is_grad_enabled());
        {
            let _outer = NoGradGuard::new();
            assert!(!is_grad_enabled());
            {
                let _inner = NoGradGuard::new();
                assert!(!is_grad_enabled());
            }
            assert!(!is_grad_enabled());
        }
        assert!(is_grad_enabled());
    }

    #[test]
    fn set_grad_enabled_returns_previous() {
        assert!(set_grad_enabled(false));
        assert!(!no_grad(is_grad_enabled));
        assert!(!set_grad_enabled(true));
        assert!(is_grad_enabled());
    }

    #[test]
    fn kernel_round_trips_through_u8() {
        assert_eq!(Kernel::try_from(Kernel::Serial as u8), Ok(Kernel::Serial));
        assert_eq!(Kernel::try_from(Kernel::Parallel as u8), Ok(Kernel::Parallel));
        assert!(Kernel::try_from(9).is_err());
    }
}
