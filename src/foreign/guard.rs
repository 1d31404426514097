//! Scoped memory-fault containment around foreign model calls.
//!
//! External model code is not ours and cannot be trusted to stay within its
//! buffers. While a [`FaultGuard`] is alive, SIGSEGV and SIGBUS print a fixed
//! diagnostic and terminate the process immediately. Nothing unwinds and
//! nothing returns to the caller: the state the foreign routine left behind is
//! unknown, so continuing would only propagate garbage.
//!
//! Guards nest. The first one saves the previous handlers, the last one to be
//! dropped puts them back.

/// Diagnostic written to stderr when a foreign routine faults.
pub const FAULT_MESSAGE: &str = "fitfun: memory fault inside an external model routine; terminating.\n";

#[cfg(unix)]
mod imp {
    use std::os::raw::c_int;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::FAULT_MESSAGE;

    const SIGNALS: [c_int; 2] = [libc::SIGSEGV, libc::SIGBUS];

    static FAULT_IN_PROGRESS: AtomicBool = AtomicBool::new(false);

    struct Installed {
        depth: usize,
        previous: Vec<(c_int, libc::sigaction)>,
    }

    static STATE: Mutex<Installed> = Mutex::new(Installed {
        depth: 0,
        previous: Vec::new(),
    });

    extern "C" fn on_fault(_signo: c_int) {
        if FAULT_IN_PROGRESS.swap(true, Ordering::SeqCst) {
            return;
        }
        // Only async-signal-safe calls from here on.
        unsafe {
            libc::write(
                libc::STDERR_FILENO,
                FAULT_MESSAGE.as_ptr().cast(),
                FAULT_MESSAGE.len(),
            );
            for sig in SIGNALS {
                libc::signal(sig, libc::SIG_DFL);
            }
            libc::_exit(libc::EXIT_FAILURE);
        }
    }

    pub(super) fn handler_address() -> libc::sighandler_t {
        on_fault as extern "C" fn(c_int) as libc::sighandler_t
    }

    pub struct FaultGuard {
        _private: (),
    }

    impl FaultGuard {
        pub fn install() -> Self {
            let mut state = STATE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if state.depth == 0 {
                for sig in SIGNALS {
                    // SAFETY: both structs are plain C data, zeroed is a valid
                    // starting state, and the handler only uses signal-safe calls.
                    unsafe {
                        let mut action: libc::sigaction = std::mem::zeroed();
                        action.sa_sigaction = handler_address();
                        libc::sigemptyset(&mut action.sa_mask);
                        action.sa_flags = 0;

                        let mut old: libc::sigaction = std::mem::zeroed();
                        if libc::sigaction(sig, &action, &mut old) == 0 {
                            state.previous.push((sig, old));
                        } else {
                            tracing::warn!(signal = sig, "could not install memory-fault handler");
                        }
                    }
                }
            }
            state.depth += 1;
            Self { _private: () }
        }

        /// Number of signals currently routed to the fault handler.
        pub fn installed(&self) -> usize {
            STATE
                .lock()
                .map(|state| state.previous.len())
                .unwrap_or_else(|poisoned| poisoned.into_inner().previous.len())
        }
    }

    impl Drop for FaultGuard {
        fn drop(&mut self) {
            let mut state = STATE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            state.depth = state.depth.saturating_sub(1);
            if state.depth > 0 {
                return;
            }
            let previous: Vec<_> = state.previous.drain(..).collect();
            for (sig, old) in previous.into_iter().rev() {
                // SAFETY: `old` was filled in by the kernel when we installed.
                let rc = unsafe { libc::sigaction(sig, &old, std::ptr::null_mut()) };
                if rc != 0 {
                    tracing::warn!(signal = sig, "could not restore previous signal handler");
                }
            }
        }
    }
}

#[cfg(not(unix))]
mod imp {
    pub struct FaultGuard {
        _private: (),
    }

    impl FaultGuard {
        pub fn install() -> Self {
            tracing::debug!("memory-fault containment is not available on this platform");
            Self { _private: () }
        }

        pub fn installed(&self) -> usize {
            0
        }
    }
}

/// RAII handle; faults are contained while it lives.
pub use imp::FaultGuard;

/// Run `body` with a [`FaultGuard`] installed.
pub fn guarded<R>(body: impl FnOnce() -> R) -> R {
    let _guard = FaultGuard::install();
    body()
}
