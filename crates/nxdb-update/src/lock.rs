//! A reader/writer lock with a single upgradeable holder.
//!
//! ```text
//!             read()              upgradeable()          upgrade()
//!   Free ───────────► Shared(n)   ──────────────► Upgradeable ──► PendingUpgrade ──► Exclusive
//!     ▲                                              (+n readers)      (readers drain)      │
//!     └──────────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Readers coexist with each other and with the upgradeable holder. Only the
//! upgradeable holder can promote to exclusive; while a promotion is pending
//! no new reader is admitted, and the promotion completes once the existing
//! readers have drained.
//!
//! A thread that holds a read guard must not upgrade, since the upgrade waits
//! for that same read guard.

use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard};

use tracing::debug;

/// Observable state of an [`UpgradeableLock`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockPhase {
    Free,
    Shared(usize),
    Upgradeable { readers: usize },
    PendingUpgrade { readers: usize },
    Exclusive,
}

#[derive(Debug, Default)]
struct LockState {
    readers: usize,
    upgradeable: bool,
    pending_upgrade: bool,
    exclusive: bool,
}

impl LockState {
    fn phase(&self) -> LockPhase {
        if self.exclusive {
            LockPhase::Exclusive
        } else if self.pending_upgrade {
            LockPhase::PendingUpgrade {
                readers: self.readers,
            }
        } else if self.upgradeable {
            LockPhase::Upgradeable {
                readers: self.readers,
            }
        } else if self.readers > 0 {
            LockPhase::Shared(self.readers)
        } else {
            LockPhase::Free
        }
    }

    fn admits_reader(&self) -> bool {
        !self.exclusive && !self.pending_upgrade
    }

    fn admits_upgradeable(&self) -> bool {
        !self.exclusive && !self.upgradeable
    }
}

/// Reader/writer lock with upgradeable read access.
#[derive(Default)]
pub struct UpgradeableLock {
    state: Mutex<LockState>,
    changed: Condvar,
}

impl UpgradeableLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared read access. Blocks while a writer holds or awaits exclusive
    /// access.
    pub fn read(&self) -> ReadGuard<'_> {
        let mut state = self.lock_state();
        while !state.admits_reader() {
            state = self.wait(state);
        }
        state.readers += 1;
        ReadGuard { lock: self }
    }

    /// Upgradeable read access. Blocks while another upgradeable holder or a
    /// writer exists; coexists with readers.
    pub fn upgradeable(&self) -> UpgradeableGuard<'_> {
        let mut state = self.lock_state();
        while !state.admits_upgradeable() {
            state = self.wait(state);
        }
        state.upgradeable = true;
        UpgradeableGuard { lock: self }
    }

    /// Upgradeable read access without blocking.
    pub fn try_upgradeable(&self) -> Option<UpgradeableGuard<'_>> {
        let mut state = self.lock_state();
        if !state.admits_upgradeable() {
            return None;
        }
        state.upgradeable = true;
        Some(UpgradeableGuard { lock: self })
    }

    pub fn phase(&self) -> LockPhase {
        self.lock_state().phase()
    }

    fn lock_state(&self) -> MutexGuard<'_, LockState> {
        self.state.lock().expect("lock poisoned")
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, LockState>) -> MutexGuard<'a, LockState> {
        self.changed.wait(guard).expect("lock poisoned")
    }

    fn release(&self, update: impl FnOnce(&mut LockState)) {
        let mut state = self.lock_state();
        update(&mut state);
        drop(state);
        self.changed.notify_all();
    }
}

impl fmt::Debug for UpgradeableLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpgradeableLock")
            .field("phase", &self.phase())
            .finish()
    }
}

/// Shared read access; released on drop.
#[must_use = "the lock is released when the guard is dropped"]
pub struct ReadGuard<'a> {
    lock: &'a UpgradeableLock,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        self.lock.release(|s| s.readers -= 1);
    }
}

/// Upgradeable read access; released on drop unless upgraded.
#[must_use = "the lock is released when the guard is dropped"]
pub struct UpgradeableGuard<'a> {
    lock: &'a UpgradeableLock,
}

impl<'a> UpgradeableGuard<'a> {
    /// Promote to exclusive access, waiting for current readers to drain.
    /// New readers are held back from the moment the promotion starts.
    pub fn upgrade(self) -> ExclusiveGuard<'a> {
        let lock = self.lock;
        // ownership of the upgradeable slot moves to the exclusive guard
        std::mem::forget(self);

        let mut state = lock.lock_state();
        state.pending_upgrade = true;
        if state.readers > 0 {
            debug!(readers = state.readers, "upgrade waiting for readers");
        }
        while state.readers > 0 {
            state = lock.wait(state);
        }
        state.pending_upgrade = false;
        state.upgradeable = false;
        state.exclusive = true;
        ExclusiveGuard { lock }
    }
}

impl Drop for UpgradeableGuard<'_> {
    fn drop(&mut self) {
        self.lock.release(|s| s.upgradeable = false);
    }
}

/// Exclusive access; released on drop.
#[must_use = "the lock is released when the guard is dropped"]
pub struct ExclusiveGuard<'a> {
    lock: &'a UpgradeableLock,
}

impl Drop for ExclusiveGuard<'_> {
    fn drop(&mut self) {
        self.lock.release(|s| s.exclusive = false);
    }
}
