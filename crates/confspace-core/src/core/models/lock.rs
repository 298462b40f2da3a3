use super::molecule::Molecule;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Guards a design-space molecule that is shared between the compiling
/// worker and concurrent observers (e.g., a live structure view).
///
/// Every in-place mutation must happen through [`MolLock::write`]; the guard
/// bumps a monotonically increasing change counter when it is released, so
/// an observer that does not want to block can poll [`MolLock::change_count`]
/// to learn when a re-read is needed. Outside of a held lock, no thread may
/// assume the molecule's state is stable.
#[derive(Debug)]
pub struct MolLock {
    inner: Mutex<Molecule>,
    change_count: AtomicU64,
}

/// A write guard over a locked molecule.
///
/// Dropping the guard releases the lock and bumps the owning lock's change
/// counter.
pub struct MolWriteGuard<'a> {
    guard: MutexGuard<'a, Molecule>,
    change_count: &'a AtomicU64,
}

impl MolLock {
    /// Wraps a molecule for shared access.
    pub fn new(molecule: Molecule) -> Self {
        Self {
            inner: Mutex::new(molecule),
            change_count: AtomicU64::new(0),
        }
    }

    /// Acquires the lock for reading.
    ///
    /// Readers that cannot tolerate blocking should instead poll
    /// [`change_count`](Self::change_count) and re-read when it moves.
    pub fn read(&self) -> MutexGuard<'_, Molecule> {
        // A poisoned lock still holds a readable molecule.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Acquires the lock for writing.
    pub fn write(&self) -> MolWriteGuard<'_> {
        let guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        MolWriteGuard {
            guard,
            change_count: &self.change_count,
        }
    }

    /// Takes an identity-preserving snapshot of the molecule under the lock.
    ///
    /// Returns the copy together with the change count it was taken at.
    pub fn snapshot(&self) -> (Molecule, u64) {
        let guard = self.read();
        (guard.clone(), self.change_count.load(Ordering::Acquire))
    }

    /// The number of completed write sessions on this molecule.
    pub fn change_count(&self) -> u64 {
        self.change_count.load(Ordering::Acquire)
    }
}

impl std::ops::Deref for MolWriteGuard<'_> {
    type Target = Molecule;

    fn deref(&self) -> &Molecule {
        &self.guard
    }
}

impl std::ops::DerefMut for MolWriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut Molecule {
        &mut self.guard
    }
}

impl Drop for MolWriteGuard<'_> {
    fn drop(&mut self) {
        self.change_count.fetch_add(1, Ordering::AcqRel);
    }
}
