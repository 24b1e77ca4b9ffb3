//! Reference-counted claim on the shared connection.

use super::ConnectionManager;

/// Keeps the shared connection wanted.
///
/// Each active consumer holds one lease. Releasing the last lease closes
/// the connection. Released on drop if not released explicitly.
#[must_use = "dropping the lease releases the connection immediately"]
pub struct ConnectionLease {
    manager: ConnectionManager,
    released: bool,
}

impl ConnectionLease {
    pub(super) fn new(manager: ConnectionManager) -> Self {
        Self {
            manager,
            released: false,
        }
    }

    /// The manager this lease belongs to.
    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    /// Give the lease back.
    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.manager.release_lease();
        }
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        self.release_once();
    }
}

impl std::fmt::Debug for ConnectionLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionLease")
            .field("released", &self.released)
            .finish()
    }
}
