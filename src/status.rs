use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tokio::sync::watch;

/// install progress as seen by the ui
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallerStatus {
    Idle,
    SendingManifest,
    SendingPayload,
    Completed { total_bytes: u64 },
    Broken,
}

impl InstallerStatus {
    fn rank(&self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::SendingManifest => 1,
            Self::SendingPayload => 2,
            Self::Completed { .. } | Self::Broken => 3,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.rank() == 3
    }

    /// transitions only move forward; terminal states are final
    pub fn can_advance_to(&self, next: &InstallerStatus) -> bool {
        next.rank() > self.rank()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// ui-owned registry of status observers
///
/// Sessions only ever hold a [`StatusHandle`], which points back here weakly,
/// so dropping the registry (or unregistering) silently disconnects them.
#[derive(Debug, Default)]
pub struct StatusRegistry {
    observers: DashMap<ObserverId, watch::Sender<InstallerStatus>>,
    next_id: AtomicU64,
}

impl StatusRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// register a new observer starting at `Idle`
    pub fn register(self: &Arc<Self>) -> (StatusHandle, watch::Receiver<InstallerStatus>) {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = watch::channel(InstallerStatus::Idle);
        self.observers.insert(id, tx);
        tracing::debug!("Registered status observer {:?}", id);

        let handle = StatusHandle {
            registry: Arc::downgrade(self),
            id,
        };
        (handle, rx)
    }

    pub fn unregister(&self, id: ObserverId) {
        if self.observers.remove(&id).is_some() {
            tracing::debug!("Unregistered status observer {:?}", id);
        }
    }

    pub fn current(&self, id: ObserverId) -> Option<InstallerStatus> {
        self.observers.get(&id).map(|tx| *tx.borrow())
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

/// non-owning handle a session uses to report status
#[derive(Debug, Clone)]
pub struct StatusHandle {
    registry: Weak<StatusRegistry>,
    id: ObserverId,
}

impl StatusHandle {
    /// handle that reports nowhere
    pub fn detached() -> Self {
        Self {
            registry: Weak::new(),
            id: ObserverId(u64::MAX),
        }
    }

    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// fire-and-forget status update, returns whether it was applied
    pub fn publish(&self, status: InstallerStatus) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            tracing::trace!("Status registry gone, dropping {:?}", status);
            return false;
        };
        let Some(tx) = registry.observers.get(&self.id) else {
            tracing::trace!("Observer {:?} gone, dropping {:?}", self.id, status);
            return false;
        };

        let applied = tx.send_if_modified(|current| {
            if current.can_advance_to(&status) {
                *current = status;
                true
            } else {
                false
            }
        });

        if applied {
            tracing::debug!("Status -> {:?}", status);
        } else {
            tracing::trace!("Ignoring status {:?}, already at {:?}", status, *tx.borrow());
        }
        applied
    }
}
