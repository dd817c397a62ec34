//! Per-resource-kind state machines: `States`, the `PendingStates` /
//! `StableStates` / `FailedStates` classification, and the legal-transition
//! table each supervisor and API handler consults before moving a resource.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! state_enum {
    ($name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

state_enum!(ClusterState {
    CreationRequested => "creation-requested",
    CreationInProgress => "creation-in-progress",
    CreationFailed => "creation-failed",
    Stable => "stable",
    ProvisioningRequested => "provisioning-requested",
    Provisioning => "provisioning",
    ProvisioningFailed => "provisioning-failed",
    UpgradeRequested => "upgrade-requested",
    Upgrading => "upgrading",
    UpgradeFailed => "upgrade-failed",
    ResizeRequested => "resize-requested",
    Resizing => "resizing",
    ResizeFailed => "resize-failed",
    DeletionRequested => "deletion-requested",
    DeletionInProgress => "deletion-in-progress",
    DeletionFailed => "deletion-failed",
    Deleted => "deleted",
});

impl ClusterState {
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            Self::CreationRequested
                | Self::CreationInProgress
                | Self::ProvisioningRequested
                | Self::Provisioning
                | Self::UpgradeRequested
                | Self::Upgrading
                | Self::ResizeRequested
                | Self::Resizing
                | Self::DeletionRequested
                | Self::DeletionInProgress
        )
    }

    pub fn is_stable(&self) -> bool {
        matches!(self, Self::Stable | Self::Deleted)
    }

    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            Self::CreationFailed
                | Self::ProvisioningFailed
                | Self::UpgradeFailed
                | Self::ResizeFailed
                | Self::DeletionFailed
        )
    }

    /// Allows any installation scheduling (§4.4 candidate-set filter).
    pub fn accepts_installations(&self) -> bool {
        matches!(self, Self::Stable | Self::Resizing | Self::Provisioning)
    }

    /// API-requested transition legality (`T: State × State → bool`).
    pub fn can_transition(&self, to: Self) -> bool {
        use ClusterState::*;
        match (*self, to) {
            (a, b) if a == b => true, // idempotent no-op, still wakes the supervisor
            (CreationFailed, CreationRequested) => true,
            (Stable, ProvisioningRequested) => true,
            (ProvisioningFailed, ProvisioningRequested) => true,
            (Stable, UpgradeRequested) => true,
            (UpgradeFailed, UpgradeRequested) => true,
            (Stable, ResizeRequested) => true,
            (ResizeFailed, ResizeRequested) => true,
            (Stable, DeletionRequested) => true,
            (CreationFailed, DeletionRequested) => true,
            (DeletionFailed, DeletionRequested) => true,
            _ => false,
        }
    }
}

state_enum!(InstallationState {
    CreationRequested => "creation-requested",
    CreationInProgress => "creation-in-progress",
    CreationNoCompatibleClusters => "creation-no-compatible-clusters",
    CreationFailed => "creation-failed",
    Stable => "stable",
    UpdateRequested => "update-requested",
    UpdateInProgress => "update-in-progress",
    UpdateFailed => "update-failed",
    HibernationRequested => "hibernation-requested",
    Hibernating => "hibernating",
    HibernationFailed => "hibernation-failed",
    WakeupRequested => "wakeup-requested",
    WakingUp => "waking-up",
    WakeupFailed => "wakeup-failed",
    DeletionRequested => "deletion-requested",
    DeletionInProgress => "deletion-in-progress",
    DeletionFailed => "deletion-failed",
    Deleted => "deleted",
});

impl InstallationState {
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            Self::CreationRequested
                | Self::CreationInProgress
                | Self::UpdateRequested
                | Self::UpdateInProgress
                | Self::HibernationRequested
                | Self::WakeupRequested
                | Self::WakingUp
                | Self::DeletionRequested
                | Self::DeletionInProgress
        )
    }

    pub fn is_stable(&self) -> bool {
        matches!(
            self,
            Self::Stable | Self::CreationNoCompatibleClusters | Self::Hibernating | Self::Deleted
        )
    }

    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            Self::CreationFailed
                | Self::UpdateFailed
                | Self::HibernationFailed
                | Self::WakeupFailed
                | Self::DeletionFailed
        )
    }

    pub fn can_transition(&self, to: Self) -> bool {
        use InstallationState::*;
        match (*self, to) {
            (a, b) if a == b => true,
            (CreationFailed, CreationRequested) => true,
            (CreationNoCompatibleClusters, CreationRequested) => true,
            (Stable, UpdateRequested) => true,
            (UpdateFailed, UpdateRequested) => true,
            (Stable, HibernationRequested) => true,
            (HibernationFailed, HibernationRequested) => true,
            (Hibernating, WakeupRequested) => true,
            (WakeupFailed, WakeupRequested) => true,
            (Stable, DeletionRequested) => true,
            (Hibernating, DeletionRequested) => true,
            (CreationNoCompatibleClusters, DeletionRequested) => true,
            (CreationFailed, DeletionRequested) => true,
            (DeletionFailed, DeletionRequested) => true,
            _ => false,
        }
    }
}

state_enum!(ClusterInstallationState {
    CreationRequested => "creation-requested",
    CreationInProgress => "creation-in-progress",
    CreationFailed => "creation-failed",
    Stable => "stable",
    ReconcilingRequested => "reconciling-requested",
    Reconciling => "reconciling",
    ReconcileFailed => "reconcile-failed",
    DeletionRequested => "deletion-requested",
    DeletionInProgress => "deletion-in-progress",
    DeletionFailed => "deletion-failed",
    Deleted => "deleted",
});

impl ClusterInstallationState {
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            Self::CreationRequested
                | Self::CreationInProgress
                | Self::ReconcilingRequested
                | Self::Reconciling
                | Self::DeletionRequested
                | Self::DeletionInProgress
        )
    }

    pub fn is_stable(&self) -> bool {
        matches!(self, Self::Stable | Self::Deleted)
    }

    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            Self::CreationFailed | Self::ReconcileFailed | Self::DeletionFailed
        )
    }

    pub fn can_transition(&self, to: Self) -> bool {
        use ClusterInstallationState::*;
        match (*self, to) {
            (a, b) if a == b => true,
            (CreationFailed, CreationRequested) => true,
            (Stable, ReconcilingRequested) => true,
            (ReconcileFailed, ReconcilingRequested) => true,
            (Stable, DeletionRequested) => true,
            (CreationFailed, DeletionRequested) => true,
            (ReconcileFailed, DeletionRequested) => true,
            (DeletionFailed, DeletionRequested) => true,
            _ => false,
        }
    }
}

/// Shared by DatabaseSchema and Backup — both are minimal request/advance
/// resources driven by a supervisor but otherwise inert.
state_enum!(WorkState {
    Requested => "requested",
    InProgress => "in-progress",
    Stable => "stable",
    Failed => "failed",
    DeletionRequested => "deletion-requested",
    DeletionInProgress => "deletion-in-progress",
    DeletionFailed => "deletion-failed",
    Deleted => "deleted",
});

impl WorkState {
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            Self::Requested | Self::InProgress | Self::DeletionRequested | Self::DeletionInProgress
        )
    }

    pub fn is_stable(&self) -> bool {
        matches!(self, Self::Stable | Self::Deleted)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed | Self::DeletionFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_idempotent_transition_is_legal() {
        assert!(ClusterState::Stable.can_transition(ClusterState::Stable));
    }

    #[test]
    fn cluster_delete_from_in_progress_is_illegal() {
        assert!(!ClusterState::CreationInProgress.can_transition(ClusterState::DeletionRequested));
    }

    #[test]
    fn installation_classification_is_disjoint() {
        for s in [
            InstallationState::Stable,
            InstallationState::CreationFailed,
            InstallationState::CreationRequested,
        ] {
            let flags = [s.is_pending(), s.is_stable(), s.is_failed()];
            assert_eq!(flags.iter().filter(|b| **b).count(), 1);
        }
    }
}
