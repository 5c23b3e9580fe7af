//! Migration from a 2-of-3 multisig keybox to a private-wallet keyset.
//!
//! [`PrivateWalletMigrationState::apply`] is the whole transition table and does no I/O.
//! [`PrivateWalletMigrationService`] performs the server and secure-store work for each
//! step, then applies the matching event.
mod service;

pub use service::{
    HwProofOfPossession, PrivateWalletMigrationF8eClient, PrivateWalletMigrationService,
};

use std::fmt;

use crate::fees::FeeEstimationError;
use crate::keybox::{HwKeyBundle, Keybox, KeyboxError, SpendingKeyset};
use crate::signing::NetworkingError;
use crate::store::StoreError;
use crate::sweep::SweepError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PrivateWalletMigrationError {
    #[error("Private wallet migration is not available")]
    FeatureNotAvailable,
    #[error("Cannot apply {event} while {state}")]
    InvalidTransition {
        state: &'static str,
        event: &'static str,
    },
    #[error("Cloud backup must complete before the migration")]
    CloudBackupIncomplete,
    #[error("No funds to migrate")]
    NoFundsToMigrate,
    #[error(transparent)]
    Network(#[from] NetworkingError),
    #[error(transparent)]
    FeeEstimation(#[from] FeeEstimationError),
    #[error(transparent)]
    Sweep(#[from] SweepError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Keybox(#[from] KeyboxError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrivateWalletMigrationState {
    /// No migration in progress.
    Available,
    InitiationComplete {
        new_hw_keys: HwKeyBundle,
        new_keyset: SpendingKeyset,
        cloud_backup_complete: bool,
    },
    Migrated {
        keybox: Box<Keybox>,
    },
    /// A migration was started and abandoned. Behaves like `Available`.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrivateWalletMigrationEvent {
    Initiated {
        new_hw_keys: HwKeyBundle,
        new_keyset: SpendingKeyset,
    },
    CloudBackupCompleted,
    Completed {
        keybox: Box<Keybox>,
    },
    Cancelled,
}

impl PrivateWalletMigrationEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PrivateWalletMigrationEvent::Initiated { .. } => "Initiated",
            PrivateWalletMigrationEvent::CloudBackupCompleted => "CloudBackupCompleted",
            PrivateWalletMigrationEvent::Completed { .. } => "Completed",
            PrivateWalletMigrationEvent::Cancelled => "Cancelled",
        }
    }
}

impl PrivateWalletMigrationState {
    pub fn name(&self) -> &'static str {
        match self {
            PrivateWalletMigrationState::Available => "Available",
            PrivateWalletMigrationState::InitiationComplete { .. } => "InitiationComplete",
            PrivateWalletMigrationState::Migrated { .. } => "Migrated",
            PrivateWalletMigrationState::Cancelled => "Cancelled",
        }
    }

    /// True when a new migration may be started.
    pub fn is_available(&self) -> bool {
        matches!(
            self,
            PrivateWalletMigrationState::Available | PrivateWalletMigrationState::Cancelled
        )
    }

    pub fn apply(
        self,
        event: PrivateWalletMigrationEvent,
    ) -> Result<Self, PrivateWalletMigrationError> {
        use PrivateWalletMigrationEvent as E;
        use PrivateWalletMigrationState as S;

        match (self, event) {
            (S::Available | S::Cancelled, E::Initiated { new_hw_keys, new_keyset }) => {
                Ok(S::InitiationComplete {
                    new_hw_keys,
                    new_keyset,
                    cloud_backup_complete: false,
                })
            }
            (
                S::InitiationComplete {
                    new_hw_keys,
                    new_keyset,
                    ..
                },
                E::CloudBackupCompleted,
            ) => Ok(S::InitiationComplete {
                new_hw_keys,
                new_keyset,
                cloud_backup_complete: true,
            }),
            (S::Migrated { keybox }, E::CloudBackupCompleted | E::Completed { .. }) => {
                Ok(S::Migrated { keybox })
            }
            (
                S::InitiationComplete {
                    cloud_backup_complete: true,
                    ..
                },
                E::Completed { keybox },
            ) => Ok(S::Migrated { keybox }),
            (
                S::InitiationComplete {
                    cloud_backup_complete: false,
                    ..
                },
                E::Completed { .. },
            ) => Err(PrivateWalletMigrationError::CloudBackupIncomplete),
            (S::InitiationComplete { .. }, E::Cancelled) => Ok(S::Cancelled),
            (state, event) => Err(PrivateWalletMigrationError::InvalidTransition {
                state: state.name(),
                event: event.name(),
            }),
        }
    }
}

impl fmt::Display for PrivateWalletMigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{keybox_parts, spending_keyset};
    use rstest::rstest;

    fn initiated() -> PrivateWalletMigrationEvent {
        let parts = keybox_parts();
        PrivateWalletMigrationEvent::Initiated {
            new_hw_keys: parts.active_hw_key_bundle,
            new_keyset: spending_keyset("private"),
        }
    }

    fn completed() -> PrivateWalletMigrationEvent {
        PrivateWalletMigrationEvent::Completed {
            keybox: Box::new(Keybox::new(keybox_parts()).unwrap()),
        }
    }

    fn initiation_complete(cloud_backup_complete: bool) -> PrivateWalletMigrationState {
        let mut state = PrivateWalletMigrationState::Available.apply(initiated()).unwrap();
        if cloud_backup_complete {
            state = state
                .apply(PrivateWalletMigrationEvent::CloudBackupCompleted)
                .unwrap();
        }
        state
    }

    #[test]
    fn test_full_lifecycle() {
        let state = initiation_complete(true);
        assert!(matches!(
            state,
            PrivateWalletMigrationState::InitiationComplete {
                cloud_backup_complete: true,
                ..
            }
        ));
        let migrated = state.apply(completed()).unwrap();
        assert_eq!(migrated.name(), "Migrated");

        let again = migrated.clone().apply(completed()).unwrap();
        assert_eq!(again, migrated);
    }

    #[test]
    fn test_complete_requires_cloud_backup() {
        assert_eq!(
            initiation_complete(false).apply(completed()),
            Err(PrivateWalletMigrationError::CloudBackupIncomplete)
        );
    }

    #[test]
    fn test_cancel_returns_to_available() {
        let cancelled = initiation_complete(false)
            .apply(PrivateWalletMigrationEvent::Cancelled)
            .unwrap();
        assert!(cancelled.is_available());
        assert!(cancelled.apply(initiated()).is_ok());
    }

    #[rstest]
    #[case(PrivateWalletMigrationState::Available)]
    #[case(PrivateWalletMigrationState::Cancelled)]
    #[case(PrivateWalletMigrationState::Migrated {
        keybox: Box::new(Keybox::new(keybox_parts()).unwrap()),
    })]
    fn test_cancel_only_from_initiation_complete(#[case] state: PrivateWalletMigrationState) {
        let name = state.name();
        assert_eq!(
            state.apply(PrivateWalletMigrationEvent::Cancelled),
            Err(PrivateWalletMigrationError::InvalidTransition {
                state: name,
                event: "Cancelled",
            })
        );
    }

    #[test]
    fn test_cannot_initiate_twice() {
        assert!(matches!(
            initiation_complete(false).apply(initiated()),
            Err(PrivateWalletMigrationError::InvalidTransition { .. })
        ));
    }
}
