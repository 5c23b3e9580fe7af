use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::{
    PrivateWalletMigrationError, PrivateWalletMigrationEvent, PrivateWalletMigrationState,
};
use crate::bitcoin::Amount;
use crate::config::CoreConfig;
use crate::fees::{BitcoinFeeRateEstimator, EstimatedTransactionPriority, FeePolicy};
use crate::keybox::{F8eSpendingKeyset, FullAccountId, HwKeyBundle, Keybox, SpendingKeyset};
use crate::keys::AppSpendingPublicKey;
use crate::networks::F8eEnvironment;
use crate::signing::NetworkingError;
use crate::store::{MigrationSecretStore, MigrationSecrets, SecureStore};
use crate::sweep::SweepGenerator;

/// Hardware-signed proof that the user holds the paired device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HwProofOfPossession(pub String);

#[async_trait]
pub trait PrivateWalletMigrationF8eClient: Send + Sync {
    /// Registers a private keyset for the new hardware key and returns the server half.
    async fn create_private_keyset(
        &self,
        f8e_environment: &F8eEnvironment,
        full_account_id: &FullAccountId,
        hw_proof_of_possession: &HwProofOfPossession,
        app_key: &AppSpendingPublicKey,
        new_hw_keys: &HwKeyBundle,
    ) -> Result<F8eSpendingKeyset, NetworkingError>;

    async fn activate_keyset(
        &self,
        f8e_environment: &F8eEnvironment,
        full_account_id: &FullAccountId,
        keyset_id: &str,
    ) -> Result<(), NetworkingError>;
}

/// Runs a single migration flow. Methods take `&mut self`; one flow at a time.
pub struct PrivateWalletMigrationService<C, G, E, S> {
    config: CoreConfig,
    f8e: C,
    sweep_generator: G,
    fee_estimator: E,
    secrets: MigrationSecretStore<S>,
    state: PrivateWalletMigrationState,
    cloud_backup_completions: usize,
    migration_completions: usize,
}

impl<C, G, E, S> PrivateWalletMigrationService<C, G, E, S>
where
    C: PrivateWalletMigrationF8eClient,
    G: SweepGenerator,
    E: BitcoinFeeRateEstimator,
    S: SecureStore,
{
    pub fn new(
        config: CoreConfig,
        f8e: C,
        sweep_generator: G,
        fee_estimator: E,
        secrets: MigrationSecretStore<S>,
    ) -> Self {
        Self {
            config,
            f8e,
            sweep_generator,
            fee_estimator,
            secrets,
            state: PrivateWalletMigrationState::Available,
            cloud_backup_completions: 0,
            migration_completions: 0,
        }
    }

    pub fn state(&self) -> &PrivateWalletMigrationState {
        &self.state
    }

    pub fn cloud_backup_completions(&self) -> usize {
        self.cloud_backup_completions
    }

    pub fn migration_completions(&self) -> usize {
        self.migration_completions
    }

    fn ensure_enabled(&self) -> Result<(), PrivateWalletMigrationError> {
        if !self.config.feature_flags.private_wallet_migration {
            return Err(PrivateWalletMigrationError::FeatureNotAvailable);
        }
        Ok(())
    }

    fn transition(
        &mut self,
        event: PrivateWalletMigrationEvent,
    ) -> Result<&PrivateWalletMigrationState, PrivateWalletMigrationError> {
        let from = self.state.name();
        let event_name = event.name();
        let next = self.state.clone().apply(event)?;
        debug!(
            from,
            event = event_name,
            to = next.name(),
            "private wallet migration transition"
        );
        self.state = next;
        Ok(&self.state)
    }

    /// Total fee to sweep every keyset of `keybox` at the half-hour rate. Does not change
    /// the migration state.
    pub async fn estimate_migration_fees(
        &self,
        keybox: &Keybox,
    ) -> Result<Amount, PrivateWalletMigrationError> {
        self.ensure_enabled()?;
        let rate = self
            .fee_estimator
            .estimated_fee_rate_for_priority(
                EstimatedTransactionPriority::ThirtyMinutes,
                keybox.config().network_type,
            )
            .await?;
        let psbts = self
            .sweep_generator
            .generate_sweep_psbts(
                keybox.keysets(),
                keybox.active_spending_keyset(),
                Some(&FeePolicy::Rate(rate)),
            )
            .await?;
        if psbts.is_empty() {
            return Err(PrivateWalletMigrationError::NoFundsToMigrate);
        }
        Ok(psbts.iter().map(|p| p.psbt.fee.amount).sum())
    }

    pub async fn initiate_migration(
        &mut self,
        keybox: &Keybox,
        hw_proof_of_possession: &HwProofOfPossession,
        new_hw_keys: HwKeyBundle,
        ssek: Zeroizing<Vec<u8>>,
        sealed_ssek: Vec<u8>,
    ) -> Result<&PrivateWalletMigrationState, PrivateWalletMigrationError> {
        self.ensure_enabled()?;
        if !self.state.is_available() {
            return Err(PrivateWalletMigrationError::InvalidTransition {
                state: self.state.name(),
                event: "Initiated",
            });
        }

        let app_key = &keybox.active_app_key_bundle().spending_key;
        let f8e_keyset = self
            .f8e
            .create_private_keyset(
                &keybox.config().f8e_environment,
                keybox.full_account_id(),
                hw_proof_of_possession,
                app_key,
                &new_hw_keys,
            )
            .await?;
        let new_keyset = SpendingKeyset {
            local_id: format!("private-{}", f8e_keyset.keyset_id),
            f8e_spending_keyset: f8e_keyset,
            network_type: keybox.config().network_type,
            app_key: app_key.clone(),
            hardware_key: new_hw_keys.spending_key.clone(),
        };

        self.secrets.store_pending(
            &new_hw_keys.spending_key,
            &MigrationSecrets {
                ssek: ssek.to_vec(),
                sealed_ssek,
            },
        )?;
        info!(keyset = new_keyset.keyset_id(), "private wallet migration initiated");
        self.transition(PrivateWalletMigrationEvent::Initiated {
            new_hw_keys,
            new_keyset,
        })
    }

    /// Records that the caller finished the cloud backup for the new keys. Repeated calls
    /// are tolerated; only accepted calls are counted.
    pub fn complete_cloud_backup(
        &mut self,
    ) -> Result<&PrivateWalletMigrationState, PrivateWalletMigrationError> {
        self.ensure_enabled()?;
        self.transition(PrivateWalletMigrationEvent::CloudBackupCompleted)?;
        self.cloud_backup_completions += 1;
        Ok(&self.state)
    }

    /// Activates the new keyset and returns the migrated keybox. Once migrated, further
    /// calls return the same keybox without contacting the server.
    ///
    /// Once the server has switched keysets the local state always moves to `Migrated`;
    /// a failure to erase the pending secrets is logged and retried on the next call.
    pub async fn complete_migration(
        &mut self,
        keybox: &Keybox,
    ) -> Result<Keybox, PrivateWalletMigrationError> {
        self.ensure_enabled()?;

        let (new_hw_keys, new_keyset) = match &self.state {
            PrivateWalletMigrationState::Migrated { keybox } => {
                let migrated = keybox.as_ref().clone();
                self.clear_secrets();
                self.migration_completions += 1;
                return Ok(migrated);
            }
            PrivateWalletMigrationState::InitiationComplete {
                cloud_backup_complete: false,
                ..
            } => return Err(PrivateWalletMigrationError::CloudBackupIncomplete),
            PrivateWalletMigrationState::InitiationComplete {
                new_hw_keys,
                new_keyset,
                ..
            } => (new_hw_keys.clone(), new_keyset.clone()),
            state => {
                return Err(PrivateWalletMigrationError::InvalidTransition {
                    state: state.name(),
                    event: "Completed",
                })
            }
        };

        let mut parts = keybox.clone().into_parts();
        parts.keysets.push(new_keyset.clone());
        parts.active_spending_keyset = new_keyset;
        parts.active_hw_key_bundle = new_hw_keys;
        let migrated = Keybox::new(parts)?;

        self.f8e
            .activate_keyset(
                &keybox.config().f8e_environment,
                keybox.full_account_id(),
                migrated.active_spending_keyset().keyset_id(),
            )
            .await?;

        self.clear_secrets();
        info!(keybox = migrated.local_id(), "private wallet migration completed");
        self.transition(PrivateWalletMigrationEvent::Completed {
            keybox: Box::new(migrated.clone()),
        })?;
        self.migration_completions += 1;
        Ok(migrated)
    }

    fn clear_secrets(&self) {
        if let Err(err) = self.secrets.clear() {
            warn!(%err, "failed to erase pending migration secrets");
        }
    }

    /// Abandons an initiated migration and erases its pending key material.
    pub fn cancel_migration(
        &mut self,
    ) -> Result<&PrivateWalletMigrationState, PrivateWalletMigrationError> {
        self.ensure_enabled()?;
        if !matches!(self.state, PrivateWalletMigrationState::InitiationComplete { .. }) {
            return Err(PrivateWalletMigrationError::InvalidTransition {
                state: self.state.name(),
                event: "Cancelled",
            });
        }
        self.secrets.clear()?;
        info!("private wallet migration cancelled");
        self.transition(PrivateWalletMigrationEvent::Cancelled)
    }
}
