// Chain collaborators
// The KYC registry contract and the user's wallet are external: only the
// functions the registry exposes and the wallet's signing/chain-switch
// capabilities are consumed here.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use tierpass_common::{
    contract::{RequestKind, Submission, TierRequestCall, TransactionReceipt, UpgradeRequest},
    crypto::{Address, Hash},
    kyc::Tier,
};
use tokio::time::{sleep, timeout};

use crate::{config::OnboardingConfig, error::ChainError};

#[async_trait]
pub trait WalletConnection: Send + Sync {
    /// Connected account
    async fn address(&self) -> Result<Address, ChainError>;

    /// Chain the wallet is currently on
    async fn chain_id(&self) -> Result<u64, ChainError>;

    /// Ask the wallet to switch chain, resolves once the switch is done
    async fn switch_chain(&self, chain_id: u64) -> Result<(), ChainError>;
}

/// Read and write surface of the KYC registry
#[async_trait]
pub trait KycContract: Send + Sync {
    /// `getSubmission(address)`
    async fn get_submission(&self, investor: &Address) -> Result<Submission, ChainError>;

    /// `hasUpgradePending(address)`
    async fn has_upgrade_pending(&self, investor: &Address) -> Result<bool, ChainError>;

    /// `getUpgradeRequest(address)`
    async fn get_upgrade_request(&self, investor: &Address) -> Result<UpgradeRequest, ChainError>;

    /// Have the wallet sign and broadcast a payable tier request
    /// Returns the transaction hash as soon as it is known
    async fn send_tier_request(
        &self,
        from: &Address,
        call: &TierRequestCall,
    ) -> Result<Hash, ChainError>;

    /// Receipt of a transaction, `None` while it is not mined
    async fn get_receipt(&self, tx_hash: &Hash) -> Result<Option<TransactionReceipt>, ChainError>;
}

/// Make sure the wallet is on `expected`, switching first if needed
pub async fn ensure_chain(wallet: &dyn WalletConnection, expected: u64) -> Result<(), ChainError> {
    let current = wallet.chain_id().await?;
    if current == expected {
        return Ok(());
    }

    info!("Wallet is on chain {}, switching to {}", current, expected);
    wallet
        .switch_chain(expected)
        .await
        .map_err(|e| match e {
            ChainError::UserRejected => ChainError::UserRejected,
            other => ChainError::ChainSwitchFailed {
                expected,
                reason: other.to_string(),
            },
        })?;

    let current = wallet.chain_id().await?;
    if current != expected {
        return Err(ChainError::ChainSwitchFailed {
            expected,
            reason: format!("wallet is still on chain {}", current),
        });
    }
    Ok(())
}

/// Build the payable call for a tier request
///
/// `submitKYC` is used when nothing is approved yet and carries the
/// submission fee and the country, `requestUpgrade` carries the upgrade fee.
pub fn build_tier_request(
    approved: Tier,
    target: Tier,
    document_hash: Hash,
    country_code: &str,
    config: &OnboardingConfig,
) -> TierRequestCall {
    let kind = RequestKind::for_approved(approved);
    let (country_code, value) = match kind {
        RequestKind::Initial => (
            Some(country_code.trim().to_ascii_uppercase()),
            config.submission_fee,
        ),
        RequestKind::Upgrade => (None, config.upgrade_fee),
    };

    TierRequestCall {
        kind,
        level: target,
        document_hash,
        country_code,
        value,
    }
}

/// Poll the receipt of `tx_hash` until it is mined or `limit` elapses
///
/// Errors while polling are retried, a mined but reverted transaction is
/// reported as `ChainError::Reverted`.
pub async fn wait_for_confirmation(
    contract: &dyn KycContract,
    tx_hash: &Hash,
    limit: Duration,
    poll_interval: Duration,
) -> Result<TransactionReceipt, ChainError> {
    let poll = async {
        loop {
            match contract.get_receipt(tx_hash).await {
                Ok(Some(receipt)) => return receipt,
                Ok(None) => {
                    if log::log_enabled!(log::Level::Debug) {
                        debug!("Transaction {} not mined yet", tx_hash);
                    }
                }
                Err(e) => {
                    warn!("Error while fetching receipt of {}: {}", tx_hash, e);
                }
            }
            sleep(poll_interval).await;
        }
    };

    let receipt = timeout(limit, poll)
        .await
        .map_err(|_| ChainError::ConfirmationTimeout(tx_hash.clone()))?;

    if !receipt.success {
        return Err(ChainError::Reverted(format!(
            "transaction {} reverted in block {}",
            tx_hash, receipt.block_number
        )));
    }

    if log::log_enabled!(log::Level::Info) {
        info!(
            "Transaction {} confirmed in block {}",
            tx_hash, receipt.block_number
        );
    }
    Ok(receipt)
}
