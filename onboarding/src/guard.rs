// Pending-request guard
// The registry is the authority on whether a tier request is outstanding.
// Every decision here is derived from the last chain read, never from
// local optimistic state.

use futures::try_join;
use log::{debug, info, warn};
use serde::Serialize;
use tierpass_common::{
    contract::RequestKind,
    crypto::Address,
    kyc::{KycError, KycResult, SubmissionStatus, Tier},
};

use crate::{backend::KycBackend, chain::KycContract, error::ChainError};

/// Outstanding tier request of the account, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequestState {
    pub has_pending: bool,
    /// Unknown when neither the chain nor the backend record it
    pub pending_tier: Option<Tier>,
    pub kind: Option<RequestKind>,
}

impl PendingRequestState {
    pub fn none() -> Self {
        Self::default()
    }
}

/// Account state read from the registry
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSnapshot {
    pub approved_tier: Tier,
    pub submission_status: SubmissionStatus,
    pub pending: PendingRequestState,
    /// The last submission was rejected
    pub previous_rejected: bool,
}

#[derive(Debug, Default)]
pub struct PendingRequestGuard {
    snapshot: Option<AccountSnapshot>,
}

impl PendingRequestGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-read the account state from the registry
    ///
    /// The pending tier of a first-time request is recovered from the
    /// backend status when the on-chain submission does not carry it.
    pub async fn refresh(
        &mut self,
        contract: &dyn KycContract,
        backend: &dyn KycBackend,
        address: &Address,
    ) -> Result<&AccountSnapshot, ChainError> {
        let (submission, upgrade_pending) = try_join!(
            contract.get_submission(address),
            contract.has_upgrade_pending(address)
        )?;

        let approved_tier = submission.approved_tier();
        let pending = if upgrade_pending {
            let request = contract.get_upgrade_request(address).await?;
            PendingRequestState {
                has_pending: true,
                pending_tier: Some(request.requested_level).filter(|tier| *tier != Tier::None),
                kind: Some(RequestKind::Upgrade),
            }
        } else if submission.status.is_pending() {
            let pending_tier = if submission.level != Tier::None {
                Some(submission.level)
            } else {
                match backend.get_status(address).await {
                    Ok(status) => status.requested_level(),
                    Err(e) => {
                        warn!("Could not recover the pending tier of {}: {}", address, e);
                        None
                    }
                }
            };
            PendingRequestState {
                has_pending: true,
                pending_tier,
                kind: Some(RequestKind::Initial),
            }
        } else {
            PendingRequestState::none()
        };

        let snapshot = AccountSnapshot {
            approved_tier,
            submission_status: submission.status,
            pending,
            previous_rejected: submission.status.is_rejected(),
        };

        if log::log_enabled!(log::Level::Debug) {
            debug!("Account {} refreshed: {:?}", address, snapshot);
        }
        if snapshot.pending.has_pending {
            info!(
                "Account {} has a pending request for tier {}",
                address,
                snapshot
                    .pending
                    .pending_tier
                    .map(|tier| tier.to_string())
                    .unwrap_or_else(|| "unknown".to_owned())
            );
        }

        Ok(self.snapshot.insert(snapshot))
    }

    pub fn is_refreshed(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn snapshot(&self) -> Option<&AccountSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn approved_tier(&self) -> Tier {
        self.snapshot
            .as_ref()
            .map(|s| s.approved_tier)
            .unwrap_or_default()
    }

    pub fn pending(&self) -> PendingRequestState {
        self.snapshot
            .as_ref()
            .map(|s| s.pending)
            .unwrap_or_default()
    }

    pub fn previous_rejected(&self) -> bool {
        self.snapshot
            .as_ref()
            .map(|s| s.previous_rejected)
            .unwrap_or(false)
    }

    /// Reason why `target` cannot be selected
    pub fn check_selectable(&self, target: Tier) -> KycResult<()> {
        let pending = self.pending();
        if pending.has_pending {
            return Err(KycError::RequestPending {
                pending: pending.pending_tier.map(u8::from),
            });
        }

        let approved = self.approved_tier();
        if target <= approved {
            return Err(KycError::NotAnUpgrade {
                approved: approved.into(),
                target: target.into(),
            });
        }
        Ok(())
    }

    /// Nothing is selectable before the first refresh
    pub fn is_selectable(&self, target: Tier) -> bool {
        self.is_refreshed() && self.check_selectable(target).is_ok()
    }
}
