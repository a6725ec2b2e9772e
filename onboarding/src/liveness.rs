use log::{info, warn};
use tierpass_common::{config::FALLBACK_LIVENESS_SCORE, kyc::LivenessResult};

use crate::oracle::LivenessChallenge;

/// Liveness challenge sub-flow
///
/// Only the last completed result counts, re-opening after a failure
/// discards it once the new sequence completes.
#[derive(Debug, Default, Clone)]
pub struct LivenessOrchestrator {
    open: bool,
    result: Option<LivenessResult>,
    // Result was produced without the challenge oracle
    degraded: bool,
}

impl LivenessOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self) {
        self.open = true;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn on_complete(&mut self, result: LivenessResult) {
        if log::log_enabled!(log::Level::Info) {
            info!(
                "Liveness completed: passed={} score={} ({}/{} challenges)",
                result.passed, result.score, result.completed_challenges, result.total_challenges
            );
        }
        self.result = Some(result);
        self.degraded = false;
        self.open = false;
    }

    /// Close without touching the stored result
    pub fn on_cancel(&mut self) {
        self.open = false;
    }

    pub fn result(&self) -> Option<&LivenessResult> {
        self.result.as_ref()
    }

    pub fn is_passed(&self) -> bool {
        self.result.map(|r| r.passed).unwrap_or(false)
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Open the sub-flow and drive the challenge to its end
    ///
    /// When the challenge oracle itself fails the user is not blocked: a
    /// result carrying `FALLBACK_LIVENESS_SCORE` is stored so the backend
    /// routes the submission to manual review.
    pub async fn run(&mut self, challenge: &dyn LivenessChallenge) -> Option<LivenessResult> {
        self.open();
        match challenge.run().await {
            Ok(Some(result)) => self.on_complete(result),
            Ok(None) => {
                info!("Liveness challenge cancelled");
                self.on_cancel();
            }
            Err(e) => {
                warn!(
                    "Liveness challenge unavailable ({}), using fallback score {}",
                    e, FALLBACK_LIVENESS_SCORE
                );
                self.on_complete(LivenessResult {
                    passed: true,
                    score: FALLBACK_LIVENESS_SCORE,
                    completed_challenges: 0,
                    total_challenges: 0,
                });
                self.degraded = true;
            }
        }
        self.result
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OracleError;
    use async_trait::async_trait;

    struct Scripted(Result<Option<LivenessResult>, OracleError>);

    #[async_trait]
    impl LivenessChallenge for Scripted {
        async fn run(&self) -> Result<Option<LivenessResult>, OracleError> {
            self.0.clone()
        }
    }

    fn result(passed: bool, score: u8) -> LivenessResult {
        LivenessResult {
            passed,
            score,
            completed_challenges: 3,
            total_challenges: 3,
        }
    }

    #[test]
    fn test_cancel_keeps_previous_result() {
        let mut liveness = LivenessOrchestrator::new();
        liveness.open();
        assert!(liveness.is_open());
        liveness.on_complete(result(true, 90));
        assert!(!liveness.is_open());

        liveness.open();
        liveness.on_cancel();
        assert!(!liveness.is_open());
        assert_eq!(liveness.result(), Some(&result(true, 90)));
    }

    #[tokio::test]
    async fn test_retry_after_failure() {
        let mut liveness = LivenessOrchestrator::new();
        liveness.run(&Scripted(Ok(Some(result(false, 30))))).await;
        assert!(!liveness.is_passed());

        liveness.run(&Scripted(Ok(Some(result(true, 81))))).await;
        assert!(liveness.is_passed());
        assert_eq!(liveness.result().unwrap().score, 81);
    }

    #[tokio::test]
    async fn test_oracle_failure_degrades() {
        let mut liveness = LivenessOrchestrator::new();
        let outcome = liveness
            .run(&Scripted(Err(OracleError::Unavailable("camera".into()))))
            .await
            .unwrap();
        assert!(outcome.passed);
        assert_eq!(outcome.score, FALLBACK_LIVENESS_SCORE);
        assert!(liveness.is_degraded());
        assert!(!liveness.is_open());
    }

    #[tokio::test]
    async fn test_dismissed_challenge() {
        let mut liveness = LivenessOrchestrator::new();
        assert_eq!(liveness.run(&Scripted(Ok(None))).await, None);
        assert!(!liveness.is_open());
    }
}
