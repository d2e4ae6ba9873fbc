use quill_persist::{DebitOutcome, Principal, PrincipalStore};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::{PipelineError, Result};

/// Kind of turn being paid for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnKind {
    Text,
    Image,
}

impl TurnKind {
    /// Credits charged per turn
    pub const fn cost(self) -> u64 {
        match self {
            TurnKind::Text => 1,
            TurnKind::Image => 2,
        }
    }
}

/// Pre-flight balance check. Never mutates the balance.
#[derive(Clone)]
pub struct CreditGate {
    principals: Arc<dyn PrincipalStore>,
}

impl CreditGate {
    pub fn new(principals: Arc<dyn PrincipalStore>) -> Self {
        Self { principals }
    }

    /// Load the principal and make sure they can pay for `kind`
    pub async fn authorize(&self, principal_id: &str, kind: TurnKind) -> Result<Principal> {
        let principal = self
            .principals
            .get_principal(principal_id)
            .await?
            .ok_or(PipelineError::PrincipalNotFound)?;

        let required = kind.cost();
        if !principal.can_afford(required) {
            info!(
                principal_id = %principal_id,
                required,
                available = principal.credits,
                "Credit gate rejected request"
            );
            return Err(PipelineError::InsufficientCredit {
                required,
                available: principal.credits,
            });
        }

        Ok(principal)
    }
}

/// Post-commit settlement.
///
/// Charging is best effort: the turn is already durable when this runs, so a
/// failed debit is logged and reported as `None` rather than failing the
/// request.
#[derive(Clone)]
pub struct CreditLedger {
    principals: Arc<dyn PrincipalStore>,
}

impl CreditLedger {
    pub fn new(principals: Arc<dyn PrincipalStore>) -> Self {
        Self { principals }
    }

    /// Debit the cost of `kind`; returns the remaining balance on success
    pub async fn charge(&self, principal_id: &str, kind: TurnKind) -> Option<u64> {
        let amount = kind.cost();
        match self.principals.try_debit(principal_id, amount).await {
            Ok(DebitOutcome::Debited { remaining }) => Some(remaining),
            Ok(DebitOutcome::Insufficient { balance }) => {
                // Another request spent the credits between gate and commit
                warn!(
                    principal_id = %principal_id,
                    amount,
                    balance,
                    "Balance no longer covers a committed turn; not charged"
                );
                None
            }
            Ok(DebitOutcome::Missing) => {
                error!(principal_id = %principal_id, amount, "Principal vanished before charge");
                None
            }
            Err(e) => {
                error!(principal_id = %principal_id, amount, error = %e, "Failed to charge credits");
                None
            }
        }
    }
}
