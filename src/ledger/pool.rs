use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::errors::{PoolError, PoolResult};
use crate::lifecycle;

/// Opaque pool identifier: 32 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolId(String);

impl PoolId {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        OsRng.fill_bytes(&mut bytes);
        PoolId(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PoolId {
    fn from(value: String) -> Self {
        PoolId(value)
    }
}

impl From<&str> for PoolId {
    fn from(value: &str) -> Self {
        PoolId(value.to_string())
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
    /// Accepting claims
    Open,
    /// Every slot has been granted
    Exhausted,
    /// Shut by the owner or by expiry
    Closed,
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolStatus::Open => write!(f, "open"),
            PoolStatus::Exhausted => write!(f, "exhausted"),
            PoolStatus::Closed => write!(f, "closed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosureReason {
    Administrative,
    Expired,
}

/// Payout channels the owner accepts; informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Wave,
    Kpay,
    Ayapay,
    APlusWallet,
    CbPay,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Wave => "wave",
            PaymentMethod::Kpay => "kpay",
            PaymentMethod::Ayapay => "ayapay",
            PaymentMethod::APlusWallet => "a_plus_wallet",
            PaymentMethod::CbPay => "cb_pay",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wave" => Ok(PaymentMethod::Wave),
            "kpay" => Ok(PaymentMethod::Kpay),
            "ayapay" => Ok(PaymentMethod::Ayapay),
            "a_plus_wallet" => Ok(PaymentMethod::APlusWallet),
            "cb_pay" => Ok(PaymentMethod::CbPay),
            other => Err(PoolError::InvalidPoolParameters {
                field: "payment_methods",
                reason: format!("unknown payment method `{}`", other),
            }),
        }
    }
}

/// Presentation data about a claimant. Never consulted by allocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimantMetadata {
    pub display_name: String,
    pub contact: Option<String>,
}

impl ClaimantMetadata {
    pub fn named(display_name: impl Into<String>) -> Self {
        ClaimantMetadata {
            display_name: display_name.into(),
            contact: None,
        }
    }
}

/// A granted portion. Immutable once appended to a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub claimant_id: String,
    pub portion: u64,
    pub granted_at: DateTime<Utc>,
    pub metadata: ClaimantMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub id: PoolId,
    pub token: String,
    pub owner_id: String,
    pub budget: u64,
    pub total_slots: u32,
    pub payment_methods: Vec<PaymentMethod>,
    pub status: PoolStatus,
    pub closure_reason: Option<ClosureReason>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Grant order
    pub claims: Vec<Claim>,
    pub allocated_total: u64,
}

impl Pool {
    pub fn claim_count(&self) -> usize {
        self.claims.len()
    }

    pub fn remaining_slots(&self) -> u32 {
        self.total_slots.saturating_sub(self.claims.len() as u32)
    }

    pub fn remaining_budget(&self) -> u64 {
        self.budget.saturating_sub(self.allocated_total)
    }

    pub fn is_full(&self) -> bool {
        self.claims.len() >= self.total_slots as usize
    }

    pub fn claim_for(&self, claimant_id: &str) -> Option<&Claim> {
        self.claims.iter().find(|c| c.claimant_id == claimant_id)
    }

    pub fn portions(&self) -> Vec<u64> {
        self.claims.iter().map(|c| c.portion).collect()
    }

    /// Next state after granting `claim`, with the exhaustion flip applied in the same step.
    ///
    /// Pure: the ledger decides whether the result may be committed.
    pub fn with_claim(&self, claim: Claim) -> PoolResult<Pool> {
        if self.status != PoolStatus::Open {
            return Err(PoolError::PoolNotOpen {
                pool_id: self.id.to_string(),
                status: self.status,
            });
        }
        if self.is_full() {
            return Err(PoolError::PoolFull {
                pool_id: self.id.to_string(),
                slots: self.total_slots,
            });
        }
        if self.claim_for(&claim.claimant_id).is_some() {
            return Err(PoolError::AlreadyClaimed);
        }
        if claim.portion == 0 || claim.portion > self.remaining_budget() {
            return Err(PoolError::InvalidAllocationInput(format!(
                "portion {} does not fit remaining budget {}",
                claim.portion,
                self.remaining_budget()
            )));
        }

        let mut next = self.clone();
        next.allocated_total += claim.portion;
        next.claims.push(claim);
        next.status = lifecycle::status_after_grant(next.claims.len(), next.total_slots);
        Ok(next)
    }

    /// Checks the ledger invariants; used by tests and debug assertions.
    pub fn check_invariants(&self) -> bool {
        let sum: u64 = self.claims.iter().map(|c| c.portion).sum();
        let full_means_not_open = !self.is_full() || self.status != PoolStatus::Open;
        sum == self.allocated_total
            && self.allocated_total <= self.budget
            && self.claims.len() <= self.total_slots as usize
            && full_means_not_open
    }
}
