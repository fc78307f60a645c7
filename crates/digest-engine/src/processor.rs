//! Per-proposal operation duplication check.
//!
//! Runs before execution, independent of the projector. Each operation
//! claims the mutually-exclusive resources its fact names (sender, currency
//! id, contract, credential triple, data key, prescription hash, newly
//! created addresses); the second operation claiming an already-claimed
//! resource within one proposal is rejected with a descriptive conflict
//! error while earlier operations proceed. Checkers are per-proposal: build
//! a fresh one for each proposal.

use std::collections::HashSet;

use shared_types::OperationFact;
use thiserror::Error;

/// A claimed mutually-exclusive resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DuplicationKey {
    Sender(String),
    Currency(String),
    Contract(String),
    Credential(String),
    StorageData(String),
    PrescriptionInfo(String),
    NewAddress(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DuplicationError {
    #[error("proposal cannot have duplicated sender, {0}")]
    Sender(String),

    #[error("cannot register duplicated currency id, {0} within a proposal")]
    Currency(String),

    #[error("cannot use a duplicated contract for registering in contract model, {0} within a proposal")]
    Contract(String),

    #[error("cannot use a duplicated contract-template-credential for credential, {0} within a proposal")]
    Credential(String),

    #[error("cannot use a duplicated contract-key for storage data, {0} within a proposal")]
    StorageData(String),

    #[error("cannot use a duplicated contract-hash for prescription info, {0} within a proposal")]
    PrescriptionInfo(String),

    #[error("new address already claimed within a proposal, {0}")]
    NewAddress(String),
}

fn conflict(key: &DuplicationKey) -> DuplicationError {
    match key {
        DuplicationKey::Sender(v) => DuplicationError::Sender(v.clone()),
        DuplicationKey::Currency(v) => DuplicationError::Currency(v.clone()),
        DuplicationKey::Contract(v) => DuplicationError::Contract(v.clone()),
        DuplicationKey::Credential(v) => DuplicationError::Credential(v.clone()),
        DuplicationKey::StorageData(v) => DuplicationError::StorageData(v.clone()),
        DuplicationKey::PrescriptionInfo(v) => DuplicationError::PrescriptionInfo(v.clone()),
        DuplicationKey::NewAddress(v) => DuplicationError::NewAddress(v.clone()),
    }
}

/// Resources a fact claims within its proposal.
fn claims(fact: &OperationFact) -> Vec<DuplicationKey> {
    let mut out = vec![DuplicationKey::Sender(fact.sender().as_str().to_string())];

    match fact {
        OperationFact::RegisterCurrency { currency_id, .. }
        | OperationFact::UpdateCurrency { currency_id, .. } => {
            out.push(DuplicationKey::Currency(currency_id.clone()));
        }
        OperationFact::RegisterModel { contract, .. } => {
            out.push(DuplicationKey::Contract(contract.as_str().to_string()));
        }
        OperationFact::CreateContractAccount { sender, targets } => {
            out.push(DuplicationKey::Contract(sender.as_str().to_string()));
            for target in targets {
                out.push(DuplicationKey::NewAddress(target.as_str().to_string()));
            }
        }
        OperationFact::CreateAccount { targets, .. } => {
            for target in targets {
                out.push(DuplicationKey::NewAddress(target.as_str().to_string()));
            }
        }
        OperationFact::IssueCredential { items, .. }
        | OperationFact::RevokeCredential { items, .. } => {
            for item in items {
                out.push(DuplicationKey::Credential(format!(
                    "{}:{}:{}",
                    item.contract, item.template_id, item.credential_id
                )));
            }
        }
        OperationFact::UpsertData {
            contract, data_key, ..
        }
        | OperationFact::DeleteData {
            contract, data_key, ..
        } => {
            out.push(DuplicationKey::StorageData(format!(
                "{contract}:{data_key}"
            )));
        }
        OperationFact::RegisterPrescription {
            contract,
            prescription_hash,
            ..
        }
        | OperationFact::UsePrescription {
            contract,
            prescription_hash,
            ..
        } => {
            out.push(DuplicationKey::PrescriptionInfo(format!(
                "{contract}:{prescription_hash}"
            )));
        }
        _ => {}
    }
    out
}

/// Tracks claimed resources across one proposal.
#[derive(Debug, Default)]
pub struct DuplicationChecker {
    claimed: HashSet<DuplicationKey>,
}

impl DuplicationChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts the operation and records its claims, or rejects it if any
    /// claim collides with an earlier operation. A rejected operation
    /// records nothing.
    pub fn check(&mut self, fact: &OperationFact) -> Result<(), DuplicationError> {
        let keys = claims(fact);
        for key in &keys {
            if self.claimed.contains(key) {
                return Err(conflict(key));
            }
        }
        self.claimed.extend(keys);
        Ok(())
    }

    pub fn claimed_len(&self) -> usize {
        self.claimed.len()
    }
}
