//! Verifies an EIP-1186 style proof
use ethers::{
    types::{EIP1186ProofResponse, StorageProof, H256, U256, U64},
    utils::keccak256,
};
use rlp_derive::{RlpDecodable, RlpEncodable};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    proof::{ProofError, SingleProofPath, Verified},
    utils::{hex_encode, storage_key_word},
};

#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize, RlpEncodable, RlpDecodable)]
pub struct Account {
    pub nonce: U64,
    pub balance: U256,
    pub storage_hash: H256,
    pub code_hash: H256,
}

impl Account {
    fn is_empty(&self) -> bool {
        self.eq(&Account::default())
    }
}

#[derive(Debug, Error)]
pub enum VerifyProofError {
    #[error("Proof not valid for account {account}, AccountError {source} ")]
    AccountError {
        source: AccountError,
        account: String,
    },
    #[error(
        "Proof not valid for account {account} storage key {storage_key}, StorageError {source}"
    )]
    StorageError {
        source: StorageError,
        account: String,
        storage_key: String,
    },
    #[error("Proof for account {0} contains no storage proofs")]
    EmptyProof(String),
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("ProofError {0}")]
    ProofError(#[from] ProofError),
    #[error("A valid exclusion proof exists, but the claimed account is not empty")]
    ClaimedAccountNotEmpty,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("ProofError {0}")]
    ProofError(#[from] ProofError),
    #[error("A valid exclusion proof exists, but the claimed storage is not empty")]
    ClaimedStorageNotEmpty,
}

/// Part of an EIP-1186 proof that failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofComponent {
    /// The account proof does not hash to the trusted state root.
    StateRoot,
    /// The account proof is inconsistent with the claimed account.
    AccountProof,
    /// A storage proof is missing or inconsistent with the storage hash.
    StorageProof,
}

impl VerifyProofError {
    /// Which part of the proof the error belongs to.
    pub fn component(&self) -> ProofComponent {
        match self {
            VerifyProofError::AccountError {
                source: AccountError::ProofError(ProofError::RootMismatch { .. }),
                ..
            } => ProofComponent::StateRoot,
            VerifyProofError::AccountError { .. } => ProofComponent::AccountProof,
            VerifyProofError::StorageError { .. } | VerifyProofError::EmptyProof(_) => {
                ProofComponent::StorageProof
            }
        }
    }
}

/// Outcome of checking a proof. An invalid proof is a result, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub valid: bool,
    pub component: Option<ProofComponent>,
    pub reason: Option<String>,
}

impl Verdict {
    pub fn valid() -> Self {
        Verdict {
            valid: true,
            component: None,
            reason: None,
        }
    }
    pub fn invalid(component: ProofComponent, reason: impl Into<String>) -> Self {
        Verdict {
            valid: false,
            component: Some(component),
            reason: Some(reason.into()),
        }
    }
}

impl From<VerifyProofError> for Verdict {
    fn from(err: VerifyProofError) -> Self {
        Verdict::invalid(err.component(), err.to_string())
    }
}

/// Verifies an `eth_getProof` response against a state root and folds the
/// result into a verdict.
pub fn verify_eip1186(state_root: H256, proof: &EIP1186ProofResponse) -> Verdict {
    match verify_proof(state_root, proof) {
        Ok(()) => Verdict::valid(),
        Err(e) => e.into(),
    }
}

/// Verifies a single account proof and all of its storage proofs with respect
/// to a state root. The proof is of the form returned by eth_getProof.
pub fn verify_proof(state_root: H256, proof: &EIP1186ProofResponse) -> Result<(), VerifyProofError> {
    let account = hex_encode(proof.address);
    verify_account_component(state_root, proof).map_err(|source| {
        VerifyProofError::AccountError {
            source,
            account: account.clone(),
        }
    })?;

    if proof.storage_proof.is_empty() {
        return Err(VerifyProofError::EmptyProof(account));
    }
    for storage_proof in &proof.storage_proof {
        verify_account_storage_component(proof.storage_hash, storage_proof).map_err(|source| {
            VerifyProofError::StorageError {
                source,
                account: account.clone(),
                storage_key: hex_encode(storage_key_word(storage_proof.key)),
            }
        })?;
    }
    Ok(())
}

/// Verifies the account part of the proof: keccak(address) -> rlp(account).
pub fn verify_account_component(
    state_root: H256,
    proof: &EIP1186ProofResponse,
) -> Result<(), AccountError> {
    let claimed_account = Account {
        nonce: proof.nonce,
        balance: proof.balance,
        storage_hash: proof.storage_hash,
        code_hash: proof.code_hash,
    };

    let account_proof = SingleProofPath {
        proof: proof.account_proof.clone(),
        root: state_root.0,
        path: keccak256(proof.address.as_bytes()),
        claimed_value: rlp::encode(&claimed_account).to_vec(),
    };

    match account_proof.verify()? {
        Verified::Inclusion => {}
        Verified::Exclusion => match claimed_account.is_empty() {
            true => {}
            false => return Err(AccountError::ClaimedAccountNotEmpty),
        },
    }
    Ok(())
}

/// Verifies a single storage proof with respect to a known storage hash.
fn verify_account_storage_component(
    storage_hash: H256,
    storage_proof: &StorageProof,
) -> Result<(), StorageError> {
    let claimed_value = storage_proof.value;

    let single = SingleProofPath {
        proof: storage_proof.proof.clone(),
        root: storage_hash.0,
        path: keccak256(storage_key_word(storage_proof.key)),
        claimed_value: rlp::encode(&claimed_value).to_vec(),
    };

    match single.verify()? {
        Verified::Inclusion => {}
        Verified::Exclusion => match claimed_value.is_zero() {
            true => {}
            false => return Err(StorageError::ClaimedStorageNotEmpty),
        },
    }
    Ok(())
}
