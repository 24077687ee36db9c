//! For verifying a Merkle Patricia Proof for arbitrary proof values.
//! E.g., Account, storage ...
use ethers::{types::Bytes, utils::keccak256};
use rlp::Rlp;
use thiserror::Error;

use crate::{
    node::{NodeError, NodeKind},
    path::NibblePath,
    utils::hex_encode,
};

#[derive(Debug, Error)]
pub enum ProofError {
    #[error("RLP decode error {0}")]
    DecodeError(#[from] rlp::DecoderError),
    #[error("Proof is empty")]
    EmptyProof,
    #[error("The final node in the proof should have been detected and assessed")]
    FailedToHandleFinalNode,
    #[error(
        "Hash of node {computed} does not match the expected hash in the parent node {expected}"
    )]
    IncorrectHash { computed: String, expected: String },
    #[error("Hash of the first node {computed} does not match the trusted root {expected}")]
    RootMismatch { computed: String, expected: String },
    #[error(
        "The claimed proof value ({claimed}) is different from the value in the proof ({expected})"
    )]
    IncorrectLeafValue { claimed: String, expected: String },
    #[error("Node (index = {node_index} error {source}")]
    NodeError {
        source: NodeError,
        node_index: usize,
    },
}

/// A proof for some data in a Merkle Patricia Tree, such as an account, or a storage value.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct SingleProofPath {
    /// Merkle PATRICIA trie proof for a key/value.
    pub proof: Vec<Bytes>,
    /// Trusted root that the proof anchors to.
    pub root: [u8; 32],
    /// Anticipated trie path to traverse for the proof.
    pub path: [u8; 32],
    /// Claimed value to be proven. E.g., RLP(account), or RLP(storage_value)
    pub claimed_value: Vec<u8>,
}

impl SingleProofPath {
    pub fn verify(&self) -> Result<Verified, ProofError> {
        if self.proof.is_empty() {
            return Err(ProofError::EmptyProof);
        }
        let mut traversal = NibblePath::init(&self.path);
        let mut parent_hash = self.root;

        for (node_index, rlp_node) in self.proof.iter().enumerate() {
            node_hash_correct(&rlp_node.0, parent_hash).map_err(|e| match (node_index, e) {
                (0, ProofError::IncorrectHash { computed, expected }) => {
                    ProofError::RootMismatch { computed, expected }
                }
                (_, e) => e,
            })?;

            let rlp = Rlp::new(&rlp_node.0);
            let node = (0..rlp.item_count()?)
                .map(|index| rlp.val_at::<Vec<u8>>(index))
                .collect::<Result<Vec<_>, _>>()?;

            let proof_type = NodeKind::deduce(&node)
                .and_then(|kind| kind.traverse_node(node, &mut traversal, &mut parent_hash))
                .map_err(|source| ProofError::NodeError { source, node_index })?;

            if let Some(verified) = proof_type.get_verification_of_value(&self.claimed_value)? {
                return Ok(verified);
            }
        }
        Err(ProofError::FailedToHandleFinalNode)
    }
}

/// The verification kind is returned to the caller.
///
/// An exclusion proof for a key does not contain information about the value
/// of that key. The caller decides whether the claimed value is acceptable
/// for an absent key (zero storage, empty account).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verified {
    Inclusion,
    Exclusion,
}

/// Checks that the hash of one node is correct.
fn node_hash_correct(rlp_node: &[u8], parent_hash: [u8; 32]) -> Result<(), ProofError> {
    let computed_hash = keccak256(rlp_node);
    if computed_hash != parent_hash {
        let computed = hex_encode(computed_hash);
        let expected = hex_encode(parent_hash);
        return Err(ProofError::IncorrectHash { computed, expected });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofType {
    /// Inclusion proof with leaf RLP bytes from the proof.
    Inclusion(Vec<u8>),
    /// Exclusion proof consisting of a terminal branch node.
    BranchExclusion,
    /// Exclusion proof consisting of a terminal extension node.
    ExtensionExclusion,
    /// Exclusion proof consisting of a terminal leaf node.
    LeafExclusion,
    /// Not yet finished processing the proof.
    Pending,
}

impl ProofType {
    /// For a terminal node, checks the proof supports the claimed value.
    ///
    /// Inclusion: the claimed RLP value must equal the leaf value.
    /// Exclusion: the key is absent, the caller judges the claimed value.
    fn get_verification_of_value(
        &self,
        claimed_rlp_value: &[u8],
    ) -> Result<Option<Verified>, ProofError> {
        match self {
            ProofType::Inclusion(proof_leaf_rlp_bytes) => {
                match claimed_rlp_value == proof_leaf_rlp_bytes.as_slice() {
                    true => Ok(Some(Verified::Inclusion)),
                    false => Err(ProofError::IncorrectLeafValue {
                        claimed: hex_encode(claimed_rlp_value),
                        expected: hex_encode(proof_leaf_rlp_bytes),
                    }),
                }
            }
            ProofType::BranchExclusion
            | ProofType::ExtensionExclusion
            | ProofType::LeafExclusion => Ok(Some(Verified::Exclusion)),
            ProofType::Pending => Ok(None),
        }
    }
}
