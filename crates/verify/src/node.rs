//! For processing a node in a Merkle PATRICIA Trie proof.
use thiserror::Error;

use crate::{
    path::{NibblePath, PathError, PathNature, PrefixEncoding},
    proof::ProofType,
};

#[derive(Debug, Error, Eq, PartialEq)]
pub enum NodeError {
    #[error("Branch node (non-terminal) expected to be empty")]
    BranchNodeHasValue,
    #[error("Branch node (non-terminal) has less than 17 items")]
    BranchNodeHasNoValue,
    #[error("Branch node item expected to be 32 bytes")]
    BranchNodeItemInvalidLength,
    #[error("Extension node has no next node")]
    ExtensionNodeNoNextNode,
    #[error("Extension node item expected to be 32 bytes")]
    ExtensionNextNodeInvalidLength,
    #[error("Unable to traverse next node in path, none present")]
    NoNodeToTraverse,
    #[error("Node has no items")]
    NodeEmpty,
    #[error("Node item has no encoding")]
    NoEncoding,
    #[error("Node has invalid item count {0}")]
    NodeHasInvalidItemCount(usize),
    #[error("Trie path error {0}")]
    PathError(#[from] PathError),
    #[error("Terminal extension node has no next node")]
    TerminalExtensionHasNoNextNode,
    #[error("Terminal extension node expected to have a final path, found none")]
    TerminalExtensionHasNoPath,
    #[error("Full 32 byte traversal should not end with an extension node")]
    TraversalEndsAtExtension,
    #[error("Leaf node has no value")]
    LeafHasNoValue,
    #[error("Leaf node expected to have a final path, found none")]
    LeafHasNoPath,
    #[error("Leaf node must complete the 32 byte path")]
    LeafHasIncompletePath,
}

/// Description of node in a merkle proof.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NodeKind {
    Branch,
    Extension,
    Leaf,
}

impl NodeKind {
    pub fn deduce(node: &[Vec<u8>]) -> Result<NodeKind, NodeError> {
        match node.len() {
            17 => Ok(NodeKind::Branch),
            2 => {
                let partial_path = node.first().ok_or(NodeError::NodeEmpty)?;
                let encoding = partial_path.first().ok_or(NodeError::NoEncoding)?;
                Ok(match PrefixEncoding::try_from(encoding)? {
                    PrefixEncoding::ExtensionEven | PrefixEncoding::ExtensionOdd(_) => {
                        NodeKind::Extension
                    }
                    PrefixEncoding::LeafEven | PrefixEncoding::LeafOdd(_) => NodeKind::Leaf,
                })
            }
            count => Err(NodeError::NodeHasInvalidItemCount(count)),
        }
    }

    /// Visits the relevant part of a node and checks values are as expected.
    ///
    /// For an intermediate node the hash of the next node is written to
    /// `parent_root_to_update` and `ProofType::Pending` is returned. A terminal
    /// node settles the proof kind.
    pub fn traverse_node(
        &self,
        node: Vec<Vec<u8>>,
        traversal: &mut NibblePath,
        parent_root_to_update: &mut [u8; 32],
    ) -> Result<ProofType, NodeError> {
        match self {
            NodeKind::Branch => {
                let final_item = node.get(16).ok_or(NodeError::BranchNodeHasNoValue)?;
                if !final_item.is_empty() {
                    return Err(NodeError::BranchNodeHasValue);
                }
                let path_nibble = traversal.visit_path_nibble()?;
                let item = node
                    .get(path_nibble as usize)
                    .ok_or(NodeError::NoNodeToTraverse)?;
                if item.is_empty() {
                    return Ok(ProofType::BranchExclusion);
                }
                *parent_root_to_update = item
                    .as_slice()
                    .try_into()
                    .map_err(|_| NodeError::BranchNodeItemInvalidLength)?;
                Ok(ProofType::Pending)
            }
            NodeKind::Extension => {
                let extension = node.first().ok_or(NodeError::TerminalExtensionHasNoPath)?;
                let next_node = node
                    .get(1)
                    .ok_or(NodeError::TerminalExtensionHasNoNextNode)?;
                match traversal.match_or_mismatch(extension)? {
                    PathNature::SubPathMatches => {
                        if next_node.is_empty() {
                            return Err(NodeError::ExtensionNodeNoNextNode);
                        }
                        traversal.skip_extension_node_nibbles(extension)?;
                        *parent_root_to_update = next_node
                            .as_slice()
                            .try_into()
                            .map_err(|_| NodeError::ExtensionNextNodeInvalidLength)?;
                        Ok(ProofType::Pending)
                    }
                    PathNature::SubPathDiverges(_) | PathNature::FullPathDiverges(_) => {
                        Ok(ProofType::ExtensionExclusion)
                    }
                    PathNature::FullPathMatches => Err(NodeError::TraversalEndsAtExtension),
                }
            }
            NodeKind::Leaf => {
                let path = node.first().ok_or(NodeError::LeafHasNoPath)?;
                let value = node.get(1).ok_or(NodeError::LeafHasNoValue)?;
                match traversal.match_or_mismatch(path)? {
                    PathNature::SubPathMatches => Err(NodeError::LeafHasIncompletePath),
                    PathNature::FullPathMatches => Ok(ProofType::Inclusion(value.to_vec())),
                    // A leaf for some other key sits where this key would be,
                    // so the trie cannot hold this key.
                    PathNature::FullPathDiverges(_) | PathNature::SubPathDiverges(_) => {
                        Ok(ProofType::LeafExclusion)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn full_leaf_run(path: &[u8; 32]) -> Vec<u8> {
        let mut run = vec![0x20];
        run.extend_from_slice(path);
        run
    }

    #[test]
    fn test_deduce_kinds() {
        let branch = vec![vec![]; 17];
        assert_eq!(NodeKind::deduce(&branch).unwrap(), NodeKind::Branch);
        let leaf = vec![vec![0x3a, 0xbc], vec![0x01]];
        assert_eq!(NodeKind::deduce(&leaf).unwrap(), NodeKind::Leaf);
        let extension = vec![vec![0x00, 0xbc], vec![0xff; 32]];
        assert_eq!(NodeKind::deduce(&extension).unwrap(), NodeKind::Extension);
        assert_eq!(
            NodeKind::deduce(&[vec![0x01]]),
            Err(NodeError::NodeHasInvalidItemCount(1))
        );
        assert_eq!(
            NodeKind::deduce(&[vec![], vec![0x01]]),
            Err(NodeError::NoEncoding)
        );
    }

    #[test]
    fn test_leaf_inclusion() {
        let path = [0x42u8; 32];
        let node = vec![full_leaf_run(&path), vec![0x82, 0x01, 0xf4]];
        let mut traversal = NibblePath::init(&path);
        let mut parent = [0u8; 32];
        let proof_type = NodeKind::Leaf
            .traverse_node(node, &mut traversal, &mut parent)
            .unwrap();
        assert_eq!(proof_type, ProofType::Inclusion(vec![0x82, 0x01, 0xf4]));
    }

    #[test]
    fn test_leaf_for_other_key_is_exclusion() {
        let other = [0x42u8; 32];
        let node = vec![full_leaf_run(&other), vec![0x01]];
        let mut traversal = NibblePath::init(&[0x43u8; 32]);
        let mut parent = [0u8; 32];
        assert_eq!(
            NodeKind::Leaf
                .traverse_node(node, &mut traversal, &mut parent)
                .unwrap(),
            ProofType::LeafExclusion
        );
    }

    #[test]
    fn test_branch_follows_path_nibble() {
        let mut node = vec![vec![]; 17];
        node[0xa] = vec![0x11; 32];
        let mut path = [0u8; 32];
        path[0] = 0xa0;
        let mut traversal = NibblePath::init(&path);
        let mut parent = [0u8; 32];
        let proof_type = NodeKind::Branch
            .traverse_node(node.clone(), &mut traversal, &mut parent)
            .unwrap();
        assert_eq!(proof_type, ProofType::Pending);
        assert_eq!(parent, [0x11; 32]);

        // Empty item at the next nibble means the key is absent.
        let mut traversal = NibblePath::init(&[0xb0; 32]);
        assert_eq!(
            NodeKind::Branch
                .traverse_node(node, &mut traversal, &mut parent)
                .unwrap(),
            ProofType::BranchExclusion
        );
    }

    #[test]
    fn test_branch_with_value_rejected() {
        let mut node = vec![vec![]; 17];
        node[16] = vec![0x01];
        let mut traversal = NibblePath::init(&[0u8; 32]);
        let mut parent = [0u8; 32];
        assert_eq!(
            NodeKind::Branch.traverse_node(node, &mut traversal, &mut parent),
            Err(NodeError::BranchNodeHasValue)
        );
    }

    #[test]
    fn test_extension_skips_or_excludes() {
        let node = vec![vec![0x00, 0xab], vec![0x22; 32]];
        let mut traversal = NibblePath::init(&[0xab; 32]);
        let mut parent = [0u8; 32];
        assert_eq!(
            NodeKind::Extension
                .traverse_node(node.clone(), &mut traversal, &mut parent)
                .unwrap(),
            ProofType::Pending
        );
        assert_eq!(traversal.visiting_index(), 2);
        assert_eq!(parent, [0x22; 32]);

        let mut traversal = NibblePath::init(&[0xac; 32]);
        assert_eq!(
            NodeKind::Extension
                .traverse_node(node, &mut traversal, &mut parent)
                .unwrap(),
            ProofType::ExtensionExclusion
        );
    }
}
