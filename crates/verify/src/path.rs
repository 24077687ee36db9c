//! Walks the traversal path of a Merkle PATRICIA Trie proof.
//!
//! The path is 32 bytes, the hash of the key being proven: keccak(key).
//! It is consumed one nibble at a time, with 16 choices at each branch.
//! Extension and leaf nodes carry a compact (hex-prefix) encoded run of
//! nibbles that must line up with the remaining path.
//!
//! When the run in a terminal node diverges from the path the key is absent
//! from the trie and the proof is an exclusion proof.

use thiserror::Error;

/// Number of nibbles in a full 32 byte path.
const FULL_PATH_NIBBLES: usize = 64;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum PathError {
    #[error("Extension path nibble {extension_contained} did not match the expected nibble {expected} (index={visiting})")]
    ExtensionNibbleMismatch {
        visiting: usize,
        expected: u8,
        extension_contained: u8,
    },
    #[error("Extension node does not contain any path data")]
    ExtensionPathEmpty,
    #[error("Extension path in extension node longer than expected")]
    ExtensionPathLongerThanExpected,
    #[error("Unable to decode invalid hex compact trie path encoding prefix")]
    InvalidPathPrefix,
    #[error("Attempted traversal to next node in path but path has no remaining nibbles")]
    NextNodeNotInPath,
}

/// Sequence of nibbles followed from the root of the trie.
///
/// E.g., path 5a1 visits branch items in the order [5, 10, 1].
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct NibblePath {
    path: Vec<u8>,
    visiting_index: usize,
}

impl NibblePath {
    /// Turns the path bytes into nibbles, ready to visit the first one.
    pub fn init(path_bytes: &[u8]) -> Self {
        let path = path_bytes.iter().flat_map(byte_to_nibbles).collect();
        Self {
            path,
            visiting_index: 0,
        }
    }
    /// Returns the next nibble and moves past it.
    pub fn visit_path_nibble(&mut self) -> Result<u8, PathError> {
        let nibble = self
            .path
            .get(self.visiting_index)
            .ok_or(PathError::NextNodeNotInPath)?;
        self.visiting_index += 1;
        Ok(*nibble)
    }
    /// Moves past the nibbles of an (internal) extension node, checking each one.
    pub fn skip_extension_node_nibbles(&mut self, extension: &[u8]) -> Result<(), PathError> {
        for skip_nibble in prefixed_bytes_to_nibbles(extension)? {
            let expected = self
                .path
                .get(self.visiting_index)
                .ok_or(PathError::ExtensionPathLongerThanExpected)?;
            if *expected != skip_nibble {
                return Err(PathError::ExtensionNibbleMismatch {
                    visiting: self.visiting_index,
                    expected: *expected,
                    extension_contained: skip_nibble,
                });
            }
            self.visiting_index += 1;
        }
        Ok(())
    }
    /// Compares the run of a terminal extension/leaf node against the remaining path,
    /// without consuming it.
    pub fn match_or_mismatch(&self, final_subpath: &[u8]) -> Result<PathNature, PathError> {
        let subpath_nibbles = prefixed_bytes_to_nibbles(final_subpath)?;
        let mut temp_index = self.visiting_index;
        let path_finished = temp_index + subpath_nibbles.len() == FULL_PATH_NIBBLES;

        for nibble in &subpath_nibbles {
            let expected = self
                .path
                .get(temp_index)
                .ok_or(PathError::ExtensionPathLongerThanExpected)?;
            if expected != nibble {
                if path_finished {
                    return Ok(PathNature::FullPathDiverges(temp_index));
                }
                return Ok(PathNature::SubPathDiverges(temp_index));
            }
            temp_index += 1;
        }
        if temp_index == FULL_PATH_NIBBLES {
            return Ok(PathNature::FullPathMatches);
        }
        Ok(PathNature::SubPathMatches)
    }
    /// Index of the nibble that will be visited next.
    pub fn visiting_index(&self) -> usize {
        self.visiting_index
    }
}

/// How the run in a terminal node relates to the expected path.
///
/// Necessary but not sufficient for the proof to be valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathNature {
    /// Matches so far, fewer than 64 nibbles covered.
    SubPathMatches,
    /// Diverges before 64 nibbles. Holds the first divergent index.
    SubPathDiverges(usize),
    /// All 64 nibbles match.
    FullPathMatches,
    /// Diverges in a run that would complete the path. Holds the first divergent index.
    FullPathDiverges(usize),
}

/// Removes the hex-prefix encoding from a node run and returns its nibbles.
///
/// E.g. an odd leaf run: `[0x3f, 0x1c, 0xb8]` -> `[0xf, 0x1, 0xc, 0xb, 0x8]`
pub fn prefixed_bytes_to_nibbles(bytes: &[u8]) -> Result<Vec<u8>, PathError> {
    let first_byte = bytes.first().ok_or(PathError::ExtensionPathEmpty)?;
    let mut nibbles = match PrefixEncoding::try_from(first_byte)? {
        PrefixEncoding::ExtensionEven | PrefixEncoding::LeafEven => vec![],
        PrefixEncoding::ExtensionOdd(nibble) | PrefixEncoding::LeafOdd(nibble) => vec![nibble],
    };
    nibbles.extend(bytes.iter().skip(1).flat_map(byte_to_nibbles));
    Ok(nibbles)
}

/// Hex-prefix flag carried by the first byte of an extension or leaf run.
/// Odd variants hold the first nibble of the run.
///
/// https://ethereum.org/en/developers/docs/data-structures-and-encoding/patricia-merkle-trie/#specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefixEncoding {
    ExtensionEven,
    ExtensionOdd(u8),
    LeafEven,
    LeafOdd(u8),
}

impl TryFrom<&u8> for PrefixEncoding {
    type Error = PathError;

    fn try_from(value: &u8) -> Result<Self, Self::Error> {
        let encoding = match byte_to_nibbles(value) {
            [0, _] => PrefixEncoding::ExtensionEven,
            [1, nibble] => PrefixEncoding::ExtensionOdd(nibble),
            [2, _] => PrefixEncoding::LeafEven,
            [3, nibble] => PrefixEncoding::LeafOdd(nibble),
            [_, _] => return Err(PathError::InvalidPathPrefix),
        };
        Ok(encoding)
    }
}

/// 0xbc -> [0xb, 0xc]
fn byte_to_nibbles(byte: &u8) -> [u8; 2] {
    [byte >> 4, byte & 0x0F]
}
