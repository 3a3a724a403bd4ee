//! append-only commitment log
//!
//! lean incremental merkle tree: the depth grows with the number of leaves,
//! a node without a right sibling is carried up unchanged, and the empty tree
//! has root zero. leaves are unique, so every leaf maps to exactly one index.

use std::collections::{HashMap, HashSet};

use ark_ff::Zero;
use pool_primitives::field::to_hex;
use pool_primitives::{hash2, FieldElement};
use thiserror::Error;

/// depth the circuit is compiled for
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// path bits are packed into a u64
pub const MAX_SUPPORTED_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MerkleError {
    #[error("leaf {0} is already in the log")]
    DuplicateLeaf(String),

    #[error("leaf index {index} out of range for log of size {size}")]
    IndexOutOfRange { index: usize, size: usize },

    #[error("appending would grow the log past depth {max_depth}")]
    DepthExceeded { max_depth: usize },
}

pub type Result<T> = std::result::Result<T, MerkleError>;

/// merkle inclusion proof
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleProof {
    pub root: FieldElement,
    pub leaf: FieldElement,
    pub leaf_index: usize,
    /// path bits, bit i set when the node is the right child at the i-th
    /// level that has a sibling
    pub index: u64,
    /// number of real siblings
    pub depth: usize,
    /// siblings from leaf to root, zero padded to the log's max depth
    pub siblings: Vec<FieldElement>,
}

impl MerkleProof {
    /// all-zero proof for slots that are never looked up
    pub fn dummy(max_depth: usize) -> Self {
        Self {
            root: FieldElement::zero(),
            leaf: FieldElement::zero(),
            leaf_index: 0,
            index: 0,
            depth: 0,
            siblings: vec![FieldElement::zero(); max_depth],
        }
    }

    /// recompute the root from leaf and path
    pub fn compute_root(&self) -> FieldElement {
        self.siblings
            .iter()
            .take(self.depth)
            .enumerate()
            .fold(self.leaf, |node, (level, sibling)| {
                if (self.index >> level) & 1 == 1 {
                    hash2(sibling, &node)
                } else {
                    hash2(&node, sibling)
                }
            })
    }

    pub fn verify(&self) -> bool {
        self.depth <= self.siblings.len() && self.compute_root() == self.root
    }

    /// verify against a root known to the caller
    pub fn verify_against(&self, root: &FieldElement) -> bool {
        self.root == *root && self.verify()
    }
}

/// incremental merkle log with a unique-leaf index
#[derive(Clone, Debug)]
pub struct IncrementalMerkleLog {
    /// nodes[0] are the leaves, nodes[depth] holds the root
    nodes: Vec<Vec<FieldElement>>,
    /// leaf -> position
    positions: HashMap<FieldElement, usize>,
    max_depth: usize,
}

impl Default for IncrementalMerkleLog {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl IncrementalMerkleLog {
    /// empty log, depth capped at `max_depth`
    pub fn new(max_depth: usize) -> Self {
        Self {
            nodes: vec![Vec::new()],
            positions: HashMap::new(),
            max_depth: max_depth.min(MAX_SUPPORTED_DEPTH),
        }
    }

    /// log rebuilt from an ordered leaf list
    pub fn from_leaves(max_depth: usize, leaves: &[FieldElement]) -> Result<Self> {
        let mut log = Self::new(max_depth);
        log.append(leaves)?;
        Ok(log)
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn size(&self) -> usize {
        self.nodes[0].len()
    }

    pub fn len(&self) -> usize {
        self.size()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn depth(&self) -> usize {
        self.nodes.len() - 1
    }

    /// current root, zero for the empty log
    pub fn root(&self) -> FieldElement {
        self.nodes[self.depth()]
            .first()
            .copied()
            .unwrap_or_else(FieldElement::zero)
    }

    pub fn leaves(&self) -> &[FieldElement] {
        &self.nodes[0]
    }

    pub fn contains(&self, leaf: &FieldElement) -> bool {
        self.positions.contains_key(leaf)
    }

    pub fn index_of(&self, leaf: &FieldElement) -> Option<usize> {
        self.positions.get(leaf).copied()
    }

    /// append leaves in order, returns the new root
    ///
    /// all-or-nothing: duplicates (against the log and inside the batch) and
    /// depth overflow are rejected before anything is inserted.
    pub fn append(&mut self, leaves: &[FieldElement]) -> Result<FieldElement> {
        let mut batch = HashSet::with_capacity(leaves.len());
        for leaf in leaves {
            if self.contains(leaf) || !batch.insert(*leaf) {
                return Err(MerkleError::DuplicateLeaf(to_hex(leaf)));
            }
        }

        let new_size = self.size() + leaves.len();
        if required_depth(new_size) > self.max_depth {
            return Err(MerkleError::DepthExceeded {
                max_depth: self.max_depth,
            });
        }

        for leaf in leaves {
            self.insert(*leaf);
        }
        Ok(self.root())
    }

    fn insert(&mut self, leaf: FieldElement) {
        let position = self.size();
        if self.depth() < required_depth(position + 1) {
            self.nodes.push(Vec::new());
        }

        let depth = self.depth();
        let mut node = leaf;
        let mut index = position;
        for level in 0..depth {
            let row = &mut self.nodes[level];
            if index < row.len() {
                row[index] = node;
            } else {
                row.push(node);
            }
            if index & 1 == 1 {
                node = hash2(&row[index - 1], &node);
            }
            index >>= 1;
        }
        self.nodes[depth] = vec![node];
        self.positions.insert(leaf, position);
    }

    /// inclusion proof for the leaf at `leaf_index`
    pub fn proof(&self, leaf_index: usize) -> Result<MerkleProof> {
        let size = self.size();
        if leaf_index >= size {
            return Err(MerkleError::IndexOutOfRange {
                index: leaf_index,
                size,
            });
        }

        let mut siblings = Vec::with_capacity(self.max_depth);
        let mut path = 0u64;
        let mut index = leaf_index;
        for level in 0..self.depth() {
            let is_right = index & 1 == 1;
            let sibling_index = if is_right { index - 1 } else { index + 1 };
            if let Some(sibling) = self.nodes[level].get(sibling_index) {
                if is_right {
                    path |= 1 << siblings.len();
                }
                siblings.push(*sibling);
            }
            index >>= 1;
        }

        let depth = siblings.len();
        siblings.resize(self.max_depth.max(depth), FieldElement::zero());

        Ok(MerkleProof {
            root: self.root(),
            leaf: self.nodes[0][leaf_index],
            leaf_index,
            index: path,
            depth,
            siblings,
        })
    }

    /// proof for a leaf looked up by value
    pub fn proof_of(&self, leaf: &FieldElement) -> Option<MerkleProof> {
        self.index_of(leaf).and_then(|i| self.proof(i).ok())
    }
}

/// depth needed to hold `size` leaves
fn required_depth(size: usize) -> usize {
    if size <= 1 {
        0
    } else {
        size.next_power_of_two().trailing_zeros() as usize
    }
}

/// root of a small fixed tree with the same carry rule as the log
pub fn fixed_root(leaves: &[FieldElement]) -> FieldElement {
    if leaves.is_empty() {
        return FieldElement::zero();
    }
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => hash2(left, right),
                _ => pair[0],
            })
            .collect();
    }
    level[0]
}
