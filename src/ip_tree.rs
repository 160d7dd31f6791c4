//! Binary search tree for the MMDB format
//!
//! Nodes live in an arena; node 0 is the root. Each node has two records, one
//! per bit value, and a record is empty, a pointer to another node, or a
//! pointer into the data section.
//!
//! Inserting a network replaces everything under its prefix, including more
//! specific networks inserted earlier. A later, more specific network splits
//! the record it lands in, so the rest of the covering network keeps its data.
//!
//! IPv6 trees hold IPv4 networks under `::/96`. When serialized with
//! [`IpTree::with_ipv4_aliases`], the IPv4-mapped (`::ffff:0:0/96`), Teredo
//! (`2001::/32`) and 6to4 (`2002::/16`) ranges point at that same subtree.

use crate::error::{ConfigError, InsertError, WriteError};
use ipnetwork::IpNetwork;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// Record size in bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordSize {
    /// 24-bit records (6 bytes per node)
    Bits24 = 24,
    /// 28-bit records (7 bytes per node)
    Bits28 = 28,
    /// 32-bit records (8 bytes per node)
    #[default]
    Bits32 = 32,
}

impl RecordSize {
    /// Size of a node (2 records) in bytes
    pub fn node_bytes(self) -> usize {
        match self {
            RecordSize::Bits24 => 6,
            RecordSize::Bits28 => 7,
            RecordSize::Bits32 => 8,
        }
    }

    /// Record width in bits
    pub fn bits(self) -> u16 {
        self as u16
    }

    /// Largest value a record can hold
    pub fn max_value(self) -> u64 {
        (1u64 << self.bits()) - 1
    }
}

impl FromStr for RecordSize {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "24" => Ok(RecordSize::Bits24),
            "28" => Ok(RecordSize::Bits28),
            "32" => Ok(RecordSize::Bits32),
            other => Err(ConfigError::RecordSize(other.to_string())),
        }
    }
}

impl fmt::Display for RecordSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

/// Address family of the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IpVersion {
    /// 32-level tree, IPv4 only
    V4,
    /// 128-level tree; IPv4 networks live under `::/96`
    #[default]
    V6,
}

impl IpVersion {
    /// Value stored in the `ip_version` metadata field
    pub fn number(self) -> u16 {
        match self {
            IpVersion::V4 => 4,
            IpVersion::V6 => 6,
        }
    }
}

impl FromStr for IpVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "4" => Ok(IpVersion::V4),
            "6" => Ok(IpVersion::V6),
            other => Err(ConfigError::IpVersion(other.to_string())),
        }
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Ranges of an IPv6 tree that alias the IPv4 subtree at `::/96`
const IPV4_ALIASES: [(u128, u8); 3] = [
    // ::ffff:0:0/96, IPv4-mapped
    (0xffff << 32, 96),
    // 2001::/32, Teredo
    (0x2001 << 112, 32),
    // 2002::/16, 6to4
    (0x2002 << 112, 16),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Record {
    Empty,
    Node(usize),
    Data(u32),
}

#[derive(Debug, Clone)]
struct Node {
    children: [Record; 2],
}

impl Node {
    fn empty() -> Self {
        Self {
            children: [Record::Empty; 2],
        }
    }
}

/// Arena-allocated search tree
#[derive(Debug, Clone)]
pub struct IpTree {
    ip_version: IpVersion,
    nodes: Vec<Node>,
}

impl IpTree {
    /// Create a tree holding only the root node
    pub fn new(ip_version: IpVersion) -> Self {
        Self {
            ip_version,
            nodes: vec![Node::empty()],
        }
    }

    /// Number of nodes allocated so far, including nodes that a later
    /// insert cut off from the root
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Attach `data_offset` to every address in `network`
    pub fn insert(&mut self, network: IpNetwork, data_offset: u32) -> Result<(), InsertError> {
        let (bits, depth) = self.key(network)?;
        self.set(bits, depth, Record::Data(data_offset));
        Ok(())
    }

    /// Copy of the tree with the IPv4 alias ranges pointing at `::/96`
    ///
    /// IPv4-only trees, and IPv6 trees without IPv4 data, come back unchanged.
    pub fn with_ipv4_aliases(&self) -> IpTree {
        let mut tree = self.clone();
        if self.ip_version != IpVersion::V6 {
            return tree;
        }

        let ipv4_root = self.record_at(0, 96);
        if ipv4_root == Record::Empty {
            return tree;
        }
        for (bits, depth) in IPV4_ALIASES {
            tree.set(bits, depth, ipv4_root);
        }
        tree
    }

    /// Point the record covering the prefix `bits/depth` at `record`,
    /// replacing whatever lay below it
    fn set(&mut self, bits: u128, depth: u8, record: Record) {
        if depth == 0 {
            self.nodes[0].children = [record; 2];
            return;
        }

        let mut node_id = 0usize;
        for level in 0..depth - 1 {
            let bit = bit_at(bits, level);
            node_id = match self.nodes[node_id].children[bit] {
                Record::Node(id) => id,
                // Split an empty or less specific record so the prefix can sit below it
                other => {
                    let new_id = self.allocate(Node {
                        children: [other; 2],
                    });
                    self.nodes[node_id].children[bit] = Record::Node(new_id);
                    new_id
                }
            };
        }
        self.nodes[node_id].children[bit_at(bits, depth - 1)] = record;
    }

    /// Record reached after following `depth` bits of `bits` from the root
    fn record_at(&self, bits: u128, depth: u8) -> Record {
        let mut node_id = 0usize;
        for level in 0..depth {
            match self.nodes[node_id].children[bit_at(bits, level)] {
                Record::Node(id) => node_id = id,
                other => return other,
            }
        }
        Record::Node(node_id)
    }

    /// Tree position of a network: 128 address bits, left aligned, and the
    /// number of levels the prefix covers
    fn key(&self, network: IpNetwork) -> Result<(u128, u8), InsertError> {
        match (network.network(), self.ip_version) {
            (IpAddr::V4(v4), IpVersion::V4) => {
                Ok((u128::from(u32::from(v4)) << 96, network.prefix()))
            }
            (IpAddr::V4(v4), IpVersion::V6) => {
                Ok((u128::from(u32::from(v4)), 96 + network.prefix()))
            }
            (IpAddr::V6(v6), IpVersion::V6) => Ok((u128::from(v6), network.prefix())),
            (IpAddr::V6(_), IpVersion::V4) => Err(InsertError::Ipv6InIpv4Tree(network)),
        }
    }

    fn allocate(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Data offset an address resolves to, if any
    pub fn lookup(&self, addr: IpAddr) -> Option<u32> {
        let (bits, depth) = match (addr, self.ip_version) {
            (IpAddr::V4(v4), IpVersion::V4) => (u128::from(u32::from(v4)) << 96, 32),
            (IpAddr::V4(v4), IpVersion::V6) => (u128::from(u32::from(v4)), 128),
            (IpAddr::V6(v6), IpVersion::V6) => (u128::from(v6), 128),
            (IpAddr::V6(_), IpVersion::V4) => return None,
        };

        match self.record_at(bits, depth) {
            Record::Data(offset) => Some(offset),
            Record::Empty | Record::Node(_) => None,
        }
    }

    /// Node ids reachable from the root, breadth first
    fn reachable(&self) -> Vec<usize> {
        let mut seen = vec![false; self.nodes.len()];
        seen[0] = true;
        let mut order = vec![0usize];

        let mut next = 0;
        while next < order.len() {
            let id = order[next];
            next += 1;
            for record in self.nodes[id].children {
                if let Record::Node(child) = record {
                    if !seen[child] {
                        seen[child] = true;
                        order.push(child);
                    }
                }
            }
        }
        order
    }

    /// Serialize the nodes reachable from the root with the given record width
    ///
    /// Nodes are renumbered breadth first, so the output holds
    /// `len / record_size.node_bytes()` nodes. Data pointers are written as
    /// `node_count + 16 + offset`, where 16 is the size of the separator
    /// between the tree and the data section.
    pub fn serialize(&self, record_size: RecordSize) -> Result<Vec<u8>, WriteError> {
        let order = self.reachable();
        let node_count = order.len();
        if node_count as u64 > record_size.max_value() {
            return Err(WriteError::TooManyNodes(node_count));
        }

        let mut new_ids = vec![0usize; self.nodes.len()];
        for (new_id, &old_id) in order.iter().enumerate() {
            new_ids[old_id] = new_id;
        }

        let mut tree = Vec::with_capacity(node_count * record_size.node_bytes());
        for &old_id in &order {
            let [left, right] = self.nodes[old_id].children.map(|record| match record {
                Record::Node(id) => Record::Node(new_ids[id]),
                other => other,
            });
            let left = record_value(left, node_count, record_size)?;
            let right = record_value(right, node_count, record_size)?;
            write_node(&mut tree, record_size, left, right);
        }

        Ok(tree)
    }
}

fn bit_at(bits: u128, level: u8) -> usize {
    ((bits >> (127 - level)) & 1) as usize
}

fn record_value(
    record: Record,
    node_count: usize,
    record_size: RecordSize,
) -> Result<u32, WriteError> {
    let value = match record {
        Record::Empty => node_count as u64,
        Record::Node(id) => id as u64,
        Record::Data(offset) => node_count as u64 + 16 + u64::from(offset),
    };

    if value > record_size.max_value() {
        return Err(WriteError::RecordSizeTooSmall {
            record_size: record_size.bits(),
            value,
        });
    }
    Ok(value as u32)
}

fn write_node(tree: &mut Vec<u8>, record_size: RecordSize, left: u32, right: u32) {
    let l = left.to_be_bytes();
    let r = right.to_be_bytes();

    match record_size {
        RecordSize::Bits24 => {
            tree.extend_from_slice(&l[1..]);
            tree.extend_from_slice(&r[1..]);
        }
        RecordSize::Bits28 => {
            // Middle byte: high nibble of left, then high nibble of right
            tree.extend_from_slice(&l[1..]);
            tree.push(((l[0] & 0x0F) << 4) | (r[0] & 0x0F));
            tree.extend_from_slice(&r[1..]);
        }
        RecordSize::Bits32 => {
            tree.extend_from_slice(&l);
            tree.extend_from_slice(&r);
        }
    }
}
