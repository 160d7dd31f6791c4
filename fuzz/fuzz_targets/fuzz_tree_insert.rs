#![no_main]
use geoip2_cn::ip_tree::{IpTree, IpVersion, RecordSize};
use ipnetwork::{IpNetwork, Ipv6Network};
use libfuzzer_sys::fuzz_target;
use std::net::{IpAddr, Ipv6Addr};

fuzz_target!(|data: &[u8]| {
    // Each 17-byte chunk: 16 address bytes plus a prefix length
    let mut tree = IpTree::new(IpVersion::V6);
    let mut inserted = Vec::new();

    for (i, chunk) in data.chunks_exact(17).enumerate() {
        let mut octets = [0u8; 16];
        octets.copy_from_slice(&chunk[..16]);
        let prefix = chunk[16] % 129;
        if let Ok(network) = Ipv6Network::new(Ipv6Addr::from(octets), prefix) {
            let network = IpNetwork::V6(network);
            if tree.insert(network, i as u32).is_ok() {
                inserted.push(network);
            }
        }
    }

    // Every inserted network's own address must resolve to something
    for network in &inserted {
        assert!(tree.lookup(network.network()).is_some());
    }
    let _ = tree.lookup(IpAddr::V6(Ipv6Addr::UNSPECIFIED));

    for record_size in [RecordSize::Bits24, RecordSize::Bits28, RecordSize::Bits32] {
        let _ = tree.serialize(record_size);
    }
});
