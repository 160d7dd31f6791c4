#![no_main]
use geoip2_cn::cidr::{parse_cidrs, parse_line, InvalidLinePolicy};
use libfuzzer_sys::fuzz_target;
use std::path::Path;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let lines: Vec<String> = s.lines().map(str::to_string).collect();

        // Skip never fails; whatever it keeps must parse to itself
        if let Ok(networks) = parse_cidrs(Path::new("fuzz.txt"), &lines, InvalidLinePolicy::Skip) {
            for network in networks {
                let reparsed = parse_line(&network.to_string());
                assert_eq!(reparsed.ok(), Some(Some(network)));
            }
        }

        let _ = parse_cidrs(Path::new("fuzz.txt"), &lines, InvalidLinePolicy::FailFast);
    }
});
