//! Databases produced by the writer, read back with an independent MMDB reader

use geoip2_cn::{
    pipeline, BuildConfig, Catalog, DatabaseWriter, GeoRecord, IpVersion, MmdbWriter,
    RecordSize, WriterOptions,
};
use ipnetwork::IpNetwork;
use maxminddb::{geoip2, Reader};
use std::fs;
use std::net::IpAddr;

const BUILD_EPOCH: u64 = 1_700_000_000;

fn options(record_size: RecordSize, ip_version: IpVersion) -> WriterOptions {
    WriterOptions {
        record_size,
        ip_version,
        languages: Catalog::builtin().unwrap().languages(),
        build_epoch: Some(BUILD_EPOCH),
        ..WriterOptions::default()
    }
}

fn build(writer_options: WriterOptions, entries: &[(&str, &str)]) -> Reader<Vec<u8>> {
    let catalog = Catalog::builtin().unwrap();
    let mut writer = MmdbWriter::new(writer_options);
    for (network, slug) in entries {
        let network: IpNetwork = network.parse().unwrap();
        writer
            .insert(network, &catalog.get(slug).unwrap().record)
            .unwrap();
    }
    Reader::from_source(writer.to_bytes().unwrap()).unwrap()
}

fn iso_code(reader: &Reader<Vec<u8>>, ip: &str) -> Option<String> {
    let ip: IpAddr = ip.parse().unwrap();
    reader
        .lookup::<GeoRecord>(ip)
        .unwrap()
        .map(|record| record.country.iso_code)
}

#[test]
fn test_lookups_for_every_record_size() {
    for record_size in [RecordSize::Bits24, RecordSize::Bits28, RecordSize::Bits32] {
        let reader = build(
            options(record_size, IpVersion::V6),
            &[
                ("1.0.1.0/24", "cn"),
                ("1.0.2.0/23", "cn"),
                ("1.0.16.0/20", "japan"),
                ("2001:250::/35", "cn"),
            ],
        );

        assert_eq!(reader.metadata.record_size, record_size.bits());
        assert_eq!(iso_code(&reader, "1.0.1.1").as_deref(), Some("CN"));
        assert_eq!(iso_code(&reader, "1.0.3.255").as_deref(), Some("CN"));
        assert_eq!(iso_code(&reader, "1.0.20.7").as_deref(), Some("JP"));
        assert_eq!(iso_code(&reader, "2001:250:1::1").as_deref(), Some("CN"));
        assert_eq!(iso_code(&reader, "1.0.0.1"), None);
        assert_eq!(iso_code(&reader, "8.8.8.8"), None);
        assert_eq!(iso_code(&reader, "2400:cb00::1"), None);
    }
}

#[test]
fn test_geoip2_country_shape() {
    let reader = build(
        options(RecordSize::Bits28, IpVersion::V6),
        &[("1.0.1.0/24", "cn"), ("3.0.0.0/8", "usa")],
    );

    let country: geoip2::Country = reader
        .lookup("1.0.1.1".parse().unwrap())
        .unwrap()
        .unwrap();
    let country = country.country.unwrap();
    assert_eq!(country.iso_code, Some("CN"));
    assert_eq!(country.geoname_id, Some(1814991));
    assert_eq!(country.is_in_european_union, Some(false));
    let names = country.names.unwrap();
    assert_eq!(names.get("en"), Some(&"China"));
    assert_eq!(names.get("zh-CN"), Some(&"中国"));

    let usa: geoip2::Country = reader
        .lookup("3.1.2.3".parse().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(usa.country.unwrap().iso_code, Some("US"));
}

#[test]
fn test_metadata() {
    let reader = build(
        options(RecordSize::Bits24, IpVersion::V6),
        &[("1.0.1.0/24", "cn")],
    );
    let metadata = &reader.metadata;

    assert_eq!(metadata.binary_format_major_version, 2);
    assert_eq!(metadata.binary_format_minor_version, 0);
    assert_eq!(metadata.database_type, "GeoIP2-Country");
    assert_eq!(metadata.ip_version, 6);
    assert_eq!(metadata.record_size, 24);
    assert_eq!(metadata.build_epoch, BUILD_EPOCH);
    assert!(metadata.languages.iter().any(|lang| lang == "en"));
    assert!(metadata.languages.iter().any(|lang| lang == "zh-CN"));
    assert!(metadata.description.contains_key("en"));
    assert!(metadata.node_count > 0);
}

#[test]
fn test_ipv4_only_database() {
    let reader = build(
        options(RecordSize::Bits32, IpVersion::V4),
        &[("1.0.1.0/24", "cn"), ("1.0.16.0/20", "japan")],
    );

    assert_eq!(reader.metadata.ip_version, 4);
    assert_eq!(iso_code(&reader, "1.0.1.200").as_deref(), Some("CN"));
    assert_eq!(iso_code(&reader, "1.0.31.1").as_deref(), Some("JP"));
    assert_eq!(iso_code(&reader, "1.0.32.1"), None);
}

#[test]
fn test_later_insert_replaces_covered_range() {
    let reader = build(
        options(RecordSize::Bits32, IpVersion::V6),
        &[
            ("1.0.0.0/16", "cn"),
            ("1.0.16.0/20", "japan"),
            ("1.0.128.0/24", "cn"),
            ("1.0.128.0/24", "korea"),
            ("1.0.0.0/8", "usa"),
            ("1.0.16.0/20", "japan"),
            ("2.2.3.0/24", "cn"),
            ("2.2.3.0/24", "korea"),
        ],
    );

    assert_eq!(iso_code(&reader, "1.0.20.1").as_deref(), Some("JP"));
    assert_eq!(iso_code(&reader, "1.0.128.9").as_deref(), Some("US"));
    assert_eq!(iso_code(&reader, "1.0.200.1").as_deref(), Some("US"));
    assert_eq!(iso_code(&reader, "1.200.0.1").as_deref(), Some("US"));
    assert_eq!(iso_code(&reader, "2.2.3.1").as_deref(), Some("KR"));
}

#[test]
fn test_wider_extra_list_overrides_primary() {
    let reader = build(
        options(RecordSize::Bits24, IpVersion::V6),
        &[("1.0.1.0/24", "cn"), ("1.0.0.0/16", "usa")],
    );

    assert_eq!(iso_code(&reader, "1.0.1.1").as_deref(), Some("US"));
    assert_eq!(iso_code(&reader, "1.0.99.1").as_deref(), Some("US"));
}

#[test]
fn test_ipv4_mapped_and_6to4_lookups() {
    let entries = [("1.0.1.0/24", "cn"), ("2001:250::/35", "cn")];
    let reader = build(options(RecordSize::Bits28, IpVersion::V6), &entries);

    assert_eq!(iso_code(&reader, "::ffff:1.0.1.1").as_deref(), Some("CN"));
    assert_eq!(iso_code(&reader, "2002:100:101::").as_deref(), Some("CN"));
    assert_eq!(iso_code(&reader, "2001:0:100:101::").as_deref(), Some("CN"));
    assert_eq!(iso_code(&reader, "2001:250:1::1").as_deref(), Some("CN"));
    assert_eq!(iso_code(&reader, "::ffff:8.8.8.8"), None);

    let reader = build(
        WriterOptions {
            ipv4_aliases: false,
            ..options(RecordSize::Bits28, IpVersion::V6)
        },
        &entries,
    );
    assert_eq!(iso_code(&reader, "1.0.1.1").as_deref(), Some("CN"));
    assert_eq!(iso_code(&reader, "::ffff:1.0.1.1"), None);
    assert_eq!(iso_code(&reader, "2002:100:101::"), None);
}

#[test]
fn test_empty_database_is_readable() {
    let reader = build(options(RecordSize::Bits24, IpVersion::V6), &[]);

    assert_eq!(iso_code(&reader, "1.0.1.1"), None);
    assert_eq!(iso_code(&reader, "::1"), None);
}

#[test]
fn test_pipeline_output_is_readable() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("ipip_cn.txt"),
        "# China\n1.0.1.0/24\n\n1.0.2.7/23\n223.255.252.0/23\n",
    )
    .unwrap();
    for (slug, list) in [
        ("usa", "3.0.0.0/8\n"),
        ("japan", "1.0.16.0/20\n"),
        ("korea", "1.11.0.0/16\n"),
        ("hongkong", "1.32.128.0/18\n"),
        ("taiwan", "1.34.0.0/15\n"),
        ("singapore", "1.32.0.0/18\n"),
    ] {
        fs::create_dir(dir.path().join(slug)).unwrap();
        fs::write(dir.path().join(slug).join("ip.txt"), list).unwrap();
    }

    let config = BuildConfig {
        source: dir.path().join("ipip_cn.txt"),
        extra_dir: dir.path().to_path_buf(),
        destination: dir.path().join("Country.mmdb"),
        ..BuildConfig::default()
    };
    let catalog = Catalog::builtin().unwrap();
    let writer = MmdbWriter::new(options(RecordSize::Bits32, IpVersion::V6));
    let report = pipeline::run(&config, &catalog, writer).unwrap();

    assert_eq!(report.total_networks(), 9);
    assert_eq!(
        report.bytes_written,
        fs::metadata(&config.destination).unwrap().len()
    );

    let reader = Reader::from_source(fs::read(&config.destination).unwrap()).unwrap();
    for (ip, iso) in [
        ("1.0.1.1", "CN"),
        ("1.0.3.1", "CN"),
        ("223.255.253.1", "CN"),
        ("3.3.3.3", "US"),
        ("1.0.16.1", "JP"),
        ("1.11.1.1", "KR"),
        ("1.32.200.1", "HK"),
        ("1.35.0.1", "TW"),
        ("1.32.10.1", "SG"),
    ] {
        assert_eq!(iso_code(&reader, ip).as_deref(), Some(iso), "{}", ip);
    }
}
