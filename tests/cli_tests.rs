use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const EXTRAS: [(&str, &str); 6] = [
    ("usa", "3.0.0.0/8\n"),
    ("japan", "1.0.16.0/20\n"),
    ("korea", "1.11.0.0/16\n"),
    ("hongkong", "1.32.128.0/18\n"),
    ("taiwan", "1.34.0.0/15\n"),
    ("singapore", "1.32.0.0/18\n"),
];

/// Helper to create a geoip2-cn command with a clean environment
fn geoip2_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("geoip2-cn"));
    cmd.env_remove("SOURCE_DATE_EPOCH").env_remove("RUST_LOG");
    cmd
}

/// Working directory laid out the way the tool expects by default
fn workdir() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("ipip_cn.txt"),
        "1.0.1.0/24\n1.0.2.0/23\n1.0.8.0/21\n",
    )
    .unwrap();
    for (slug, contents) in EXTRAS {
        write_extra(dir.path(), slug, contents);
    }
    dir
}

fn write_extra(root: &Path, slug: &str, contents: &str) {
    fs::create_dir_all(root.join(slug)).unwrap();
    fs::write(root.join(slug).join("ip.txt"), contents).unwrap();
}

#[test]
fn test_help() {
    geoip2_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--extra-countries"))
        .stdout(predicate::str::contains("--record-size"));
}

#[test]
fn test_version() {
    geoip2_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("geoip2-cn"));
}

#[test]
fn test_build_with_defaults() {
    let dir = workdir();

    geoip2_cmd()
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Database built: Country.mmdb"))
        .stderr(predicate::str::contains("cn cnt: 3"))
        .stderr(predicate::str::contains("japan cnt: 1"))
        .stderr(predicate::str::contains("singapore cnt: 1"));

    let db = fs::read(dir.path().join("Country.mmdb")).unwrap();
    assert!(db
        .windows(14)
        .any(|window| window == b"\xAB\xCD\xEFMaxMind.com"));
}

#[test]
fn test_build_with_explicit_paths() {
    let dir = workdir();
    let output = dir.path().join("out").join("China.mmdb");
    fs::create_dir(dir.path().join("out")).unwrap();

    geoip2_cmd()
        .arg("-s")
        .arg(dir.path().join("ipip_cn.txt"))
        .arg("-d")
        .arg(&output)
        .arg("-D")
        .arg(dir.path())
        .assert()
        .success();

    assert!(output.exists());
}

#[test]
fn test_missing_extra_country_fails() {
    let dir = workdir();
    fs::remove_file(dir.path().join("korea").join("ip.txt")).unwrap();

    geoip2_cmd()
        .current_dir(dir.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("fail to open"))
        .stderr(predicate::str::contains("korea"));

    assert!(!dir.path().join("Country.mmdb").exists());
}

#[test]
fn test_missing_source_fails() {
    let dir = TempDir::new().unwrap();

    geoip2_cmd()
        .current_dir(dir.path())
        .args(["-e", "false"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ipip_cn.txt"));
}

#[test]
fn test_extra_countries_disabled() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("ipip_cn.txt"), "1.0.1.0/24\n").unwrap();

    geoip2_cmd()
        .current_dir(dir.path())
        .args(["-e", "false"])
        .assert()
        .success()
        .stderr(predicate::str::contains("cn cnt: 1"))
        .stderr(predicate::str::contains("usa cnt").not());

    assert!(dir.path().join("Country.mmdb").exists());
}

#[test]
fn test_countries_subset() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("ipip_cn.txt"), "1.0.1.0/24\n").unwrap();
    write_extra(dir.path(), "japan", "1.0.16.0/20\n");

    geoip2_cmd()
        .current_dir(dir.path())
        .args(["--countries", "japan"])
        .assert()
        .success()
        .stderr(predicate::str::contains("japan cnt: 1"))
        .stderr(predicate::str::contains("usa cnt").not());
}

#[test]
fn test_unknown_country_rejected() {
    let dir = workdir();

    geoip2_cmd()
        .current_dir(dir.path())
        .args(["--countries", "japan,atlantis"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown country 'atlantis'"));

    assert!(!dir.path().join("Country.mmdb").exists());
}

#[test]
fn test_reproducible_with_build_epoch() {
    let dir = workdir();
    let first = dir.path().join("first.mmdb");
    let second = dir.path().join("second.mmdb");

    for output in [&first, &second] {
        geoip2_cmd()
            .current_dir(dir.path())
            .arg("-d")
            .arg(output)
            .args(["--build-epoch", "1700000000"])
            .assert()
            .success();
    }

    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
}

#[test]
fn test_build_epoch_from_environment() {
    let dir = workdir();
    let first = dir.path().join("first.mmdb");
    let second = dir.path().join("second.mmdb");

    geoip2_cmd()
        .current_dir(dir.path())
        .arg("-d")
        .arg(&first)
        .env("SOURCE_DATE_EPOCH", "1700000000")
        .assert()
        .success();
    geoip2_cmd()
        .current_dir(dir.path())
        .arg("-d")
        .arg(&second)
        .args(["--build-epoch", "1700000000"])
        .assert()
        .success();

    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
}

#[test]
fn test_invalid_line_fails_by_default() {
    let dir = workdir();
    fs::write(
        dir.path().join("ipip_cn.txt"),
        "1.0.1.0/24\n1.0.2.0/33\n",
    )
    .unwrap();

    geoip2_cmd()
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("ipip_cn.txt:2"));

    assert!(!dir.path().join("Country.mmdb").exists());
}

#[test]
fn test_invalid_lines_skipped() {
    let dir = workdir();
    fs::write(
        dir.path().join("ipip_cn.txt"),
        "1.0.1.0/24\n1.0.2.0/33\n1.0.8.0/21\n",
    )
    .unwrap();

    geoip2_cmd()
        .current_dir(dir.path())
        .args(["--invalid-lines", "skip"])
        .assert()
        .success()
        .stderr(predicate::str::contains("cn cnt: 2"));
}

#[test]
fn test_bad_record_size_rejected() {
    let dir = workdir();

    geoip2_cmd()
        .current_dir(dir.path())
        .args(["-r", "16"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid record size"));
}

#[test]
fn test_rerun_overwrites_output() {
    let dir = workdir();
    let output = dir.path().join("Country.mmdb");
    fs::write(&output, vec![0xffu8; 1 << 16]).unwrap();

    geoip2_cmd()
        .current_dir(dir.path())
        .assert()
        .success();

    let db = fs::read(&output).unwrap();
    assert!(db.len() < 1 << 16);
    assert_ne!(db[0], 0xff);
}

#[test]
fn test_verbose_summary() {
    let dir = workdir();

    geoip2_cmd()
        .current_dir(dir.path())
        .arg("-v")
        .assert()
        .success()
        .stdout(predicate::str::contains("Database built successfully"))
        .stdout(predicate::str::contains("Networks:      9"));
}

#[test]
fn test_gzip_source() {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    let dir = TempDir::new().unwrap();
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(b"1.0.1.0/24\n1.0.2.0/23\n").unwrap();
    fs::write(dir.path().join("cn.txt.gz"), encoder.finish().unwrap()).unwrap();

    geoip2_cmd()
        .current_dir(dir.path())
        .args(["-s", "cn.txt.gz", "-e", "false"])
        .assert()
        .success()
        .stderr(predicate::str::contains("cn cnt: 2"));
}
