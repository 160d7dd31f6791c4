use anyhow::Result;
use clap::{ArgAction, Parser};
use geoip2_cn::mmdb_writer::{DEFAULT_DATABASE_TYPE, DEFAULT_DESCRIPTION};
use geoip2_cn::pipeline::{self, DEFAULT_DESTINATION, DEFAULT_SOURCE};
use geoip2_cn::{
    BuildConfig, BuildReport, Catalog, InvalidLinePolicy, IpVersion, MmdbWriter, RecordSize,
    WriterOptions,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "geoip2-cn")]
#[command(
    about = "Build a GeoIP2-Country compatible MMDB database from per-country CIDR lists",
    long_about = "geoip2-cn - Build a GeoIP2-Country compatible MMDB database\n\n\
    Reads the China CIDR list given by --source and, unless disabled, one list per\n\
    extra country from <extra-dir>/<country>/ip.txt (usa, japan, korea, hongkong,\n\
    taiwan, singapore). Every network is tagged with its country's GeoIP2 record.\n\
    A network replaces whatever earlier networks it covers, so later lists\n\
    override earlier ones where they overlap.\n\n\
    Examples:\n\
      geoip2-cn\n\
      geoip2-cn -s ipip_cn.txt -d Country.mmdb -e false\n\
      geoip2-cn -D lists --countries japan,usa -r 24"
)]
#[command(version)]
struct Cli {
    /// Primary (China) CIDR list, plain or .gz
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_SOURCE)]
    source: PathBuf,

    /// Output database path (overwritten if it exists)
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_DESTINATION)]
    destination: PathBuf,

    /// Value of the database_type metadata field
    #[arg(short = 't', long, value_name = "NAME", default_value = DEFAULT_DATABASE_TYPE)]
    database_type: String,

    /// Tree record size in bits: 24, 28 or 32
    #[arg(short, long, value_name = "BITS", default_value = "32")]
    record_size: RecordSize,

    /// Ingest the extra country lists
    #[arg(short, long, value_name = "BOOL", default_value_t = true, action = ArgAction::Set)]
    extra_countries: bool,

    /// Directory holding <country>/ip.txt for each extra country
    #[arg(short = 'D', long, value_name = "DIR", default_value = ".")]
    extra_dir: PathBuf,

    /// Extra countries to ingest, in order (comma-separated, default: all)
    #[arg(long, value_name = "LIST", value_delimiter = ',')]
    countries: Option<Vec<String>>,

    /// JSON country catalog replacing the built-in records
    #[arg(long, value_name = "FILE")]
    catalog: Option<PathBuf>,

    /// What to do with lines that are not valid CIDRs: fail or skip
    #[arg(long, value_name = "POLICY", default_value = "fail")]
    invalid_lines: InvalidLinePolicy,

    /// Search tree type: 4 or 6
    #[arg(long, value_name = "VERSION", default_value = "6")]
    ip_version: IpVersion,

    /// Do not map ::ffff:0:0/96, 2001::/32 and 2002::/16 onto the IPv4 networks
    #[arg(long)]
    no_ipv4_aliases: bool,

    /// English description stored in the metadata
    #[arg(long, value_name = "TEXT", default_value = DEFAULT_DESCRIPTION)]
    description: String,

    /// Build timestamp in seconds since the epoch (default: now)
    #[arg(long, value_name = "SECS", env = "SOURCE_DATE_EPOCH")]
    build_epoch: Option<u64>,

    /// Debug logging and a detailed summary
    #[arg(short, long)]
    verbose: bool,
}

fn init_logger(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run(cli: Cli) -> Result<BuildReport> {
    let catalog = match &cli.catalog {
        Some(path) => Catalog::from_path(path)?,
        None => Catalog::builtin()?,
    };

    let mut description = BTreeMap::new();
    description.insert("en".to_string(), cli.description);

    let options = WriterOptions {
        database_type: cli.database_type,
        record_size: cli.record_size,
        ip_version: cli.ip_version,
        languages: catalog.languages(),
        description,
        build_epoch: cli.build_epoch,
        ipv4_aliases: !cli.no_ipv4_aliases,
    };
    log::debug!("writer options: {:?}", options);

    let config = BuildConfig {
        source: cli.source,
        extra_dir: cli.extra_dir,
        extra_countries: cli.extra_countries,
        countries: cli.countries,
        destination: cli.destination,
        invalid_lines: cli.invalid_lines,
    };

    let report = pipeline::run(&config, &catalog, MmdbWriter::new(options))?;
    Ok(report)
}

fn print_summary(destination: &std::path::Path, report: &BuildReport, verbose: bool) {
    if !verbose {
        println!("✓ Database built: {}", destination.display());
        return;
    }

    println!("\n✓ Database built successfully!");
    println!("  Output:        {}", destination.display());
    println!(
        "  Database size: {:.2} MB ({} bytes)",
        report.bytes_written as f64 / (1024.0 * 1024.0),
        report.bytes_written
    );
    println!("  Networks:      {}", report.total_networks());
    for country in &report.countries {
        println!("    {:<12} {}", country.slug, country.networks);
    }
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let verbose = cli.verbose;
    let destination = cli.destination.clone();

    match run(cli) {
        Ok(report) => print_summary(&destination, &report, verbose),
        Err(err) => {
            log::error!("{}", err);
            process::exit(1);
        }
    }
}
