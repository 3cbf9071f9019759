use clap::Parser;
use geostage::geocode::{GeocodeConfig, GeocodeResolver, PlaceContext, ResultStore};
use std::path::PathBuf;
use std::time::Duration;

/// Geostage — geocode titled place records from a JSON file.
///
/// Runs four lookup stages in order (Nominatim basic, Nominatim
/// variants, Photon, OpenCage) and writes resolved/remaining snapshots.
/// OpenCage runs only when OPENCAGE_API_KEY is set.
///
/// Examples:
///   geostage --in balat.json
///   geostage --in balat.json --city İstanbul --district Fatih
///   geostage --in ankara.json --city Ankara --out-resolved found.json
///   geostage --reset
#[derive(Parser)]
#[command(name = "geostage", version, about, long_about = None)]
struct Cli {
    /// Input JSON path: an array of {title, content, labels, coordinates}.
    #[arg(long = "in", value_name = "FILE")]
    infile: Option<PathBuf>,

    /// Default city appended to queries.
    #[arg(long, default_value = "İstanbul")]
    city: String,

    /// Default country appended to queries.
    #[arg(long, default_value = "Türkiye")]
    country: String,

    /// Default district/quarter appended to queries (optional).
    #[arg(long, default_value = "")]
    district: String,

    /// Snapshot path for resolved records.
    #[arg(long, default_value = "coor_resolved.json")]
    out_resolved: PathBuf,

    /// Snapshot path for remaining records.
    #[arg(long, default_value = "coor_remaining.json")]
    out_remaining: PathBuf,

    /// Politeness delay between lookups, in seconds.
    #[arg(long, default_value_t = 1.0)]
    sleep: f64,

    /// Per-lookup timeout, in seconds.
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    /// Clear both snapshots and exit.
    #[arg(long)]
    reset: bool,
}

fn main() {
    let cli = Cli::parse();

    let store = ResultStore::open(cli.out_resolved.clone(), cli.out_remaining.clone());

    if cli.reset {
        let mut store = store;
        store.reset();
        eprintln!("Snapshots cleared.");
        return;
    }

    let infile = cli.infile.unwrap_or_else(|| {
        eprintln!("Error: --in is required (or use --reset).");
        std::process::exit(2);
    });

    let config = GeocodeConfig {
        delay: Duration::from_secs_f64(cli.sleep.max(0.0)),
        timeout: Duration::from_secs(cli.timeout),
        ..GeocodeConfig::from_env()
    };

    let records = ResultStore::load_records(&infile);
    let ctx = PlaceContext::new(&cli.city, &cli.district, &cli.country);

    let mut resolver = GeocodeResolver::new(&config, store);
    resolver.resolve(records, &ctx);

    // An exhausted pipeline is a normal outcome, not an error.
    let summary = resolver.summary();
    println!("Resolved : {}", summary.resolved);
    println!("Remaining: {}", summary.remaining);
    println!(
        "Outputs  : {}, {}",
        cli.out_resolved.display(),
        cli.out_remaining.display()
    );
}
