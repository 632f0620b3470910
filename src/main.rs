use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use intraday::credentials::ApiKey;
use intraday::data::provider::{polygon::DEFAULT_BASE_URL, PolygonProvider};
use intraday::downloader::Downloader;
use intraday::limiter::Strategy;
use intraday::Options;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{fmt::writer::MakeWriterExt, EnvFilter};

/// Download 1-minute intraday bars from Polygon.io, one CSV file per trading day.
///
/// Days that already have a file in the output directory are skipped, so an interrupted
/// download can simply be started again.
#[derive(Debug, Parser)]
#[command(name = "intraday", version, about)]
struct Args {
    /// Instrument symbol, e.g. "SPY" or "I:SPX"
    #[arg(long)]
    ticker: String,
    /// First trading day (YYYY-MM-DD)
    #[arg(long)]
    start: NaiveDate,
    /// Last trading day (YYYY-MM-DD)
    #[arg(long)]
    end: NaiveDate,
    /// Output directory, created if missing
    #[arg(long, default_value = ".")]
    out: PathBuf,
    /// File holding the Polygon API key
    #[arg(long, env = "POLYGON_API_KEY_FILE", default_value = "api_key.txt")]
    api_key_file: PathBuf,
    #[arg(long, env = "POLYGON_BASE_URL", default_value = DEFAULT_BASE_URL, hide = true)]
    base_url: String,
    /// How requests are paced
    #[arg(long, value_enum, default_value_t = Strategy::Fixed)]
    rate_limit: Strategy,
    /// Requests allowed per minute (the free plan allows 5)
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..))]
    requests_per_minute: u32,
    /// Remember days that returned no data and skip them on later runs
    #[arg(long)]
    remember_empty: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .with_target(false)
        .with_level(false)
        .with_writer(std::io::stderr.with_max_level(Level::WARN).or_else(std::io::stdout))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv::dotenv();
    init_tracing();
    let args = Args::parse();

    let api_key = ApiKey::from_file(&args.api_key_file)?;
    let provider = PolygonProvider::new(api_key)?.base_url(&args.base_url);

    let options = Options::new(args.ticker, args.start, args.end)
        .set_outdir(args.out)
        .set_rate_limit(args.rate_limit, args.requests_per_minute)
        .set_remember_empty(args.remember_empty);
    let limiter = options.rate_limit.limiter(options.requests_per_minute);

    Downloader::new(provider, limiter).run(&options).await?;
    Ok(())
}
