use clap::Parser;
use mirror_relay::config::{self, DEFAULT_TIMEOUT_SECS, RunConfig};
use mirror_relay::imaging::Encoding;
use mirror_relay::pipeline::{DEFAULT_CONCURRENCY, Pipeline, Topology};
use mirror_relay::transport::ReqwestTransport;
use mirror_relay::{listing, output};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mirror-relay")]
#[command(about = "Mirror every image in a remote listing and post the results back")]
#[command(long_about = "\
Mirror every image in a remote listing and post the results back

The base URL must answer a GET with one image name per line. Each name is
fetched from <base-url><name>, flipped left-to-right, and POSTed to
<base-url> as a binary body.

Topologies:
  fused   each image goes fetch → mirror → upload in one task (default)
  staged  every fetch and mirror finishes before the first upload

Exit status is non-zero only when the listing cannot be fetched or the
options are invalid. Per-image failures are counted in the final report.")]
#[command(version)]
struct Cli {
    /// Listing URL; image URLs are formed by appending each listed name
    #[arg(long, env = "MIRROR_RELAY_BASE_URL")]
    base_url: String,

    /// Maximum simultaneous network calls
    #[arg(long, env = "MIRROR_RELAY_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Give uploads their own permit pool of this size instead of sharing
    #[arg(long, env = "MIRROR_RELAY_UPLOAD_CONCURRENCY")]
    upload_concurrency: Option<usize>,

    #[arg(long, value_enum, env = "MIRROR_RELAY_TOPOLOGY", default_value_t = Topology::Fused)]
    topology: Topology,

    /// How mirrored images are encoded for upload
    #[arg(long, value_enum, env = "MIRROR_RELAY_ENCODING", default_value_t = Encoding::Raw)]
    encoding: Encoding,

    /// Per-request timeout in seconds
    #[arg(long, env = "MIRROR_RELAY_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Mirror worker threads (default: all CPU cores)
    #[arg(long, env = "MIRROR_RELAY_TRANSFORM_THREADS")]
    transform_threads: Option<usize>,

    /// Only process the first N listed images
    #[arg(long)]
    limit: Option<usize>,

    /// Suppress per-image progress lines
    #[arg(long, short)]
    quiet: bool,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,

    /// Debug logging for this crate (RUST_LOG overrides)
    #[arg(long, short)]
    verbose: bool,
}

impl Cli {
    fn run_config(&self) -> RunConfig {
        RunConfig {
            base_url: self.base_url.clone(),
            concurrency: self.concurrency,
            upload_concurrency: self.upload_concurrency,
            topology: self.topology,
            encoding: self.encoding,
            timeout_secs: self.timeout_secs,
            transform_threads: self.transform_threads,
            limit: self.limit,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let run_config = cli.run_config();
    run_config.validate()?;
    init_thread_pool(&run_config);
    tracing::debug!(config = %serde_json::to_string(&run_config)?, "resolved configuration");

    let transport = Arc::new(ReqwestTransport::new(run_config.timeout())?);

    let mut ids = listing::fetch_listing(transport.as_ref(), &run_config.base_url).await?;
    if let Some(limit) = run_config.limit {
        ids.truncate(limit);
    }
    if !cli.json {
        output::print_listing(ids.len());
    }

    let mut pipeline = Pipeline::new(
        transport,
        run_config.pipeline_config(),
        run_config.limits(),
    );

    let printer = if cli.quiet || cli.json {
        None
    } else {
        let (tx, rx) = std::sync::mpsc::channel();
        pipeline = pipeline.with_events(tx);
        Some(std::thread::spawn(move || {
            for event in rx {
                for line in output::format_event(&event) {
                    println!("{}", line);
                }
            }
        }))
    };

    let report = pipeline.run(ids).await;
    // Closes the event channel so the printer drains and exits.
    drop(pipeline);
    if let Some(printer) = printer {
        printer
            .join()
            .map_err(|_| "progress printer thread panicked")?;
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        output::print_report(&report);
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "mirror_relay=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool used for mirroring.
///
/// Caps at the number of available CPU cores — user can constrain down, not up.
fn init_thread_pool(run_config: &RunConfig) {
    let threads = config::effective_threads(run_config);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
