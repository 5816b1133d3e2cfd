use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use color_eyre::Result;
use color_eyre::eyre::eyre;
use procsnap::config::{self, load_config, load_config_from_path};
use procsnap::report;
use procsnap::system::collector::Collector;
use procsnap::system::snapshot::SystemSnapshot;
use tokio::time::{Instant, Interval, interval_at};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(
    name = "procsnap",
    about = "Point-in-time system telemetry from /proc"
)]
struct Cli {
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Refresh rate in milliseconds
    #[arg(long)]
    refresh_rate: Option<u64>,

    /// Number of snapshots to print; 0 keeps polling until Ctrl-C
    #[arg(long, default_value_t = 1)]
    count: u64,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Print the open descriptors and locks of one process and exit
    #[arg(long, value_name = "PID")]
    inspect: Option<u32>,

    /// Capacity helper program
    #[arg(long)]
    helper: Option<PathBuf>,

    /// Worker threads for per-process reads
    #[arg(long)]
    workers: Option<usize>,

    /// Root of the process information filesystem
    #[arg(long)]
    proc_root: Option<PathBuf>,

    /// Column width of the text process table
    #[arg(long, default_value_t = 120)]
    width: usize,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, default_value_t = false)]
    log_json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(&cli)?;
    let config = load_config_for_cli(&cli);
    let collector = Arc::new(Collector::from_config(&config));

    if let Some(pid) = cli.inspect {
        let set = collector.inspect(pid);
        match cli.format {
            OutputFormat::Text => print!("{}", report::render_resources(&set)),
            OutputFormat::Json => println!("{}", serde_json::to_string(&set)?),
        }
        return Ok(());
    }

    run(collector, &config, &cli).await
}

async fn run(collector: Arc<Collector>, config: &config::Config, cli: &Cli) -> Result<()> {
    let tick_rate = Duration::from_millis(config.general.refresh_rate_ms.max(1));
    let mut ticker = report_ticker(tick_rate);
    let mut emitted = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let worker = Arc::clone(&collector);
                let snapshot = tokio::task::spawn_blocking(move || worker.refresh()).await?;
                emit(&snapshot, cli)?;
                emitted += 1;
                if cli.count != 0 && emitted >= cli.count {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}

/// Ticks one full period after creation, so the first report's CPU figure
/// covers a real interval after the baseline primed in `Collector::new`.
fn report_ticker(period: Duration) -> Interval {
    interval_at(Instant::now() + period, period)
}

fn emit(snapshot: &SystemSnapshot, cli: &Cli) -> Result<()> {
    match cli.format {
        OutputFormat::Text => println!("{}", report::render_snapshot(snapshot, cli.width)),
        OutputFormat::Json => println!("{}", serde_json::to_string(snapshot)?),
    }
    Ok(())
}

fn init_logging(cli: &Cli) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .map_err(|e| eyre!("invalid log filter {:?}: {e}", cli.log_level))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = if cli.log_json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| eyre!("failed to set tracing subscriber: {e}"))
}

fn load_config_for_cli(cli: &Cli) -> config::Config {
    let mut config = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };

    if let Some(rate) = cli.refresh_rate {
        config.general.refresh_rate_ms = rate;
    }
    if let Some(ref helper) = cli.helper {
        config.mounts.helper_path = helper.clone();
    }
    if let Some(workers) = cli.workers {
        config.collector.worker_threads = workers;
    }
    if let Some(ref root) = cli.proc_root {
        config.collector.proc_root = root.clone();
    }
    config.mounts.helper_path = resolve_helper(&config.mounts.helper_path);

    config
}

/// A bare helper name prefers the binary installed next to this one, then
/// falls back to `PATH` lookup.
fn resolve_helper(helper: &Path) -> PathBuf {
    if helper.components().count() != 1 {
        return helper.to_path_buf();
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(helper)))
        .filter(|candidate| candidate.exists())
        .unwrap_or_else(|| helper.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_report_waits_a_full_period() {
        let period = Duration::from_millis(50);
        let started = Instant::now();
        let mut ticker = report_ticker(period);
        ticker.tick().await;
        assert!(started.elapsed() >= period);
    }

    #[test]
    fn path_helper_is_kept_verbatim() {
        let explicit = Path::new("/usr/local/bin/procsnap-df");
        assert_eq!(resolve_helper(explicit), explicit);
    }
}
