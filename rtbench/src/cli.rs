use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 10s, 250ms, 1m)".to_string());
    }

    let number_end = s
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit())
        .map_or(s.len(), |(idx, _)| idx);

    if number_end == 0 {
        return Err(format!(
            "invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"
        ));
    }

    let (number_str, unit_str) = s.split_at(number_end);
    let value: u64 = number_str
        .parse()
        .map_err(|_| format!("invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"))?;

    match unit_str.trim() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => Ok(Duration::from_secs(value)),
        "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => {
            Ok(Duration::from_millis(value))
        }
        "m" | "min" | "mins" | "minute" | "minutes" => {
            let secs = value
                .checked_mul(60)
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        "h" | "hr" | "hrs" | "hour" | "hours" => {
            let secs = value
                .checked_mul(60 * 60)
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        _ => Err(format!(
            "invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"
        )),
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Progress bars on stderr and a comparison table on stdout.
    HumanReadable,
    /// Emit JSON progress and summary lines (NDJSON) to stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "rtbench",
    author,
    version,
    about = "Compare PHP runtimes under the same synthetic HTTP load",
    long_about = "rtbench drives weighted, staged HTTP workloads against several named targets (e.g. Swoole, PHP-FPM and FrankenPHP serving the same application) and reports latency, error rate and throughput per target, category and endpoint.\n\nEverything is described by a YAML config; `rtbench init` writes a starter one.\n\nLogging goes to stderr and is controlled by RTBENCH_LOG (or RUST_LOG), e.g. RTBENCH_LOG=debug.",
    after_help = "Examples:\n  rtbench init bench\n  rtbench check bench/rtbench.yaml\n  rtbench run bench/rtbench.yaml\n  rtbench run bench/rtbench.yaml --vus 20 --duration 30s\n  rtbench run bench/rtbench.yaml --scenario heavy_load --output json --report-out report.json"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a benchmark described by a config file
    #[command(
        long_about = "Run every scenario of the config (or the ones selected with --scenario) one after another.\n\nCLI flags --vus/--duration/--iterations turn each scenario into a constant-VU scenario."
    )]
    Run(RunArgs),

    /// Write a starter config for the three PHP runtimes
    Init(InitArgs),

    /// Validate a config and probe every target without generating load
    Check(CheckArgs),
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Target directory to initialize (created if missing)
    #[arg(default_value = ".")]
    pub dir: PathBuf,

    /// Overwrite existing files
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Path to the config (.yaml)
    pub config: PathBuf,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Path to the config (.yaml)
    pub config: PathBuf,

    /// Only run the named scenario (repeatable)
    #[arg(long = "scenario", value_name = "NAME")]
    pub scenarios: Vec<String>,

    /// Override iterations (shared budget across VUs)
    #[arg(long)]
    pub iterations: Option<u64>,

    /// Number of virtual users
    #[arg(long)]
    pub vus: Option<u64>,

    /// Test duration (e.g. 10s, 250ms, 1m)
    #[arg(long, value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Base seed for target/workload selection (overrides the config)
    #[arg(long, env = "RTBENCH_SEED")]
    pub seed: Option<u64>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,

    /// Write the comparison report as JSON to this file
    #[arg(long, value_name = "FILE")]
    pub report_out: Option<PathBuf>,
}
