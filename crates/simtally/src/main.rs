use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use simtally::commands::{self, parse_fixed};
use simtally::{Settings, StorageFormat, init_logging};
use simtally_core::{FixedParams, ParamValue};

#[derive(Parser, Debug)]
#[command(name = "simtally")]
#[command(about = "Inspect, merge and combine Monte Carlo simulation results")]
#[command(version)]
struct Args {
    /// Settings file (default: <config dir>/simtally/settings.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the grid and every metric series of a results file
    Inspect {
        input: PathBuf,

        /// Input format (default: from the file extension)
        #[arg(short, long)]
        format: Option<StorageFormat>,
    },

    /// Print the values of one metric with confidence intervals
    Values {
        input: PathBuf,

        /// Metric name
        metric: String,

        /// Restrict to grid points with these parameter values (name=value)
        #[arg(short = 'p', long = "param", value_parser = parse_fixed)]
        fixed: Vec<(String, ParamValue)>,

        /// Confidence level in percent
        #[arg(long)]
        confidence: Option<f64>,

        /// Input format (default: from the file extension)
        #[arg(short, long)]
        format: Option<StorageFormat>,
    },

    /// Merge partial results computed for the same grid
    Merge {
        /// Output file name; `{param}` placeholders are expanded
        #[arg(short, long)]
        output: PathBuf,

        #[arg(short, long)]
        format: Option<StorageFormat>,

        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Combine two result files computed over different parameter values
    Combine {
        first: PathBuf,
        second: PathBuf,

        /// Output file name; `{param}` placeholders are expanded
        #[arg(short, long)]
        output: PathBuf,

        #[arg(short, long)]
        format: Option<StorageFormat>,
    },

    /// Re-encode a results file
    Convert {
        input: PathBuf,
        output: PathBuf,

        #[arg(short, long)]
        format: Option<StorageFormat>,
    },
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref())?;

    let log_level = args.log_level.as_deref().unwrap_or(&settings.log_level);
    let log_file = args.log_file.as_ref().or(settings.log_file.as_ref());
    init_logging(log_level, log_file.map(PathBuf::as_path))?;

    let mut out = io::stdout().lock();
    match args.command {
        Command::Inspect { input, format } => commands::inspect(&mut out, &input, format)?,
        Command::Values {
            input,
            metric,
            fixed,
            confidence,
            format,
        } => {
            let fixed: FixedParams = fixed.into_iter().collect();
            let confidence = confidence.unwrap_or(settings.confidence);
            commands::values(&mut out, &input, &metric, &fixed, confidence, format)?
        }
        Command::Merge {
            output,
            format,
            inputs,
        } => commands::merge(&mut out, &inputs, &output, format.or(settings.format))?,
        Command::Combine {
            first,
            second,
            output,
            format,
        } => commands::combine(&mut out, &first, &second, &output, format.or(settings.format))?,
        Command::Convert {
            input,
            output,
            format,
        } => commands::convert(&mut out, &input, &output, format.or(settings.format))?,
    }

    tracing::debug!("done");
    Ok(())
}
