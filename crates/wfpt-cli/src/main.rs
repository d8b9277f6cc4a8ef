//! wfpt CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;
use wfpt_prob::{Method, MethodConfig, TrialData};

#[derive(Parser)]
#[command(name = "wfpt")]
#[command(about = "wfpt - Wiener first-passage time densities")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate densities for a batch of trials
    Density {
        /// Input JSON: `{"trials": {...}, "method": {...}}`
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for results (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Small-time term-count bound (Gondan, Navarro)
        #[arg(long)]
        n_terms_small: Option<String>,

        /// Small-time summation kernel (eps_2017, eps_2014, 2017, 2014)
        #[arg(long)]
        summation_small: Option<String>,

        /// Series selection (small, large, both, combined, sv)
        #[arg(long)]
        scale: Option<String>,

        /// Return log-densities.
        #[arg(long)]
        log: bool,

        /// Cap on the large-time term count.
        #[arg(long)]
        max_terms_large: Option<usize>,

        /// Standardized crossover time for `--scale combined`.
        #[arg(long)]
        crossover: Option<f64>,

        /// Series selection for `--scale sv` (small, large, both, combined)
        #[arg(long)]
        sv_series: Option<String>,

        /// Threads (0 = auto).
        #[arg(long, default_value = "0")]
        threads: usize,
    },

    /// Print version information
    Version,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DensityInput {
    trials: TrialData,
    #[serde(default)]
    method: MethodConfig,
}

struct Overrides {
    n_terms_small: Option<String>,
    summation_small: Option<String>,
    scale: Option<String>,
    log: bool,
    max_terms_large: Option<usize>,
    crossover: Option<f64>,
    sv_series: Option<String>,
}

impl Overrides {
    fn apply(self, mut config: MethodConfig) -> Result<MethodConfig> {
        if let Some(s) = self.n_terms_small {
            config.n_terms_small = s.parse()?;
        }
        if let Some(s) = self.summation_small {
            config.summation_small = s.parse()?;
        }
        if let Some(s) = self.scale {
            config.scale = s.parse()?;
        }
        if self.log {
            config.log_prob = true;
        }
        if let Some(n) = self.max_terms_large {
            config.max_terms_large = n;
        }
        if let Some(x) = self.crossover {
            config.crossover = x;
        }
        if let Some(s) = self.sv_series {
            config.sv_series = s.parse()?;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Density {
            input,
            output,
            n_terms_small,
            summation_small,
            scale,
            log,
            max_terms_large,
            crossover,
            sv_series,
            threads,
        } => {
            let overrides = Overrides {
                n_terms_small,
                summation_small,
                scale,
                log,
                max_terms_large,
                crossover,
                sv_series,
            };
            cmd_density(&input, output.as_ref(), overrides, threads)
        }
        Commands::Version => {
            println!("wfpt {}", wfpt_core::VERSION);
            Ok(())
        }
    }
}

fn cmd_density(
    input: &PathBuf,
    output: Option<&PathBuf>,
    overrides: Overrides,
    threads: usize,
) -> Result<()> {
    if threads > 0 {
        // Best-effort; if a global pool already exists, keep going.
        let _ = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global();
    }

    tracing::info!(path = %input.display(), "loading trials");
    let json = std::fs::read_to_string(input)?;
    let parsed: DensityInput = serde_json::from_str(&json)?;

    let config = overrides.apply(parsed.method)?;
    let method = Method::from_config(&config)?;
    tracing::info!(
        n_terms_small = %config.n_terms_small,
        summation_small = %config.summation_small,
        scale = %config.scale,
        sv_series = %config.sv_series,
        log_prob = config.log_prob,
        "method resolved"
    );

    let density = wfpt_prob::evaluate(&parsed.trials, &method)?;
    tracing::info!(trials = density.len(), "densities evaluated");

    // Non-finite values (the -inf log sentinel) serialize as null.
    let output_json = serde_json::json!({
        "method": config,
        "n_trials": density.len(),
        "density": density,
    });

    write_json(output, output_json)
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
