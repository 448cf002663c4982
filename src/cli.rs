use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::dataset::{Dataset, DEFAULT_AVERAGES};
use crate::executor::{instrument, Args, InstrumentedKernel, Val};
use crate::parser::parse_kernel;
use crate::parser::semantic_validator::check_kernel;
use crate::scheduler::{vectorize_instrumented, LockstepOptions, LockstepReport};

#[derive(Parser)]
#[command(name = "lockstep")]
#[command(about = "Lockstep - measure SIMD divergence of scalar kernels", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a kernel and print its numbered statements
    Check {
        /// Kernel source file
        file: PathBuf,
    },

    /// Run a kernel in lockstep and report the divergence cost
    Run {
        /// Kernel source file
        file: PathBuf,

        /// Number of lanes (default: from config, or one per dataset list)
        #[arg(short = 'n', long)]
        lanes: Option<usize>,

        /// Positional arguments (JSON array)
        #[arg(long, default_value = "[]")]
        args: String,

        /// Keyword arguments (JSON object)
        #[arg(long, default_value = "{}")]
        kwargs: String,

        /// Dataset directory (default: data_dir from config)
        #[arg(long)]
        dataset: Option<PathBuf>,

        /// Bind the dataset with this average list size as offsets/content/parents
        #[arg(long)]
        average: Option<f64>,

        /// Abort after this many lane resumes
        #[arg(long)]
        max_resumes: Option<u64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate jagged datasets
    GenData {
        /// Output directory (default: data_dir from config)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Content values per dataset (default: task_size from config)
        #[arg(long)]
        task_size: Option<usize>,

        /// Average list sizes (comma-separated)
        #[arg(long, value_delimiter = ',')]
        averages: Vec<f64>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Run a kernel over every dataset and compare divergence costs
    Sweep {
        /// Kernel source file
        file: PathBuf,

        /// Dataset directory (default: data_dir from config)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Average list sizes (comma-separated)
        #[arg(long, value_delimiter = ',')]
        averages: Vec<f64>,
    },

    /// Print the effective configuration
    Config,
}

/// Run the CLI by parsing process arguments
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli)
}

/// Run the CLI with explicit arguments
pub fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli)
}

fn run_cli_with_args(cli: Cli) -> Result<()> {
    // Load configuration before any command so errors show up first
    let config = Config::builder()
        .config_path(cli.config.clone())
        .build()
        .context("Failed to load configuration")?;
    init_tracing(&config.log_level);

    match cli.command {
        Commands::Check { file } => check(&file),

        Commands::Run {
            file,
            lanes,
            args,
            kwargs,
            dataset,
            average,
            max_resumes,
            json,
        } => {
            let kernel = load_kernel(&file)?;
            let mut call_args = parse_args(&args, &kwargs)?;

            let lanes = match average {
                Some(average) => {
                    let dir = dataset.unwrap_or_else(|| config.data_dir.clone());
                    let data = Dataset::read(&dir, average)
                        .with_context(|| format!("Failed to read dataset from {}", dir.display()))?;
                    call_args.keyword.extend(data.to_args().keyword);
                    lanes.unwrap_or_else(|| data.num_lists())
                }
                None => lanes.unwrap_or(config.lanes),
            };

            let options = LockstepOptions {
                max_resumes: max_resumes.or(config.max_resumes),
            };
            let report = run_kernel(&kernel, lanes, &call_args, &options)
                .with_context(|| format!("Failed to run kernel '{}'", kernel.name()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(kernel.name(), &report);
            }
            Ok(())
        }

        Commands::GenData {
            dir,
            task_size,
            averages,
            seed,
        } => {
            let dir = dir.unwrap_or_else(|| config.data_dir.clone());
            let task_size = task_size.unwrap_or(config.task_size);
            let seed = seed.unwrap_or_else(rand::random);
            info!(seed, task_size, "Generating datasets");

            let mut rng = StdRng::seed_from_u64(seed);
            for average in averages_or_default(averages) {
                let data = Dataset::generate(average, task_size, &mut rng)?;
                data.write(&dir)?;
                println!("{:>8} | {:>10} lists | {:>10} values", average, data.num_lists(), data.content.len());
            }
            Ok(())
        }

        Commands::Sweep { file, dir, averages } => {
            let kernel = load_kernel(&file)?;
            let dir = dir.unwrap_or_else(|| config.data_dir.clone());
            let options = LockstepOptions {
                max_resumes: config.max_resumes,
            };

            println!(
                "{:>8} | {:>10} | {:>12} | {:>10} | {:>11}",
                "average", "lanes", "iterations", "waves", "utilization"
            );
            for average in averages_or_default(averages) {
                let data = Dataset::read(&dir, average)
                    .with_context(|| format!("Failed to read dataset from {}", dir.display()))?;
                let report = run_kernel(&kernel, data.num_lists(), &data.to_args(), &options)
                    .with_context(|| format!("Failed to run kernel on average size {}", average))?;
                println!(
                    "{:>8} | {:>10} | {:>12} | {:>10} | {:>11.3}",
                    average,
                    report.lanes,
                    report.iterations,
                    report.waves,
                    report.utilization()
                );
            }
            Ok(())
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

/// Install the subscriber; `RUST_LOG` wins over the configured level
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // A subscriber may already be installed by an embedding program
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn check(file: &Path) -> Result<()> {
    let source = read_source(file)?;
    let kernel = parse_kernel(&source).with_context(|| format!("Failed to parse {}", file.display()))?;

    let violations = check_kernel(&kernel);
    if !violations.is_empty() {
        for violation in &violations {
            eprintln!("{}: {}", file.display(), violation);
        }
        bail!("{} structural violation(s) in kernel '{}'", violations.len(), kernel.name);
    }

    let instrumented = instrument(&kernel)?;
    println!(
        "Kernel '{}' ({} statements, lane + {} parameter(s))\n",
        instrumented.name(),
        instrumented.num_steps(),
        instrumented.params().len()
    );
    for (step, text) in instrumented.step_text().iter().enumerate() {
        let first_line = text.lines().next().unwrap_or_default();
        println!("  {:>4}  {}", step, first_line);
    }
    Ok(())
}

fn read_source(file: &Path) -> Result<String> {
    fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))
}

fn load_kernel(file: &Path) -> Result<InstrumentedKernel> {
    let source = read_source(file)?;
    let kernel = parse_kernel(&source).with_context(|| format!("Failed to parse {}", file.display()))?;
    instrument(&kernel).with_context(|| format!("Kernel in {} cannot be instrumented", file.display()))
}

/// Lockstep run with the lane error flattened into an `anyhow::Error`
///
/// Lane errors carry `Rc`-backed values and are not `Send`.
fn run_kernel(kernel: &InstrumentedKernel, lanes: usize, args: &Args, options: &LockstepOptions) -> Result<LockstepReport> {
    vectorize_instrumented(kernel, lanes, args, options).map_err(|err| anyhow!("{}", err))
}

/// Parse `--args` and `--kwargs`
fn parse_args(args: &str, kwargs: &str) -> Result<Args> {
    let positional = match serde_json::from_str::<serde_json::Value>(args).context("--args is not valid JSON")? {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(Val::try_from)
            .collect::<Result<Vec<_>, _>>()?,
        _ => return Err(anyhow!("--args must be a JSON array")),
    };

    let keyword = match serde_json::from_str::<serde_json::Value>(kwargs).context("--kwargs is not valid JSON")? {
        serde_json::Value::Object(entries) => entries
            .into_iter()
            .map(|(name, value)| Val::try_from(value).map(|value| (name, value)))
            .collect::<Result<BTreeMap<_, _>, _>>()?,
        _ => return Err(anyhow!("--kwargs must be a JSON object")),
    };

    Ok(Args { positional, keyword })
}

fn averages_or_default(averages: Vec<f64>) -> Vec<f64> {
    if averages.is_empty() {
        DEFAULT_AVERAGES.to_vec()
    } else {
        averages
    }
}

fn print_report(name: &str, report: &LockstepReport) {
    println!("Kernel: {}", name);
    println!("Lanes: {}", report.lanes);
    println!("Statements: {}", report.num_steps);
    println!("Iterations: {}", report.iterations);
    println!(
        "Waves: {} ({} catch-up, {} divergent)",
        report.waves, report.catch_up_passes, report.divergent_waves
    );
    println!("Utilization: {:.3}", report.utilization());
}
