//! DeepWater CLI
//!
//! Trains the image classifiers on the convergence datasets and prints
//! network descriptions.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use burn::{data::dataset::Dataset, module::Module, record::CompactRecorder};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use deepwater::backend::{
    backend_name, default_device, seed_backend, DefaultBackend, TrainingBackend,
};
use deepwater::dataset::DatasetKind;
use deepwater::model::{ImageClassifier, InputShape, Network, NetworkPreset};
use deepwater::training::{
    load_dataset, train_model, write_summary, ConvergenceConfig, OptimizerKind,
};
use deepwater::utils::format_duration;
use deepwater::utils::load_toml_config;
use deepwater::utils::logging::{init_logging, LogConfig, LogLevel};
use deepwater::{DeepWaterError, MAX_CONVERGED_ERROR};

/// Image classifiers and convergence checks on Burn
#[derive(Parser, Debug)]
#[command(name = "deepwater")]
#[command(version)]
#[command(about = "Train and inspect image classifiers built with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, default_value = "false")]
    quiet: bool,

    /// Log level (trace, debug, info, warn, error); overrides --verbose and --quiet
    #[arg(long)]
    log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train a network preset on one of the datasets
    Train {
        /// Network preset (lenet, inception_v3, mlp)
        #[arg(short, long)]
        model: String,

        /// Dataset (mnist, cifar10, cat-dog-mouse)
        #[arg(short, long)]
        dataset: String,

        /// Optimizer (momentum, sgd, adam)
        #[arg(long, default_value = "momentum")]
        optimizer: String,

        /// TOML run file; flags given on the command line override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of training epochs
        #[arg(short, long)]
        epochs: Option<usize>,

        /// Batch size for training
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Learning rate
        #[arg(short, long)]
        learning_rate: Option<f64>,

        /// Image side for the cat/dog/mouse set
        #[arg(long)]
        dim: Option<usize>,

        /// Train on at most this many samples
        #[arg(long)]
        max_samples: Option<usize>,

        /// Log every epoch and write a JSON summary
        #[arg(long, default_value = "false")]
        summaries: bool,

        /// Dataset root
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Output directory for parameters and the network description
        #[arg(short, long, default_value = "output")]
        output_dir: PathBuf,

        /// Random seed for reproducibility
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print a network description as JSON
    Describe {
        /// Network preset
        #[arg(short, long)]
        model: String,

        /// Number of classes
        #[arg(long, default_value = "10")]
        classes: usize,

        /// Input width (defaults to the preset's minimum, at least 28)
        #[arg(long)]
        width: Option<usize>,

        /// Input height (defaults to the width)
        #[arg(long)]
        height: Option<usize>,

        /// Input channels
        #[arg(long, default_value = "1")]
        channels: usize,
    },

    /// List a network's layer scopes
    Layers {
        /// Network preset
        #[arg(short, long)]
        model: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = if cli.verbose {
        LogConfig::verbose()
    } else if cli.quiet {
        LogConfig::quiet()
    } else {
        LogConfig::default()
    };
    if let Some(level) = &cli.log_level {
        log_config.level = LogLevel::parse(level);
    }

    let _ = init_logging(&log_config);

    match cli.command {
        Commands::Train {
            model,
            dataset,
            optimizer,
            config,
            epochs,
            batch_size,
            learning_rate,
            dim,
            max_samples,
            summaries,
            data_dir,
            output_dir,
            seed,
        } => {
            let mut run = match config {
                Some(path) => load_toml_config::<ConvergenceConfig>(&path)?,
                None => ConvergenceConfig::default(),
            };
            if let Some(epochs) = epochs {
                run.epochs = epochs;
            }
            if let Some(batch_size) = batch_size {
                run.batch_size = batch_size;
            }
            if let Some(learning_rate) = learning_rate {
                run.initial_learning_rate = learning_rate;
            }
            if let Some(dim) = dim {
                run.dim = dim;
            }
            if let Some(max_samples) = max_samples {
                run.max_samples = Some(max_samples);
            }
            if let Some(data_dir) = data_dir {
                run.data_dir = data_dir;
            }
            if let Some(seed) = seed {
                run.seed = seed;
            }
            run.summaries |= summaries;

            cmd_train(
                model.parse()?,
                dataset.parse()?,
                optimizer.parse()?,
                &run,
                &output_dir,
            )?;
        }

        Commands::Describe {
            model,
            classes,
            width,
            height,
            channels,
        } => {
            let preset: NetworkPreset = model.parse()?;
            let width = width.unwrap_or_else(|| preset.min_side().max(28));
            let shape = InputShape::new(width, height.unwrap_or(width), channels);
            cmd_describe(preset, shape, classes)?;
        }

        Commands::Layers { model } => {
            let preset: NetworkPreset = model.parse()?;
            let shape = InputShape::square(preset.min_side().max(28), 1);
            let network = Network::<DefaultBackend>::build(preset, shape, 2, &default_device())?;
            for layer in network.layers() {
                println!("{layer}");
            }
        }
    }

    Ok(())
}

fn cmd_train(
    preset: NetworkPreset,
    kind: DatasetKind,
    optimizer: OptimizerKind,
    config: &ConvergenceConfig,
    output_dir: &Path,
) -> Result<()> {
    println!(
        "{} {} on {} with {} ({})",
        "Training".green().bold(),
        preset.to_string().cyan(),
        kind.to_string().cyan(),
        optimizer,
        backend_name()
    );

    config.validate()?;
    let dataset = load_dataset(kind, config, preset.min_side())?;
    println!(
        "  {} samples, {} classes, input {}",
        dataset.len(),
        dataset.num_classes(),
        dataset.shape()
    );

    let device = default_device();
    seed_backend::<TrainingBackend>(&device, config.seed);
    let network =
        Network::<TrainingBackend>::build(preset, dataset.shape(), dataset.num_classes(), &device)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner().template("  {spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    spinner.set_message(format!("{} epochs", config.epochs));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let result = train_model::<TrainingBackend, Network<TrainingBackend>>(
        network, &dataset, optimizer, config, &device,
    );
    spinner.finish_and_clear();
    let (network, report) = result?;

    if config.summaries {
        let name = preset.to_string();
        let path = write_summary(&config.summary_dir, &name, kind, optimizer, &report)?;
        info!("Summary written to {:?}", path);
    }

    std::fs::create_dir_all(output_dir)?;
    let stem = output_dir.join(format!("{preset}_{kind}"));
    std::fs::write(stem.with_extension("json"), network.descriptor().to_json()?)?;
    network
        .save_file(stem.clone(), &CompactRecorder::new())
        .map_err(DeepWaterError::from)?;
    info!("Parameters saved under {:?}", stem);

    let error = report.final_error();
    let verdict = if error <= MAX_CONVERGED_ERROR {
        "converged".green().bold()
    } else {
        "did not converge".red().bold()
    };
    println!(
        "  final error {:.4}, loss {:.4} after {}: {}",
        error,
        report.final_loss(),
        format_duration(report.duration_secs),
        verdict
    );

    Ok(())
}

fn cmd_describe(preset: NetworkPreset, shape: InputShape, classes: usize) -> Result<()> {
    let network = Network::<DefaultBackend>::build(preset, shape, classes, &default_device())?;
    println!("{}", network.descriptor().to_json()?);
    Ok(())
}
