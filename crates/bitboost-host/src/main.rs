//! CLI entry point for training and predicting with the BitBoost engine.

use anyhow::{Context, Result, anyhow, bail};
use bitboost_host::engine::locate;
use bitboost_host::{Booster, BoosterConfig, ConfigSchema, NumericType, Runtime, SearchOptions};
use clap::{Parser, Subcommand};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(
    author = "Laurens Devos",
    version,
    about = "Train and predict with the native BitBoost engine",
    long_about = "Command-line front end for the BitBoost gradient boosting engine.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  BITBOOST_LIB           Path to the engine's shared library\n  \
                  BITBOOST_CONFIG_CSV    Path to the generated parameter schema\n  \
                  RUST_LOG               Overrides --log-level\n\n\
                  EXAMPLES:\n  \
                  # List the settable parameters\n  \
                  bitboost params\n\n  \
                  # Train on one file, predict another\n  \
                  bitboost train -i train.csv -t label --test test.csv -o predictions.csv\n\n  \
                  # Override parameters\n  \
                  bitboost train -i train.csv -t label --set max_depth=4 --set niterations=50"
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Additional directory to search for the engine and its schema
    ///
    /// Searched before the default locations. May be repeated.
    #[arg(long = "lib-dir", global = true)]
    lib_dirs: Vec<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the settable parameters and their defaults
    Params {
        /// Output the schema as JSON instead of the human-readable listing
        #[arg(long)]
        json: bool,
    },

    /// Train a booster on a CSV file and predict
    Train(TrainArgs),
}

#[derive(clap::Args, Debug)]
struct TrainArgs {
    /// Path to the training CSV file
    #[arg(short, long)]
    input: PathBuf,

    /// Target column in the training file
    #[arg(short, long)]
    target: String,

    /// CSV file to predict on
    ///
    /// If not specified, predictions are made for the training file
    #[arg(long)]
    test: Option<PathBuf>,

    /// Comma-separated feature columns to treat as categorical
    #[arg(long, value_delimiter = ',')]
    categorical: Vec<String>,

    /// Parameter assignment NAME=VALUE. May be repeated.
    #[arg(long = "set", value_name = "NAME=VALUE")]
    assignments: Vec<String>,

    /// JSON file holding an object of parameter assignments
    ///
    /// Applied before any --set assignment
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write predictions to this CSV file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Initialize the tracing subscriber for logging.
///
/// When `machine_output` is true, logging is completely disabled so that
/// stdout only carries the requested data.
fn init_logging(level: &str, quiet: bool, machine_output: bool) {
    if machine_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    let machine_output = matches!(args.command, Command::Params { json: true });
    init_logging(&args.log_level, args.quiet, machine_output);

    let mut options = SearchOptions::default();
    for dir in &args.lib_dirs {
        options = options.search_dir(dir);
    }

    match &args.command {
        Command::Params { json } => run_params(&options, *json),
        Command::Train(train) => run_train(&options, train),
    }
}

/// Print the parameter schema.
///
/// Only the schema is needed, so this works without a loadable engine.
fn run_params(options: &SearchOptions, json: bool) -> Result<()> {
    let path = locate::locate_schema(options)?;
    let schema = ConfigSchema::from_path(&path)
        .with_context(|| format!("Failed to read parameter schema {}", path.display()))?;

    if json {
        let params: Vec<_> = schema.iter().collect();
        println!("{}", serde_json::to_string_pretty(&params)?);
    } else {
        print!("{}", schema.describe());
    }
    Ok(())
}

fn run_train(options: &SearchOptions, args: &TrainArgs) -> Result<()> {
    // 1. Engine and schema
    let runtime = Runtime::load(options).context("Failed to initialize the BitBoost runtime")?;
    let numeric = runtime.numeric_type();

    // 2. Configuration, validated before any data is read
    let config = build_config(runtime.schema(), args)?;
    debug!("Configuration: {} explicit assignments", config.len());

    // 3. Training data
    info!("Loading training data from: {}", args.input.display());
    let train_df = read_csv(&args.input)?;
    info!("Training data loaded: {:?}", train_df.shape());

    let feature_names: Vec<PlSmallStr> = train_df
        .get_column_names()
        .into_iter()
        .filter(|name| name.as_str() != args.target)
        .cloned()
        .collect();
    if feature_names.len() == train_df.width() {
        bail!("Target column '{}' not found in {}", args.target, args.input.display());
    }

    let categorical = categorical_indices(&feature_names, &args.categorical)?;
    let features = feature_frame(&train_df, &feature_names, numeric)?;
    let target = train_df
        .column(&args.target)?
        .as_materialized_series()
        .cast(&numeric.dtype())
        .with_context(|| format!("Target column '{}' is not numeric", args.target))?;

    let test_features = args
        .test
        .as_deref()
        .map(|path| read_test_features(path, &feature_names, numeric))
        .transpose()?;

    // 4. Train, then predict on the test set or the training set
    let predictions = Booster::scoped(&runtime, feature_names.len(), |booster| {
        booster.load_dataset(&features, &categorical)?;
        booster.load_target(&target)?;
        booster.apply_config(&config)?;

        info!("Training on {} examples", features.height());
        booster.train()?;

        if let Some(ref test) = test_features {
            booster.load_dataset(test, &categorical)?;
        }
        booster.predict()
    })?;
    info!("Predicted {} values", predictions.len());

    // 5. Output
    let mut output = DataFrame::new(vec![predictions.into_column()])?;
    match args.output {
        Some(ref path) => {
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            CsvWriter::new(&mut file).finish(&mut output)?;
            info!("Predictions written to: {}", path.display());
        }
        None => {
            CsvWriter::new(&mut std::io::stdout().lock()).finish(&mut output)?;
        }
    }
    Ok(())
}

/// Combine the `--config` file and `--set` assignments, in that order.
fn build_config(schema: &ConfigSchema, args: &TrainArgs) -> Result<BoosterConfig> {
    let mut builder = BoosterConfig::builder(schema);

    if let Some(ref path) = args.config {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let json: serde_json::Value = serde_json::from_str(&text)
            .with_context(|| format!("Config file {} is not valid JSON", path.display()))?;
        let from_file = BoosterConfig::from_json(schema, &json)?;
        for (name, value) in from_file.assignments() {
            builder = builder.set(name, value);
        }
    }

    for assignment in &args.assignments {
        let (name, value) = assignment
            .split_once('=')
            .ok_or_else(|| anyhow!("Expected NAME=VALUE, got '{}'", assignment))?;
        builder = builder.set(name.trim(), value.trim());
    }

    Ok(builder.build()?)
}

/// Map categorical column names to feature positions.
fn categorical_indices(feature_names: &[PlSmallStr], names: &[String]) -> Result<HashSet<usize>> {
    names
        .iter()
        .map(|name| {
            feature_names
                .iter()
                .position(|f| f.as_str() == name)
                .ok_or_else(|| anyhow!("Categorical column '{}' is not a feature column", name))
        })
        .collect()
}

/// Select `names` from `df` and cast every column to the exchange dtype.
fn feature_frame(df: &DataFrame, names: &[PlSmallStr], numeric: NumericType) -> Result<DataFrame> {
    let dtype = numeric.dtype();
    let columns = names
        .iter()
        .map(|name| {
            let column = df
                .column(name)
                .with_context(|| format!("Missing feature column '{}'", name))?;
            column
                .cast(&dtype)
                .with_context(|| format!("Feature column '{}' is not numeric", name))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(DataFrame::new(columns)?)
}

fn read_test_features(
    path: &Path,
    feature_names: &[PlSmallStr],
    numeric: NumericType,
) -> Result<DataFrame> {
    info!("Loading test data from: {}", path.display());
    let test_df = read_csv(path)?;
    feature_frame(&test_df, feature_names, numeric)
}

fn read_csv(path: &Path) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
        .with_context(|| format!("Failed to read {}", path.display()))
}
