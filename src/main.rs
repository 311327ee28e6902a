//! Tomato Diagnosis CLI
//!
//! Classifies tomato leaf photos, flags images that are unlikely to show a
//! tomato leaf and prints disease information for the predicted class.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::json;
use tracing::info;
use walkdir::WalkDir;

use tomato_diagnosis::backend::{backend_name, default_device, DefaultBackend};
use tomato_diagnosis::classes::{display_name, CLASS_NAMES};
use tomato_diagnosis::inference::{
    load_classifier_with_config, BatchPredictionStats, Classifier, ClassifierHandle,
    PredictionResult, Predictor, SubjectStatus,
};
use tomato_diagnosis::knowledge::KnowledgeBase;
use tomato_diagnosis::model::DEFAULT_WEIGHTS_FILE;
use tomato_diagnosis::utils::format_millis;
use tomato_diagnosis::utils::logging::{init_logging, LogConfig, LogLevel};
use tomato_diagnosis::PipelineConfig;

/// File extensions picked up when the input is a directory
const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "bmp"];

/// Tomato leaf disease diagnosis
///
/// Runs a Burn CNN over tomato leaf photos and checks whether each image
/// plausibly shows a tomato leaf before trusting the prediction.
#[derive(Parser, Debug)]
#[command(name = "tomato-diagnosis")]
#[command(version)]
#[command(about = "Tomato leaf disease diagnosis with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error), overrides --verbose
    #[arg(long, global = true, env = "TOMATO_LOG")]
    log_level: Option<LogLevel>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Diagnose a single image or every image in a directory
    Predict {
        /// Path to input image or directory
        #[arg(short, long)]
        input: PathBuf,

        /// Path to trained weights (random weights are used if missing)
        #[arg(short, long, env = "TOMATO_MODEL", default_value = DEFAULT_WEIGHTS_FILE)]
        model: PathBuf,

        /// Print results as JSON
        #[arg(long, default_value = "false")]
        json: bool,

        /// Print the full disease report for each image
        #[arg(long, default_value = "false")]
        details: bool,

        /// Pipeline configuration JSON
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Disease knowledge base JSON (embedded table if omitted)
        #[arg(short, long)]
        knowledge: Option<PathBuf>,
    },

    /// Show backend, model status and class labels
    Info {
        /// Path to trained weights
        #[arg(short, long, env = "TOMATO_MODEL", default_value = DEFAULT_WEIGHTS_FILE)]
        model: PathBuf,

        /// Pipeline configuration JSON
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Write the default pipeline configuration
    InitConfig {
        /// Output path
        #[arg(short, long, default_value = "pipeline.json")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let json_output = matches!(cli.command, Commands::Predict { json: true, .. });
    let log_config = LogConfig::for_cli(cli.verbose, json_output, cli.log_level);
    init_logging(&log_config)?;

    if !json_output {
        print_banner();
    }

    match cli.command {
        Commands::Predict {
            input,
            model,
            json,
            details,
            config,
            knowledge,
        } => {
            cmd_predict(
                &input,
                &model,
                json,
                details,
                config.as_deref(),
                knowledge.as_deref(),
            )?;
        }

        Commands::Info { model, config } => {
            cmd_info(&model, config.as_deref())?;
        }

        Commands::InitConfig { output } => {
            cmd_init_config(&output)?;
        }
    }

    Ok(())
}

fn print_banner() {
    println!(
        "{}",
        r#"
 ╔══════════════════════════════════════════════════════╗
 ║   🍅 Tomato Leaf Diagnosis                            ║
 ║   Disease classification with Burn + Rust            ║
 ╚══════════════════════════════════════════════════════╝
  "#
        .green()
    );
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn load_handle(model: &Path, config: &PipelineConfig) -> Result<ClassifierHandle<DefaultBackend>> {
    let device = default_device();
    let handle = load_classifier_with_config::<DefaultBackend>(model, &config.model, &device)
        .with_context(|| format!("Failed to open weights {}", model.display()))?;
    Ok(handle)
}

/// Image files under `input`, or `input` itself when it is a file
fn collect_images(input: &Path) -> Vec<PathBuf> {
    if !input.is_dir() {
        return vec![input.to_path_buf()];
    }

    WalkDir::new(input)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect()
}

fn cmd_predict(
    input: &Path,
    model: &Path,
    json: bool,
    details: bool,
    config: Option<&Path>,
    knowledge: Option<&Path>,
) -> Result<()> {
    info!("Running prediction");
    info!("  Input: {}", input.display());
    info!("  Model: {}", model.display());

    if !input.exists() {
        anyhow::bail!("Input path not found: {}", input.display());
    }

    let config = load_config(config)?;
    let knowledge = match knowledge {
        Some(path) => KnowledgeBase::load(path)
            .with_context(|| format!("Failed to load knowledge base {}", path.display()))?,
        None => KnowledgeBase::embedded()?,
    };
    let predictor = Predictor::new(&config, knowledge)?;
    let handle = load_handle(model, &config)?;

    if !json {
        println!("{}", "Prediction Configuration:".cyan().bold());
        println!("  📷 Input:   {}", input.display());
        println!("  🧠 Model:   {}", handle.status());
        println!("  🖥️  Backend: {}", backend_name());
        println!();
        if !handle.is_trained() {
            println!(
                "{} No trained weights loaded, predictions are random.",
                "Warning:".yellow().bold()
            );
            println!();
        }
    }

    let files = collect_images(input);
    if files.is_empty() {
        anyhow::bail!("No images found in {}", input.display());
    }

    // A single file that cannot be decoded is a hard failure
    if !input.is_dir() {
        let result = predictor.predict(input, &handle)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else {
            print_result(&result, details);
        }
        return Ok(());
    }

    let outcomes = predictor.predict_batch(&files, &handle);

    if json {
        let entries: Vec<serde_json::Value> = outcomes
            .iter()
            .map(|(path, outcome)| match outcome {
                Ok(result) => json!({ "path": path, "result": result }),
                Err(e) => json!({ "path": path, "error": e.to_string() }),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for (path, outcome) in &outcomes {
            match outcome {
                Ok(result) => print_result(result, details),
                Err(e) => {
                    println!("📷 {}", path.display());
                    println!("  {} {}", "No prediction:".red().bold(), e);
                    println!();
                }
            }
        }
        println!("{}", BatchPredictionStats::from_outcomes(&outcomes));
    }

    Ok(())
}

fn print_result(result: &PredictionResult, details: bool) {
    if let Some(path) = &result.image_path {
        println!(
            "📷 {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );
    }

    let label = if result.is_valid_subject() {
        result.display_name.green().bold()
    } else {
        result.display_name.red()
    };
    println!("  Predicted:  {} ({})", label, result.class_name);
    println!("  Confidence: {:.1}%", result.confidence_percent);
    println!("  Time:       {}", format_millis(result.inference_time_ms));

    let status = result.subject_status().to_string();
    match result.subject_status() {
        SubjectStatus::Valid => println!("  Status:     {}", status.green().bold()),
        SubjectStatus::LowConfidence => println!("  Status:     {}", status.yellow().bold()),
        SubjectStatus::Invalid => println!("  Status:     {}", status.red().bold()),
    }

    match (&result.validation.warning_message, result.is_valid_subject()) {
        (Some(warning), false) => println!("  {}", warning.red().bold()),
        (Some(note), true) => println!("  {}", note.yellow()),
        (None, _) => println!("  {}", "Looks like a tomato leaf".green()),
    }

    println!("  Top-3:");
    for (i, entry) in result.top_k.iter().enumerate() {
        println!(
            "    {}. {} ({:.1}%)",
            i + 1,
            display_name(entry.class_id).unwrap_or(entry.class_name.as_str()),
            entry.percent()
        );
    }

    if details {
        println!();
        for line in result.display().lines() {
            println!("  {}", line);
        }
    } else {
        println!("  {}", result.action_plan.headline.cyan());
    }
    println!();
}

fn cmd_info(model: &Path, config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let handle = load_handle(model, &config)?;

    println!("{}", "Model Information:".cyan().bold());
    println!("  Version:      {}", tomato_diagnosis::VERSION);
    println!("  Backend:      {}", backend_name());
    println!("  Weights:      {}", model.display());
    let status = handle.status().to_string();
    if handle.is_trained() {
        println!("  Status:       {}", status.green());
    } else {
        println!("  Status:       {}", status.yellow());
    }
    println!(
        "  Input:        {}x{}x{}",
        config.model.input_channels, config.model.input_size, config.model.input_size
    );
    println!("  Base filters: {}", config.model.base_filters);
    println!();

    println!("{}", "Classes:".cyan().bold());
    for (idx, name) in CLASS_NAMES.iter().enumerate() {
        println!(
            "  {:>2}. {:<48} {}",
            idx,
            name,
            display_name(idx).unwrap_or("")
        );
    }

    Ok(())
}

fn cmd_init_config(output: &Path) -> Result<()> {
    let config = PipelineConfig::default();
    config
        .save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "{} Wrote default configuration to {}",
        "Done:".green().bold(),
        output.display()
    );
    Ok(())
}
