use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use eigenface_core::{DistanceMetric, FaceImage, Recognition, RecognitionConfig, TrainingSource};
use std::path::{Path, PathBuf};

mod config;

#[derive(Parser)]
#[command(name = "eigenface", about = "Eigenface face recognition CLI")]
struct Cli {
    /// TOML file with recognition settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Minimum accepted confidence (0.0–1.0)
    #[arg(long, global = true)]
    threshold: Option<f32>,

    /// Distance metric: euclidean or mahalanobis
    #[arg(long, global = true)]
    distance: Option<DistanceMetric>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model from a manifest file or a directory database
    Train {
        /// Training source kind: manifest or directory
        #[arg(short, long, default_value = "manifest")]
        source: TrainingSource,
        /// Path to the manifest file or database directory
        path: PathBuf,
        /// Write the average face and eigenface images
        #[arg(long)]
        save_eigenfaces: bool,
        /// Output model file (defaults to the configured training file)
        #[arg(short, long)]
        model: Option<PathBuf>,
    },
    /// Recognize face images against a trained model
    Recognize {
        /// Model file (defaults to the configured training file)
        #[arg(short, long)]
        model: Option<PathBuf>,
        /// Number of best results per face
        #[arg(short, long, default_value_t = 1)]
        results: usize,
        /// Face images, same size as the training images
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Evaluate recognition accuracy over a labeled manifest
    Evaluate {
        #[arg(short, long)]
        model: Option<PathBuf>,
        /// Manifest of `subjectID imagePath` (or `imagePath subjectID`) lines
        manifest: PathBuf,
    },
    /// Show a summary of a trained model
    Info {
        #[arg(short, long)]
        model: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut settings: RecognitionConfig = config::load(cli.config.as_deref())?;
    if let Some(threshold) = cli.threshold {
        settings.threshold = threshold;
    }
    if let Some(distance) = cli.distance {
        settings.distance = distance;
    }

    let mut recognition = Recognition::new(settings)?;

    match cli.command {
        Commands::Train {
            source,
            path,
            save_eigenfaces,
            model,
        } => {
            let summary = recognition
                .train(source, &path, save_eigenfaces)
                .with_context(|| format!("training from {}", path.display()))?;
            let saved = recognition.save_training_data(model.as_deref())?;
            println!(
                "Trained on {} faces of {} subjects ({}x{}, {} eigenfaces)",
                summary.faces, summary.subjects, summary.width, summary.height, summary.components
            );
            for artifact in &summary.artifacts {
                println!("Wrote {}", artifact.display());
            }
            println!("Model saved to {}", saved.display());
        }
        Commands::Recognize {
            model,
            results,
            images,
        } => {
            load_model(&mut recognition, model.as_deref())?;
            let faces = images
                .iter()
                .map(|p| FaceImage::load(p).with_context(|| format!("loading {}", p.display())))
                .collect::<Result<Vec<_>>>()?;
            let recognized = recognition.recognize_faces(&faces, results)?;

            let output: Vec<_> = images
                .iter()
                .zip(&recognized)
                .map(|(path, results)| {
                    serde_json::json!({
                        "image": path.display().to_string(),
                        "results": results,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Evaluate { model, manifest } => {
            load_model(&mut recognition, model.as_deref())?;
            let report = recognition.test_recognition_performance(&manifest)?;
            for entry in &report.entries {
                println!(
                    "{}: expected {} got {} (confidence {:.3}) {:?}",
                    entry.path.display(),
                    entry.expected,
                    entry.predicted,
                    entry.confidence,
                    entry.outcome
                );
            }
            println!(
                "{} faces: {} correct, {} wrong, {} unknown, accuracy {:.1}%",
                report.total(),
                report.correct,
                report.wrong,
                report.unknown,
                report.accuracy() * 100.0
            );
        }
        Commands::Info { model } => {
            load_model(&mut recognition, model.as_deref())?;
            let Some(m) = recognition.model() else {
                anyhow::bail!("no model loaded");
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "width": m.width,
                    "height": m.height,
                    "equalized": m.equalized,
                    "training_faces": m.training_faces(),
                    "subjects": m.subject_ids(),
                    "components": m.components(),
                    "eigenvalues": m.eigenvalues,
                    "trained_at": m.trained_at.to_rfc3339(),
                }))?
            );
        }
    }

    Ok(())
}

fn load_model(recognition: &mut Recognition, path: Option<&Path>) -> Result<()> {
    let shown = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| recognition.config().training_file.clone());
    recognition
        .load_training_data(path)
        .with_context(|| format!("loading model {}", shown.display()))
}
