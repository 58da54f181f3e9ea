// KYC document screening from the command line

use clap::{Parser, Subcommand};
use kycdoc::{
    models::{CheckDetail, CheckKind, IdType, Thresholds, ValidationReport},
    processing::{image::THUMBNAIL_SIZE, ImageProcessor},
    submission::KycSubmission,
    utils::KycError,
    DocumentValidator, SubmissionProcessor,
};
use log::debug;
use std::path::{Path, PathBuf};

/// Automated quality and plausibility screening of identity document uploads
#[derive(Parser)]
#[command(name = "kycdoc")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON file overriding the default thresholds
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print JSON instead of the text report
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a single document image
    Validate {
        image: PathBuf,
        /// Declared document type (passport, national_id, driver_license, ...)
        #[arg(short, long, default_value = "passport")]
        id_type: String,
    },
    /// Screen a multi-file submission and decide its initial status
    Submit {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(short, long, default_value = "passport")]
        id_type: String,
        /// Write the stored submission record here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write a JPEG preview of an upload
    Thumbnail {
        image: PathBuf,
        output: PathBuf,
        #[arg(long, default_value_t = THUMBNAIL_SIZE.0)]
        size: u32,
    },
}

fn pass_fail(passed: bool) -> &'static str {
    if passed {
        "PASSED"
    } else {
        "FAILED"
    }
}

// Function to print a detailed validation report
fn print_detailed_report(path: &Path, id_type: &IdType, report: &ValidationReport) {
    println!("\n===============================================");
    println!("      KYC DOCUMENT VALIDATION REPORT");
    println!("===============================================\n");

    println!("DOCUMENT:");
    println!("  File: {}", path.display());
    println!("  Declared Type: {}", id_type);
    println!("  Analyzed At: {}", report.analyzed_at.to_rfc3339());

    if let Some(error) = &report.error {
        println!("\nANALYSIS ERROR:\n  {}", error);
    }

    let quality = &report.quality_analysis;
    println!("\nIMAGE QUALITY: {:.2}", quality.quality_score);
    if let Some(metrics) = &quality.metrics {
        println!("  Level: {}", metrics.quality_level);
        println!(
            "  Resolution: {}x{} [{}]",
            metrics.resolution.width,
            metrics.resolution.height,
            pass_fail(metrics.resolution.passed)
        );
        println!("  Brightness: {:.2} [{}]", metrics.brightness.value, pass_fail(metrics.brightness.passed));
        println!("  Sharpness: {:.2} [{}]", metrics.sharpness.value, pass_fail(metrics.sharpness.passed));
        println!("  Contrast: {:.2} [{}]", metrics.contrast.value, pass_fail(metrics.contrast.passed));
        println!("  Edge Density: {:.4}", metrics.edge_density);
    }

    let doc = &report.document_type;
    println!("\nDOCUMENT TYPE:");
    println!("  Detected: {} ({:.0}% confidence)", doc.document_type, doc.confidence);
    println!("  Aspect Ratio: {:.2}", doc.aspect_ratio);
    println!("  Document Outline: {}", if doc.has_document_shape { "found" } else { "not found" });

    let faces = &report.face_detection;
    println!("\nFACES: {}", faces.face_count);
    for face in &faces.faces {
        println!(
            "  - {}x{} at ({}, {}), {:.2}% of image",
            face.width, face.height, face.x, face.y, face.face_ratio_percent
        );
    }

    println!("\nVALIDATION STEPS:");
    for (i, check) in report.validation_checks.iter().enumerate() {
        let name = match check.check {
            CheckKind::ImageQuality => "Image Quality",
            CheckKind::DocumentType => "Document Type",
            CheckKind::FaceDetection => "Face Detection",
        };
        let note = match &check.detail {
            CheckDetail::NotRequired { .. } => " (not required)",
            _ => "",
        };
        println!("  {}. {}: {}{}", i + 1, name, pass_fail(check.passed), note);
    }

    let issues = quality.issues();
    if !issues.is_empty() {
        println!("\nISSUES FOUND:");
        for issue in issues {
            println!("  - {}", issue);
        }
    }
    if let Some(metrics) = &quality.metrics {
        println!("\nRECOMMENDATIONS:");
        for recommendation in &metrics.recommendations {
            println!("  - {}", recommendation);
        }
    }

    println!("\nValidation score: {}/100", report.validation_score);
    println!("Decision: {:?}", report.decision());
}

fn print_submission(submission: &KycSubmission) {
    println!("Submission {} ({})", submission.id, submission.id_type);
    for file in &submission.analysis.file_analyses {
        match &file.analysis {
            Some(report) => println!("  {}: score {}", file.file_name, report.validation_score),
            None => println!("  {}: stored, not analysed", file.file_name),
        }
    }
    println!("Average score: {:.2}", submission.analysis.validation_score);
    println!("Status: {} (account {:?})", submission.status, submission.kyc_status);
    if let Some(note) = &submission.admin_note {
        println!("Note: {}", note);
    }
}

fn run(cli: Cli) -> Result<(), KycError> {
    let thresholds = match &cli.config {
        Some(path) => Thresholds::from_json_file(path)?,
        None => Thresholds::default(),
    };
    debug!("Thresholds: {:?}", thresholds);

    match cli.command {
        Commands::Validate { image, id_type } => {
            let id_type = IdType::from(id_type);
            let report = DocumentValidator::new(thresholds).validate_document(&image, &id_type);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_detailed_report(&image, &id_type, &report);
            }
        }
        Commands::Submit { files, id_type, output } => {
            let processor = SubmissionProcessor::new(DocumentValidator::new(thresholds));
            let submission = processor.submit(&IdType::from(id_type), &files)?;
            let json = serde_json::to_string_pretty(&submission)?;
            if let Some(path) = output {
                std::fs::write(&path, &json)?;
                println!("Submission record written to {}", path.display());
            }
            if cli.json {
                println!("{}", json);
            } else {
                print_submission(&submission);
            }
        }
        Commands::Thumbnail { image, output, size } => {
            ImageProcessor::generate_thumbnail(&image, &output, (size, size))?;
            println!("Thumbnail written to {}", output.display());
        }
    }
    Ok(())
}

fn main() {
    env_logger::init();

    if let Err(err) = run(Cli::parse()) {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}
