use chrono::{Duration, Utc};
use clap::Parser;
use kycdoc::reporting::{daily_activity, KycStatistics};
use kycdoc::submission::KycSubmission;
use kycdoc::utils::KycError;
use log::warn;
use std::path::{Path, PathBuf};

/// Aggregate stored submission records into review-queue statistics
#[derive(Parser)]
#[command(name = "kyc_stats")]
struct Args {
    /// Submission JSON files, or directories containing them
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    #[arg(long)]
    json: bool,

    /// Only list daily activity for the last N days
    #[arg(long)]
    days: Option<i64>,
}

fn collect(path: &Path, out: &mut Vec<KycSubmission>) -> Result<(), KycError> {
    if path.is_dir() {
        for entry in std::fs::read_dir(path)? {
            let entry = entry?.path();
            if entry.extension().map_or(false, |ext| ext == "json") {
                collect(&entry, out)?;
            }
        }
        return Ok(());
    }

    // Unreadable records are skipped, not fatal
    match KycSubmission::from_json_file(path) {
        Ok(submission) => out.push(submission),
        Err(e) => warn!("Skipping {:?}: {}", path, e),
    }
    Ok(())
}

fn main() -> Result<(), KycError> {
    env_logger::init();
    let args = Args::parse();

    let mut submissions = Vec::new();
    for path in &args.paths {
        collect(path, &mut submissions)?;
    }
    let mut stats = KycStatistics::from_submissions(&submissions);
    if let Some(days) = args.days {
        stats.timeline = daily_activity(&submissions, Some(Utc::now() - Duration::days(days)));
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let o = &stats.overview;
    println!("KYC Submission Statistics");
    println!("-------------------------");
    println!("  Total: {}", o.total_submissions);
    println!("  Pending: {}  Approved: {}  Rejected: {}", o.pending, o.approved, o.rejected);
    println!("  Approval rate: {:.2}%", o.approval_rate);
    let t = &stats.processing_times;
    println!("  Processing time: avg {:.2} h, min {:.2} h, max {:.2} h", t.average, t.min, t.max);

    println!("\nQuality distribution:");
    let q = &stats.quality_distribution;
    println!("  excellent (80-100): {}", q.excellent);
    println!("  good (60-80):       {}", q.good);
    println!("  acceptable (40-60): {}", q.acceptable);
    println!("  poor (0-40):        {}", q.poor);

    println!("\nDaily activity:");
    for day in &stats.timeline {
        println!(
            "  {}: {} submitted, {} approved, {} rejected, {} pending",
            day.date, day.submitted, day.approved, day.rejected, day.pending
        );
    }

    println!("\nDocument types:");
    for entry in &stats.id_type_distribution {
        println!("  {}: {}", entry.id_type, entry.count);
    }
    Ok(())
}
