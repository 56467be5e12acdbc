use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use photo_geotag_rs::config::{ClockAlignment, ProcessConfig, SequenceTarget, TagOutput, UploadConfig};
use photo_geotag_rs::encoding::AltitudeRefPolicy;
use photo_geotag_rs::{pipeline, upload};

#[derive(Parser, Debug)]
#[command(name = "photo_geotag")]
#[command(about = "Geotag panoramas from a GPX track and an attitude log, then upload them", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write GPS tags for every JPEG in a folder
    Process(ProcessArgs),
    /// Upload every JPEG in a folder to a panorama backend
    Upload(UploadArgs),
}

#[derive(Args, Debug)]
struct ProcessArgs {
    /// Images directory
    #[arg(value_name = "FOLDER")]
    folder: PathBuf,

    /// GPX track (.gpx or .gpx.gz)
    #[arg(long)]
    gpx: PathBuf,

    /// Attitude CSV: time,roll,pitch (.csv or .csv.gz)
    #[arg(long)]
    telemetry: Option<PathBuf>,

    /// Camera clock zone offset from UTC in hours
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    offset_hours: i64,

    /// Capture time calibration in milliseconds
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    delay_ms: i64,

    /// Attitude log shift relative to the GPS clock, milliseconds
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    attitude_offset_ms: i64,

    #[arg(long, value_enum, default_value_t = AltitudeRefPolicy::AboveSeaLevel)]
    altitude_ref: AltitudeRefPolicy,

    /// Where the tags go: into the JPEG, a JSON sidecar, or the log only
    #[arg(long, value_enum, default_value_t = TagOutput::Exif)]
    output: TagOutput,

    /// Same as `--output dry-run`
    #[arg(long, default_value_t = false, conflicts_with = "output")]
    dry_run: bool,

    /// Write a JSON report of every image outcome
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Args, Debug)]
#[command(group(clap::ArgGroup::new("target").required(true).args(["new_sequence", "sequence"])))]
struct UploadArgs {
    #[arg(value_name = "FOLDER")]
    folder: PathBuf,

    /// Create a new sequence titled TITLE
    #[arg(long, value_name = "TITLE")]
    new_sequence: Option<String>,

    /// Existing sequence id
    #[arg(long, value_name = "ID")]
    sequence: Option<String>,

    #[arg(long)]
    user: String,

    #[arg(long)]
    password: String,

    /// Backend base URL
    #[arg(long, value_name = "URL")]
    backend: String,

    /// Camera height from ground in meters
    #[arg(long, default_value_t = 2.0)]
    height: f64,
}

impl From<ProcessArgs> for ProcessConfig {
    fn from(args: ProcessArgs) -> Self {
        ProcessConfig {
            images_dir: args.folder,
            gpx_path: args.gpx,
            attitude_path: args.telemetry,
            clock: ClockAlignment {
                offset_hours: args.offset_hours,
                delay_ms: args.delay_ms,
                attitude_offset_ms: args.attitude_offset_ms,
            },
            altitude_ref_policy: args.altitude_ref,
            output: if args.dry_run {
                TagOutput::DryRun
            } else {
                args.output
            },
            report_path: args.report,
        }
    }
}

impl From<UploadArgs> for UploadConfig {
    fn from(args: UploadArgs) -> Self {
        let sequence = match (args.new_sequence, args.sequence) {
            (Some(title), _) => SequenceTarget::New { title },
            (None, Some(id)) => SequenceTarget::Existing(id),
            // clap's required group rules this out
            (None, None) => SequenceTarget::Existing(String::new()),
        };
        UploadConfig {
            images_dir: args.folder,
            backend: args.backend,
            user: args.user,
            password: args.password,
            sequence,
            height_from_ground: args.height,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Process(args) => {
            let config = ProcessConfig::from(args);
            let report = pipeline::run_process(&config)
                .with_context(|| format!("processing {}", config.images_dir.display()))?;
            println!(
                "Tagged {} / {} images ({} outside track, {} skipped)",
                report.tagged,
                report.images.len(),
                report.out_of_range,
                report.skipped
            );
        }
        Command::Upload(args) => {
            let config = UploadConfig::from(args);
            let summary = upload::run_upload(&config)
                .await
                .with_context(|| format!("uploading to {}", config.backend))?;
            match &summary.rejected {
                Some((image, status)) => println!(
                    "Uploaded {} images to sequence {}, stopped at {} (HTTP {})",
                    summary.uploaded,
                    summary.sequence,
                    image.display(),
                    status
                ),
                None => println!(
                    "Uploaded {} images to sequence {}",
                    summary.uploaded, summary.sequence
                ),
            }
        }
    }

    Ok(())
}
