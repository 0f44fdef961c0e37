use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveTime, Weekday};
use clap::{Parser, Subcommand};

use presence_core::attendance::domain::schedule::parse_clock_time;
use presence_core::attendance::domain::system_mode::SystemMode;
use presence_core::attendance::infrastructure::sqlite_attendance_sink::SqliteAttendanceSink;
use presence_core::attendance::infrastructure::sqlite_timetable_store::{
    day_name, NewSchedule, SqliteTimetableStore,
};
use presence_core::camera::domain::camera_config::{CameraConfig, VideoSource};
use presence_core::camera::infrastructure::ffmpeg_camera::FfmpegCameraBackend;
use presence_core::camera::infrastructure::sqlite_camera_registry::SqliteCameraRegistry;
use presence_core::detection::infrastructure::model_resolver::ModelResolver;
use presence_core::pipeline::attendance_pipeline::{AttendancePipeline, PipelineDeps};
use presence_core::pipeline::infrastructure::onnx_vision_engine::OnnxVisionEngine;
use presence_core::recognition::infrastructure::json_gallery_store::JsonGalleryStore;
use presence_core::settings::domain::setting_key::SettingKey;
use presence_core::settings::domain::settings_store::SettingsStore;
use presence_core::settings::infrastructure::sqlite_settings_source::SqliteSettingsSource;
use presence_core::shared::clock::SystemClock;
use presence_core::shared::constants::APP_DIR_NAME;
use presence_core::shared::frame::Frame;
use presence_core::shared::stop_signal::StopSignal;
use presence_core::storage::infrastructure::database::Database;

const DEFAULT_DB_NAME: &str = "presence.db";
const DEFAULT_GALLERY_NAME: &str = "encodings.json";
const RUN_TICK: Duration = Duration::from_millis(200);

/// Camera-based classroom attendance.
#[derive(Parser)]
#[command(name = "presence")]
struct Cli {
    /// SQLite database (default: <data dir>/Presence/presence.db).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Enrolled face gallery (default: <data dir>/Presence/encodings.json).
    #[arg(long, global = true)]
    gallery: Option<PathBuf>,

    /// Directory searched for bundled ONNX models.
    #[arg(long, global = true)]
    models_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline until stdin closes or the duration elapses.
    Run {
        /// Stop after this many seconds.
        #[arg(long)]
        duration: Option<u64>,

        /// Seconds between status lines.
        #[arg(long, default_value = "10")]
        status_interval: u64,

        /// Keep writing the latest annotated frame to this JPEG file.
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Seconds between snapshot writes.
        #[arg(long, default_value = "1")]
        snapshot_interval: u64,
    },
    /// Print the pipeline status as JSON.
    Status,
    /// Enroll a student from an image containing exactly one face.
    Enroll {
        #[arg(long)]
        name: String,
        #[arg(long)]
        image: PathBuf,
    },
    /// Set the system mode: auto, force_on or force_off.
    Mode { mode: SystemMode },
    /// Manage the class timetable.
    Schedule {
        #[command(subcommand)]
        action: ScheduleAction,
    },
    /// Manage cameras.
    Camera {
        #[command(subcommand)]
        action: CameraAction,
    },
}

#[derive(Subcommand)]
enum ScheduleAction {
    /// Add a weekly class slot.
    Add {
        /// Weekday, e.g. Monday or mon.
        #[arg(long)]
        day: Weekday,
        /// Start time (HH:MM).
        #[arg(long, value_parser = parse_time)]
        start: NaiveTime,
        /// End time (HH:MM).
        #[arg(long, value_parser = parse_time)]
        end: NaiveTime,
        #[arg(long = "class")]
        class_name: String,
    },
    /// List every timetable row.
    List,
}

#[derive(Subcommand)]
enum CameraAction {
    /// Register a camera by device index or stream URI.
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        source: VideoSource,
        /// Lower values are tried first.
        #[arg(long, default_value = "0")]
        priority: i64,
        /// Register without enabling it.
        #[arg(long)]
        disabled: bool,
    },
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let db_path = match cli.db {
        Some(path) => path,
        None => data_dir()?.join(DEFAULT_DB_NAME),
    };
    let gallery_path = match cli.gallery {
        Some(path) => path,
        None => data_dir()?.join(DEFAULT_GALLERY_NAME),
    };
    let db = Database::open(&db_path)?;
    log::debug!("Using database {}", db_path.display());

    match cli.command {
        Command::Run {
            duration,
            status_interval,
            snapshot,
            snapshot_interval,
        } => {
            let engine = OnnxVisionEngine::resolve(
                &model_resolver(cli.models_dir)?,
                Some(download_progress),
            )?;
            let mut pipeline = AttendancePipeline::new(deps(&db, &gallery_path, engine));
            run_pipeline(
                &mut pipeline,
                duration.map(Duration::from_secs),
                Duration::from_secs(status_interval.max(1)),
                snapshot.as_deref(),
                Duration::from_secs(snapshot_interval.max(1)),
            )
        }
        Command::Status => {
            let engine = OnnxVisionEngine::installed(&model_resolver(cli.models_dir)?);
            let pipeline = AttendancePipeline::new(deps(&db, &gallery_path, engine));
            println!("{}", serde_json::to_string_pretty(&pipeline.status())?);
            Ok(())
        }
        Command::Enroll {
            name,
            image: image_path,
        } => {
            let engine = OnnxVisionEngine::resolve(
                &model_resolver(cli.models_dir)?,
                Some(download_progress),
            )?;
            let pipeline = AttendancePipeline::new(deps(&db, &gallery_path, engine));
            let frame = Frame::from_rgb_image(image::open(&image_path)?.to_rgb8(), 0);
            pipeline.enroll(&name, &frame)?;
            println!("Enrolled {} from {}", name.trim(), image_path.display());
            Ok(())
        }
        Command::Mode { mode } => {
            let settings = SettingsStore::new(Arc::new(SqliteSettingsSource::new(db)));
            settings.set(SettingKey::SystemMode, mode)?;
            println!("System mode: {mode}");
            Ok(())
        }
        Command::Schedule { action } => run_schedule(SqliteTimetableStore::new(db), action),
        Command::Camera { action } => run_camera(SqliteCameraRegistry::new(db), action),
    }
}

fn deps(db: &Database, gallery_path: &Path, engine: OnnxVisionEngine) -> PipelineDeps {
    let attendance = Arc::new(SqliteAttendanceSink::new(db.clone()));
    PipelineDeps {
        camera_registry: Arc::new(SqliteCameraRegistry::new(db.clone())),
        camera_backend: Arc::new(FfmpegCameraBackend::new()),
        detectors: engine.detectors,
        encoders: engine.encoders,
        gallery_store: Arc::new(JsonGalleryStore::new(gallery_path)),
        timetable: Arc::new(SqliteTimetableStore::new(db.clone())),
        sink: attendance.clone(),
        students: attendance,
        settings: Arc::new(SettingsStore::new(Arc::new(SqliteSettingsSource::new(
            db.clone(),
        )))),
        clock: Arc::new(SystemClock),
    }
}

fn run_pipeline(
    pipeline: &mut AttendancePipeline,
    duration: Option<Duration>,
    status_interval: Duration,
    snapshot: Option<&Path>,
    snapshot_interval: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let (trigger, stdin_closed) = StopSignal::new();
    std::thread::spawn(move || {
        let mut sink = Vec::new();
        let _ = std::io::stdin().read_to_end(&mut sink);
        trigger.fire();
    });

    pipeline.start();
    let started = Instant::now();
    let mut last_status = started;
    let mut last_snapshot = started;

    loop {
        if stdin_closed.wait(RUN_TICK) {
            log::info!("stdin closed, stopping");
            break;
        }
        if duration.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }
        if last_status.elapsed() >= status_interval {
            println!("{}", serde_json::to_string(&pipeline.status())?);
            last_status = Instant::now();
        }
        if let Some(path) = snapshot {
            if last_snapshot.elapsed() >= snapshot_interval {
                write_snapshot(pipeline, path);
                last_snapshot = Instant::now();
            }
        }
    }

    if let Some(path) = snapshot {
        write_snapshot(pipeline, path);
    }
    pipeline.stop();
    println!("{}", serde_json::to_string(&pipeline.status())?);
    Ok(())
}

fn write_snapshot(pipeline: &AttendancePipeline, path: &Path) {
    let Some(jpeg) = pipeline.snapshot_jpeg() else {
        return;
    };
    let temp_path = path.with_extension("jpg.tmp");
    let result = fs::write(&temp_path, jpeg).and_then(|()| fs::rename(&temp_path, path));
    if let Err(e) = result {
        log::warn!("Failed to write snapshot to {}: {e}", path.display());
    }
}

fn run_schedule(
    store: SqliteTimetableStore,
    action: ScheduleAction,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ScheduleAction::Add {
            day,
            start,
            end,
            class_name,
        } => {
            let id = store.add_schedule(&NewSchedule {
                day,
                start_time: start,
                end_time: end,
                class_name: class_name.clone(),
            })?;
            println!(
                "Added #{id}: {class_name} on {} {}-{}",
                day_name(day),
                start.format("%H:%M"),
                end.format("%H:%M")
            );
        }
        ScheduleAction::List => {
            for s in store.list_schedules()? {
                let inactive = if s.is_active { "" } else { "  (inactive)" };
                println!(
                    "{:>4}  {:<9}  {}-{}  {}{inactive}",
                    s.id, s.day_of_week, s.start_time, s.end_time, s.class_name
                );
            }
        }
    }
    Ok(())
}

fn run_camera(
    registry: SqliteCameraRegistry,
    action: CameraAction,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        CameraAction::Add {
            name,
            source,
            priority,
            disabled,
        } => {
            let id = registry.add_camera(&CameraConfig {
                name: name.clone(),
                source,
                enabled: !disabled,
                priority,
            })?;
            println!("Added camera #{id}: {name}");
        }
    }
    Ok(())
}

fn model_resolver(
    models_dir: Option<PathBuf>,
) -> Result<ModelResolver, Box<dyn std::error::Error>> {
    Ok(ModelResolver::new(models_dir)?)
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face models... {pct}%");
    } else {
        eprint!("\rDownloading face models... {downloaded} bytes");
    }
}

fn data_dir() -> Result<PathBuf, Box<dyn std::error::Error>> {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| "could not determine data directory".into())
}

fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    parse_clock_time(raw).ok_or_else(|| format!("expected HH:MM, got '{raw}'"))
}
