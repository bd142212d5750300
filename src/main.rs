// src/main.rs

mod alignment;
mod config;
mod discovery;
mod error;
mod export;
mod pipeline;
mod pose_table;
mod postprocess;
mod types;

use alignment::{EventLog, EventSources, TimeTable};
use anyhow::Result;
use export::{write_statistics_csv, StatisticsRow};
use pipeline::{EventInput, PipelineOrchestrator, RunMetrics, VideoContext, VideoReport};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use types::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.yaml".to_string());
    let config = Config::load(&config_path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("touchscreen_pose={}", config.logging.level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🐭 Touchscreen pose postprocessing starting");
    info!("✓ Configuration loaded from {}", config_path);
    info!(
        "Refine: cutoff={:.2}, median window={}, savgol={:?}",
        config.refine.confidence_cutoff, config.refine.median_window, config.refine.savgol_window
    );

    let events = match load_event_sources(&config) {
        Ok(Some(sources)) => EventInput::Loaded(sources),
        Ok(None) => EventInput::Disabled,
        Err(e) => {
            error!("✗ Event log unavailable, videos needing it will fail: {:#}", e);
            EventInput::Unreadable(format!("{:#}", e))
        }
    };

    let output_dir = PathBuf::from(&config.io.output_dir);
    let files = discovery::find_pose_files(
        Path::new(&config.io.input_dir),
        &config.io.pose_suffix,
        &output_dir,
    );
    if files.is_empty() {
        error!("No pose tables found in {}", config.io.input_dir);
        return Ok(());
    }
    std::fs::create_dir_all(&output_dir)?;

    let orchestrator = Arc::new(PipelineOrchestrator::new(config.clone(), events));
    let metrics = RunMetrics::new();
    let semaphore = Arc::new(Semaphore::new(config.workers.0));
    info!("Processing {} video(s) with {} worker(s)", files.len(), config.workers.0);

    let mut handles = Vec::with_capacity(files.len());
    for path in files {
        let orchestrator = orchestrator.clone();
        let sem = semaphore.clone();
        let file = path.display().to_string();
        let handle = tokio::spawn(async move {
            let _permit = sem.acquire_owned().await.ok();
            tokio::task::spawn_blocking(move || orchestrator.process(&path)).await
        });
        handles.push((file, handle));
    }

    let mut reports: Vec<VideoReport> = Vec::new();
    let mut contexts: Vec<VideoContext> = Vec::new();
    for (file, handle) in handles {
        match handle.await {
            Ok(Ok((report, ctx))) => {
                metrics.record(&report);
                reports.push(report);
                contexts.push(ctx);
            }
            Ok(Err(e)) | Err(e) => {
                error!("✗ Worker for {} panicked: {}", file, e);
                let report = VideoReport::crashed(file, e.to_string());
                metrics.record(&report);
                reports.push(report);
            }
        }
    }

    write_statistics(&output_dir, &mut contexts);

    let summary = metrics.summary(reports);
    let summary_path = output_dir.join("run_summary.json");
    summary.write_json(&summary_path)?;

    info!("========================================");
    info!(
        "Done: {} merged, {} features only, {} skipped, {} failed ({} frames, {:.1}s)",
        summary.merged,
        summary.features_only,
        summary.skipped,
        summary.failed,
        summary.total_frames,
        summary.elapsed_secs
    );
    info!("💾 Summary written to {}", summary_path.display());
    Ok(())
}

fn load_event_sources(config: &Config) -> Result<Option<Arc<EventSources>>> {
    let Some(log_path) = &config.alignment.event_log else {
        info!("⚪ No event log configured; writing features only");
        return Ok(None);
    };
    let log = EventLog::load(Path::new(log_path))?;
    info!("✓ Event log loaded: {} subject(s)", log.subject_count());

    let time_table = match &config.alignment.time_table {
        Some(path) => {
            let table = TimeTable::load(Path::new(path))?;
            info!("✓ Time table loaded: {} recording window(s)", table.len());
            Some(table)
        }
        None => {
            warn!("No time table configured; event times used without offset");
            None
        }
    };

    Ok(Some(Arc::new(EventSources { log, time_table })))
}

fn write_statistics(output_dir: &Path, contexts: &mut [VideoContext]) {
    contexts.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    let rows: Vec<StatisticsRow> = contexts
        .iter()
        .filter_map(|ctx| {
            Some(StatisticsRow {
                file_name: &ctx.file_name,
                info: ctx.info.as_ref()?,
                fps: ctx.fps,
                stats: ctx.statistics.as_ref()?,
            })
        })
        .collect();

    let path = output_dir.join("statistics.csv");
    match write_statistics_csv(&path, &rows) {
        Ok(()) => info!("✓ Statistics for {} video(s) written to {}", rows.len(), path.display()),
        Err(e) => error!("Failed to write {}: {}", path.display(), e),
    }
}
