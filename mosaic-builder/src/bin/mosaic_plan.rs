//! Plan a multi-level image simulation and write its task manifest
//!
//! Reads a JSON run configuration, resolves the hierarchy, and walks every
//! build task (or a single one, for array-job schedulers). For each task the
//! object seeds are written to a CSV manifest; in wide mode objects are
//! scattered over the exposure footprint and pruned against the task's chip.
//!
//! Usage:
//! ```
//! cargo run --release --bin mosaic-plan -- --config run.json [OPTIONS]
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use mosaic_builder::{
    write_group_summaries, BuildError, BuildTask, BuildTaskEnumerator, Dispatch, RunConfig,
    TaskManifest, TaskRenderer,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Plans build tasks, seeds and group geometry for a mosaic simulation",
    long_about = None
)]
struct Args {
    /// JSON run configuration
    #[arg(long)]
    config: PathBuf,

    /// Output CSV file for the task manifest
    #[arg(long, default_value = "task_manifest.csv")]
    output: PathBuf,

    /// Optional JSON file for per-group geometry scalars
    #[arg(long)]
    groups: Option<PathBuf>,

    /// Build only this flat task number
    #[arg(long)]
    task: Option<usize>,

    /// Print the total number of tasks and exit
    #[arg(long, default_value_t = false)]
    count_only: bool,

    /// Run tasks serially instead of in parallel
    #[arg(long, default_value_t = false)]
    serial: bool,
}

/// Writes manifest rows for each task and tracks progress
struct ManifestRenderer {
    manifest: TaskManifest,
    wide: bool,
    progress: ProgressBar,
    kept: AtomicU64,
    compute_nanos: AtomicU64,
}

impl TaskRenderer for ManifestRenderer {
    fn render(&self, task: &BuildTask) -> mosaic_builder::Result<()> {
        let start = Instant::now();

        let skip = if self.wide {
            task.scatter_positions()
                .map(|positions| task.prune(&positions))
        } else {
            None
        };
        let kept = skip.as_ref().map_or(task.object_count(), |mask| {
            mask.iter().filter(|s| !**s).count()
        });
        debug!(
            "Task {}: keeping {} of {} objects",
            task.number(),
            kept,
            task.object_count()
        );

        self.manifest
            .write_task(task, skip.as_deref())
            .map_err(|e| BuildError::Render {
                task: task.number(),
                message: e.to_string(),
            })?;

        self.kept.fetch_add(kept as u64, Ordering::Relaxed);
        self.compute_nanos
            .fetch_add(start.elapsed().as_nanos() as u64, Ordering::Relaxed);
        self.progress.inc(1);
        Ok(())
    }
}

fn main() -> Result<()> {
    // Initialize logging from environment variables
    env_logger::init();

    let args = Args::parse();
    let wallclock_start = Instant::now();

    let config = RunConfig::load(&args.config)
        .with_context(|| format!("reading run configuration {}", args.config.display()))?;
    let tile = config.load_tile().context("reading tile source list")?;
    let plan = config.build_plan(tile.as_ref()).context("building run plan")?;

    info!(
        "{} seed streams per object",
        plan.seed_plan().stream_count()
    );

    if args.count_only {
        println!("{}", plan.total_tasks());
        return Ok(());
    }

    let mut enumerator = BuildTaskEnumerator::new(&plan);
    if let Some(wcs) = config.wcs_service(&plan).context("setting up focal plane")? {
        enumerator = enumerator.with_wcs(wcs);
    } else if config.wide {
        anyhow::bail!("wide mode needs a focal_plane section");
    }

    let manifest = TaskManifest::create(&args.output)
        .with_context(|| format!("creating manifest {}", args.output.display()))?;

    let task_count = args.task.map_or(plan.total_tasks(), |_| 1);
    let progress = ProgressBar::new(task_count as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("█▉▊▋▌▍▎▏ "),
    );
    progress.set_message("Building tasks");

    let renderer = ManifestRenderer {
        manifest,
        wide: config.wide,
        progress,
        kept: AtomicU64::new(0),
        compute_nanos: AtomicU64::new(0),
    };

    let dispatch = if args.serial {
        Dispatch::Serial
    } else {
        Dispatch::Parallel
    };

    let (tasks, objects) = match args.task {
        Some(n) => {
            let task = enumerator
                .task(n)
                .with_context(|| format!("building task {n}"))?;
            renderer.render(&task)?;
            (1, task.object_count())
        }
        None => {
            let summary = enumerator.run(&renderer, dispatch)?;
            (summary.tasks, summary.objects)
        }
    };
    renderer.progress.finish_with_message("Tasks complete!");
    info!("Manifest written to {}", args.output.display());

    if let Some(path) = &args.groups {
        write_group_summaries(path, &enumerator.cache().groups())
            .with_context(|| format!("writing group summaries {}", path.display()))?;
        info!("Group summaries written to {}", path.display());
    }

    let wallclock_duration = wallclock_start.elapsed();
    let compute_time = Duration::from_nanos(renderer.compute_nanos.load(Ordering::Relaxed));

    info!("==================== TIMING REPORT ====================");
    info!("Total tasks built: {}", tasks);
    info!("Total objects: {}", objects);
    info!("Objects kept: {}", renderer.kept.load(Ordering::Relaxed));
    info!("Groups computed: {}", enumerator.cache().computed_count());
    info!(
        "Execution mode: {}",
        if args.serial { "Serial" } else { "Parallel" }
    );
    info!("");
    info!("Wallclock time: {:.2}s", wallclock_duration.as_secs_f64());
    info!("Total render time: {:.2}s", compute_time.as_secs_f64());
    if !args.serial && wallclock_duration.as_secs_f64() > 0.0 {
        let speedup = compute_time.as_secs_f64() / wallclock_duration.as_secs_f64();
        info!("Parallel speedup: {:.2}x", speedup);
    }
    info!("======================================================");

    Ok(())
}
