use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use mapsmith_coords::{ChunkPos, DimensionId, MapVariant, RegionPos, TileKey};
use mapsmith_tiles::PixelBuffer;

use crate::context::{CancelToken, MappingContext};
use crate::render::{CellColorizer, ChunkLookahead, render_chunk, task_variants};
use crate::scan::WorkItem;

/// North, west and north-west: the neighbours a chunk's slope shading reads.
const CONTEXT_OFFSETS: [(i32, i32); 3] = [(0, -1), (-1, 0), (-1, -1)];

#[derive(Clone, Copy, Debug)]
pub struct SchedulerConfig {
    /// Write changed tiles at the end of every task instead of leaving them to cache upkeep.
    pub flush_each_task: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            flush_each_task: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObsoleteReason {
    DimensionChanged,
    MappingDisabled,
}

impl std::fmt::Display for ObsoleteReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObsoleteReason::DimensionChanged => write!(f, "dimension changed"),
            ObsoleteReason::MappingDisabled => write!(f, "mapping disabled"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaskStats {
    pub chunks_rendered: usize,
    /// Loaded but already up to date for every variant of the pass.
    pub chunks_current: usize,
    pub chunks_missing: usize,
    pub tiles_changed: usize,
    pub tiles_written: usize,
    pub pixels_changed: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed(TaskStats),
    Obsolete(ObsoleteReason),
    Cancelled,
    Failed(String),
}

#[derive(Clone, Debug)]
pub struct TaskReport {
    pub job: RenderJob,
    pub outcome: TaskOutcome,
    pub elapsed: Duration,
}

/// Re-render of the resident chunks within `radius` chunks of `center`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AreaRequest {
    pub dimension: DimensionId,
    pub variant: MapVariant,
    pub center: ChunkPos,
    pub radius: i32,
}

impl AreaRequest {
    /// Chunks of the square area that fall in `region`, x-major.
    pub fn chunks_in(&self, region: RegionPos) -> impl Iterator<Item = ChunkPos> + '_ {
        region.chunks().filter(move |c| {
            (c.cx - self.center.cx).abs() <= self.radius && (c.cz - self.center.cz).abs() <= self.radius
        })
    }

    /// Regions the area touches, sorted.
    pub fn regions(&self) -> Vec<RegionPos> {
        let r = self.radius.max(0);
        let lo = ChunkPos::new(self.center.cx - r, self.center.cz - r).region();
        let hi = ChunkPos::new(self.center.cx + r, self.center.cz + r).region();
        (lo.rx..=hi.rx)
            .flat_map(|rx| (lo.rz..=hi.rz).map(move |rz| RegionPos::new(rx, rz)))
            .collect()
    }
}

/// One unit of work for the render thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderJob {
    Region(WorkItem),
    Area(AreaRequest),
}

impl RenderJob {
    #[inline]
    pub fn dimension(&self) -> DimensionId {
        match self {
            RenderJob::Region(item) => item.dimension,
            RenderJob::Area(area) => area.dimension,
        }
    }
}

impl std::fmt::Display for RenderJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderJob::Region(item) => write!(f, "region {}", item.region),
            RenderJob::Area(area) => write!(f, "area {} r{}", area.center, area.radius),
        }
    }
}

fn obsolete(ctx: &MappingContext, dimension: DimensionId) -> Option<ObsoleteReason> {
    let session = ctx.session();
    if session.current_dimension() != Some(dimension) {
        Some(ObsoleteReason::DimensionChanged)
    } else if !session.is_mapping_active() {
        Some(ObsoleteReason::MappingDisabled)
    } else {
        None
    }
}

/// Pixels drawn for one region, not yet committed.
struct RegionDraft {
    region: RegionPos,
    tiles: Vec<(MapVariant, PixelBuffer)>,
    rendered: Vec<Vec<ChunkPos>>,
}

/// Draws `chunks` of `region` (x-major) onto copies of its current tiles.
#[allow(clippy::too_many_arguments)]
fn draw_region<I>(
    ctx: &MappingContext,
    colorizer: &dyn CellColorizer,
    dim: DimensionId,
    region: RegionPos,
    variants: &[MapVariant],
    chunks: I,
    cancel: &CancelToken,
    stats: &mut TaskStats,
) -> Result<RegionDraft, TaskOutcome>
where
    I: IntoIterator<Item = ChunkPos>,
{
    let mut tiles: Vec<(MapVariant, PixelBuffer)> = variants
        .iter()
        .map(|&v| (v, ctx.cache.base_pixels(&TileKey::new(region, v, dim))))
        .collect();
    let mut rendered: Vec<Vec<ChunkPos>> = vec![Vec::new(); variants.len()];
    let mut lookahead = ChunkLookahead::new();
    let mut column = None;

    for pos in chunks {
        if cancel.is_cancelled() {
            return Err(TaskOutcome::Cancelled);
        }
        if let Some(reason) = obsolete(ctx, dim) {
            return Err(TaskOutcome::Obsolete(reason));
        }
        if column != Some(pos.cx) {
            lookahead.evict_before(pos.cx - 1);
            column = Some(pos.cx);
        }
        for (dx, dz) in CONTEXT_OFFSETS {
            let n = pos.offset(dx, dz);
            if region.contains(n) || lookahead.is_known(n) {
                continue;
            }
            match ctx.source.acquire(dim, n) {
                Some(mut snap) => {
                    snap.retain = true;
                    lookahead.insert(snap);
                }
                None => lookahead.mark_missing(n),
            }
        }

        let Some(mut snap) = ctx.source.acquire(dim, pos) else {
            stats.chunks_missing += 1;
            lookahead.mark_missing(pos);
            continue;
        };
        if let Some(&first) = variants.first() {
            snap.last_rendered = ctx.monitor.last_rendered(dim, pos, first);
        }

        let Some((ox, oy)) = region.pixel_offset(pos) else {
            continue;
        };
        let mut drew = false;
        for (i, &variant) in variants.iter().enumerate() {
            if !ctx.monitor.needs_render(dim, pos, variant) {
                continue;
            }
            let block = render_chunk(&snap, &lookahead, variant, colorizer);
            tiles[i].1.blit_chunk(ox, oy, &block);
            rendered[i].push(pos);
            drew = true;
        }
        if drew {
            stats.chunks_rendered += 1;
        } else {
            stats.chunks_current += 1;
        }
        lookahead.insert(snap);
    }
    Ok(RegionDraft {
        region,
        tiles,
        rendered,
    })
}

/// Writes the drafts through the cache, then records the renders at `stamp`.
/// Liveness is checked one last time first; an aborted commit changes nothing.
fn commit(
    ctx: &MappingContext,
    dim: DimensionId,
    drafts: Vec<RegionDraft>,
    stamp: u64,
    cancel: &CancelToken,
    config: &SchedulerConfig,
    stats: &mut TaskStats,
) -> Option<TaskOutcome> {
    if cancel.is_cancelled() {
        return Some(TaskOutcome::Cancelled);
    }
    if let Some(reason) = obsolete(ctx, dim) {
        return Some(TaskOutcome::Obsolete(reason));
    }
    let mut marks: Vec<(MapVariant, Vec<ChunkPos>)> = Vec::new();
    let mut tiles: Vec<(TileKey, PixelBuffer)> = Vec::new();
    for draft in drafts {
        for ((variant, pixels), chunks) in draft.tiles.into_iter().zip(draft.rendered) {
            tiles.push((TileKey::new(draft.region, variant, dim), pixels));
            marks.push((variant, chunks));
        }
    }
    match ctx.cache.put_all(tiles, config.flush_each_task) {
        Ok(report) => {
            stats.tiles_changed = report.changed;
            stats.tiles_written = report.written;
            stats.pixels_changed = report.pixels_changed;
        }
        Err(err) => {
            log::error!(target: "render", "{}: commit failed: {}", dim, err);
            return Some(TaskOutcome::Failed(err.to_string()));
        }
    }
    for (variant, chunks) in marks {
        ctx.monitor.mark_rendered(dim, variant, chunks, stamp);
    }
    None
}

/// Renders one region on the calling thread.
///
/// The cancel token and the session are checked once per chunk and again
/// before anything is committed; an aborted task leaves the cache untouched.
pub fn run_task(
    ctx: &MappingContext,
    colorizer: &dyn CellColorizer,
    item: &WorkItem,
    cancel: &CancelToken,
    config: &SchedulerConfig,
) -> TaskOutcome {
    let dim = item.dimension;
    if let Some(reason) = obsolete(ctx, dim) {
        return TaskOutcome::Obsolete(reason);
    }
    let stamp = ctx.monitor.tick();
    let variants = task_variants(item.variant);
    let mut stats = TaskStats::default();
    let draft = match draw_region(
        ctx,
        colorizer,
        dim,
        item.region,
        &variants,
        item.region.chunks(),
        cancel,
        &mut stats,
    ) {
        Ok(draft) => draft,
        Err(outcome) => return outcome,
    };
    if let Some(outcome) = commit(ctx, dim, vec![draft], stamp, cancel, config, &mut stats) {
        return outcome;
    }
    log::debug!(
        target: "render",
        "{} {} {}: {} rendered, {} current, {} missing, {} tiles changed ({} pixels)",
        dim,
        item.variant,
        item.region,
        stats.chunks_rendered,
        stats.chunks_current,
        stats.chunks_missing,
        stats.tiles_changed,
        stats.pixels_changed
    );
    TaskOutcome::Completed(stats)
}

/// Re-renders the chunks the session holds in memory around `area.center`.
///
/// Chunks not resident in the session are left alone; resident chunks whose
/// render is current are counted but not drawn.
pub fn run_area_task(
    ctx: &MappingContext,
    colorizer: &dyn CellColorizer,
    area: &AreaRequest,
    cancel: &CancelToken,
    config: &SchedulerConfig,
) -> TaskOutcome {
    let dim = area.dimension;
    if let Some(reason) = obsolete(ctx, dim) {
        return TaskOutcome::Obsolete(reason);
    }
    let stamp = ctx.monitor.tick();
    let variants = task_variants(area.variant);
    let session = ctx.session();
    let mut stats = TaskStats::default();
    let mut drafts = Vec::new();
    for region in area.regions() {
        let resident: Vec<ChunkPos> = area.chunks_in(region).filter(|&c| session.is_loaded(c)).collect();
        if resident.is_empty() {
            continue;
        }
        match draw_region(ctx, colorizer, dim, region, &variants, resident, cancel, &mut stats) {
            Ok(draft) => drafts.push(draft),
            Err(outcome) => return outcome,
        }
    }
    if stats.chunks_rendered == 0 {
        if cancel.is_cancelled() {
            return TaskOutcome::Cancelled;
        }
        return TaskOutcome::Completed(stats);
    }
    if let Some(outcome) = commit(ctx, dim, drafts, stamp, cancel, config, &mut stats) {
        return outcome;
    }
    log::debug!(
        target: "render",
        "{} {} area {} r{}: {} rendered, {} current, {} tiles changed",
        dim,
        area.variant,
        area.center,
        area.radius,
        stats.chunks_rendered,
        stats.chunks_current,
        stats.tiles_changed
    );
    TaskOutcome::Completed(stats)
}

fn run_job(
    ctx: &MappingContext,
    colorizer: &dyn CellColorizer,
    job: &RenderJob,
    cancel: &CancelToken,
    config: &SchedulerConfig,
) -> TaskOutcome {
    match job {
        RenderJob::Region(item) => run_task(ctx, colorizer, item, cancel, config),
        RenderJob::Area(area) => run_area_task(ctx, colorizer, area, cancel, config),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}

/// Background renderer that accepts at most one task at a time.
pub struct RenderScheduler {
    job_tx: Option<Sender<RenderJob>>,
    report_rx: Receiver<TaskReport>,
    busy: Arc<AtomicBool>,
    cancel: CancelToken,
    worker: Option<JoinHandle<()>>,
}

impl RenderScheduler {
    pub fn new(
        ctx: Arc<MappingContext>,
        colorizer: Arc<dyn CellColorizer>,
        config: SchedulerConfig,
    ) -> std::io::Result<Self> {
        let (job_tx, job_rx) = bounded::<RenderJob>(1);
        let (report_tx, report_rx) = unbounded::<TaskReport>();
        let busy = Arc::new(AtomicBool::new(false));
        let cancel = ctx.cancel.clone();

        let worker = {
            let busy = Arc::clone(&busy);
            let cancel = cancel.clone();
            thread::Builder::new()
                .name("mapsmith-render".to_string())
                .spawn(move || {
                    while let Ok(job) = job_rx.recv() {
                        let t0 = Instant::now();
                        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                            run_job(&ctx, colorizer.as_ref(), &job, &cancel, &config)
                        }))
                        .unwrap_or_else(|payload| {
                            let msg = panic_message(payload.as_ref());
                            log::error!(target: "render", "task for {} panicked: {}", job, msg);
                            TaskOutcome::Failed(msg)
                        });
                        // free the slot before reporting so the receiver can resubmit at once
                        busy.store(false, Ordering::Release);
                        let _ = report_tx.send(TaskReport {
                            job,
                            outcome,
                            elapsed: t0.elapsed(),
                        });
                    }
                })?
        };

        Ok(Self {
            job_tx: Some(job_tx),
            report_rx,
            busy,
            cancel,
            worker: Some(worker),
        })
    }

    /// Queues a region task unless a task is already queued or running.
    pub fn submit(&self, item: WorkItem) -> bool {
        self.submit_job(RenderJob::Region(item))
    }

    /// Queues a resident-area task unless a task is already queued or running.
    pub fn submit_area(&self, area: AreaRequest) -> bool {
        self.submit_job(RenderJob::Area(area))
    }

    pub fn submit_job(&self, job: RenderJob) -> bool {
        let Some(tx) = self.job_tx.as_ref() else {
            return false;
        };
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.cancel.reset();
        if tx.try_send(job).is_err() {
            self.busy.store(false, Ordering::Release);
            return false;
        }
        true
    }

    #[inline]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Asks the running task to stop at its next safe point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn try_recv_report(&self) -> Option<TaskReport> {
        self.report_rx.try_recv().ok()
    }

    pub fn recv_report_timeout(&self, timeout: Duration) -> Option<TaskReport> {
        self.report_rx.recv_timeout(timeout).ok()
    }

    pub fn drain_reports(&self) -> Vec<TaskReport> {
        self.report_rx.try_iter().collect()
    }

    /// Cancels any running task and joins the worker.
    pub fn shutdown(&mut self) {
        self.cancel.cancel();
        self.job_tx.take();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!(target: "render", "render worker exited by panic");
            }
        }
    }
}

impl Drop for RenderScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
