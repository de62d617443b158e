use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::context::MappingContext;
use crate::scan::{RegionScanner, ScanRequest, WorkItem, WorkQueue};
use crate::scheduler::{AreaRequest, RenderJob, RenderScheduler, TaskOutcome, TaskReport, TaskStats};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AutoMapState {
    /// Not started, stopped, or already finished.
    Idle,
    /// A submitted task has not reported yet.
    Busy,
    /// The scheduler is free but the poll delay has not elapsed.
    Waiting,
    Submitted(WorkItem),
    /// No region work is queued, so the followed area was re-rendered.
    AreaSubmitted(AreaRequest),
    /// The queue drained on this tick; the cache was flushed and cleared.
    Finished,
}

/// Feeds a scanned queue to the scheduler one region at a time.
///
/// A followed area (usually the chunks around the player) shares the same
/// scheduler: it is re-rendered every `area_delay` while no region work is queued.
pub struct AutoMapper {
    ctx: Arc<MappingContext>,
    scanner: RegionScanner,
    scheduler: RenderScheduler,
    queue: WorkQueue,
    poll_delay: Duration,
    last_completed: Option<Instant>,
    in_flight: bool,
    enabled: bool,
    totals: TaskStats,
    failed: usize,
    area: Option<AreaRequest>,
    area_delay: Duration,
    last_area: Option<Instant>,
    area_passes: usize,
}

impl AutoMapper {
    pub fn new(ctx: Arc<MappingContext>, scheduler: RenderScheduler, poll_delay: Duration) -> Self {
        Self {
            scanner: RegionScanner::new(Arc::clone(&ctx)),
            ctx,
            scheduler,
            queue: WorkQueue::default(),
            poll_delay,
            last_completed: None,
            in_flight: false,
            enabled: false,
            totals: TaskStats::default(),
            failed: 0,
            area: None,
            area_delay: Duration::ZERO,
            last_area: None,
            area_passes: 0,
        }
    }

    /// Re-renders `area` every `every` whenever no region work is queued.
    /// Calling it again moves the area without resetting its timer.
    pub fn follow(&mut self, area: AreaRequest, every: Duration) {
        self.area = Some(area);
        self.area_delay = every;
    }

    pub fn unfollow(&mut self) {
        self.area = None;
    }

    #[inline]
    pub fn following(&self) -> Option<AreaRequest> {
        self.area
    }

    /// Completed area passes since construction.
    pub fn area_passes(&self) -> usize {
        self.area_passes
    }

    /// Scans and arms the mapper. Returns the number of regions queued.
    pub fn start(&mut self, req: &ScanRequest) -> usize {
        self.queue = self.scanner.scan(req);
        self.last_completed = None;
        self.totals = TaskStats::default();
        self.failed = 0;
        let found = self.queue.found();
        self.enabled = found > 0;
        if self.enabled {
            log::info!(target: "automap", "auto-mapping {} regions of {} {}", found, req.dimension, req.variant);
        }
        found
    }

    pub fn tick(&mut self, now: Instant) -> AutoMapState {
        for report in self.scheduler.drain_reports() {
            self.absorb(report, now);
        }
        if !self.enabled && self.area.is_none() {
            return AutoMapState::Idle;
        }
        match self.ctx.cache.maintain(now) {
            Ok(r) if r.flushed > 0 || r.expired > 0 => {
                log::debug!(target: "automap", "cache upkeep: {} flushed, {} expired", r.flushed, r.expired);
            }
            Ok(_) => {}
            Err(err) => log::error!(target: "automap", "cache upkeep failed: {}", err),
        }
        if self.in_flight {
            return AutoMapState::Busy;
        }
        if self.enabled {
            self.tick_regions(now)
        } else {
            self.tick_area(now)
        }
    }

    fn tick_regions(&mut self, now: Instant) -> AutoMapState {
        let Some(item) = self.queue.peek().copied() else {
            self.finish();
            return AutoMapState::Finished;
        };
        if let Some(done) = self.last_completed {
            if now.saturating_duration_since(done) < self.poll_delay {
                return AutoMapState::Waiting;
            }
        }
        if !self.scheduler.submit(item) {
            return AutoMapState::Waiting;
        }
        self.queue.pop();
        self.in_flight = true;
        log::info!(
            target: "automap",
            "rendering {} ({:.0}% done, {} left)",
            item.region,
            self.queue.progress(),
            self.queue.len()
        );
        AutoMapState::Submitted(item)
    }

    fn tick_area(&mut self, now: Instant) -> AutoMapState {
        let Some(area) = self.area else {
            return AutoMapState::Idle;
        };
        if let Some(done) = self.last_area {
            if now.saturating_duration_since(done) < self.area_delay {
                return AutoMapState::Waiting;
            }
        }
        if !self.scheduler.submit_area(area) {
            return AutoMapState::Waiting;
        }
        self.in_flight = true;
        AutoMapState::AreaSubmitted(area)
    }

    /// Blocks on the scheduler until the queue is done. Used by offline runs.
    pub fn run_to_completion(&mut self) -> TaskStats {
        while self.enabled || self.in_flight {
            match self.tick(Instant::now()) {
                AutoMapState::Idle | AutoMapState::Finished => break,
                AutoMapState::Busy => {
                    if let Some(report) = self.scheduler.recv_report_timeout(Duration::from_millis(250)) {
                        self.absorb(report, Instant::now());
                    }
                }
                AutoMapState::Waiting => std::thread::sleep(self.poll_delay.min(Duration::from_millis(50))),
                AutoMapState::Submitted(_) | AutoMapState::AreaSubmitted(_) => {}
            }
        }
        self.totals
    }

    /// Cancels the running task, drops the queue and flushes what was rendered.
    pub fn stop(&mut self) {
        if !self.enabled {
            return;
        }
        self.enabled = false;
        self.scheduler.cancel();
        self.queue = WorkQueue::default();
        if let Err(err) = self.ctx.cache.flush_to_disk(false) {
            log::error!(target: "automap", "flush on stop failed: {}", err);
        }
        log::info!(target: "automap", "auto-mapping stopped");
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn progress(&self) -> f32 {
        self.queue.progress()
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    /// Sum of the stats of every completed task since `start`.
    pub fn totals(&self) -> TaskStats {
        self.totals
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn scheduler(&self) -> &RenderScheduler {
        &self.scheduler
    }

    fn absorb(&mut self, report: TaskReport, now: Instant) {
        self.in_flight = false;
        match report.job {
            RenderJob::Region(item) => self.absorb_region(item, report.outcome, report.elapsed, now),
            RenderJob::Area(area) => {
                self.last_area = Some(now);
                match report.outcome {
                    TaskOutcome::Completed(stats) => {
                        self.area_passes += 1;
                        log::trace!(
                            target: "automap",
                            "area {} done in {:?}: {} rendered, {} current",
                            area.center,
                            report.elapsed,
                            stats.chunks_rendered,
                            stats.chunks_current
                        );
                    }
                    TaskOutcome::Obsolete(reason) => {
                        log::debug!(target: "automap", "area {} obsolete ({}), unfollowing", area.center, reason);
                        if self.area == Some(area) {
                            self.area = None;
                        }
                    }
                    TaskOutcome::Cancelled => {}
                    TaskOutcome::Failed(msg) => {
                        self.failed += 1;
                        log::error!(target: "automap", "area {} failed: {}", area.center, msg);
                    }
                }
            }
        }
    }

    fn absorb_region(&mut self, item: WorkItem, outcome: TaskOutcome, elapsed: Duration, now: Instant) {
        self.last_completed = Some(now);
        match outcome {
            TaskOutcome::Completed(stats) => {
                self.totals.chunks_rendered += stats.chunks_rendered;
                self.totals.chunks_current += stats.chunks_current;
                self.totals.chunks_missing += stats.chunks_missing;
                self.totals.tiles_changed += stats.tiles_changed;
                self.totals.tiles_written += stats.tiles_written;
                self.totals.pixels_changed += stats.pixels_changed;
                log::debug!(target: "automap", "{} done in {:?}", item.region, elapsed);
            }
            TaskOutcome::Obsolete(reason) => {
                log::info!(target: "automap", "{} obsolete ({}), stopping", item.region, reason);
                self.stop();
            }
            TaskOutcome::Cancelled => {
                log::debug!(target: "automap", "{} cancelled", item.region);
            }
            TaskOutcome::Failed(msg) => {
                self.failed += 1;
                log::error!(target: "automap", "{} failed: {}", item.region, msg);
            }
        }
    }

    fn finish(&mut self) {
        self.enabled = false;
        if let Err(err) = self.ctx.cache.clear(true) {
            log::error!(target: "automap", "final tile flush failed: {}", err);
        }
        self.ctx.monitor.compact();
        log::info!(
            target: "automap",
            "auto-mapping finished: {} chunks rendered, {} tiles written, {} failed",
            self.totals.chunks_rendered,
            self.totals.tiles_written,
            self.failed
        );
    }
}
