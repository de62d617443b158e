//! Region scanning, single-flight background rendering and auto-mapping.
#![forbid(unsafe_code)]

mod automap;
mod context;
mod render;
mod scan;
mod scheduler;

pub use automap::{AutoMapState, AutoMapper};
pub use context::{CancelToken, MappingContext};
pub use render::{
    CellColorizer, ChunkLookahead, ColumnSample, NeighborContext, render_chunk, sample_column,
    task_variants,
};
pub use scan::{RegionScanner, ScanRequest, WorkItem, WorkQueue};
pub use scheduler::{
    AreaRequest, ObsoleteReason, RenderJob, RenderScheduler, SchedulerConfig, TaskOutcome,
    TaskReport, TaskStats, run_area_task, run_task,
};
