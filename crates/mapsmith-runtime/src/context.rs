use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mapsmith_chunk::{ChunkDataSource, LiveSession, WorldStore};
use mapsmith_monitor::ChangeMonitor;
use mapsmith_tiles::TileCache;

/// Cooperative cancellation flag shared between the submitter and the worker.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    #[inline]
    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Everything a mapping session shares between scanner, scheduler and event hooks.
/// Built once per session; dropped when the session ends.
pub struct MappingContext {
    pub source: ChunkDataSource,
    pub monitor: Arc<ChangeMonitor>,
    pub cache: Arc<TileCache>,
    pub cancel: CancelToken,
}

impl MappingContext {
    pub fn new(source: ChunkDataSource, monitor: Arc<ChangeMonitor>, cache: Arc<TileCache>) -> Self {
        Self {
            source,
            monitor,
            cache,
            cancel: CancelToken::new(),
        }
    }

    #[inline]
    pub fn session(&self) -> &Arc<dyn LiveSession> {
        self.source.session()
    }

    #[inline]
    pub fn world(&self) -> &Arc<dyn WorldStore> {
        self.source.store()
    }
}
