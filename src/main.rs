mod config;
mod logging;
mod palette;
mod session;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use mapsmith_chunk::ChunkDataSource;
use mapsmith_coords::{BlockPos, DimensionId, MapVariant};
use mapsmith_io::{AnvilDecoder, AnvilWorldStore, FsTileStore};
use mapsmith_monitor::ChangeMonitor;
use mapsmith_runtime::{AutoMapper, MappingContext, RegionScanner, RenderScheduler, ScanRequest};
use mapsmith_tiles::TileCache;

use crate::config::{MapsmithConfig, load_config_from_path};
use crate::palette::DefaultColorizer;
use crate::session::OfflineSession;

#[derive(Parser)]
#[command(name = "mapsmith", about = "Render region map tiles from a world save")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render every region that is missing or stale
    Render(RunArgs),
    /// List the regions a render would visit, nearest first
    Scan(RunArgs),
}

#[derive(Args, Clone, Debug)]
struct RunArgs {
    /// World save directory (the one holding `region/`)
    #[arg(long)]
    world: Option<PathBuf>,
    /// Tile output directory
    #[arg(long)]
    tiles: Option<PathBuf>,
    /// Dimension id: 0 overworld, -1 nether, 1 end
    #[arg(long, allow_hyphen_values = true)]
    dimension: Option<i32>,
    /// day, night, topo or slice:N; repeatable
    #[arg(long = "variant")]
    variants: Vec<MapVariant>,
    /// Render every region, including ones with an up-to-date tile
    #[arg(long)]
    all: bool,
    /// Block x,z whose region is rendered first
    #[arg(long, value_parser = parse_center, allow_hyphen_values = true)]
    center: Option<BlockPos>,
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// error, warn, info, debug or trace
    #[arg(long)]
    log_level: Option<String>,
}

fn parse_center(s: &str) -> Result<BlockPos, String> {
    let (x, z) = s
        .split_once(',')
        .ok_or_else(|| format!("expected x,z but got '{}'", s))?;
    let x: i32 = x.trim().parse().map_err(|e| format!("bad x '{}': {}", x, e))?;
    let z: i32 = z.trim().parse().map_err(|e| format!("bad z '{}': {}", z, e))?;
    Ok(BlockPos::new(x, 64, z))
}

/// Settings after merging the config file with command-line overrides.
struct Plan {
    world: PathBuf,
    tiles: PathBuf,
    dimension: DimensionId,
    variants: Vec<MapVariant>,
    include_all: bool,
    center: BlockPos,
    cfg: MapsmithConfig,
}

fn plan(args: &RunArgs) -> Result<Plan, Box<dyn Error>> {
    let cfg = match &args.config {
        Some(path) => load_config_from_path(path)
            .map_err(|e| format!("cannot load config {}: {}", path.display(), e))?,
        None => MapsmithConfig::default(),
    };
    let level = logging::parse_level(args.log_level.as_deref().unwrap_or(cfg.log.level.as_str()))?;
    logging::init_logging(level, cfg.log.file.as_deref())?;

    let world = args
        .world
        .clone()
        .or_else(|| cfg.world.path.clone())
        .ok_or("no world directory given (use --world or [world] path)")?;
    let tiles = args
        .tiles
        .clone()
        .or_else(|| cfg.tiles.path.clone())
        .unwrap_or_else(|| world.join("mapsmith"));
    let variants = if args.variants.is_empty() {
        cfg.scan.map_variants()?
    } else {
        args.variants.clone()
    };
    Ok(Plan {
        world,
        tiles,
        dimension: DimensionId(args.dimension.unwrap_or(cfg.world.dimension)),
        variants,
        include_all: args.all || cfg.scan.include_all,
        center: args.center.unwrap_or(BlockPos::new(0, 64, 0)),
        cfg,
    })
}

fn context(plan: &Plan) -> Arc<MappingContext> {
    let source = ChunkDataSource::new(
        Arc::new(OfflineSession::new(plan.dimension)),
        Arc::new(AnvilWorldStore::new(&plan.world)),
        Arc::new(AnvilDecoder::new()),
    );
    let monitor = Arc::new(ChangeMonitor::new());
    monitor.attach(plan.dimension);
    let cache = Arc::new(TileCache::new(
        Arc::new(FsTileStore::new(&plan.tiles)),
        plan.cfg.cache.to_cache_config(),
    ));
    Arc::new(MappingContext::new(source, monitor, cache))
}

fn request(plan: &Plan, variant: MapVariant) -> ScanRequest {
    ScanRequest {
        dimension: plan.dimension,
        variant,
        reference: plan.center,
        include_all: plan.include_all,
    }
}

fn scan(plan: &Plan) -> Result<(), Box<dyn Error>> {
    let ctx = context(plan);
    let scanner = RegionScanner::new(ctx);
    for &variant in &plan.variants {
        let queue = scanner.scan(&request(plan, variant));
        println!("{} {}: {} regions", plan.dimension, variant, queue.len());
        for item in queue.iter() {
            println!("  {}\t{}", item.region, item.priority);
        }
    }
    Ok(())
}

fn render(plan: &Plan) -> Result<(), Box<dyn Error>> {
    let ctx = context(plan);
    let poll_delay = Duration::from_millis(plan.cfg.automap.poll_delay_ms);
    log::info!(
        "rendering {} of {} into {}",
        plan.dimension,
        plan.world.display(),
        plan.tiles.display()
    );
    let mut failed = 0;
    for &variant in &plan.variants {
        let scheduler = RenderScheduler::new(
            Arc::clone(&ctx),
            Arc::new(DefaultColorizer::default()),
            plan.cfg.automap.to_scheduler_config(),
        )?;
        let mut auto = AutoMapper::new(Arc::clone(&ctx), scheduler, poll_delay);
        if auto.start(&request(plan, variant)) == 0 {
            println!("{} {}: nothing to render", plan.dimension, variant);
            continue;
        }
        let totals = auto.run_to_completion();
        failed += auto.failed();
        println!(
            "{} {}: {} chunks rendered, {} missing, {} tiles written",
            plan.dimension, variant, totals.chunks_rendered, totals.chunks_missing, totals.tiles_written
        );
    }
    let stats = ctx.source.stats();
    log::info!(
        "chunk reads: {} from disk, {} unavailable, {} errors",
        stats.store_hits,
        stats.unavailable,
        stats.errors
    );
    if failed > 0 {
        return Err(format!("{} region task(s) failed", failed).into());
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let result = match &cli.command {
        Command::Render(args) => plan(args).and_then(|p| render(&p)),
        Command::Scan(args) => plan(args).and_then(|p| scan(&p)),
    };
    if let Err(err) = result {
        eprintln!("mapsmith: {}", err);
        std::process::exit(1);
    }
}
