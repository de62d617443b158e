use mapsmith_coords::MapVariant;
use mapsmith_runtime::{CellColorizer, ColumnSample, NeighborContext};
use mapsmith_tiles::Rgba;

/// Built-in block colouring for offline renders.
#[derive(Clone, Debug)]
pub struct DefaultColorizer {
    pub sea_level: i32,
    pub world_top: i32,
    /// Height step between topo contour lines.
    pub contour_step: i32,
}

impl Default for DefaultColorizer {
    fn default() -> Self {
        Self {
            sea_level: 62,
            world_top: 320,
            contour_step: 16,
        }
    }
}

impl CellColorizer for DefaultColorizer {
    fn color_of(
        &self,
        sample: &ColumnSample<'_>,
        neighbors: &NeighborContext,
        variant: MapVariant,
    ) -> Rgba {
        let rgb = match variant {
            MapVariant::Topo => self.topo_color(sample),
            MapVariant::Day => scale(surface_color(sample), slope(sample, neighbors)),
            MapVariant::Night => {
                let lit = scale(surface_color(sample), slope(sample, neighbors));
                scale(lit, night_factor(sample))
            }
            MapVariant::Underground { .. } => {
                let base = scale(surface_color(sample), slope(sample, neighbors));
                let light = 0.35 + 0.65 * f32::from(sample.block_light) / 15.0;
                scale(base, light)
            }
        };
        [rgb[0], rgb[1], rgb[2], 255]
    }
}

impl DefaultColorizer {
    fn topo_color(&self, sample: &ColumnSample<'_>) -> [u8; 3] {
        let rgb = if sample.water_depth > 0 {
            height_color(sample.y - sample.water_depth as i32, self.sea_level, self.world_top)
        } else {
            height_color(sample.y, self.sea_level, self.world_top)
        };
        if self.contour_step > 0 && sample.y.rem_euclid(self.contour_step) == 0 {
            scale(rgb, 0.6)
        } else {
            rgb
        }
    }
}

/// Relative brightness from the north and west neighbours: lit slopes face north-west.
fn slope(sample: &ColumnSample<'_>, neighbors: &NeighborContext) -> f32 {
    let here = sample.y;
    let diffs: Vec<i32> = [neighbors.north, neighbors.west, neighbors.north_west]
        .into_iter()
        .flatten()
        .map(|h| here - h)
        .collect();
    if diffs.is_empty() {
        return 1.0;
    }
    let avg = diffs.iter().sum::<i32>() as f32 / diffs.len() as f32;
    (1.0 + avg * 0.08).clamp(0.7, 1.2)
}

fn night_factor(sample: &ColumnSample<'_>) -> f32 {
    let sky = f32::from(sample.sky_light) / 15.0 * 0.25;
    let block = f32::from(sample.block_light) / 15.0;
    (0.15 + sky.max(block) * 0.85).min(1.0)
}

fn surface_color(sample: &ColumnSample<'_>) -> [u8; 3] {
    let floor = block_color(sample.block);
    if sample.water_depth == 0 {
        return floor;
    }
    let depth = (sample.water_depth as f32 / 12.0).clamp(0.0, 1.0);
    let water = [lerp(40, 10, depth), lerp(110, 50, depth), lerp(200, 140, depth)];
    lerp_color(floor, water, 0.55 + 0.45 * depth)
}

fn block_color(name: &str) -> [u8; 3] {
    let short = name.strip_prefix("minecraft:").unwrap_or(name);
    match short {
        "grass_block" | "grass" | "tall_grass" | "fern" => [91, 139, 50],
        "dirt" | "coarse_dirt" | "rooted_dirt" | "farmland" | "dirt_path" => [134, 96, 67],
        "sand" | "sandstone" => [219, 207, 163],
        "red_sand" | "red_sandstone" => [190, 102, 33],
        "gravel" => [136, 126, 126],
        "stone" | "cobblestone" | "andesite" | "tuff" => [125, 125, 125],
        "deepslate" | "cobbled_deepslate" => [80, 80, 82],
        "granite" => [149, 103, 85],
        "diorite" => [188, 188, 188],
        "snow" | "snow_block" | "powder_snow" => [245, 245, 250],
        "ice" | "packed_ice" | "blue_ice" => [160, 188, 245],
        "water" | "bubble_column" => [40, 110, 200],
        "lava" => [210, 90, 20],
        "clay" => [160, 166, 179],
        "netherrack" => [110, 53, 51],
        "soul_sand" | "soul_soil" => [81, 62, 50],
        "basalt" | "blackstone" => [60, 58, 62],
        "end_stone" => [219, 222, 158],
        "bedrock" => [60, 60, 65],
        "mycelium" => [111, 98, 101],
        "podzol" => [91, 63, 24],
        _ if short.ends_with("_leaves") => [60, 110, 40],
        _ if short.ends_with("_log") || short.ends_with("_wood") => [102, 81, 51],
        _ if short.ends_with("_planks") => [162, 130, 78],
        _ if short.ends_with("_ore") => [120, 120, 120],
        _ => hash_color(short),
    }
}

fn height_color(height: i32, water_level: i32, world_height: i32) -> [u8; 3] {
    if height <= water_level {
        let depth = (water_level - height).max(0) as f32;
        let d_norm = (depth / water_level.max(1) as f32).clamp(0.0, 1.0);
        [0, lerp(90, 30, d_norm), lerp(200, 110, d_norm)]
    } else {
        let above = (height - water_level) as f32;
        let span = (world_height - water_level).max(1) as f32;
        let t = (above / span).clamp(0.0, 1.0);
        if t < 0.33 {
            lerp_color([34, 139, 34], [107, 142, 35], t / 0.33)
        } else if t < 0.66 {
            lerp_color([107, 142, 35], [139, 69, 19], (t - 0.33) / 0.33)
        } else {
            lerp_color([139, 69, 19], [245, 245, 245], (t - 0.66) / 0.34)
        }
    }
}

#[inline]
fn lerp(a: u8, b: u8, t: f32) -> u8 {
    (a as f32 + (b as f32 - a as f32) * t)
        .round()
        .clamp(0.0, 255.0) as u8
}

fn lerp_color(a: [u8; 3], b: [u8; 3], t: f32) -> [u8; 3] {
    [lerp(a[0], b[0], t), lerp(a[1], b[1], t), lerp(a[2], b[2], t)]
}

fn scale(c: [u8; 3], f: f32) -> [u8; 3] {
    c.map(|v| (v as f32 * f).round().clamp(0.0, 255.0) as u8)
}

fn hash_color(name: &str) -> [u8; 3] {
    let mut hash = 0u32;
    for b in name.as_bytes() {
        hash = hash.wrapping_mul(31).wrapping_add(u32::from(*b));
    }
    [
        (hash & 0xFF) as u8,
        ((hash >> 8) & 0xFF) as u8,
        ((hash >> 16) & 0xFF) as u8,
    ]
}
