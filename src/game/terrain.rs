//! Destructible heightmap terrain: generation, spawn selection, collision and craters

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::physics::Vec2;

/// Tank resting point sits this far above the surface
pub const TANK_REST_OFFSET: f32 = 5.0;
/// Horizontal distance used when measuring slope at a column
const SLOPE_PROBE: usize = 10;
/// Columns skipped at each end of a spawn zone
const ZONE_PADDING: usize = 50;
/// Base sampling frequency of the first noise octave
const BASE_FREQUENCY: f64 = 0.005;

/// Parameters for procedural terrain generation
#[derive(Debug, Clone, Copy)]
pub struct TerrainParams {
    pub width: usize,
    pub height: f32,
    pub seed: u64,
    pub octaves: u32,
    pub persistence: f64,
    /// Lowest surface as a fraction of playfield height
    pub min_height_frac: f32,
    /// Highest surface as a fraction of playfield height
    pub max_height_frac: f32,
}

impl TerrainParams {
    pub fn new(width: usize, height: f32, seed: u64) -> Self {
        Self {
            width,
            height,
            seed,
            octaves: 4,
            persistence: 0.5,
            min_height_frac: 0.2,
            max_height_frac: 0.6,
        }
    }
}

/// How a crater removes material
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CraterShape {
    /// Round crater, depth equal to the radius
    Standard,
    /// Deep narrow crater: depth tapers away from the center and reaches
    /// twice as far below the impact as a standard crater
    Burrow,
}

/// 1D gradient noise with a seeded permutation table
struct GradientNoise {
    permutation: [u8; 512],
}

impl GradientNoise {
    fn new(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut table: Vec<u8> = (0..=255).collect();
        table.shuffle(&mut rng);

        let mut permutation = [0u8; 512];
        for (i, slot) in permutation.iter_mut().enumerate() {
            *slot = table[i & 255];
        }
        Self { permutation }
    }

    fn fade(t: f64) -> f64 {
        t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
    }

    fn grad(hash: u8, x: f64) -> f64 {
        if hash & 1 == 0 {
            x
        } else {
            -x
        }
    }

    fn sample(&self, x: f64) -> f64 {
        let cell = x.floor();
        let index = (cell as i64 & 255) as usize;
        let local = x - cell;
        let u = Self::fade(local);

        let a = self.permutation[index] as usize;
        let b = self.permutation[index + 1] as usize;

        let left = Self::grad(self.permutation[a], local);
        let right = Self::grad(self.permutation[b], local - 1.0);
        left + u * (right - left)
    }
}

/// Heightmap terrain, one surface height per playfield column
///
/// Heights are measured upward from the bottom of the playfield; screen
/// y for a column's surface is `height - heights[x]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Terrain {
    heights: Vec<f32>,
    height: f32,
}

impl Terrain {
    pub fn from_heights(heights: Vec<f32>, height: f32) -> Self {
        let heights = heights.into_iter().map(|h| h.clamp(0.0, height)).collect();
        Self { heights, height }
    }

    /// Flat terrain with every column at `surface` height
    pub fn flat(width: usize, height: f32, surface: f32) -> Self {
        Self::from_heights(vec![surface; width], height)
    }

    /// Layered noise heightmap, smoothed once
    pub fn generate(params: &TerrainParams) -> Self {
        let raw = Self::generate_heights(params);
        Self::from_heights(Self::smooth(&raw, 3), params.height)
    }

    /// Raw octave noise rescaled into the configured height band
    pub fn generate_heights(params: &TerrainParams) -> Vec<f32> {
        let noise = GradientNoise::new(params.seed);
        let band = (params.max_height_frac - params.min_height_frac) as f64;

        (0..params.width)
            .map(|x| {
                let mut amplitude = 1.0;
                let mut frequency = BASE_FREQUENCY;
                let mut total = 0.0;

                for _ in 0..params.octaves {
                    total += noise.sample(x as f64 * frequency) * amplitude;
                    amplitude *= params.persistence;
                    frequency *= 2.0;
                }

                let normalized = ((total + 1.0) / 2.0).clamp(0.0, 1.0);
                let fraction = normalized * band + params.min_height_frac as f64;
                (fraction * params.height as f64).floor() as f32
            })
            .collect()
    }

    /// Moving average over `window` columns on each side, floored
    pub fn smooth(heights: &[f32], window: usize) -> Vec<f32> {
        (0..heights.len())
            .map(|i| {
                let start = i.saturating_sub(window);
                let end = (i + window).min(heights.len().saturating_sub(1));
                let slice = &heights[start..=end];
                (slice.iter().sum::<f32>() / slice.len() as f32).floor()
            })
            .collect()
    }

    pub fn width(&self) -> usize {
        self.heights.len()
    }

    /// Playfield height in pixels
    pub fn playfield_height(&self) -> f32 {
        self.height
    }

    pub fn heights(&self) -> &[f32] {
        &self.heights
    }

    fn column(&self, x: f32) -> Option<usize> {
        let xi = x.floor();
        if xi < 0.0 || xi >= self.heights.len() as f32 {
            None
        } else {
            Some(xi as usize)
        }
    }

    /// Surface height of the column containing `x` (0 outside the playfield)
    pub fn height_at(&self, x: f32) -> f32 {
        self.column(x).map(|c| self.heights[c]).unwrap_or(0.0)
    }

    /// Screen y of the surface at `x`
    pub fn surface_y(&self, x: f32) -> f32 {
        self.height - self.height_at(x)
    }

    /// True if the point is inside the ground or outside the playfield columns
    pub fn check_collision(&self, x: f32, y: f32) -> bool {
        match self.column(x) {
            Some(c) => y >= self.height - self.heights[c],
            None => true,
        }
    }

    /// Remove material around an impact point
    ///
    /// Heights only ever decrease. For each affected column the deepest
    /// destroyed point is found analytically and the surface is lowered to
    /// that point minus the crater depth.
    pub fn carve(&mut self, center: Vec2, radius: f32, shape: CraterShape) {
        if radius <= 0.0 {
            return;
        }

        let xi = center.x.floor() as i64;
        let yi = center.y.floor();
        let reach = radius.floor() as i64;

        for dx in -reach..=reach {
            let px = xi + dx;
            if px < 0 || px >= self.heights.len() as i64 {
                continue;
            }
            let px = px as usize;
            let dxf = dx as f32;
            let span = (radius * radius - dxf * dxf).max(0.0).sqrt();

            let (lowest_dy, depth) = match shape {
                CraterShape::Standard => (span.floor(), radius),
                CraterShape::Burrow => {
                    let multiplier = 1.5 - dxf.abs() / radius;
                    ((2.0 * span).floor().min(radius.floor()), radius * multiplier)
                }
            };

            let surface = self.height - self.heights[px];
            let destroy_y = (yi + lowest_dy).min(surface);
            if destroy_y < 0.0 {
                continue;
            }

            let new_height = (self.height - destroy_y - depth).max(0.0);
            if new_height < self.heights[px] {
                self.heights[px] = new_height;
            }
        }
    }

    /// Choose one flat spawn column per player
    ///
    /// The usable width (minus `margin` on both sides) is split into equal
    /// zones. Within each zone the column with the smallest slope is picked,
    /// preferring columns at least `min_separation` from the previous spawn.
    pub fn find_spawn_positions(
        &self,
        player_count: usize,
        margin: usize,
        min_separation: f32,
    ) -> Vec<Vec2> {
        let width = self.heights.len();
        if player_count == 0 || width == 0 {
            return Vec::new();
        }

        let margin = margin.min(width / 4);
        let usable = width.saturating_sub(margin * 2);
        let zone_width = usable as f32 / player_count as f32;

        let mut positions: Vec<Vec2> = Vec::with_capacity(player_count);

        for i in 0..player_count {
            let zone_start = margin + (zone_width * i as f32).floor() as usize;
            let zone_end = (margin + (zone_width * (i + 1) as f32).floor() as usize).min(width);
            let zone_mid = ((zone_start + zone_end) / 2).min(width - 1);

            let scan_start = (zone_start + ZONE_PADDING).max(SLOPE_PROBE);
            let scan_end = zone_end
                .saturating_sub(ZONE_PADDING)
                .min(width.saturating_sub(SLOPE_PROBE));

            let previous_x = positions.last().map(|p| p.x);
            let mut best: Option<(usize, f32)> = None;
            let mut best_separated: Option<(usize, f32)> = None;

            for x in scan_start..scan_end {
                let slope = (self.heights[x + SLOPE_PROBE] - self.heights[x - SLOPE_PROBE]).abs();

                if best.map_or(true, |(_, s)| slope < s) {
                    best = Some((x, slope));
                }

                let separated =
                    previous_x.map_or(true, |px| (x as f32 - px).abs() >= min_separation);
                if separated && best_separated.map_or(true, |(_, s)| slope < s) {
                    best_separated = Some((x, slope));
                }
            }

            let column = best_separated.or(best).map(|(x, _)| x).unwrap_or(zone_mid);
            let x = column as f32;
            positions.push(Vec2::new(x, self.surface_y(x) - TANK_REST_OFFSET));
        }

        positions
    }
}
