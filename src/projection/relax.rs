//! Collision relaxation of projected points.
//!
//! Each point is a card-sized rectangle on a virtual pixel canvas. A fixed
//! number of simulation ticks pushes overlapping rectangles apart while a weak
//! spring pulls every point back towards its projected position. The tick
//! budget is the only stop condition.
//!
//! Tick (velocity Verlet, as in d3-force):
//!
//! ```text
//! alpha += (0 - alpha) * alpha_decay
//! collide:  for each overlapping pair, push apart along the shallower axis
//! anchor:   v += (target - x) * anchor_strength * alpha
//! x += v *= (1 - velocity_decay)
//! ```

use serde::{Deserialize, Serialize};

/// Alpha decays from 1 to this value over 300 ticks.
const ALPHA_MIN: f64 = 0.001;
const ALPHA_DECAY_TICKS: f64 = 300.0;

/// Relaxation parameters. Card sizes are in virtual pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaxConfig {
    pub card_width: f64,
    pub card_height: f64,
    pub card_padding: f64,
    pub ticks: usize,
    pub collision_strength: f64,
    /// Collision passes per tick.
    pub collision_iterations: usize,
    pub anchor_strength: f64,
    pub velocity_decay: f64,
    /// Canvas area multiplier over the summed card area.
    pub breathing_room: f64,
    /// Width / height of the virtual canvas.
    pub aspect_ratio: f64,
    /// Margin of the final re-normalisation, in unit-square units.
    pub edge_padding: f64,
}

impl Default for RelaxConfig {
    fn default() -> Self {
        Self {
            card_width: 180.0,
            card_height: 44.0,
            card_padding: 8.0,
            ticks: 150,
            collision_strength: 0.8,
            collision_iterations: 2,
            anchor_strength: 0.1,
            velocity_decay: 0.4,
            breathing_room: 1.8,
            aspect_ratio: 1.5,
            edge_padding: 0.02,
        }
    }
}

impl RelaxConfig {
    /// Virtual canvas `(width, height)` that fits `count` cards with room
    /// to spare.
    pub fn virtual_canvas(&self, count: usize) -> (f64, f64) {
        let card_area =
            (self.card_width + self.card_padding) * (self.card_height + self.card_padding);
        let total = count as f64 * card_area * self.breathing_room;
        let height = (total / self.aspect_ratio).sqrt();
        (height * self.aspect_ratio, height)
    }

    fn half_extent(&self) -> (f64, f64) {
        (
            (self.card_width + self.card_padding) / 2.0,
            (self.card_height + self.card_padding) / 2.0,
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct Particle {
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
    target_x: f64,
    target_y: f64,
}

/// Deterministic tiny nudge for exactly coincident centres.
fn jiggle(i: usize, j: usize) -> f64 {
    if (i + j) % 2 == 0 {
        1e-6
    } else {
        -1e-6
    }
}

fn collide(particles: &mut [Particle], half_w: f64, half_h: f64, strength: f64) {
    let n = particles.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let a = particles[i];
            let b = particles[j];
            let mut dx = (b.x + b.vx) - (a.x + a.vx);
            let mut dy = (b.y + b.vy) - (a.y + a.vy);
            if dx == 0.0 {
                dx = jiggle(i, j);
            }
            if dy == 0.0 {
                dy = jiggle(j, i + 1);
            }

            let overlap_x = 2.0 * half_w - dx.abs();
            let overlap_y = 2.0 * half_h - dy.abs();
            if overlap_x <= 0.0 || overlap_y <= 0.0 {
                continue;
            }

            if overlap_x < overlap_y {
                let push = overlap_x * strength / 2.0 * dx.signum();
                particles[i].vx -= push;
                particles[j].vx += push;
            } else {
                let push = overlap_y * strength / 2.0 * dy.signum();
                particles[i].vy -= push;
                particles[j].vy += push;
            }
        }
    }
}

/// Relax normalized points in place on a `width` x `height` virtual canvas.
///
/// Points come in and go out in unit-square coordinates (not re-normalized).
pub fn relax(points: &mut [[f64; 2]], width: f64, height: f64, config: &RelaxConfig) {
    if points.len() < 2 || width <= 0.0 || height <= 0.0 {
        return;
    }

    let (half_w, half_h) = config.half_extent();
    let mut particles: Vec<Particle> = points
        .iter()
        .map(|p| Particle {
            x: p[0] * width,
            y: p[1] * height,
            vx: 0.0,
            vy: 0.0,
            target_x: p[0] * width,
            target_y: p[1] * height,
        })
        .collect();

    let alpha_decay = 1.0 - ALPHA_MIN.powf(1.0 / ALPHA_DECAY_TICKS);
    let mut alpha = 1.0f64;
    let keep = 1.0 - config.velocity_decay;

    for _ in 0..config.ticks {
        alpha += -alpha * alpha_decay;

        for _ in 0..config.collision_iterations {
            collide(&mut particles, half_w, half_h, config.collision_strength);
        }

        for p in particles.iter_mut() {
            p.vx += (p.target_x - p.x) * config.anchor_strength * alpha;
            p.vy += (p.target_y - p.y) * config.anchor_strength * alpha;
            p.vx *= keep;
            p.vy *= keep;
            p.x += p.vx;
            p.y += p.vy;
        }
    }

    for (point, p) in points.iter_mut().zip(&particles) {
        point[0] = p.x / width;
        point[1] = p.y / height;
    }
}

/// Min/max normalize to `[padding, 1 - padding]` per axis.
///
/// A zero-range axis is treated as range 1.
pub fn renormalize(points: &mut [[f64; 2]], padding: f64) {
    if points.is_empty() {
        return;
    }

    let span = 1.0 - 2.0 * padding;
    for axis in 0..2 {
        let (min, max) = points
            .iter()
            .map(|p| p[axis])
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        let range = if max - min > 0.0 { max - min } else { 1.0 };
        for p in points.iter_mut() {
            p[axis] = padding + (p[axis] - min) / range * span;
        }
    }
}
