//! Projectile physics: trajectory integration, splash falloff and wind

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Default downward acceleration in pixels per second squared
pub const DEFAULT_GRAVITY: f32 = 980.0;
/// Integration timestep in seconds
pub const DEFAULT_DT: f32 = 0.016;
/// Launch speed at power 100
pub const MAX_LAUNCH_SPEED: f32 = 800.0;
/// Longest simulated flight
pub const MAX_FLIGHT_SECS: f32 = 10.0;
/// Horizontal acceleration per unit of wind
pub const WIND_ACCELERATION_FACTOR: f32 = 0.05;
/// Wind clamp range
pub const MAX_WIND: f32 = 20.0;
/// Largest per-turn wind change in either direction
pub const WIND_DRIFT: f32 = 2.5;

/// A 2D position or vector in playfield pixels (y grows downward)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Vec2) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// One integration sample of a projectile's flight
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    /// Simulated seconds since launch
    pub t: f32,
}

impl TrajectoryPoint {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// Launch parameters for a single shot
#[derive(Debug, Clone, Copy)]
pub struct LaunchParams {
    pub start: Vec2,
    /// Degrees, 0 = right, 90 = straight up, 180 = left
    pub angle: f32,
    /// Percentage of maximum launch speed
    pub power: f32,
    pub wind: f32,
    pub gravity: f32,
    pub dt: f32,
}

impl LaunchParams {
    pub fn new(start: Vec2, angle: f32, power: f32, wind: f32) -> Self {
        Self {
            start,
            angle,
            power,
            wind,
            gravity: DEFAULT_GRAVITY,
            dt: DEFAULT_DT,
        }
    }

    pub fn with_gravity(mut self, gravity: f32) -> Self {
        self.gravity = gravity;
        self
    }
}

/// Region outside of which a projectile is no longer simulated
#[derive(Debug, Clone, Copy)]
pub struct FlightBounds {
    pub min_x: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl FlightBounds {
    /// Generous bounds around a playfield of the given size
    pub fn around(width: f32, height: f32) -> Self {
        Self {
            min_x: -500.0,
            max_x: width + 800.0,
            max_y: height + 400.0,
        }
    }

    fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.min_x && x <= self.max_x && y <= self.max_y
    }
}

/// Physics system for projectile flight and explosions
pub struct PhysicsEngine;

impl PhysicsEngine {
    /// Initial velocity vector for an angle/power pair
    pub fn launch_velocity(angle: f32, power: f32) -> (f32, f32) {
        let angle = angle.clamp(0.0, 180.0).to_radians();
        let speed = (power.clamp(0.0, 100.0) / 100.0) * MAX_LAUNCH_SPEED;
        // Negative vy because y increases downward
        (speed * angle.cos(), -speed * angle.sin())
    }

    /// Integrate a projectile's flight with a fixed timestep
    ///
    /// The first sample is the launch point at t = 0. The sequence ends at
    /// [`MAX_FLIGHT_SECS`] or once the projectile leaves `bounds`, whichever
    /// comes first; the sample that left the bounds is included.
    pub fn trajectory(params: &LaunchParams, bounds: &FlightBounds) -> Vec<TrajectoryPoint> {
        let dt = if params.dt > 0.0 { params.dt } else { DEFAULT_DT };
        let max_steps = (MAX_FLIGHT_SECS / dt).floor() as usize;

        let (mut vx, mut vy) = Self::launch_velocity(params.angle, params.power);
        let mut x = params.start.x;
        let mut y = params.start.y;
        let mut t = 0.0;

        let mut points = Vec::with_capacity(max_steps.min(1024));

        for _ in 0..max_steps {
            points.push(TrajectoryPoint { x, y, vx, vy, t });

            vx += params.wind * WIND_ACCELERATION_FACTOR * dt;
            vy += params.gravity * dt;

            x += vx * dt;
            y += vy * dt;
            t += dt;

            if !bounds.contains(x, y) {
                points.push(TrajectoryPoint { x, y, vx, vy, t });
                break;
            }
        }

        points
    }

    /// Linear splash falloff, floored to whole hit points
    pub fn splash_damage(impact: Vec2, target: Vec2, radius: f32, base_damage: u32) -> u32 {
        if radius <= 0.0 {
            return 0;
        }

        let distance = impact.distance(target);
        if distance >= radius {
            return 0;
        }

        let falloff = (1.0 - distance / radius).max(0.0);
        (base_damage as f32 * falloff).floor() as u32
    }

    /// Perturb the wind for the next turn
    pub fn evolve_wind<R: Rng + ?Sized>(current: f32, rng: &mut R) -> f32 {
        let change = rng.gen_range(-WIND_DRIFT..=WIND_DRIFT);
        (current + change).clamp(-MAX_WIND, MAX_WIND)
    }

    /// Starting wind for a new session
    pub fn initial_wind<R: Rng + ?Sized>(rng: &mut R) -> f32 {
        rng.gen_range(-MAX_WIND / 2.0..=MAX_WIND / 2.0)
    }

    /// Landing point of a flat-ground shot, ignoring wind
    ///
    /// Returns the x coordinate where a projectile launched from `start`
    /// returns to `start.y`.
    pub fn flat_ground_range(start: Vec2, angle: f32, power: f32, gravity: f32) -> f32 {
        let (vx, vy) = Self::launch_velocity(angle, power);
        let flight_time = 2.0 * -vy / gravity;
        start.x + vx * flight_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn bounds() -> FlightBounds {
        FlightBounds::around(1200.0, 600.0)
    }

    #[test]
    fn test_trajectory_deterministic() {
        let params = LaunchParams::new(Vec2::new(200.0, 300.0), 60.0, 70.0, 5.0);
        let a = PhysicsEngine::trajectory(&params, &bounds());
        let b = PhysicsEngine::trajectory(&params, &bounds());
        assert_eq!(a, b);
    }

    #[test]
    fn test_trajectory_length_bounded() {
        // Straight up with no power never leaves bounds
        let params = LaunchParams::new(Vec2::new(600.0, 100.0), 90.0, 0.0, 0.0);
        let points = PhysicsEngine::trajectory(&params, &FlightBounds::around(1200.0, 1e9));
        let max = (MAX_FLIGHT_SECS / DEFAULT_DT).floor() as usize;
        assert!(points.len() <= max + 1);
        assert!(!points.is_empty());
    }

    #[test]
    fn test_trajectory_stops_outside_bounds() {
        let params = LaunchParams::new(Vec2::new(1100.0, 300.0), 0.0, 100.0, 0.0);
        let points = PhysicsEngine::trajectory(&params, &bounds());
        let last = points.last().unwrap();
        assert!(last.x > bounds().max_x || last.y > bounds().max_y);
        assert!(points.len() < 200);
    }

    #[test]
    fn test_first_sample_is_launch_point() {
        let start = Vec2::new(150.0, 420.0);
        let params = LaunchParams::new(start, 45.0, 50.0, 0.0);
        let points = PhysicsEngine::trajectory(&params, &bounds());
        assert_eq!(points[0].position(), start);
        assert_eq!(points[0].t, 0.0);
    }

    #[test]
    fn test_launch_speed_grows_with_power() {
        let mut previous = -1.0;
        for power in [0.0, 10.0, 25.0, 50.0, 75.0, 100.0] {
            let (vx, vy) = PhysicsEngine::launch_velocity(45.0, power);
            let speed = (vx * vx + vy * vy).sqrt();
            assert!(speed > previous, "speed must increase with power");
            previous = speed;
        }
    }

    #[test]
    fn test_angle_orientation() {
        let (vx, vy) = PhysicsEngine::launch_velocity(90.0, 100.0);
        assert!(vx.abs() < 1e-3);
        assert!(vy < 0.0, "90 degrees points up");

        let (vx, _) = PhysicsEngine::launch_velocity(0.0, 100.0);
        assert!(vx > 0.0);
        let (vx, _) = PhysicsEngine::launch_velocity(180.0, 100.0);
        assert!(vx < 0.0);
    }

    #[test]
    fn test_wind_pushes_projectile() {
        let calm = LaunchParams::new(Vec2::new(300.0, 300.0), 80.0, 60.0, 0.0);
        let windy = LaunchParams::new(Vec2::new(300.0, 300.0), 80.0, 60.0, 20.0);
        let a = PhysicsEngine::trajectory(&calm, &bounds());
        let b = PhysicsEngine::trajectory(&windy, &bounds());
        assert!(b[50].x > a[50].x);
    }

    #[test]
    fn test_splash_damage_falloff() {
        let impact = Vec2::new(100.0, 100.0);
        assert_eq!(PhysicsEngine::splash_damage(impact, impact, 30.0, 30), 30);
        assert_eq!(
            PhysicsEngine::splash_damage(impact, Vec2::new(115.0, 100.0), 30.0, 30),
            15
        );
        assert_eq!(
            PhysicsEngine::splash_damage(impact, Vec2::new(130.0, 100.0), 30.0, 30),
            0
        );
        assert_eq!(
            PhysicsEngine::splash_damage(impact, Vec2::new(200.0, 100.0), 30.0, 30),
            0
        );
    }

    #[test]
    fn test_wind_stays_clamped() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut wind = 19.0;
        for _ in 0..1000 {
            wind = PhysicsEngine::evolve_wind(wind, &mut rng);
            assert!((-MAX_WIND..=MAX_WIND).contains(&wind));
        }
    }

    #[test]
    fn test_flat_ground_range_matches_simulation() {
        let start = Vec2::new(100.0, 400.0);
        let predicted = PhysicsEngine::flat_ground_range(start, 45.0, 60.0, DEFAULT_GRAVITY);
        let params = LaunchParams::new(start, 45.0, 60.0, 0.0);
        let points = PhysicsEngine::trajectory(&params, &bounds());
        let landing = points
            .iter()
            .skip(1)
            .find(|p| p.y >= start.y)
            .expect("shot comes back down");
        assert!((landing.x - predicted).abs() < 10.0);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn splash_never_exceeds_base(
                dx in -100.0f32..100.0,
                dy in -100.0f32..100.0,
                radius in 1.0f32..80.0,
                base in 0u32..100,
            ) {
                let impact = Vec2::new(500.0, 300.0);
                let target = Vec2::new(500.0 + dx, 300.0 + dy);
                let damage = PhysicsEngine::splash_damage(impact, target, radius, base);
                prop_assert!(damage <= base);
                if impact.distance(target) >= radius {
                    prop_assert_eq!(damage, 0);
                }
            }
        }
    }
}
