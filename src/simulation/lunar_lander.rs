// src/simulation/lunar_lander.rs
//! Built-in LunarLander-v3 dynamics
//!
//! A rigid-body approximation of the classic lander task: one body with two
//! legs above a flat landing pad, a main engine and two orientation engines.
//!
//! Observation layout:
//!
//! ```text
//! [x, y, vx, vy, angle, angular_velocity, left_leg_contact, right_leg_contact]
//! ```
//!
//! Actions: 0 = noop, 1 = fire left engine, 2 = fire main engine,
//! 3 = fire right engine.

use crate::simulation::simulator::{BackendStep, SimulationBackend, SimulatorConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use tracing::trace;

const FPS: f64 = 50.0;
const DT: f64 = 1.0 / FPS;

const WORLD_W: f64 = 20.0;
const WORLD_H: f64 = 40.0 / 3.0;
const HELIPAD_Y: f64 = WORLD_H / 4.0;

const LEG_AWAY: f64 = 20.0 / 30.0;
const LEG_DOWN: f64 = 18.0 / 30.0;
const BODY_BOTTOM: f64 = 10.0 / 30.0;

const MAIN_ENGINE_ACCEL: f64 = 17.0;
const SIDE_ENGINE_ACCEL: f64 = 1.2;
const SIDE_ENGINE_TORQUE: f64 = 2.5;
const ENGINE_DISPERSION: f64 = 0.1;
const INITIAL_RANDOM: f64 = 1.5;

const WIND_SCALE: f64 = 0.05;
const TURBULENCE_SCALE: f64 = 0.5;

const CRASH_SPEED: f64 = 3.0;
const MAX_LANDING_ANGLE: f64 = 0.8;
const GROUND_FRICTION: f64 = 0.8;
const REST_THRESHOLD: f64 = 0.05;

const MAIN_FUEL_COST: f64 = 0.30;
const SIDE_FUEL_COST: f64 = 0.03;

/// Lander physics state
pub struct LunarLander {
    config: SimulatorConfig,
    rng: StdRng,
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
    angle: f64,
    angular_velocity: f64,
    legs: [bool; 2],
    game_over: bool,
    wind_idx: i64,
    torque_idx: i64,
    prev_shaping: f64,
}

impl LunarLander {
    pub fn new(config: SimulatorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            config,
            rng,
            x: WORLD_W / 2.0,
            y: WORLD_H,
            vx: 0.0,
            vy: 0.0,
            angle: 0.0,
            angular_velocity: 0.0,
            legs: [false; 2],
            game_over: false,
            wind_idx: 0,
            torque_idx: 0,
            prev_shaping: 0.0,
        }
    }

    fn observation(&self) -> Vec<f32> {
        vec![
            ((self.x - WORLD_W / 2.0) / (WORLD_W / 2.0)) as f32,
            ((self.y - (HELIPAD_Y + LEG_DOWN)) / (WORLD_H / 2.0)) as f32,
            (self.vx * (WORLD_W / 2.0) / FPS) as f32,
            (self.vy * (WORLD_H / 2.0) / FPS) as f32,
            self.angle as f32,
            (20.0 * self.angular_velocity / FPS) as f32,
            if self.legs[0] { 1.0 } else { 0.0 },
            if self.legs[1] { 1.0 } else { 0.0 },
        ]
    }

    fn shaping(obs: &[f32]) -> f64 {
        let o: Vec<f64> = obs.iter().map(|v| *v as f64).collect();
        -100.0 * (o[0] * o[0] + o[1] * o[1]).sqrt()
            - 100.0 * (o[2] * o[2] + o[3] * o[3]).sqrt()
            - 100.0 * o[4].abs()
            + 10.0 * o[6]
            + 10.0 * o[7]
    }

    /// Smooth pseudo-random signal used for wind and turbulence
    fn gust(idx: i64) -> f64 {
        let t = idx as f64;
        ((0.02 * t).sin() + (PI * 0.01 * t).sin()).tanh()
    }

    fn dispersion(&mut self) -> f64 {
        1.0 + self.rng.gen_range(-ENGINE_DISPERSION..ENGINE_DISPERSION)
    }

    fn leg_tips(&self) -> [(f64, f64); 2] {
        let (sin, cos) = self.angle.sin_cos();
        [-1.0, 1.0].map(|side| {
            let lx = side * LEG_AWAY;
            let ly = -LEG_DOWN;
            (self.x + lx * cos - ly * sin, self.y + lx * sin + ly * cos)
        })
    }

    fn resolve_ground_contact(&mut self) {
        let tips = self.leg_tips();
        let lowest = tips[0].1.min(tips[1].1);

        if lowest < HELIPAD_Y {
            let impact_speed = -self.vy;
            if impact_speed > CRASH_SPEED || self.angle.abs() > MAX_LANDING_ANGLE {
                self.game_over = true;
            }

            self.y += HELIPAD_Y - lowest;
            self.vy = self.vy.max(0.0);
            self.vx *= GROUND_FRICTION;
            self.angular_velocity *= 0.5;
            self.angular_velocity -= self.angle * 5.0 * DT;
        }

        let tips = self.leg_tips();
        self.legs = [
            tips[0].1 <= HELIPAD_Y + 0.01,
            tips[1].1 <= HELIPAD_Y + 0.01,
        ];

        if self.y - BODY_BOTTOM * self.angle.cos() <= HELIPAD_Y {
            self.game_over = true;
        }
    }

    fn at_rest(&self) -> bool {
        self.legs[0]
            && self.legs[1]
            && (self.vx * self.vx + self.vy * self.vy).sqrt() < REST_THRESHOLD
            && self.angular_velocity.abs() < REST_THRESHOLD
    }
}

impl SimulationBackend for LunarLander {
    fn reset(&mut self) -> Vec<f32> {
        self.x = WORLD_W / 2.0;
        self.y = WORLD_H;
        self.vx = self.rng.gen_range(-INITIAL_RANDOM..INITIAL_RANDOM);
        self.vy = self.rng.gen_range(-INITIAL_RANDOM..INITIAL_RANDOM);
        self.angle = 0.0;
        self.angular_velocity = 0.0;
        self.legs = [false; 2];
        self.game_over = false;
        self.wind_idx = self.rng.gen_range(-9999..9999);
        self.torque_idx = self.rng.gen_range(-9999..9999);

        let obs = self.observation();
        self.prev_shaping = Self::shaping(&obs);
        obs
    }

    fn step(&mut self, action: usize) -> BackendStep {
        let (main_power, side) = match action {
            1 => (0.0, -1.0),
            2 => (1.0, 0.0),
            3 => (0.0, 1.0),
            _ => (0.0, 0.0),
        };

        let (sin, cos) = self.angle.sin_cos();
        let mut ax = 0.0;
        let mut ay = self.config.gravity;
        let mut alpha = 0.0;

        if main_power > 0.0 {
            let thrust = MAIN_ENGINE_ACCEL * self.dispersion();
            ax += -sin * thrust;
            ay += cos * thrust;
        }

        if side != 0.0 {
            let push = SIDE_ENGINE_ACCEL * self.dispersion();
            ax += -side * cos * push;
            ay += -side * sin * push;
            alpha += side * SIDE_ENGINE_TORQUE;
        }

        if self.config.enable_wind && !(self.legs[0] || self.legs[1]) {
            ax += Self::gust(self.wind_idx) * self.config.wind_power * WIND_SCALE;
            alpha += Self::gust(self.torque_idx) * self.config.turbulence_power * TURBULENCE_SCALE;
            self.wind_idx += 1;
            self.torque_idx += 1;
        }

        self.vx += ax * DT;
        self.vy += ay * DT;
        self.angular_velocity += alpha * DT;
        self.x += self.vx * DT;
        self.y += self.vy * DT;
        self.angle += self.angular_velocity * DT;

        self.resolve_ground_contact();

        let observation = self.observation();
        let shaping = Self::shaping(&observation);
        let mut reward = shaping - self.prev_shaping;
        self.prev_shaping = shaping;
        reward -= main_power * MAIN_FUEL_COST;
        reward -= side.abs() * SIDE_FUEL_COST;

        let mut terminated = false;
        if self.game_over || observation[0].abs() >= 1.0 {
            terminated = true;
            reward = -100.0;
        } else if self.at_rest() {
            terminated = true;
            reward = 100.0;
        }

        trace!(action, reward, terminated, "lander step");

        BackendStep {
            observation,
            reward,
            terminated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(seed: u64) -> LunarLander {
        LunarLander::new(SimulatorConfig {
            seed: Some(seed),
            ..Default::default()
        })
    }

    #[test]
    fn test_observation_shape() {
        let mut lander = seeded(1);
        let obs = lander.reset();
        assert_eq!(obs.len(), 8);
        assert!(obs.iter().all(|v| v.is_finite()));
        // Legs start in the air
        assert_eq!(obs[6], 0.0);
        assert_eq!(obs[7], 0.0);
    }

    #[test]
    fn test_free_fall_crashes() {
        let mut lander = seeded(7);
        lander.reset();

        let mut last = None;
        for _ in 0..500 {
            let step = lander.step(0);
            if step.terminated {
                last = Some(step);
                break;
            }
        }

        let last = last.expect("free fall should end the episode");
        assert_eq!(last.reward, -100.0);
    }

    #[test]
    fn test_main_engine_slows_descent() {
        let mut coasting = seeded(3);
        let mut burning = seeded(3);
        coasting.reset();
        burning.reset();

        let mut coast_obs = Vec::new();
        let mut burn_obs = Vec::new();
        for _ in 0..10 {
            coast_obs = coasting.step(0).observation;
            burn_obs = burning.step(2).observation;
        }

        assert!(burn_obs[3] > coast_obs[3]);
    }

    #[test]
    fn test_seeded_runs_are_deterministic() {
        let mut a = seeded(42);
        let mut b = seeded(42);
        assert_eq!(a.reset(), b.reset());

        for action in [0, 1, 2, 3, 2, 2, 0] {
            let sa = a.step(action);
            let sb = b.step(action);
            assert_eq!(sa.observation, sb.observation);
            assert_eq!(sa.reward, sb.reward);
        }
    }

    #[test]
    fn test_wind_pushes_lander() {
        let mut calm = seeded(11);
        let mut windy = LunarLander::new(SimulatorConfig {
            seed: Some(11),
            enable_wind: true,
            wind_power: 20.0,
            ..Default::default()
        });
        calm.reset();
        windy.reset();

        let mut calm_obs = Vec::new();
        let mut windy_obs = Vec::new();
        for _ in 0..20 {
            calm_obs = calm.step(0).observation;
            windy_obs = windy.step(0).observation;
        }

        assert_ne!(calm_obs[2], windy_obs[2]);
    }
}
