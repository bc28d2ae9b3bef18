//! Sun rotation cycle.
//!
//! The sun keeps its position and spins about its own pitch axis, one full
//! turn every `period_secs`, looping forever. The rotation is composed with
//! the orientation the sun had when the cycle started, so the initial aim
//! (looking at the island) is the pose at `t = 0`.
//!
//! # Example
//!
//! ```ignore
//! commands.spawn((
//!     DirectionalLight::default(),
//!     transform,
//!     SunCycle::new(10.0, transform.rotation),
//! ));
//! ```

use bevy::prelude::*;
use std::f32::consts::TAU;

/// Looping pitch rotation of a light.
#[derive(Component, Clone, Debug)]
pub struct SunCycle {
    /// Seconds for one full turn.
    pub period_secs: f32,
    /// Seconds into the current turn, in `[0, period_secs)`.
    pub elapsed: f32,
    /// Orientation at the start of a turn.
    pub base_rotation: Quat,
}

impl SunCycle {
    pub fn new(period_secs: f32, base_rotation: Quat) -> Self {
        Self {
            period_secs,
            elapsed: 0.0,
            base_rotation,
        }
    }

    /// Advance the cycle, wrapping at the period.
    pub fn update(&mut self, delta_seconds: f32) {
        if self.period_secs <= 0.0 {
            return;
        }
        self.elapsed = (self.elapsed + delta_seconds).rem_euclid(self.period_secs);
    }

    /// Fraction of the current turn, in `[0, 1)`.
    pub fn phase(&self) -> f32 {
        if self.period_secs <= 0.0 {
            return 0.0;
        }
        self.elapsed / self.period_secs
    }

    /// Pitch offset from the base orientation (radians). Decreases over a turn.
    pub fn pitch_offset(&self) -> f32 {
        -TAU * self.phase()
    }

    /// Current orientation.
    pub fn rotation(&self) -> Quat {
        self.base_rotation * Quat::from_rotation_x(self.pitch_offset())
    }
}

/// System: advance every sun cycle and write the rotation into its transform.
pub fn update_sun_cycle(time: Res<Time>, mut query: Query<(&mut SunCycle, &mut Transform)>) {
    let dt = time.delta_secs();
    for (mut cycle, mut transform) in query.iter_mut() {
        cycle.update(dt);
        transform.rotation = cycle.rotation();
    }
}

/// Plugin that animates [`SunCycle`] lights.
pub struct SunCyclePlugin;

impl Plugin for SunCyclePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, update_sun_cycle);
    }
}
