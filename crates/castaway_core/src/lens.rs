//! Orthographic shadow lens for the sun light.
//!
//! [`ShadowLens`] is the fitted off-center orthographic shadow volume of the
//! sun. Bevy's directional shadow pipeline does the rendering; the lens
//! decides whether the sun casts at all ([`ShadowCaster`]) and is what the
//! readout and frustum gizmo show:
//! - `film_offset`: lateral center of the projection rectangle
//! - `film_size`: full width/height of the rectangle
//! - `near` / `far`: depth range along the light direction
//!
//! All of these are expressed in *light space*: the light entity's local
//! frame with the depth axis flipped so that +Z points where the light shines
//! (Bevy lights look down their local -Z). See [`light_space_from_world`].

use bevy::prelude::*;

/// Default shadow map resolution for the sun.
pub const SHADOW_MAP_SIZE: u32 = 4096;

/// Converts a light's local frame (looking down -Z) into light space (+Z is depth).
const FLIP_DEPTH: Mat4 = Mat4::from_cols(
    Vec4::X,
    Vec4::Y,
    Vec4::NEG_Z,
    Vec4::W,
);

/// Matrix taking world-space points into the light space of `light`.
pub fn light_space_from_world(light: &GlobalTransform) -> Mat4 {
    FLIP_DEPTH * Mat4::from(light.affine().inverse())
}

/// Off-center orthographic projection of a shadow-casting light.
#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct ShadowLens {
    /// Lateral center of the projection rectangle (light-space X/Y).
    pub film_offset: Vec2,
    /// Full lateral size of the projection rectangle.
    pub film_size: Vec2,
    /// Nearest depth covered (light-space Z).
    pub near: f32,
    /// Farthest depth covered (light-space Z).
    pub far: f32,
}

impl Default for ShadowLens {
    fn default() -> Self {
        Self::sun()
    }
}

impl ShadowLens {
    /// Initial sun lens, used until the first fit runs.
    pub fn sun() -> Self {
        Self {
            film_offset: Vec2::ZERO,
            film_size: Vec2::new(20.0, 40.0),
            near: 1.0,
            far: 30.0,
        }
    }

    pub fn set_film_offset(&mut self, offset: Vec2) {
        self.film_offset = offset;
    }

    pub fn set_film_size(&mut self, size: Vec2) {
        self.film_size = size;
    }

    pub fn set_near_far(&mut self, near: f32, far: f32) {
        self.near = near;
        self.far = far;
    }

    /// Light-space box covered by the lens.
    pub fn light_space_bounds(&self) -> crate::bounds::Bounds {
        let half = self.film_size * 0.5;
        crate::bounds::Bounds::new(
            (self.film_offset - half).extend(self.near),
            (self.film_offset + half).extend(self.far),
        )
    }

    /// World-space corners of the shadow volume, for debug drawing.
    ///
    /// Same ordering as [`crate::bounds::Bounds::corners`].
    pub fn world_corners(&self, light: &GlobalTransform) -> [Vec3; 8] {
        let world_from_light = light_space_from_world(light).inverse();
        self.light_space_bounds()
            .corners()
            .map(|c| world_from_light.transform_point3(c))
    }
}

/// Shadow casting state of a light.
#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct ShadowCaster {
    /// Whether the light renders a shadow map this frame.
    pub active: bool,
    /// Shadow map resolution (square).
    pub map_size: u32,
}

impl Default for ShadowCaster {
    fn default() -> Self {
        Self {
            active: true,
            map_size: SHADOW_MAP_SIZE,
        }
    }
}

/// Mirror the caster's activation flag into Bevy's directional light.
pub fn sync_shadow_caster(
    mut lights: Query<(&ShadowCaster, &mut DirectionalLight), Changed<ShadowCaster>>,
) {
    for (caster, mut light) in lights.iter_mut() {
        if light.shadows_enabled != caster.active {
            light.shadows_enabled = caster.active;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sun_lens_defaults() {
        let lens = ShadowLens::sun();
        assert_eq!(lens.film_size, Vec2::new(20.0, 40.0));
        assert_eq!((lens.near, lens.far), (1.0, 30.0));
        assert_eq!(lens.film_offset, Vec2::ZERO);
    }

    #[test]
    fn test_light_space_depth_points_forward() {
        // Light at origin looking down -Z (Bevy default): a point 5 units in
        // front of it lands at depth +5.
        let light = GlobalTransform::IDENTITY;
        let p = light_space_from_world(&light).transform_point3(Vec3::new(1.0, 2.0, -5.0));
        assert!((p - Vec3::new(1.0, 2.0, 5.0)).length() < 1e-5);
    }

    #[test]
    fn test_light_space_follows_light_transform() {
        let light = GlobalTransform::from(
            Transform::from_xyz(0.0, 10.0, 0.0).looking_at(Vec3::ZERO, Vec3::Z),
        );
        // Origin is 10 units ahead of a light looking straight down
        let p = light_space_from_world(&light).transform_point3(Vec3::ZERO);
        assert!(p.truncate().length() < 1e-4);
        assert!((p.z - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_world_corners_round_trip() {
        let lens = ShadowLens::sun();
        let light = GlobalTransform::from(
            Transform::from_xyz(10.0, -10.0, -10.0).looking_at(Vec3::ZERO, Vec3::Y),
        );
        let to_light = light_space_from_world(&light);
        let expected = lens.light_space_bounds().corners();
        for (world, local) in lens.world_corners(&light).iter().zip(expected.iter()) {
            assert!((to_light.transform_point3(*world) - *local).length() < 1e-3);
        }
    }

    #[test]
    fn test_shadow_caster_default_active() {
        let caster = ShadowCaster::default();
        assert!(caster.active);
        assert_eq!(caster.map_size, SHADOW_MAP_SIZE);
    }
}
