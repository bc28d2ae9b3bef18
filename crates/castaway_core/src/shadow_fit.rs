//! Shadow frustum fitting for the sun.
//!
//! Keeps the sun's orthographic [`ShadowLens`] as tight as possible around the
//! geometry that can cast visible shadows. Two strategies:
//!
//! - **Static** ([`fit_static`]): exact light-space bounds of every caster
//!   vertex. Always correct, but walks all geometry.
//! - **Dynamic** ([`fit_dynamic`]): cached scene volume clipped against the
//!   camera's view volume. Cheap, looser, and switches the shadow caster off
//!   when the scene is entirely out of view.
//!
//! Light-space axes: X and Y are lateral, Z is depth (see [`crate::lens`]).
//!
//! The per-frame driver is [`run_fit`], which threads an explicit
//! [`ShadowFitState`] through each call. [`ShadowFitPlugin`] schedules it
//! after transform propagation so the sun's current orientation is used.

use bevy::prelude::*;
use bevy::transform::TransformSystems;

use crate::bounds::{BoundingVolume, Bounds, Containment, VolumeKind};
use crate::lens::{light_space_from_world, sync_shadow_caster, ShadowCaster, ShadowLens};
use crate::scene_bounds::{
    collect_scene_geometry, compute_local_bounds, CameraView, LocalBounds, SceneBoundsSource,
    ShadowSceneRoot, ViewFrustumSource,
};

/// How the sun lens is adjusted every frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentMode {
    /// Exact fit around the whole scene.
    #[default]
    Static,
    /// Cheap fit clipped to the camera's view.
    Dynamic,
    /// Leave the lens alone.
    Disabled,
}

impl AdjustmentMode {
    /// Mode from its numeric selector (0, 1, 2). Anything else selects `Static`.
    pub fn from_index(index: i64) -> Self {
        match index {
            1 => AdjustmentMode::Dynamic,
            2 => AdjustmentMode::Disabled,
            _ => AdjustmentMode::Static,
        }
    }

    pub fn index(self) -> u8 {
        match self {
            AdjustmentMode::Static => 0,
            AdjustmentMode::Dynamic => 1,
            AdjustmentMode::Disabled => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AdjustmentMode::Static => "static",
            AdjustmentMode::Dynamic => "dynamic",
            AdjustmentMode::Disabled => "disabled",
        }
    }
}

// ============================================================================
// Fit values
// ============================================================================

/// Lens parameters computed from light-space bounds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LensFit {
    pub offset: Vec2,
    pub size: Vec2,
    pub near: f32,
    pub far: f32,
}

/// Why a fit was not applied to the lens.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FitError {
    /// No shadow-casting geometry.
    EmptyBounds,
    /// NaN or infinite parameters.
    NonFinite,
    /// Zero or negative lateral size.
    NonPositiveSize { size: Vec2 },
    /// Zero or inverted depth range.
    InvalidDepthRange { near: f32, far: f32 },
}

impl std::fmt::Display for FitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FitError::EmptyBounds => write!(f, "no shadow-casting geometry"),
            FitError::NonFinite => write!(f, "non-finite lens parameters"),
            FitError::NonPositiveSize { size } => {
                write!(f, "non-positive film size {:.3} x {:.3}", size.x, size.y)
            }
            FitError::InvalidDepthRange { near, far } => {
                write!(f, "invalid depth range {:.3}..{:.3}", near, far)
            }
        }
    }
}

impl std::error::Error for FitError {}

impl LensFit {
    /// Lens parameters covering `bounds` exactly.
    ///
    /// Offset is the lateral midpoint, size the lateral extent, near/far the
    /// depth range. Empty bounds give non-finite values; see [`LensFit::validate`].
    pub fn from_bounds(bounds: &Bounds) -> Self {
        Self {
            offset: ((bounds.min + bounds.max) * 0.5).truncate(),
            size: (bounds.max - bounds.min).truncate(),
            near: bounds.min.z,
            far: bounds.max.z,
        }
    }

    /// Check the fit describes a usable orthographic projection.
    pub fn validate(&self) -> Result<(), FitError> {
        let finite = self.offset.is_finite()
            && self.size.is_finite()
            && self.near.is_finite()
            && self.far.is_finite();
        if !finite {
            return Err(FitError::NonFinite);
        }
        if self.size.x <= 0.0 || self.size.y <= 0.0 {
            return Err(FitError::NonPositiveSize { size: self.size });
        }
        if self.far <= self.near {
            return Err(FitError::InvalidDepthRange {
                near: self.near,
                far: self.far,
            });
        }
        Ok(())
    }

    /// Write the fit into a lens.
    pub fn apply_to(&self, lens: &mut ShadowLens) {
        lens.set_film_offset(self.offset);
        lens.set_film_size(self.size);
        lens.set_near_far(self.near, self.far);
    }
}

/// Result of a dynamic fit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DynamicFit {
    /// The scene is out of view: switch the shadow caster off, keep the lens.
    Deactivate,
    /// Switch the shadow caster on and use this fit.
    Fit {
        containment: Containment,
        fit: LensFit,
    },
}

// ============================================================================
// Fitting
// ============================================================================

/// Exact fit around light-space scene bounds.
pub fn fit_static(light_space_bounds: &Bounds) -> LensFit {
    LensFit::from_bounds(light_space_bounds)
}

/// Pull scene bounds toward the view bounds.
///
/// Lateral minimums are clamped into the view range. The depth minimum is
/// only capped at the view's far side, never raised: casters between the
/// light and the view volume still throw shadows into it. Maximums are kept.
pub fn tighten_to_view(scene: &Bounds, view: &Bounds) -> Bounds {
    let mut min = scene.min;
    min.x = min.x.max(view.min.x).min(view.max.x);
    min.y = min.y.max(view.min.y).min(view.max.y);
    min.z = min.z.min(view.max.z);
    Bounds {
        min,
        max: scene.max,
    }
}

/// Cheap fit of a light-space scene volume against a light-space view volume.
pub fn fit_dynamic(scene: &BoundingVolume, view: &BoundingVolume) -> DynamicFit {
    let containment = view.classify(scene);
    let scene_bounds = scene.bounds();
    let bounds = match containment {
        Containment::Disjoint => return DynamicFit::Deactivate,
        Containment::Full => scene_bounds,
        Containment::Partial => tighten_to_view(&scene_bounds, &view.bounds()),
    };
    DynamicFit::Fit {
        containment,
        fit: LensFit::from_bounds(&bounds),
    }
}

// ============================================================================
// Per-frame driver
// ============================================================================

/// Fit state carried from frame to frame.
#[derive(Resource, Clone, Debug)]
pub struct ShadowFitState {
    /// Current adjustment mode.
    pub mode: AdjustmentMode,
    /// Shape of the precomputed scene volume used by the dynamic fit.
    pub volume_kind: VolumeKind,
    /// Whether the shadow caster was on after the last fit.
    pub light_active: bool,
    /// Last fit written to the lens.
    pub last_fit: Option<LensFit>,
    /// Last dynamic-fit classification.
    pub last_containment: Option<Containment>,
    /// Fits rejected as degenerate since startup.
    pub rejected_fits: u32,
}

impl Default for ShadowFitState {
    fn default() -> Self {
        Self {
            mode: AdjustmentMode::Static,
            volume_kind: VolumeKind::Box,
            light_active: true,
            last_fit: None,
            last_containment: None,
            rejected_fits: 0,
        }
    }
}

impl ShadowFitState {
    pub fn new(mode: AdjustmentMode, volume_kind: VolumeKind) -> Self {
        Self {
            mode,
            volume_kind,
            ..default()
        }
    }

    /// Switch mode. Returns `true` when the mode actually changed.
    pub fn set_mode(&mut self, mode: AdjustmentMode) -> bool {
        info!("Setting adjustment mode: {} ({})", mode.index(), mode.label());
        let changed = self.mode != mode;
        self.mode = mode;
        changed
    }
}

/// What one call to [`run_fit`] did.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FitOutcome {
    /// Adjustment disabled; nothing touched.
    Disabled,
    /// Dynamic mode without a camera to fit against.
    NoView,
    /// Scene out of view; caster switched off, lens untouched.
    Deactivated,
    /// Lens updated.
    Applied(LensFit),
    /// Fit computed but degenerate; lens untouched.
    Rejected(FitError),
}

/// Run one frame of lens adjustment.
///
/// `light_frame` maps world space into the sun's light space.
pub fn run_fit<S, V>(
    state: &mut ShadowFitState,
    scene: &S,
    view: Option<&V>,
    light_frame: &Mat4,
    lens: &mut ShadowLens,
    caster: &mut ShadowCaster,
) -> FitOutcome
where
    S: SceneBoundsSource + ?Sized,
    V: ViewFrustumSource + ?Sized,
{
    let fit = match state.mode {
        AdjustmentMode::Disabled => return FitOutcome::Disabled,
        AdjustmentMode::Static => {
            let bounds = scene.tight_bounds(light_frame);
            if bounds.is_empty() {
                return reject(state, FitError::EmptyBounds);
            }
            fit_static(&bounds)
        }
        AdjustmentMode::Dynamic => {
            let Some(view) = view else {
                return FitOutcome::NoView;
            };
            let scene_volume = scene.precomputed_volume(light_frame, state.volume_kind);
            if scene_volume.is_empty() {
                return reject(state, FitError::EmptyBounds);
            }
            let view_volume = view.frustum_volume().transform(light_frame);
            match fit_dynamic(&scene_volume, &view_volume) {
                DynamicFit::Deactivate => {
                    state.last_containment = Some(Containment::Disjoint);
                    set_active(state, caster, false);
                    return FitOutcome::Deactivated;
                }
                DynamicFit::Fit { containment, fit } => {
                    state.last_containment = Some(containment);
                    fit
                }
            }
        }
    };

    set_active(state, caster, true);
    if let Err(err) = fit.validate() {
        return reject(state, err);
    }
    fit.apply_to(lens);
    state.last_fit = Some(fit);
    FitOutcome::Applied(fit)
}

fn set_active(state: &mut ShadowFitState, caster: &mut ShadowCaster, active: bool) {
    if caster.active != active {
        debug!("Sun shadow caster {}", if active { "enabled" } else { "disabled" });
        caster.active = active;
    }
    state.light_active = active;
}

fn reject(state: &mut ShadowFitState, err: FitError) -> FitOutcome {
    if state.rejected_fits == 0 {
        warn!("Skipping shadow lens update: {}", err);
    } else {
        debug!("Skipping shadow lens update: {}", err);
    }
    state.rejected_fits += 1;
    FitOutcome::Rejected(err)
}

/// Camera whose view frustum drives the dynamic fit.
#[derive(Component, Default)]
pub struct ShadowFitCamera;

/// The light whose lens is fitted.
#[derive(Component, Default)]
pub struct SunLight;

/// System: fit the sun lens for this frame.
pub fn adjust_shadow_lens(
    mut state: ResMut<ShadowFitState>,
    meshes: Res<Assets<Mesh>>,
    roots: Query<Entity, With<ShadowSceneRoot>>,
    children: Query<&Children>,
    casters: Query<(&Mesh3d, &GlobalTransform, &LocalBounds)>,
    cameras: Query<(&GlobalTransform, &Projection), With<ShadowFitCamera>>,
    mut lights: Query<(&GlobalTransform, &mut ShadowLens, &mut ShadowCaster), With<SunLight>>,
) {
    if state.mode == AdjustmentMode::Disabled {
        return;
    }

    let scene = collect_scene_geometry(&roots, &children, &casters, &meshes);
    let view = cameras
        .iter()
        .next()
        .and_then(|(transform, projection)| CameraView::from_camera(transform, projection));

    for (light_transform, mut lens, mut caster) in lights.iter_mut() {
        let light_frame = light_space_from_world(light_transform);
        // Work on copies so change detection only fires on real updates.
        let mut new_lens = *lens;
        let mut new_caster = *caster;
        run_fit(
            &mut state,
            &scene,
            view.as_ref(),
            &light_frame,
            &mut new_lens,
            &mut new_caster,
        );
        lens.set_if_neq(new_lens);
        caster.set_if_neq(new_caster);
    }
}

/// Plugin that fits the sun's shadow lens every frame.
///
/// Runs in `PostUpdate` after transform propagation, so animation for the
/// frame has already been applied, and before rendering extracts the frame.
pub struct ShadowFitPlugin;

impl Plugin for ShadowFitPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ShadowFitState>()
            .add_systems(Update, compute_local_bounds)
            .add_systems(
                PostUpdate,
                (adjust_shadow_lens, sync_shadow_caster)
                    .chain()
                    .after(TransformSystems::Propagate),
            );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene_bounds::{CasterGeometry, SceneGeometry};
    use bevy::ecs::schedule::ExecutorKind;
    use std::f32::consts::FRAC_PI_2;

    fn b(min: [f32; 3], max: [f32; 3]) -> Bounds {
        Bounds::new(Vec3::from_array(min), Vec3::from_array(max))
    }

    /// Scene source returning fixed light-space bounds (frame is ignored).
    struct FixedScene(Bounds);

    impl SceneBoundsSource for FixedScene {
        fn tight_bounds(&self, _frame: &Mat4) -> Bounds {
            self.0
        }

        fn precomputed_volume(&self, _frame: &Mat4, kind: VolumeKind) -> BoundingVolume {
            BoundingVolume::from_bounds(self.0, kind)
        }
    }

    struct FixedView(Bounds);

    impl ViewFrustumSource for FixedView {
        fn frustum_volume(&self) -> BoundingVolume {
            BoundingVolume::Box(self.0)
        }
    }

    #[test]
    fn test_mode_from_index_clamps() {
        assert_eq!(AdjustmentMode::from_index(0), AdjustmentMode::Static);
        assert_eq!(AdjustmentMode::from_index(1), AdjustmentMode::Dynamic);
        assert_eq!(AdjustmentMode::from_index(2), AdjustmentMode::Disabled);
        assert_eq!(AdjustmentMode::from_index(3), AdjustmentMode::Static);
        assert_eq!(AdjustmentMode::from_index(-1), AdjustmentMode::Static);
        assert_eq!(AdjustmentMode::default(), AdjustmentMode::Static);
    }

    #[test]
    fn test_static_fit_matches_extents() {
        let fit = fit_static(&b([-10.0, -5.0, -20.0], [10.0, 5.0, 20.0]));
        assert_eq!(fit.offset, Vec2::ZERO);
        assert_eq!(fit.size, Vec2::new(20.0, 10.0));
        assert_eq!((fit.near, fit.far), (-20.0, 20.0));

        let off_center = fit_static(&b([2.0, -4.0, 1.0], [6.0, 0.0, 9.0]));
        assert_eq!(off_center.offset, Vec2::new(4.0, -2.0));
        assert_eq!(off_center.size, Vec2::new(4.0, 4.0));
        assert_eq!((off_center.near, off_center.far), (1.0, 9.0));
    }

    #[test]
    fn test_dynamic_disjoint_deactivates() {
        let scene = BoundingVolume::Box(b([-1.0, -1.0, -1.0], [1.0, 1.0, 1.0]));
        let view = BoundingVolume::Box(b([10.0, 10.0, 10.0], [20.0, 20.0, 20.0]));
        assert_eq!(fit_dynamic(&scene, &view), DynamicFit::Deactivate);
    }

    #[test]
    fn test_dynamic_full_containment_equals_static() {
        let scene_bounds = b([-10.0, -5.0, -20.0], [10.0, 5.0, 20.0]);
        let scene = BoundingVolume::Box(scene_bounds);
        let view = BoundingVolume::Box(b([-50.0, -50.0, -50.0], [50.0, 50.0, 50.0]));
        match fit_dynamic(&scene, &view) {
            DynamicFit::Fit { containment, fit } => {
                assert_eq!(containment, Containment::Full);
                assert_eq!(fit, fit_static(&scene_bounds));
            }
            DynamicFit::Deactivate => panic!("scene is in view"),
        }
    }

    #[test]
    fn test_dynamic_partial_tightens_lateral_and_near() {
        let scene = b([-10.0, -5.0, -20.0], [10.0, 5.0, 20.0]);
        let view = b([-4.0, -3.0, -15.0], [6.0, 8.0, 25.0]);
        let fit = match fit_dynamic(&BoundingVolume::Box(scene), &BoundingVolume::Box(view)) {
            DynamicFit::Fit { containment, fit } => {
                assert_eq!(containment, Containment::Partial);
                fit
            }
            DynamicFit::Deactivate => panic!("volumes overlap"),
        };
        // x-min raised to the view min, maxima untouched
        assert_eq!(fit.size.x, 10.0 - -4.0);
        assert_eq!(fit.size.y, 5.0 - -3.0);
        // Depth min is never raised toward the view
        assert_eq!(fit.near, -20.0);
        assert_eq!(fit.far, 20.0);
    }

    #[test]
    fn test_tighten_clamps_into_view_range() {
        let scene = b([-10.0, -5.0, -20.0], [10.0, 5.0, 20.0]);

        let view = b([2.0, -3.0, -15.0], [6.0, 8.0, 25.0]);
        let t = tighten_to_view(&scene, &view);
        assert_eq!(t.min.x, 2.0);
        assert_eq!(t.max, scene.max);

        // Scene min above the view max is pulled down to it
        let above = b([20.0, 20.0, 30.0], [40.0, 40.0, 40.0]);
        let low_view = b([0.0, 0.0, 0.0], [5.0, 6.0, 7.0]);
        let t = tighten_to_view(&above, &low_view);
        assert_eq!(t.min, Vec3::new(5.0, 6.0, 7.0));
        assert_eq!(t.max, above.max);
    }

    #[test]
    fn test_tighten_bounds_property() {
        let scene = b([-10.0, -5.0, -20.0], [10.0, 5.0, 20.0]);
        for i in 0..20 {
            let shift = i as f32 - 10.0;
            let view = b(
                [shift - 3.0, shift * 0.5 - 2.0, shift - 5.0],
                [shift + 3.0, shift * 0.5 + 2.0, shift + 5.0],
            );
            let t = tighten_to_view(&scene, &view);
            for axis in 0..2 {
                assert!(t.min[axis] >= view.min[axis]);
                assert!(t.min[axis] <= view.max[axis]);
            }
            assert!(t.min.z <= view.max.z);
            assert!(t.min.z <= scene.min.z.max(view.max.z));
            assert_eq!(t.max, scene.max);
        }
    }

    #[test]
    fn test_validate_rejects_degenerate() {
        assert_eq!(
            LensFit::from_bounds(&Bounds::EMPTY).validate(),
            Err(FitError::NonFinite)
        );
        let flat = LensFit::from_bounds(&b([0.0, 0.0, 0.0], [0.0, 4.0, 4.0]));
        assert!(matches!(flat.validate(), Err(FitError::NonPositiveSize { .. })));
        let thin = LensFit::from_bounds(&b([0.0, 0.0, 3.0], [4.0, 4.0, 3.0]));
        assert!(matches!(thin.validate(), Err(FitError::InvalidDepthRange { .. })));
        let ok = LensFit::from_bounds(&b([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]));
        assert_eq!(ok.validate(), Ok(()));
    }

    #[test]
    fn test_run_fit_disjoint_leaves_lens_unchanged() {
        let mut state = ShadowFitState::new(AdjustmentMode::Dynamic, VolumeKind::Box);
        let scene = FixedScene(b([-1.0, -1.0, -1.0], [1.0, 1.0, 1.0]));
        let view = FixedView(b([10.0, 10.0, 10.0], [20.0, 20.0, 20.0]));
        let mut lens = ShadowLens::sun();
        let mut caster = ShadowCaster::default();

        let outcome = run_fit(
            &mut state,
            &scene,
            Some(&view),
            &Mat4::IDENTITY,
            &mut lens,
            &mut caster,
        );

        assert_eq!(outcome, FitOutcome::Deactivated);
        assert_eq!(lens, ShadowLens::sun());
        assert!(!caster.active);
        assert!(!state.light_active);
        assert_eq!(state.last_containment, Some(Containment::Disjoint));
    }

    #[test]
    fn test_run_fit_reactivates_when_back_in_view() {
        let mut state = ShadowFitState::new(AdjustmentMode::Dynamic, VolumeKind::Box);
        let scene = FixedScene(b([-1.0, -1.0, -1.0], [1.0, 1.0, 1.0]));
        let view = FixedView(b([-5.0, -5.0, -5.0], [5.0, 5.0, 5.0]));
        let mut lens = ShadowLens::sun();
        let mut caster = ShadowCaster {
            active: false,
            ..default()
        };

        let outcome = run_fit(
            &mut state,
            &scene,
            Some(&view),
            &Mat4::IDENTITY,
            &mut lens,
            &mut caster,
        );

        assert!(matches!(outcome, FitOutcome::Applied(_)));
        assert!(caster.active);
        assert_eq!(lens.film_size, Vec2::new(2.0, 2.0));
        assert_eq!((lens.near, lens.far), (-1.0, 1.0));
    }

    #[test]
    fn test_run_fit_dynamic_is_idempotent() {
        let mut state = ShadowFitState::new(AdjustmentMode::Dynamic, VolumeKind::Box);
        let scene = FixedScene(b([-10.0, -5.0, -20.0], [10.0, 5.0, 20.0]));
        let view = FixedView(b([2.0, -3.0, -15.0], [6.0, 8.0, 25.0]));
        let mut lens = ShadowLens::sun();
        let mut caster = ShadowCaster::default();

        run_fit(&mut state, &scene, Some(&view), &Mat4::IDENTITY, &mut lens, &mut caster);
        let first = lens;
        run_fit(&mut state, &scene, Some(&view), &Mat4::IDENTITY, &mut lens, &mut caster);

        assert_eq!(lens, first);
        assert_eq!(lens.film_size.x, 8.0);
        assert_eq!(lens.film_offset.x, 6.0);
    }

    #[test]
    fn test_run_fit_disabled_touches_nothing() {
        let mut state = ShadowFitState::new(AdjustmentMode::Disabled, VolumeKind::Box);
        let scene = FixedScene(b([-1.0, -1.0, -1.0], [1.0, 1.0, 1.0]));
        let mut lens = ShadowLens::sun();
        let mut caster = ShadowCaster::default();

        let outcome = run_fit(
            &mut state,
            &scene,
            None::<&FixedView>,
            &Mat4::IDENTITY,
            &mut lens,
            &mut caster,
        );

        assert_eq!(outcome, FitOutcome::Disabled);
        assert_eq!(lens, ShadowLens::sun());
        assert!(state.last_fit.is_none());
    }

    #[test]
    fn test_run_fit_dynamic_without_camera() {
        let mut state = ShadowFitState::new(AdjustmentMode::Dynamic, VolumeKind::Box);
        let scene = FixedScene(b([-1.0, -1.0, -1.0], [1.0, 1.0, 1.0]));
        let mut lens = ShadowLens::sun();
        let mut caster = ShadowCaster::default();

        let outcome = run_fit(
            &mut state,
            &scene,
            None::<&FixedView>,
            &Mat4::IDENTITY,
            &mut lens,
            &mut caster,
        );
        assert_eq!(outcome, FitOutcome::NoView);
        assert_eq!(lens, ShadowLens::sun());
    }

    #[test]
    fn test_run_fit_empty_scene_is_rejected() {
        let mut state = ShadowFitState::default();
        let scene = SceneGeometry::default();
        let mut lens = ShadowLens::sun();
        let mut caster = ShadowCaster::default();

        let outcome = run_fit(
            &mut state,
            &scene,
            None::<&FixedView>,
            &Mat4::IDENTITY,
            &mut lens,
            &mut caster,
        );

        assert_eq!(outcome, FitOutcome::Rejected(FitError::EmptyBounds));
        assert_eq!(lens, ShadowLens::sun());
        assert_eq!(state.rejected_fits, 1);
    }

    #[test]
    fn test_run_fit_static_uses_light_frame() {
        // Unit cube 10 units in front of a light at the origin looking down -Z
        let cube: [[f32; 3]; 2] = [[-1.0, -1.0, -11.0], [1.0, 1.0, -9.0]];
        let scene = SceneGeometry {
            casters: vec![CasterGeometry {
                world_from_local: Mat4::IDENTITY,
                local_bounds: b(cube[0], cube[1]),
                positions: &cube,
            }],
        };
        let light_frame = light_space_from_world(&GlobalTransform::IDENTITY);
        let mut state = ShadowFitState::default();
        let mut lens = ShadowLens::sun();
        let mut caster = ShadowCaster::default();

        let outcome = run_fit(
            &mut state,
            &scene,
            None::<&FixedView>,
            &light_frame,
            &mut lens,
            &mut caster,
        );

        assert!(matches!(outcome, FitOutcome::Applied(_)));
        assert!((lens.near - 9.0).abs() < 1e-5);
        assert!((lens.far - 11.0).abs() < 1e-5);
        assert!((lens.film_size - Vec2::new(2.0, 2.0)).length() < 1e-5);
        assert!(lens.film_offset.length() < 1e-5);
    }

    fn fit_schedule() -> Schedule {
        let mut schedule = Schedule::default();
        schedule.set_executor_kind(ExecutorKind::SingleThreaded);
        schedule.add_systems((compute_local_bounds, adjust_shadow_lens, sync_shadow_caster).chain());
        schedule
    }

    fn camera_transform(target: Vec3) -> GlobalTransform {
        GlobalTransform::from(Transform::from_xyz(0.0, 0.0, 30.0).looking_at(target, Vec3::Y))
    }

    #[test]
    fn test_systems_fit_scene_root_and_toggle_light() {
        let mut world = World::new();
        let mut meshes = Assets::<Mesh>::default();
        let cube = meshes.add(Cuboid::new(2.0, 2.0, 2.0));
        let plane = meshes.add(Plane3d::new(Vec3::Y, Vec2::splat(200.0)));
        world.insert_resource(meshes);
        world.insert_resource(ShadowFitState::new(AdjustmentMode::Dynamic, VolumeKind::Box));

        let root = world
            .spawn((ShadowSceneRoot, Transform::default(), GlobalTransform::default()))
            .id();
        world.spawn((Mesh3d(cube), GlobalTransform::default(), ChildOf(root)));
        let unloaded = world
            .spawn((Mesh3d(Handle::default()), GlobalTransform::default(), ChildOf(root)))
            .id();
        // Water sits outside the shadow scene
        world.spawn((Mesh3d(plane), GlobalTransform::from_xyz(0.0, -5.0, 0.0)));

        let sun = world
            .spawn((
                DirectionalLight {
                    shadows_enabled: true,
                    ..default()
                },
                GlobalTransform::from(
                    Transform::from_xyz(0.0, 20.0, 0.0).looking_at(Vec3::ZERO, Vec3::Z),
                ),
                ShadowLens::sun(),
                ShadowCaster::default(),
                SunLight,
            ))
            .id();
        let camera = world
            .spawn((
                camera_transform(Vec3::ZERO),
                Projection::Perspective(PerspectiveProjection {
                    fov: FRAC_PI_2,
                    aspect_ratio: 1.0,
                    near: 0.1,
                    far: 100.0,
                    ..default()
                }),
                ShadowFitCamera,
            ))
            .id();

        let mut schedule = fit_schedule();
        schedule.run(&mut world);

        assert!(world.get::<LocalBounds>(unloaded).is_none());
        assert_eq!(
            world.resource::<ShadowFitState>().last_containment,
            Some(Containment::Full)
        );
        let lens = *world.get::<ShadowLens>(sun).unwrap();
        assert!((lens.film_size - Vec2::new(2.0, 2.0)).length() < 1e-3);
        assert!((lens.near - 19.0).abs() < 1e-3);
        assert!((lens.far - 21.0).abs() < 1e-3);
        assert!(world.get::<DirectionalLight>(sun).unwrap().shadows_enabled);

        // Look away from the island
        *world.get_mut::<GlobalTransform>(camera).unwrap() =
            camera_transform(Vec3::new(0.0, 0.0, 60.0));
        schedule.run(&mut world);

        assert!(!world.get::<ShadowCaster>(sun).unwrap().active);
        assert!(!world.get::<DirectionalLight>(sun).unwrap().shadows_enabled);
        assert_eq!(*world.get::<ShadowLens>(sun).unwrap(), lens);

        // And back
        *world.get_mut::<GlobalTransform>(camera).unwrap() = camera_transform(Vec3::ZERO);
        schedule.run(&mut world);

        assert!(world.get::<DirectionalLight>(sun).unwrap().shadows_enabled);
    }

    #[test]
    fn test_set_mode_reports_change() {
        let mut state = ShadowFitState::default();
        assert!(!state.set_mode(AdjustmentMode::Static));
        assert!(state.set_mode(AdjustmentMode::Dynamic));
        assert_eq!(state.mode, AdjustmentMode::Dynamic);
    }
}
