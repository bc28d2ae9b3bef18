//! Debug key bindings and overlays.
//!
//! | key | action |
//! |-----|--------|
//! | Esc | quit |
//! | Tab | toggle lens readout |
//! | F12 | save screenshot |
//! | F11 | toggle frame rate meter |
//! | F | toggle sun frustum gizmo |
//! | O | toggle OOBE (detached orbit camera) |
//! | 1 / 2 / 3 | static / dynamic / disabled shadow adjustment |
//!
//! In OOBE mode the shadow fitter keeps using the scene camera; its frustum
//! is drawn so the fit can be inspected from outside.

use bevy::app::AppExit;
use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::input::mouse::{AccumulatedMouseMotion, AccumulatedMouseScroll};
use bevy::prelude::*;
use bevy::render::view::screenshot::{save_to_disk, Screenshot};
use std::path::PathBuf;

use crate::bounds::Containment;
use crate::config::CastawayConfig;
use crate::island::SceneCamera;
use crate::lens::{ShadowCaster, ShadowLens};
use crate::scene_bounds::CameraView;
use crate::shadow_fit::{AdjustmentMode, ShadowFitState, SunLight};

/// On/off state of every debug overlay.
#[derive(Resource, Clone, Debug, Default, PartialEq)]
pub struct DebugToggles {
    pub show_readout: bool,
    pub show_frame_rate: bool,
    pub show_frustum: bool,
    pub oobe: bool,
}

/// Lens readout text ("buffer viewer").
#[derive(Component)]
pub struct LensReadout;

/// Frame rate meter text.
#[derive(Component)]
pub struct FrameRateMeter;

/// Numbered screenshot paths.
#[derive(Resource, Clone, Debug)]
pub struct ScreenshotCounter {
    pub dir: PathBuf,
    pub next: u32,
}

impl Default for ScreenshotCounter {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("screenshots"),
            next: 0,
        }
    }
}

impl ScreenshotCounter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            next: 0,
        }
    }

    /// Path for the next screenshot, advancing the counter.
    pub fn next_path(&mut self) -> PathBuf {
        let path = self.dir.join(format!("castaway_{}.png", self.next));
        self.next += 1;
        path
    }
}

/// Save the primary window to `path` after the current frame renders.
pub fn capture_screenshot(commands: &mut Commands, path: PathBuf) {
    commands
        .spawn(Screenshot::primary_window())
        .observe(save_to_disk(path));
}

/// Detached camera orbiting a target point.
///
/// - Left mouse drag: rotate (azimuth and elevation)
/// - Scroll wheel: zoom
#[derive(Component)]
pub struct OrbitCamera {
    pub target: Vec3,
    pub distance: f32,
    /// Horizontal angle (radians)
    pub azimuth: f32,
    /// Vertical angle (radians), clamped short of the poles
    pub elevation: f32,
    pub sensitivity: f32,
    pub zoom_sensitivity: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            distance: 80.0,
            azimuth: -1.0,
            elevation: 0.6,
            sensitivity: 0.005,
            zoom_sensitivity: 4.0,
        }
    }
}

impl OrbitCamera {
    pub fn calculate_position(&self) -> Vec3 {
        let x = self.distance * self.elevation.cos() * self.azimuth.sin();
        let y = self.distance * self.elevation.sin();
        let z = self.distance * self.elevation.cos() * self.azimuth.cos();
        self.target + Vec3::new(x, y, z)
    }

    pub fn rotate(&mut self, delta: Vec2) {
        self.azimuth -= delta.x * self.sensitivity;
        self.elevation = (self.elevation + delta.y * self.sensitivity).clamp(-1.4, 1.4);
    }

    pub fn zoom(&mut self, scroll: f32) {
        self.distance = (self.distance - scroll * self.zoom_sensitivity).clamp(5.0, 400.0);
    }
}

/// Readout panel contents.
pub fn format_lens_readout(
    state: &ShadowFitState,
    lens: &ShadowLens,
    caster: &ShadowCaster,
) -> String {
    let containment = match state.last_containment {
        Some(Containment::Disjoint) => "disjoint",
        Some(Containment::Partial) => "partial",
        Some(Containment::Full) => "full",
        None => "-",
    };
    format!(
        "mode: {} ({})\nactive: {}\noffset: ({:.2}, {:.2})\nsize: ({:.2}, {:.2})\nnear/far: {:.2} / {:.2}\ncontainment: {}\nskipped fits: {}\nshadow map: {}x{}",
        state.mode.label(),
        state.mode.index(),
        caster.active,
        lens.film_offset.x,
        lens.film_offset.y,
        lens.film_size.x,
        lens.film_size.y,
        lens.near,
        lens.far,
        containment,
        state.rejected_fits,
        caster.map_size,
        caster.map_size,
    )
}

pub fn format_frame_rate(fps: Option<f64>, frame_ms: Option<f64>) -> String {
    match (fps, frame_ms) {
        (Some(fps), Some(ms)) => format!("{:.1} fps\n{:.2} ms", fps, ms),
        (Some(fps), None) => format!("{:.1} fps", fps),
        _ => "-- fps".to_string(),
    }
}

/// The 12 edges of a box whose corners use [`crate::bounds::Bounds::corners`] ordering.
pub fn box_edges() -> [(usize, usize); 12] {
    let mut edges = [(0, 0); 12];
    let mut n = 0;
    for i in 0..8 {
        for bit in [1, 2, 4] {
            if i & bit == 0 {
                edges[n] = (i, i | bit);
                n += 1;
            }
        }
    }
    edges
}

fn draw_box(gizmos: &mut Gizmos, corners: &[Vec3; 8], color: Color) {
    for (a, b) in box_edges() {
        gizmos.line(corners[a], corners[b], color);
    }
}

fn toggle(flag: &mut bool, what: &str) {
    *flag = !*flag;
    info!("{}: {}", what, if *flag { "on" } else { "off" });
}

/// Esc and the 1/2/3 mode keys.
pub fn handle_control_keys(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut state: ResMut<ShadowFitState>,
    mut exit: EventWriter<AppExit>,
) {
    if keyboard.just_pressed(KeyCode::Escape) {
        info!("Quit requested");
        exit.write(AppExit::Success);
    }

    let modes = [
        (KeyCode::Digit1, 0),
        (KeyCode::Digit2, 1),
        (KeyCode::Digit3, 2),
    ];
    for (key, index) in modes {
        if keyboard.just_pressed(key) {
            state.set_mode(AdjustmentMode::from_index(index));
        }
    }
}

/// Overlay toggles and the screenshot key.
pub fn handle_debug_keys(
    mut commands: Commands,
    keyboard: Res<ButtonInput<KeyCode>>,
    mut toggles: ResMut<DebugToggles>,
    mut screenshots: ResMut<ScreenshotCounter>,
) {
    if keyboard.just_pressed(KeyCode::Tab) {
        toggle(&mut toggles.show_readout, "Lens readout");
    }
    if keyboard.just_pressed(KeyCode::F11) {
        toggle(&mut toggles.show_frame_rate, "Frame rate meter");
    }
    if keyboard.just_pressed(KeyCode::KeyF) {
        toggle(&mut toggles.show_frustum, "Sun frustum");
    }
    if keyboard.just_pressed(KeyCode::KeyO) {
        toggle(&mut toggles.oobe, "OOBE mode");
    }

    if keyboard.just_pressed(KeyCode::F12) {
        if let Err(e) = std::fs::create_dir_all(&screenshots.dir) {
            warn!("Cannot create {}: {}", screenshots.dir.display(), e);
            return;
        }
        let path = screenshots.next_path();
        info!("Saving screenshot to {}", path.display());
        capture_screenshot(&mut commands, path);
    }
}

/// Spawn the (hidden) readout, frame rate meter and OOBE camera.
pub fn setup_debug_overlays(mut commands: Commands) {
    commands.spawn((
        LensReadout,
        Text::new(""),
        TextFont {
            font_size: 14.0,
            ..default()
        },
        TextColor(Color::srgb(1.0, 1.0, 0.6)),
        Node {
            position_type: PositionType::Absolute,
            bottom: Val::Px(12.0),
            left: Val::Px(12.0),
            ..default()
        },
        Visibility::Hidden,
    ));

    commands.spawn((
        FrameRateMeter,
        Text::new(""),
        TextFont {
            font_size: 14.0,
            ..default()
        },
        TextColor(Color::WHITE),
        Node {
            position_type: PositionType::Absolute,
            top: Val::Px(12.0),
            right: Val::Px(12.0),
            ..default()
        },
        Visibility::Hidden,
    ));

    let orbit = OrbitCamera::default();
    let position = orbit.calculate_position();
    let target = orbit.target;
    commands.spawn((
        Name::new("oobe_camera"),
        Camera3d::default(),
        Camera {
            is_active: false,
            order: 1,
            ..default()
        },
        Transform::from_translation(position).looking_at(target, Vec3::Y),
        orbit,
    ));
}

/// Refresh the lens readout while it is shown.
pub fn update_lens_readout(
    toggles: Res<DebugToggles>,
    state: Res<ShadowFitState>,
    lights: Query<(&ShadowLens, &ShadowCaster), With<SunLight>>,
    mut readouts: Query<(&mut Text, &mut Visibility), With<LensReadout>>,
) {
    for (mut text, mut visibility) in readouts.iter_mut() {
        let wanted = if toggles.show_readout {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
        visibility.set_if_neq(wanted);
        if !toggles.show_readout {
            continue;
        }
        if let Some((lens, caster)) = lights.iter().next() {
            text.0 = format_lens_readout(&state, lens, caster);
        }
    }
}

/// Refresh the frame rate meter while it is shown.
pub fn update_frame_rate_meter(
    toggles: Res<DebugToggles>,
    diagnostics: Res<DiagnosticsStore>,
    mut meters: Query<(&mut Text, &mut Visibility), With<FrameRateMeter>>,
) {
    let fps = diagnostics
        .get(&FrameTimeDiagnosticsPlugin::FPS)
        .and_then(|d| d.smoothed());
    let frame_ms = diagnostics
        .get(&FrameTimeDiagnosticsPlugin::FRAME_TIME)
        .and_then(|d| d.smoothed());

    for (mut text, mut visibility) in meters.iter_mut() {
        let wanted = if toggles.show_frame_rate {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
        visibility.set_if_neq(wanted);
        if toggles.show_frame_rate {
            text.0 = format_frame_rate(fps, frame_ms);
        }
    }
}

/// Draw the sun's shadow volume, and the scene camera frustum in OOBE mode.
pub fn draw_debug_gizmos(
    mut gizmos: Gizmos,
    toggles: Res<DebugToggles>,
    lights: Query<(&GlobalTransform, &ShadowLens, &ShadowCaster), With<SunLight>>,
    cameras: Query<(&GlobalTransform, &Projection), With<SceneCamera>>,
) {
    if toggles.show_frustum {
        for (transform, lens, caster) in lights.iter() {
            let color = if caster.active {
                Color::srgb(1.0, 0.9, 0.2)
            } else {
                Color::srgb(0.5, 0.5, 0.5)
            };
            draw_box(&mut gizmos, &lens.world_corners(transform), color);
        }
    }

    if toggles.oobe {
        for (transform, projection) in cameras.iter() {
            if let Some(view) = CameraView::from_camera(transform, projection) {
                draw_box(&mut gizmos, &view.world_corners(), Color::srgb(0.3, 0.8, 1.0));
            }
        }
    }
}

/// Switch rendering between the scene camera and the OOBE camera.
pub fn apply_oobe(
    toggles: Res<DebugToggles>,
    mut scene_cameras: Query<&mut Camera, (With<SceneCamera>, Without<OrbitCamera>)>,
    mut oobe_cameras: Query<&mut Camera, (With<OrbitCamera>, Without<SceneCamera>)>,
) {
    if !toggles.is_changed() {
        return;
    }
    for mut camera in scene_cameras.iter_mut() {
        camera.is_active = !toggles.oobe;
    }
    for mut camera in oobe_cameras.iter_mut() {
        camera.is_active = toggles.oobe;
    }
}

/// Mouse control of the OOBE camera.
pub fn orbit_camera_system(
    mouse_button: Res<ButtonInput<MouseButton>>,
    mouse_motion: Res<AccumulatedMouseMotion>,
    mouse_scroll: Res<AccumulatedMouseScroll>,
    mut query: Query<(&mut OrbitCamera, &mut Transform)>,
) {
    for (mut orbit, mut transform) in query.iter_mut() {
        if mouse_button.pressed(MouseButton::Left) {
            orbit.rotate(mouse_motion.delta);
        }
        if mouse_scroll.delta.y != 0.0 {
            orbit.zoom(mouse_scroll.delta.y);
        }

        transform.translation = orbit.calculate_position();
        transform.look_at(orbit.target, Vec3::Y);
    }
}

fn oobe_enabled(toggles: Res<DebugToggles>) -> bool {
    toggles.oobe
}

/// Plugin with every debug binding and overlay.
///
/// Adds `FrameTimeDiagnosticsPlugin` if not already present.
pub struct DebugToolsPlugin;

impl Plugin for DebugToolsPlugin {
    fn build(&self, app: &mut App) {
        if !app.is_plugin_added::<FrameTimeDiagnosticsPlugin>() {
            app.add_plugins(FrameTimeDiagnosticsPlugin::default());
        }

        let screenshots = app
            .world()
            .get_resource::<CastawayConfig>()
            .map(|config| ScreenshotCounter::new(&config.assets.screenshot_dir))
            .unwrap_or_default();

        app.init_resource::<DebugToggles>()
            .insert_resource(screenshots)
            .add_systems(Startup, setup_debug_overlays)
            .add_systems(
                Update,
                (
                    handle_control_keys,
                    handle_debug_keys,
                    apply_oobe.after(handle_debug_keys),
                    orbit_camera_system.run_if(oobe_enabled),
                    update_frame_rate_meter,
                ),
            )
            .add_systems(
                PostUpdate,
                (update_lens_readout, draw_debug_gizmos)
                    .after(crate::shadow_fit::adjust_shadow_lens),
            );
    }
}
