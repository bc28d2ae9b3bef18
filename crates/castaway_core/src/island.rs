//! Castaway island scene and application builder.
//!
//! Spawns the demo scene from a [`CastawayConfig`]:
//! - scene camera with distance fog
//! - island glTF model under a [`ShadowSceneRoot`]
//! - pseudo-infinite water plane
//! - animated sun with a fitted shadow lens
//! - sky light and clear color
//! - instructions overlay
//!
//! # Example
//!
//! ```ignore
//! use castaway_core::{CastawayApp, AdjustmentMode};
//!
//! fn main() {
//!     CastawayApp::new()
//!         .with_adjustment_mode(AdjustmentMode::Dynamic)
//!         .with_sun_period(20.0)
//!         .run();
//! }
//! ```

use bevy::light::DirectionalLightShadowMap;
use bevy::prelude::*;
use bevy::window::{PresentMode, WindowPlugin};

use crate::bounds::VolumeKind;
use crate::config::{CastawayConfig, ConfigSource};
use crate::debug_tools::DebugToolsPlugin;
use crate::lens::{ShadowCaster, ShadowLens};
use crate::scene_bounds::ShadowSceneRoot;
use crate::shadow_fit::{AdjustmentMode, ShadowFitCamera, ShadowFitPlugin, ShadowFitState, SunLight};
use crate::sun_cycle::{SunCycle, SunCyclePlugin};

/// Title shown in the bottom-right corner.
pub const TITLE: &str = "Bevy Tutorial: Castaway Island";

/// Key bindings listed in the top-left corner.
pub const INSTRUCTIONS: &[&str] = &[
    "[ESC]: Quit",
    "[TAB]: Toggle Lens Readout",
    "[F12]: Save Screenshot",
    "[F11]: Toggle Frame Rate Meter",
    "[F]: Toggle Sun Frustum",
    "[O]: Toggle OOBE mode",
    "[1]: Enable static adjustment mode",
    "[2]: Enable dynamic adjustment mode",
    "[3]: Disable automatic adjustment",
];

/// The camera the scene is viewed (and shadows are fitted) through.
#[derive(Component)]
pub struct SceneCamera;

/// The pseudo-infinite water plane.
#[derive(Component)]
pub struct Water;

/// Root node of the on-screen instructions.
#[derive(Component)]
pub struct InstructionsOverlay;

fn msaa_from_samples(samples: u32) -> Msaa {
    match samples {
        1 => Msaa::Off,
        2 => Msaa::Sample2,
        8 => Msaa::Sample8,
        _ => Msaa::Sample4,
    }
}

/// Spawn the scene camera.
pub fn spawn_camera(commands: &mut Commands, config: &CastawayConfig) -> Entity {
    let camera = &config.camera;
    let position = Vec3::from(camera.position);
    let look_at = Vec3::from(camera.look_at);

    commands
        .spawn((
            Camera3d::default(),
            Projection::Perspective(PerspectiveProjection {
                fov: camera.fov_degrees.to_radians(),
                near: camera.near,
                far: camera.far,
                ..default()
            }),
            msaa_from_samples(config.window.msaa_samples),
            DistanceFog {
                color: config.sky_color(),
                falloff: FogFalloff::Linear {
                    start: config.sky.fog_start,
                    end: config.sky.fog_end,
                },
                ..default()
            },
            Transform::from_translation(position).looking_at(look_at, Vec3::Y),
            SceneCamera,
            ShadowFitCamera,
        ))
        .id()
}

/// Spawn the island model under a shadow scene root.
pub fn spawn_island(
    commands: &mut Commands,
    asset_server: &AssetServer,
    config: &CastawayConfig,
) -> Entity {
    let scene = asset_server.load(GltfAssetLabel::Scene(0).from_asset(config.assets.island_model.clone()));
    let pitch = config.assets.island_pitch_degrees.to_radians();

    commands
        .spawn((
            Name::new("castaway_scene"),
            ShadowSceneRoot,
            Transform::default(),
            Visibility::default(),
        ))
        .with_children(|parent| {
            parent.spawn((
                Name::new("island"),
                SceneRoot(scene),
                Transform::from_rotation(Quat::from_rotation_x(pitch)),
            ));
        })
        .id()
}

/// Spawn the water plane. It is not part of the shadow scene.
pub fn spawn_water(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    config: &CastawayConfig,
) -> Entity {
    let water = &config.water;
    let mesh = meshes.add(Plane3d::new(Vec3::Y, Vec2::from(water.half_size)));
    let material = materials.add(StandardMaterial {
        base_color: config.water_color(),
        perceptual_roughness: 0.3,
        ..default()
    });

    commands
        .spawn((
            Name::new("water"),
            Mesh3d(mesh),
            MeshMaterial3d(material),
            Transform::from_xyz(0.0, water.height, 0.0).with_scale(Vec3::splat(water.scale)),
            Water,
        ))
        .id()
}

/// Spawn the animated sun with its shadow lens.
pub fn spawn_sun(commands: &mut Commands, config: &CastawayConfig) -> Entity {
    let sun = &config.sun;
    let transform = Transform::from_translation(Vec3::from(sun.position))
        .looking_at(Vec3::from(sun.look_at), Vec3::Y);

    let mut lens = ShadowLens::sun();
    lens.set_film_size(Vec2::from(sun.lens_film_size));
    lens.set_near_far(sun.lens_near, sun.lens_far);

    commands
        .spawn((
            Name::new("sun_light"),
            DirectionalLight {
                color: config.sun_color(),
                illuminance: config.sun_illuminance(),
                shadows_enabled: true,
                ..default()
            },
            transform,
            lens,
            ShadowCaster {
                active: true,
                map_size: sun.shadow_map_size,
            },
            SunLight,
            SunCycle::new(sun.period_secs, transform.rotation),
        ))
        .id()
}

/// Insert the sky light and background color.
pub fn spawn_sky(commands: &mut Commands, config: &CastawayConfig) {
    commands.insert_resource(ClearColor(config.sky_color()));
    commands.insert_resource(AmbientLight {
        color: config.ambient_color(),
        brightness: config.sky.ambient_brightness,
        affects_lightmapped_meshes: false,
    });
    commands.insert_resource(DirectionalLightShadowMap {
        size: config.sun.shadow_map_size as usize,
    });
}

/// Spawn the title and key list overlay.
pub fn spawn_instructions(commands: &mut Commands) -> Entity {
    let root = commands
        .spawn((
            InstructionsOverlay,
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                ..default()
            },
        ))
        .id();

    commands.entity(root).with_children(|parent| {
        parent.spawn((
            Text::new(INSTRUCTIONS.join("\n")),
            TextFont {
                font_size: 16.0,
                ..default()
            },
            TextColor(Color::WHITE),
            Node {
                position_type: PositionType::Absolute,
                top: Val::Px(12.0),
                left: Val::Px(12.0),
                ..default()
            },
        ));
        parent.spawn((
            Text::new(TITLE),
            TextFont {
                font_size: 24.0,
                ..default()
            },
            TextColor(Color::WHITE),
            Node {
                position_type: PositionType::Absolute,
                bottom: Val::Px(12.0),
                right: Val::Px(12.0),
                ..default()
            },
        ));
    });

    root
}

/// Startup system: build the whole scene.
pub fn setup_island(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    config: Res<CastawayConfig>,
) {
    spawn_camera(&mut commands, &config);
    spawn_island(&mut commands, &asset_server, &config);
    spawn_water(&mut commands, &mut meshes, &mut materials, &config);
    spawn_sun(&mut commands, &config);
    spawn_sky(&mut commands, &config);
    spawn_instructions(&mut commands);

    info!(
        "Castaway island ready: sun period {:.1}s, adjustment mode {}",
        config.sun.period_secs,
        config.shadow.initial_mode.label()
    );
}

fn log_config_source(source: Option<Res<ConfigSource>>) {
    if let Some(source) = source {
        source.log();
    }
}

/// Set the background, sky light and fog to one color (time of day).
pub fn adjust_colors(world: &mut World, color: Color) {
    world.insert_resource(ClearColor(color));
    if let Some(mut ambient) = world.get_resource_mut::<AmbientLight>() {
        ambient.color = color;
    }
    let mut fogs = world.query::<&mut DistanceFog>();
    for mut fog in fogs.iter_mut(world) {
        fog.color = color;
    }
}

/// Plugin with the castaway scene, the shadow fitter, the sun cycle and debug tools.
///
/// Expects a [`CastawayConfig`] resource; inserts the default one otherwise.
pub struct CastawayPlugin;

impl Plugin for CastawayPlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<CastawayConfig>() {
            app.insert_resource(CastawayConfig::default());
        }
        let (mode, kind) = {
            let config = app.world().resource::<CastawayConfig>();
            (config.shadow.initial_mode, config.shadow.volume_kind)
        };

        app.insert_resource(ShadowFitState::new(mode, kind))
            .add_plugins((ShadowFitPlugin, SunCyclePlugin, DebugToolsPlugin))
            .add_systems(Startup, (log_config_source, setup_island).chain());
    }
}

/// Builder for the castaway demo app.
pub struct CastawayApp {
    config: CastawayConfig,
    source: Option<ConfigSource>,
}

impl Default for CastawayApp {
    fn default() -> Self {
        Self::new()
    }
}

impl CastawayApp {
    pub fn new() -> Self {
        Self::from_config(CastawayConfig::default())
    }

    pub fn from_config(config: CastawayConfig) -> Self {
        Self {
            config,
            source: None,
        }
    }

    /// Record where the config came from; logged at startup.
    pub fn with_config_source(mut self, source: ConfigSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Set window title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.config.window.title = title.into();
        self
    }

    /// Set window resolution.
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.config.window.resolution = (width, height);
        self
    }

    /// Set the initial shadow adjustment mode.
    pub fn with_adjustment_mode(mut self, mode: AdjustmentMode) -> Self {
        self.config.shadow.initial_mode = mode;
        self
    }

    /// Use a box or sphere for the cached scene volume.
    pub fn with_volume_kind(mut self, kind: VolumeKind) -> Self {
        self.config.shadow.volume_kind = kind;
        self
    }

    /// Seconds per full sun turn.
    pub fn with_sun_period(mut self, period_secs: f32) -> Self {
        self.config.sun.period_secs = period_secs;
        self
    }

    pub fn config(&self) -> &CastawayConfig {
        &self.config
    }

    /// Build the app without running it.
    pub fn build(self) -> App {
        let window = &self.config.window;
        let present_mode = if window.vsync {
            PresentMode::AutoVsync
        } else {
            PresentMode::AutoNoVsync
        };

        let mut app = App::new();
        app.add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: window.title.clone(),
                resolution: window.resolution.into(),
                present_mode,
                ..default()
            }),
            ..default()
        }));
        app.insert_resource(ClearColor(self.config.sky_color()));
        app.insert_resource(self.config);
        if let Some(source) = self.source {
            app.insert_resource(source);
        }
        app.add_plugins(CastawayPlugin);
        app
    }

    pub fn run(self) -> AppExit {
        self.build().run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msaa_mapping() {
        assert_eq!(msaa_from_samples(1), Msaa::Off);
        assert_eq!(msaa_from_samples(4), Msaa::Sample4);
        assert_eq!(msaa_from_samples(8), Msaa::Sample8);
    }

    #[test]
    fn test_builder_overrides_config() {
        let app = CastawayApp::new()
            .with_title("Test")
            .with_resolution(640, 480)
            .with_adjustment_mode(AdjustmentMode::Disabled)
            .with_volume_kind(VolumeKind::Sphere)
            .with_sun_period(3.0);
        let config = app.config();
        assert_eq!(config.window.title, "Test");
        assert_eq!(config.window.resolution, (640, 480));
        assert_eq!(config.shadow.initial_mode, AdjustmentMode::Disabled);
        assert_eq!(config.shadow.volume_kind, VolumeKind::Sphere);
        assert_eq!(config.sun.period_secs, 3.0);
    }

    #[test]
    fn test_instructions_cover_every_binding() {
        assert_eq!(INSTRUCTIONS.len(), 9);
        assert!(INSTRUCTIONS.iter().any(|line| line.starts_with("[F12]")));
        assert!(INSTRUCTIONS.iter().any(|line| line.starts_with("[3]")));
    }

    #[test]
    fn test_adjust_colors_updates_background_sky_and_fog() {
        let mut world = World::new();
        world.insert_resource(ClearColor(Color::BLACK));
        world.insert_resource(AmbientLight::default());
        let fog = world.spawn(DistanceFog::default()).id();

        let dusk = Color::srgb(0.9, 0.4, 0.2);
        adjust_colors(&mut world, dusk);

        assert_eq!(world.resource::<ClearColor>().0, dusk);
        assert_eq!(world.resource::<AmbientLight>().color, dusk);
        assert_eq!(world.get::<DistanceFog>(fog).map(|f| f.color), Some(dusk));
    }
}
