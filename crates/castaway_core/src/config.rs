//! Scene configuration for the castaway island demo.
//!
//! [`CastawayConfig::default`] reproduces the stock scene. A JSON file can
//! override any subset of fields (missing fields keep their defaults):
//!
//! ```json
//! {
//!   "sun": { "period_secs": 20.0, "temperature_kelvin": 4500.0 },
//!   "shadow": { "initial_mode": "dynamic", "volume_kind": "sphere" }
//! }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use castaway_core::{load_config, save_config, CastawayConfig};
//!
//! save_config(&CastawayConfig::default(), "castaway.json")?;
//! let config = load_config("castaway.json")?;
//! ```

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::bounds::VolumeKind;
use crate::lens::SHADOW_MAP_SIZE;
use crate::shadow_fit::AdjustmentMode;

/// Default configuration file looked up next to the executable's working directory.
pub const DEFAULT_CONFIG_PATH: &str = "castaway.json";

/// Light blue sky, (135, 206, 235) / 255.
pub const SKY_COLOR: [f32; 3] = [135.0 / 255.0, 206.0 / 255.0, 235.0 / 255.0];

/// Largest shadow map edge accepted (wgpu's default 2D texture limit).
pub const MAX_SHADOW_MAP_SIZE: u32 = 8192;

/// Sun color temperature in Kelvin.
pub const SUN_TEMPERATURE: f32 = 5000.0;

/// Errors that can occur while loading or saving configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// File system error
    Io(std::io::Error),
    /// JSON (de)serialization error
    Json(String),
    /// Values that would break the scene
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Json(e) => write!(f, "JSON error: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Window settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    pub title: String,
    pub resolution: (u32, u32),
    pub vsync: bool,
    /// MSAA sample count (1 disables multisampling).
    pub msaa_samples: u32,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "Castaway Island".to_string(),
            resolution: (1280, 720),
            vsync: false,
            msaa_samples: 4,
        }
    }
}

/// Scene camera placement and lens.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub position: [f32; 3],
    pub look_at: [f32; 3],
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            position: [-35.0, 6.0, 6.0],
            look_at: [0.0, 2.0, 0.0],
            fov_degrees: 90.0,
            near: 0.1,
            far: 250.0,
        }
    }
}

/// Sky color, sky (ambient) light and distance fog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkySettings {
    /// Linear RGB.
    pub color: [f32; 3],
    /// Ambient light color = sky color * this.
    pub ambient_scale: f32,
    /// Ambient light brightness (Bevy units).
    pub ambient_brightness: f32,
    pub fog_start: f32,
    pub fog_end: f32,
}

impl Default for SkySettings {
    fn default() -> Self {
        Self {
            color: SKY_COLOR,
            ambient_scale: 0.04,
            ambient_brightness: 500.0,
            fog_start: 0.0,
            fog_end: 320.0,
        }
    }
}

/// Pseudo-infinite water plane.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterSettings {
    /// Half width / half depth of the plane before scaling.
    pub half_size: [f32; 2],
    pub scale: f32,
    pub height: f32,
    /// Linear RGBA base color.
    pub color: [f32; 4],
}

impl Default for WaterSettings {
    fn default() -> Self {
        Self {
            half_size: [200.0, 150.0],
            scale: 500.0,
            height: 0.0,
            color: [0.0, 0.7, 0.9, 1.0],
        }
    }
}

/// Sun light placement, color, animation and initial lens.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SunSettings {
    pub position: [f32; 3],
    pub look_at: [f32; 3],
    pub temperature_kelvin: f32,
    /// Multiplier on the temperature color.
    pub intensity_scale: f32,
    /// Base illuminance (lux) before `intensity_scale`.
    pub illuminance: f32,
    /// Seconds per full pitch turn.
    pub period_secs: f32,
    pub lens_near: f32,
    pub lens_far: f32,
    pub lens_film_size: [f32; 2],
    pub shadow_map_size: u32,
}

impl Default for SunSettings {
    fn default() -> Self {
        Self {
            position: [10.0, -10.0, 10.0],
            look_at: [0.0, 0.0, 0.0],
            temperature_kelvin: SUN_TEMPERATURE,
            intensity_scale: 4.0,
            illuminance: 2_500.0,
            period_secs: 10.0,
            lens_near: 1.0,
            lens_far: 30.0,
            lens_film_size: [20.0, 40.0],
            shadow_map_size: SHADOW_MAP_SIZE,
        }
    }
}

/// Shadow frustum fitting settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowSettings {
    pub initial_mode: AdjustmentMode,
    /// Shape of the cached scene volume for the dynamic fit.
    pub volume_kind: VolumeKind,
}

/// Asset locations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetSettings {
    /// glTF file holding the island scene (relative to the asset folder).
    pub island_model: String,
    /// Rotation about X applied to the island (model up-axis fix).
    pub island_pitch_degrees: f32,
    /// Folder for F12 screenshots.
    pub screenshot_dir: String,
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            island_model: "island.glb".to_string(),
            island_pitch_degrees: 90.0,
            screenshot_dir: "screenshots".to_string(),
        }
    }
}

/// Full scene configuration.
#[derive(Resource, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CastawayConfig {
    pub window: WindowSettings,
    pub camera: CameraSettings,
    pub sky: SkySettings,
    pub water: WaterSettings,
    pub sun: SunSettings,
    pub shadow: ShadowSettings,
    pub assets: AssetSettings,
}

impl CastawayConfig {
    /// Reject values the scene cannot be built from.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.sun.period_secs <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "sun.period_secs must be positive, got {}",
                self.sun.period_secs
            )));
        }
        if self.sky.fog_end <= self.sky.fog_start {
            return Err(ConfigError::Invalid(format!(
                "sky.fog_end ({}) must be greater than sky.fog_start ({})",
                self.sky.fog_end, self.sky.fog_start
            )));
        }
        if self.camera.near <= 0.0 || self.camera.far <= self.camera.near {
            return Err(ConfigError::Invalid(format!(
                "camera near/far must satisfy 0 < near < far, got {}..{}",
                self.camera.near, self.camera.far
            )));
        }
        if !(1.0..180.0).contains(&self.camera.fov_degrees) {
            return Err(ConfigError::Invalid(format!(
                "camera.fov_degrees out of range: {}",
                self.camera.fov_degrees
            )));
        }
        if self.sun.lens_far <= self.sun.lens_near {
            return Err(ConfigError::Invalid(format!(
                "sun lens far ({}) must be greater than near ({})",
                self.sun.lens_far, self.sun.lens_near
            )));
        }
        if self.sun.lens_film_size.iter().any(|s| *s <= 0.0) {
            return Err(ConfigError::Invalid(
                "sun.lens_film_size must be positive".to_string(),
            ));
        }
        if self.sun.temperature_kelvin <= 0.0 {
            return Err(ConfigError::Invalid(
                "sun.temperature_kelvin must be positive".to_string(),
            ));
        }
        if !(1..=MAX_SHADOW_MAP_SIZE).contains(&self.sun.shadow_map_size) {
            return Err(ConfigError::Invalid(format!(
                "sun.shadow_map_size must be in 1..={}, got {}",
                MAX_SHADOW_MAP_SIZE, self.sun.shadow_map_size
            )));
        }
        if !matches!(self.window.msaa_samples, 1 | 2 | 4 | 8) {
            return Err(ConfigError::Invalid(format!(
                "window.msaa_samples must be 1, 2, 4 or 8, got {}",
                self.window.msaa_samples
            )));
        }
        Ok(())
    }

    pub fn sky_color(&self) -> Color {
        let [r, g, b] = self.sky.color;
        Color::linear_rgb(r, g, b)
    }

    pub fn ambient_color(&self) -> Color {
        let [r, g, b] = self.sky.color;
        let s = self.sky.ambient_scale;
        Color::linear_rgb(r * s, g * s, b * s)
    }

    pub fn water_color(&self) -> Color {
        let [r, g, b, a] = self.water.color;
        Color::linear_rgba(r, g, b, a)
    }

    pub fn sun_color(&self) -> Color {
        color_temperature(self.sun.temperature_kelvin)
    }

    pub fn sun_illuminance(&self) -> f32 {
        self.sun.illuminance * self.sun.intensity_scale
    }
}

/// Approximate color of a black body at `kelvin`, normalized to a max channel of 1.
///
/// Curve fit over 1000 K - 40000 K (Tanner Helland).
pub fn color_temperature(kelvin: f32) -> Color {
    let t = kelvin.clamp(1000.0, 40000.0) / 100.0;

    let r = if t <= 66.0 {
        255.0
    } else {
        329.698_73 * (t - 60.0).powf(-0.133_204_76)
    };
    let g = if t <= 66.0 {
        99.470_8 * t.ln() - 161.119_57
    } else {
        288.122_16 * (t - 60.0).powf(-0.075_514_85)
    };
    let b = if t >= 66.0 {
        255.0
    } else if t <= 19.0 {
        0.0
    } else {
        138.517_73 * (t - 10.0).ln() - 305.044_8
    };

    let rgb = Vec3::new(r, g, b).clamp(Vec3::ZERO, Vec3::splat(255.0)) / 255.0;
    let rgb = rgb / rgb.max_element().max(f32::EPSILON);
    Color::srgb(rgb.x, rgb.y, rgb.z)
}

/// Load configuration from a JSON file and validate it.
pub fn load_config<P: AsRef<Path>>(path: P) -> ConfigResult<CastawayConfig> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let config: CastawayConfig =
        serde_json::from_reader(reader).map_err(|e| ConfigError::Json(e.to_string()))?;
    config.validate()?;

    Ok(config)
}

/// Save configuration as pretty-printed JSON.
pub fn save_config<P: AsRef<Path>>(config: &CastawayConfig, path: P) -> ConfigResult<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, config)
        .map_err(|e| ConfigError::Json(e.to_string()))?;
    writer.flush()?;

    Ok(())
}

/// Where the running configuration came from.
#[derive(Resource, Clone, Debug, PartialEq)]
pub enum ConfigSource {
    Defaults { missing: PathBuf },
    File(PathBuf),
    /// The file exists but could not be used.
    Fallback { path: PathBuf, error: String },
}

impl ConfigSource {
    /// Log the choice. Called once logging is up.
    pub fn log(&self) {
        match self {
            ConfigSource::Defaults { missing } => {
                info!("No config at {}, using defaults", missing.display())
            }
            ConfigSource::File(path) => info!("Loaded config from {}", path.display()),
            ConfigSource::Fallback { path, error } => {
                warn!("Ignoring {}: {}; using defaults", path.display(), error)
            }
        }
    }
}

/// Load `path` when it exists, otherwise use defaults.
///
/// A file that exists but fails to load is ignored; the returned
/// [`ConfigSource`] records why.
pub fn load_or_default<P: AsRef<Path>>(path: P) -> (CastawayConfig, ConfigSource) {
    let path = path.as_ref();
    if !path.exists() {
        let source = ConfigSource::Defaults {
            missing: path.to_path_buf(),
        };
        return (CastawayConfig::default(), source);
    }
    match load_config(path) {
        Ok(config) => (config, ConfigSource::File(path.to_path_buf())),
        Err(e) => {
            let source = ConfigSource::Fallback {
                path: path.to_path_buf(),
                error: e.to_string(),
            };
            (CastawayConfig::default(), source)
        }
    }
}
