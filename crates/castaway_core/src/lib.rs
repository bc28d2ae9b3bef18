//! Core of the Castaway Island demo.
//!
//! This crate provides:
//! - Bounding volumes (box and sphere) with containment classification
//! - The sun's orthographic shadow lens and light-space conventions
//! - Scene and camera bounds queries
//! - Static and dynamic shadow frustum fitting
//! - Sun animation
//! - Scene assembly, debug tools and configuration

pub mod bounds;
pub mod config;
pub mod debug_tools;
pub mod island;
pub mod lens;
pub mod scene_bounds;
pub mod shadow_fit;
pub mod sun_cycle;

pub use bounds::{BoundingSphere, BoundingVolume, Bounds, Containment, VolumeKind};
pub use config::{
    color_temperature, load_config, load_or_default, save_config, CastawayConfig, ConfigError,
    ConfigResult, ConfigSource, DEFAULT_CONFIG_PATH,
};
pub use debug_tools::{DebugToggles, DebugToolsPlugin, OrbitCamera, ScreenshotCounter};
pub use island::{adjust_colors, CastawayApp, CastawayPlugin, SceneCamera};
pub use lens::{light_space_from_world, ShadowCaster, ShadowLens, SHADOW_MAP_SIZE};
pub use scene_bounds::{
    CameraView, CasterGeometry, LocalBounds, SceneBoundsSource, SceneGeometry, ShadowSceneRoot,
    ViewFrustumSource, ViewProjection,
};
pub use shadow_fit::{
    fit_dynamic, fit_static, run_fit, tighten_to_view, AdjustmentMode, DynamicFit, FitError,
    FitOutcome, LensFit, ShadowFitCamera, ShadowFitPlugin, ShadowFitState, SunLight,
};
pub use sun_cycle::{SunCycle, SunCyclePlugin};
