use bevy::prelude::*;
use castaway_core::{load_or_default, CastawayApp, DEFAULT_CONFIG_PATH};

fn main() -> AppExit {
    // Optional first argument: path to a JSON config
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let (config, source) = load_or_default(&path);

    CastawayApp::from_config(config)
        .with_config_source(source)
        .run()
}
