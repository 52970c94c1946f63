use std::path::PathBuf;

use crate::placement::{PlacementPolicy, ReticleStyle};
use crate::xr::sim::SimConfig;

const ORIGIN_VAR: &str = "ARPLACE_ORIGIN";
const HIT_TEST_WARMUP_VAR: &str = "ARPLACE_HIT_TEST_WARMUP";
const UNSUPPORTED_VAR: &str = "ARPLACE_UNSUPPORTED";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub asset_path: PathBuf,
    /// Where the experience is considered to be served from; gates activation.
    pub origin: String,
    pub placement: PlacementPolicy,
    pub reticle: ReticleStyle,
    pub sim: SimConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            asset_path: PathBuf::from("assets/cup.glb"),
            origin: "https://localhost".to_string(),
            placement: PlacementPolicy::default(),
            reticle: ReticleStyle::default(),
            sim: SimConfig::default(),
        }
    }
}

impl AppConfig {
    /// Defaults, overridden by the first command line argument (asset path) and environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(path) = std::env::args_os().nth(1) {
            config.asset_path = PathBuf::from(path);
        }

        config.apply_overrides(|name| std::env::var(name).ok());
        config
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(origin) = var(ORIGIN_VAR) {
            self.origin = origin;
        }

        if let Some(frames) = var(HIT_TEST_WARMUP_VAR) {
            match frames.trim().parse() {
                Ok(frames) => self.sim.hit_test_warmup_frames = frames,
                Err(_) => log::warn!(
                    "Ignoring {}={:?}: not a frame count",
                    HIT_TEST_WARMUP_VAR,
                    frames
                ),
            }
        }

        if var(UNSUPPORTED_VAR).is_some() {
            self.sim.supported = false;
        }
    }
}
