// config/mod.rs
use config::Config;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct Settings {
    #[validate(nested)]
    pub server: ServerSettings,
    #[validate(nested)]
    pub metrics: MetricsSettings,
    #[validate(nested)]
    pub driver: DriverSettings,
    #[validate(nested)]
    pub fade: FadeDurations,
    #[validate(length(min = 1, message = "curve needs at least one point"), nested)]
    pub curve: Vec<CurvePoint>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ServerSettings {
    #[validate(length(min = 1))]
    pub address: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MetricsSettings {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DriverSettings {
    /// Path to the lightsd JSON-RPC unix socket.
    #[validate(length(min = 1))]
    pub socket: String,
}

/// The two manual-override fades: a short fade-in and a longer fade-out.
/// Scheduled curve transitions use the boundary delta instead.
#[derive(Debug, Deserialize, Validate)]
pub struct FadeDurations {
    #[validate(range(min = 0.001))]
    pub in_secs: f64,
    #[validate(range(min = 0.001))]
    pub out_secs: f64,
}

// Serialize is required by the length validator on `Settings::curve`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CurvePoint {
    #[validate(length(min = 1))]
    pub name: String,
    /// Local wall time, `HH:MM`.
    pub at: String,
    #[validate(range(min = 0.0, max = 360.0))]
    pub hue: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub saturation: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub brightness: f64,
    #[validate(range(min = 1500, max = 9000))]
    pub kelvin: u16,
}

impl Settings {
    pub fn new() -> Result<Self, config::ConfigError> {
        let settings = Config::builder()
            .add_source(config::File::with_name("config/config"))
            .add_source(config::Environment::with_prefix("APP"))
            .build()?;

        settings.try_deserialize()
    }
}
