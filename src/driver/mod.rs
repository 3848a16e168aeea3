// driver/mod.rs
mod lightsd;

pub use lightsd::LightsdClient;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Selector understood by the driver; `*` addresses every fixture.
pub const ALL_FIXTURES: &str = "*";

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("socket i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed driver response: {0}")]
    Protocol(#[from] serde_json::Error),
    #[error("driver rejected call: {0}")]
    Rpc(String),
}

/// Power and color of one fixture as reported by the driver.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureState {
    pub label: String,
    pub power: bool,
    /// Hue, saturation, brightness, kelvin.
    pub hsbk: (f64, f64, f64, u16),
}

/// The component that actually talks to the fixtures. The scheduler never
/// cares how; anything that can apply an HSBK target over a fade fits here.
#[async_trait]
pub trait FixtureDriver: Send + Sync {
    async fn query_state(&self, selector: &str) -> Result<Vec<FixtureState>, DriverError>;

    #[allow(clippy::too_many_arguments)]
    async fn apply_state(
        &self,
        selector: &str,
        hue: f64,
        saturation: f64,
        brightness: f64,
        kelvin: u16,
        fade_secs: f64,
    ) -> Result<(), DriverError>;
}
