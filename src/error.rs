// error.rs
use thiserror::Error;

use crate::driver::DriverError;

#[derive(Error, Debug)]
pub enum AppError {
    /// No fixtures reachable at startup. Fatal: there is nothing to control.
    #[error("fixture driver unreachable: {0}")]
    DriverUnavailable(#[source] DriverError),
    /// A single command failed. Transient: logged and retried next cycle.
    #[error("fixture driver command failed: {0}")]
    DriverCommandFailed(#[source] DriverError),
    #[error("invalid curve configuration: {0}")]
    InvalidCurve(String),
}
