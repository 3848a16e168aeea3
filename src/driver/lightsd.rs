//! lightsd JSON-RPC 2.0 client.
//!
//! Talks to a running lightsd daemon over its unix socket, one connection
//! per call. Responses are read until a complete JSON value parses; lightsd
//! does not frame its replies.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::debug;

use super::{DriverError, FixtureDriver, FixtureState};

pub struct LightsdClient {
    socket_path: PathBuf,
    next_id: AtomicU32,
}

impl LightsdClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            next_id: AtomicU32::new(1),
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, DriverError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = serde_json::to_vec(&encode_request(method, params, id))?;

        let mut stream = UnixStream::connect(&self.socket_path).await?;
        stream.write_all(&payload).await?;
        debug!(method, id, "rpc sent");

        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Ok(value) = serde_json::from_slice::<Value>(&buf) {
                return unwrap_response(value);
            }
        }
        // peer closed before a parseable reply arrived
        unwrap_response(serde_json::from_slice(&buf)?)
    }
}

fn encode_request(method: &str, params: Value, id: u32) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": id,
    })
}

fn unwrap_response(mut value: Value) -> Result<Value, DriverError> {
    if let Some(err) = value.get("error") {
        return Err(DriverError::Rpc(err.to_string()));
    }
    Ok(value.get_mut("result").map(Value::take).unwrap_or(Value::Null))
}

#[async_trait]
impl FixtureDriver for LightsdClient {
    async fn query_state(&self, selector: &str) -> Result<Vec<FixtureState>, DriverError> {
        let result = self.call("get_light_state", json!([selector])).await?;
        Ok(serde_json::from_value(result)?)
    }

    async fn apply_state(
        &self,
        selector: &str,
        hue: f64,
        saturation: f64,
        brightness: f64,
        kelvin: u16,
        fade_secs: f64,
    ) -> Result<(), DriverError> {
        // lightsd takes the transition in milliseconds
        let transition_ms = (fade_secs.max(0.0) * 1000.0).round() as u64;
        self.call(
            "set_light_from_hsbk",
            json!([selector, hue, saturation, brightness, kelvin, transition_ms]),
        )
        .await?;
        Ok(())
    }
}
