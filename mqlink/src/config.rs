use std::time::Duration;

use config::{Config, File};
use serde::Deserialize;

use mqlink_utils::{deserialize_duration, deserialize_duration_option};

use crate::error::ClientError;

/// Client settings, loadable from a TOML file and environment overrides.
///
/// Every field has a default, so `ClientOptions::default()` yields a
/// working local-broker configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientOptions {
    //Broker host name or address
    #[serde(default = "ClientOptions::host_default")]
    pub host: String,

    //Broker TCP port
    #[serde(default = "ClientOptions::port_default")]
    pub port: u16,

    //Connect on first use instead of waiting for an explicit connect call
    #[serde(default = "ClientOptions::auto_connect_default")]
    pub auto_connect: bool,

    //Delay between connect attempts while the broker is unreachable
    #[serde(
        default = "ClientOptions::reconnect_interval_default",
        deserialize_with = "deserialize_duration"
    )]
    pub reconnect_interval: Duration,

    //Bound on a single connect attempt; unset waits as long as the
    //transport takes
    #[serde(default, deserialize_with = "deserialize_duration_option")]
    pub connect_timeout: Option<Duration>,

    //Upper bound on waiting for in-flight inbound messages during stop()
    #[serde(
        default = "ClientOptions::stop_drain_timeout_default",
        deserialize_with = "deserialize_duration"
    )]
    pub stop_drain_timeout: Duration,
}

impl Default for ClientOptions {
    #[inline]
    fn default() -> Self {
        Self {
            host: Self::host_default(),
            port: Self::port_default(),
            auto_connect: Self::auto_connect_default(),
            reconnect_interval: Self::reconnect_interval_default(),
            connect_timeout: None,
            stop_drain_timeout: Self::stop_drain_timeout_default(),
        }
    }
}

impl ClientOptions {
    fn host_default() -> String {
        "127.0.0.1".into()
    }
    fn port_default() -> u16 {
        1883
    }
    fn auto_connect_default() -> bool {
        true
    }
    fn reconnect_interval_default() -> Duration {
        Duration::from_secs(5)
    }
    fn stop_drain_timeout_default() -> Duration {
        Duration::from_secs(3)
    }

    /// "host:port" string for the transport layer.
    #[inline]
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Loads options from an optional file plus `MQLINK_`-prefixed
    /// environment variables. Missing file falls back to defaults.
    pub fn load(cfg_name: &str) -> Result<Self, ClientError> {
        let builder = Config::builder()
            .add_source(File::with_name(cfg_name).required(false))
            .add_source(config::Environment::with_prefix("mqlink").try_parsing(true));

        let opts = builder.build()?.try_deserialize()?;
        Ok(opts)
    }
}
