// Copyright 2024 - developers of the `gremlin-rs` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use crate::ConfigError;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// The recognized configuration keys, with their defaults.
///
/// Three loaders can feed this: [`Configuration::merge_from_map`] (used by
/// [`config_from_yaml`] and [`config_from_json`]) and [`config_from_env`].
/// All three compare keys case-insensitively.
#[derive(Clone, Debug, PartialEq)]
pub struct Configuration {
    pub scheme: String,
    pub hosts: Vec<String>,
    pub port: u16,
    pub ssl_certfile: String,
    pub ssl_keyfile: String,
    pub ssl_password: String,
    pub username: String,
    pub password: String,
    /// Per-result await timeout, in seconds. `None` means wait forever.
    pub response_timeout: Option<f64>,
    pub max_conns: usize,
    pub min_conns: usize,
    pub max_times_acquired: usize,
    pub max_inflight: usize,
    /// Tag identifying the message serializer implementation; the default
    /// resolves to [`gremlin_protocol::GraphSONV2Serializer`].
    pub message_serializer: String,
    /// Graph-provider tag, carried through for diagnostics only.
    pub provider: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            scheme: "ws".to_string(),
            hosts: vec!["localhost".to_string()],
            port: 8182,
            ssl_certfile: String::new(),
            ssl_keyfile: String::new(),
            ssl_password: String::new(),
            username: String::new(),
            password: String::new(),
            response_timeout: None,
            max_conns: 4,
            min_conns: 1,
            max_times_acquired: 16,
            max_inflight: 64,
            message_serializer: "GraphSONV2".to_string(),
            provider: "TinkerGraph".to_string(),
        }
    }
}

impl Configuration {
    pub fn response_timeout_duration(&self) -> Option<Duration> {
        self.response_timeout.map(Duration::from_secs_f64)
    }

    /// One URL per configured host, e.g. `ws://localhost:8182/gremlin` —
    /// the server's endpoint path is conventionally `/gremlin`. Built through
    /// `url::Url` so a malformed scheme or host is caught here rather than
    /// surfacing as an opaque WebSocket connect failure later.
    pub fn host_urls(&self) -> Result<Vec<String>, ConfigError> {
        self.hosts
            .iter()
            .map(|host| {
                let mut url = Url::parse(&format!("{}://{}:{}", self.scheme, host, self.port))
                    .map_err(|e| ConfigError(format!("invalid host {host:?}: {e}")))?;
                url.set_path("/gremlin");
                Ok(url.to_string())
            })
            .collect()
    }

    /// Case-insensitively overlays recognized keys from `map` onto `self`.
    /// Unrecognized keys are ignored.
    pub fn merge_from_map(&mut self, map: &Map<String, Value>) -> Result<(), ConfigError> {
        let lower: Map<String, Value> = map
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.clone()))
            .collect();

        macro_rules! str_field {
            ($name:literal, $field:expr) => {
                if let Some(v) = lower.get($name) {
                    $field = v
                        .as_str()
                        .ok_or_else(|| ConfigError(format!("{} must be a string", $name)))?
                        .to_string();
                }
            };
        }
        macro_rules! int_field {
            ($name:literal, $field:expr) => {
                if let Some(v) = lower.get($name) {
                    $field = v
                        .as_u64()
                        .ok_or_else(|| ConfigError(format!("{} must be a non-negative integer", $name)))?
                        as _;
                }
            };
        }

        str_field!("scheme", self.scheme);
        str_field!("ssl_certfile", self.ssl_certfile);
        str_field!("ssl_keyfile", self.ssl_keyfile);
        str_field!("ssl_password", self.ssl_password);
        str_field!("username", self.username);
        str_field!("password", self.password);
        str_field!("message_serializer", self.message_serializer);
        str_field!("provider", self.provider);
        int_field!("port", self.port);
        int_field!("max_conns", self.max_conns);
        int_field!("min_conns", self.min_conns);
        int_field!("max_times_acquired", self.max_times_acquired);
        int_field!("max_inflight", self.max_inflight);

        if let Some(v) = lower.get("hosts") {
            let hosts = v
                .as_array()
                .ok_or_else(|| ConfigError("hosts must be an array".to_string()))?
                .iter()
                .map(|h| h.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| ConfigError("hosts entries must be strings".to_string()))?;
            self.hosts = hosts;
        }

        if let Some(v) = lower.get("response_timeout") {
            self.response_timeout = if v.is_null() {
                None
            } else {
                Some(
                    v.as_f64()
                        .ok_or_else(|| ConfigError("response_timeout must be a number of seconds".to_string()))?,
                )
            };
        }

        if self.min_conns > self.max_conns {
            return Err(ConfigError(format!(
                "min_conns ({}) cannot exceed max_conns ({})",
                self.min_conns, self.max_conns
            )));
        }

        Ok(())
    }
}

fn read_json_map(path: &Path) -> Result<Map<String, Value>, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError(format!("reading {}: {e}", path.display())))?;
    match serde_json::from_str(&contents).map_err(|e| ConfigError(format!("parsing {}: {e}", path.display())))? {
        Value::Object(map) => Ok(map),
        _ => Err(ConfigError(format!("{} is not a JSON object", path.display()))),
    }
}

fn read_yaml_map(path: &Path) -> Result<Map<String, Value>, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError(format!("reading {}: {e}", path.display())))?;
    let value: Value =
        serde_yaml::from_str(&contents).map_err(|e| ConfigError(format!("parsing {}: {e}", path.display())))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ConfigError(format!("{} is not a YAML mapping", path.display()))),
    }
}

/// Loads configuration overrides from a `.json` file.
pub fn config_from_json(config: &mut Configuration, path: impl AsRef<Path>) -> Result<(), ConfigError> {
    config.merge_from_map(&read_json_map(path.as_ref())?)
}

/// Loads configuration overrides from a `.yml`/`.yaml` file.
pub fn config_from_yaml(config: &mut Configuration, path: impl AsRef<Path>) -> Result<(), ConfigError> {
    config.merge_from_map(&read_yaml_map(path.as_ref())?)
}

/// Loads configuration overrides from `{prefix}{KEY}` environment
/// variables, e.g. `GREMLIN_MAX_CONNS=8`. The process environment is the
/// idiomatic Rust stand-in for a module-based config source.
pub fn config_from_env(config: &mut Configuration, prefix: &str) -> Result<(), ConfigError> {
    let mut map = Map::new();
    for (key, value) in std::env::vars() {
        if let Some(suffix) = key.strip_prefix(prefix) {
            map.insert(suffix.to_lowercase(), Value::String(value));
        }
    }
    // Integer/array-typed keys arrive as strings from the environment;
    // coerce the ones merge_from_map expects to be numeric or array typed.
    for key in ["port", "max_conns", "min_conns", "max_times_acquired", "max_inflight"] {
        if let Some(Value::String(s)) = map.get(key).cloned() {
            let n: u64 = s
                .parse()
                .map_err(|_| ConfigError(format!("{prefix}{} must be an integer", key.to_uppercase())))?;
            map.insert(key.to_string(), Value::Number(n.into()));
        }
    }
    if let Some(Value::String(s)) = map.get("hosts").cloned() {
        map.insert(
            "hosts".to_string(),
            Value::Array(s.split(',').map(|h| Value::String(h.trim().to_string())).collect()),
        );
    }
    if let Some(Value::String(s)) = map.get("response_timeout").cloned() {
        let n: f64 = s
            .parse()
            .map_err(|_| ConfigError(format!("{prefix}RESPONSE_TIMEOUT must be a number")))?;
        map.insert("response_timeout".to_string(), serde_json::json!(n));
    }
    config.merge_from_map(&map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let config = Configuration::default();
        assert_eq!(config.scheme, "ws");
        assert_eq!(config.hosts, vec!["localhost".to_string()]);
        assert_eq!(config.port, 8182);
        assert_eq!(config.max_conns, 4);
        assert_eq!(config.min_conns, 1);
        assert_eq!(config.max_times_acquired, 16);
        assert_eq!(config.max_inflight, 64);
        assert_eq!(config.response_timeout, None);
    }

    #[test]
    fn merge_is_case_insensitive_and_partial() {
        let mut config = Configuration::default();
        let mut map = Map::new();
        map.insert("MAX_CONNS".to_string(), serde_json::json!(8));
        map.insert("Username".to_string(), serde_json::json!("stephen"));
        config.merge_from_map(&map).unwrap();
        assert_eq!(config.max_conns, 8);
        assert_eq!(config.username, "stephen");
        assert_eq!(config.port, 8182, "unrelated keys must keep their default");
    }

    #[test]
    fn rejects_min_conns_above_max_conns() {
        let mut config = Configuration::default();
        let mut map = Map::new();
        map.insert("min_conns".to_string(), serde_json::json!(10));
        assert!(config.merge_from_map(&map).is_err());
    }

    #[test]
    fn host_urls_use_configured_endpoint_path() {
        let config = Configuration::default();
        assert_eq!(config.host_urls().unwrap(), vec!["ws://localhost:8182/gremlin".to_string()]);
    }

    #[test]
    fn host_urls_rejects_an_invalid_scheme() {
        let config = Configuration {
            scheme: "not a scheme".to_string(),
            ..Configuration::default()
        };
        assert!(config.host_urls().is_err());
    }
}
