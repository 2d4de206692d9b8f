/**
 * Copyright (c) 2024-2025 Rampart, Inc.
 *
 * This file is part of Rampart Cache
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

//! YAML configuration for the proxies a process wires up.

use std::fs::File;
use std::time::Duration;

use serde::Deserialize;

use crate::chain::CacheId;

/// Raw shape loaded from `config.yaml`, before defaults are applied.
#[derive(Debug, Deserialize)]
struct RawConfig {
    cache_id: String,
    read_timeout_ms: Option<u64>,
    mutative_timeout_ms: Option<u64>,
    reconnect_poll_ms: Option<u64>,
}

/// Resolved configuration for one proxy instance.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub cache_id: CacheId,
    pub read_timeout: Duration,
    pub mutative_timeout: Duration,
    pub reconnect_poll_interval: Duration,
}

const DEFAULT_READ_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_MUTATIVE_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_RECONNECT_POLL_MS: u64 = 200;

// load config from yaml
fn load_yaml(file_path: &str) -> RawConfig {
    let file = File::open(file_path).expect("Unable to open the file");
    serde_yaml::from_reader(file).expect("Unable to parse YAML")
}

// validate resolved config
fn validate(config: &ProxyConfig) -> bool {
    if config.cache_id.as_str().is_empty() {
        return true;
    }
    if config.read_timeout.is_zero() || config.mutative_timeout.is_zero() {
        return true;
    }
    if config.reconnect_poll_interval.is_zero() {
        return true;
    }
    false
}

/// Reads a YAML config file, applying defaults for any omitted optional
/// field, and panics on a missing file, malformed YAML, or an invalid
/// resolved value.
pub fn load_config(file_path: &str) -> ProxyConfig {
    let raw = load_yaml(file_path);

    let config = ProxyConfig {
        cache_id: CacheId::from(raw.cache_id),
        read_timeout: Duration::from_millis(raw.read_timeout_ms.unwrap_or(DEFAULT_READ_TIMEOUT_MS)),
        mutative_timeout: Duration::from_millis(
            raw.mutative_timeout_ms.unwrap_or(DEFAULT_MUTATIVE_TIMEOUT_MS),
        ),
        reconnect_poll_interval: Duration::from_millis(
            raw.reconnect_poll_ms.unwrap_or(DEFAULT_RECONNECT_POLL_MS),
        ),
    };

    match validate(&config) {
        true => panic!("invalid proxy configuration"),
        false => {}
    }

    config
}

/// Initializes the global `tracing` subscriber from `RUST_LOG`, loading a
/// `.env` file first if present. Call once, near the top of `main`.
pub fn init_logging() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_ansi(true)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}
