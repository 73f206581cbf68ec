// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! One-time `env_logger` installation.

use env_logger::{Builder, Env};
use log::LevelFilter;
use std::sync::Once;

static INIT: Once = Once::new();

/// How the global logger is set up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Level used when `RUST_LOG` is not set.
    pub default_level: LevelFilter,
    /// Prefix lines with a millisecond timestamp.
    pub timestamps: bool,
    /// Per-module overrides applied on top of the default level.
    pub module_filters: Vec<(String, LevelFilter)>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_level: LevelFilter::Info,
            timestamps: true,
            module_filters: vec![
                ("wgpu_hal".to_string(), LevelFilter::Error),
                ("wgpu_core".to_string(), LevelFilter::Warn),
                ("naga".to_string(), LevelFilter::Warn),
            ],
        }
    }
}

impl LoggingConfig {
    fn builder(&self) -> Builder {
        let default = self.default_level.as_str().to_ascii_lowercase();
        let mut builder = Builder::from_env(Env::default().default_filter_or(default));
        for (module, level) in &self.module_filters {
            builder.filter_module(module, *level);
        }
        if self.timestamps {
            builder.format_timestamp_millis();
        } else {
            builder.format_timestamp(None);
        }
        builder
    }
}

/// Installs the global logger. Only the first call has any effect.
///
/// Returns `false` when a logger was already installed, by this function or
/// by someone else.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let mut installed = false;
    INIT.call_once(|| {
        installed = config.builder().try_init().is_ok();
    });
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_noop() {
        let config = LoggingConfig {
            default_level: LevelFilter::Debug,
            ..LoggingConfig::default()
        };
        init_logging(&config);
        assert!(!init_logging(&config));
        log::debug!("logging initialised twice without panicking");
    }

    #[test]
    fn test_default_silences_backend_noise() {
        let config = LoggingConfig::default();
        assert!(config
            .module_filters
            .iter()
            .any(|(m, l)| m == "wgpu_hal" && *l == LevelFilter::Error));
    }
}
