use std::{path::Path, time::Duration};

use anyhow::Context;
use client_core::{SessionOptions, DEFAULT_DEVICE_LABEL};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "wingctl.toml";
const ENV_PREFIX: &str = "WINGCTL";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub default_endpoint: String,
    pub device_label: String,
    pub preset_delay_ms: u64,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_endpoint: "ws://localhost:8080".into(),
            device_label: DEFAULT_DEVICE_LABEL.into(),
            preset_delay_ms: 50,
            log_filter: "info".into(),
        }
    }
}

impl Settings {
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            device_label: self.device_label.clone(),
            preset_delay: Duration::from_millis(self.preset_delay_ms),
            ..SessionOptions::default()
        }
    }
}

/// Defaults, then the TOML file, then `WINGCTL__*` variables.
///
/// An explicit `path` must exist; the default `wingctl.toml` is optional.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    load_settings_with_prefix(path, ENV_PREFIX)
}

fn load_settings_with_prefix(path: Option<&Path>, env_prefix: &str) -> anyhow::Result<Settings> {
    let (file, required) = match path {
        Some(path) => (path.to_string_lossy().into_owned(), true),
        None => (DEFAULT_CONFIG_FILE.to_string(), false),
    };

    Config::builder()
        .add_source(File::new(&file, FileFormat::Toml).required(required))
        .add_source(Environment::with_prefix(env_prefix).separator("__"))
        .build()
        .with_context(|| format!("failed to load settings from '{file}'"))?
        .try_deserialize::<Settings>()
        .with_context(|| format!("invalid settings in '{file}'"))
}

#[cfg(test)]
mod tests {
    use std::{
        env, fs,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;

    fn temp_config(contents: &str) -> std::path::PathBuf {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = env::temp_dir().join(format!("wingctl_settings_{suffix}.toml"));
        fs::write(&path, contents).expect("write config");
        path
    }

    #[test]
    fn missing_default_file_yields_defaults() {
        let settings =
            load_settings_with_prefix(None, "WINGCTL_TEST_DEFAULTS").expect("settings");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.session_options().preset_delay, Duration::from_millis(50));
    }

    #[test]
    fn file_values_override_defaults() {
        let path = temp_config(
            "default_endpoint = \"ws://wing.local:9000\"\npreset_delay_ms = 0\n",
        );

        let settings =
            load_settings_with_prefix(Some(&path), "WINGCTL_TEST_FILE").expect("settings");
        assert_eq!(settings.default_endpoint, "ws://wing.local:9000");
        assert_eq!(settings.preset_delay_ms, 0);
        assert_eq!(settings.device_label, DEFAULT_DEVICE_LABEL);

        fs::remove_file(path).expect("cleanup");
    }

    #[test]
    fn environment_overrides_file() {
        let path = temp_config("device_label = \"bench rig\"\n");
        env::set_var("WINGCTL_TEST_ENV__DEVICE_LABEL", "wind tunnel");

        let settings =
            load_settings_with_prefix(Some(&path), "WINGCTL_TEST_ENV").expect("settings");
        assert_eq!(settings.device_label, "wind tunnel");
        assert_eq!(settings.session_options().device_label, "wind tunnel");

        env::remove_var("WINGCTL_TEST_ENV__DEVICE_LABEL");
        fs::remove_file(path).expect("cleanup");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let path = env::temp_dir().join("wingctl_settings_does_not_exist.toml");
        assert!(load_settings_with_prefix(Some(&path), "WINGCTL_TEST_MISSING").is_err());
    }
}
