use std::path::Path;

use anyhow::Context;
use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::dispatch::DEFAULT_PIC_DEPTH;
use crate::trace::env_toggle_enabled;

/// Per-join operand cap of the host's bulk join.
pub const DEFAULT_MAX_GROUP_OPERANDS: usize = 200;
/// Hard ceiling on operands in one concatenation expression.
pub const DEFAULT_MAX_TOTAL_OPERANDS: usize = 65_535;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BackendConfig {
    pub dispatch: DispatchConfig,
    pub concat: ConcatConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Argument shapes cached per call site before it goes megamorphic.
    pub pic_depth: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcatConfig {
    /// Forces the bulk join on or off; `None` leaves it to the probe.
    pub bulk_join: Option<bool>,
    pub max_group_operands: usize,
    pub max_total_operands: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            pic_depth: DEFAULT_PIC_DEPTH,
        }
    }
}

impl Default for ConcatConfig {
    fn default() -> Self {
        Self {
            bulk_join: None,
            max_group_operands: DEFAULT_MAX_GROUP_OPERANDS,
            max_total_operands: DEFAULT_MAX_TOTAL_OPERANDS,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    dispatch: DispatchSection,
    #[serde(default)]
    concat: ConcatSection,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct DispatchSection {
    #[serde(default)]
    pic_depth: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct ConcatSection {
    #[serde(default)]
    bulk_join: Option<bool>,
    #[serde(default)]
    max_group_operands: Option<usize>,
    #[serde(default)]
    max_total_operands: Option<usize>,
}

static GLOBAL_CONFIG: Lazy<BackendConfig> = Lazy::new(BackendConfig::from_env);

impl BackendConfig {
    /// Defaults plus environment overrides, read once per process.
    pub fn global() -> &'static BackendConfig {
        &GLOBAL_CONFIG
    }

    pub fn from_env() -> Self {
        Self::default().with_overrides_from(|key| std::env::var(key).ok())
    }

    pub fn from_toml_str(src: &str) -> anyhow::Result<Self> {
        let file: ConfigFile = toml::from_str(src).context("invalid backend configuration")?;
        let mut config = Self::default();
        config.apply(file);
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&src).with_context(|| format!("failed to load {}", path.display()))
    }

    /// Applies `SCOUR_PIC_DEPTH` and `SCOUR_BULK_JOIN` as resolved by `var`.
    pub fn with_overrides_from(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(depth) = var("SCOUR_PIC_DEPTH")
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|v| *v > 0)
        {
            self.dispatch.pic_depth = depth;
        }
        if let Some(raw) = var("SCOUR_BULK_JOIN").filter(|raw| !raw.trim().is_empty()) {
            self.concat.bulk_join = Some(env_toggle_enabled(&raw));
        }
        self
    }

    fn apply(&mut self, file: ConfigFile) {
        if let Some(v) = file.dispatch.pic_depth.filter(|v| *v > 0) {
            self.dispatch.pic_depth = v;
        }
        if file.concat.bulk_join.is_some() {
            self.concat.bulk_join = file.concat.bulk_join;
        }
        if let Some(v) = file.concat.max_group_operands.filter(|v| *v > 0) {
            self.concat.max_group_operands = v;
        }
        if let Some(v) = file.concat.max_total_operands.filter(|v| *v > 0) {
            self.concat.max_total_operands = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults() {
        let config = BackendConfig::default();
        assert_eq!(config.dispatch.pic_depth, 4);
        assert_eq!(config.concat.bulk_join, None);
        assert_eq!(config.concat.max_group_operands, 200);
        assert_eq!(config.concat.max_total_operands, 65_535);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = BackendConfig::from_toml_str("[dispatch]\npic_depth = 8\n").unwrap();
        assert_eq!(config.dispatch.pic_depth, 8);
        assert_eq!(config.concat, ConcatConfig::default());
    }

    #[test]
    fn zero_values_are_ignored() {
        let config = BackendConfig::from_toml_str("[dispatch]\npic_depth = 0\n[concat]\nmax_group_operands = 0\n").unwrap();
        assert_eq!(config, BackendConfig::default());
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let err = BackendConfig::from_toml_str("[dispatch\n").unwrap_err();
        assert!(err.to_string().contains("invalid backend configuration"));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[concat]\nbulk_join = false\nmax_total_operands = 10").unwrap();
        let config = BackendConfig::load(file.path()).unwrap();
        assert_eq!(config.concat.bulk_join, Some(false));
        assert_eq!(config.concat.max_total_operands, 10);
        assert!(BackendConfig::load(file.path().with_extension("missing")).is_err());
    }

    #[test]
    fn env_overrides() {
        let config = BackendConfig::default().with_overrides_from(|key| match key {
            "SCOUR_PIC_DEPTH" => Some("2".into()),
            "SCOUR_BULK_JOIN" => Some("off".into()),
            _ => None,
        });
        assert_eq!(config.dispatch.pic_depth, 2);
        assert_eq!(config.concat.bulk_join, Some(false));

        let untouched = BackendConfig::default().with_overrides_from(|key| match key {
            "SCOUR_PIC_DEPTH" => Some("many".into()),
            _ => None,
        });
        assert_eq!(untouched, BackendConfig::default());
    }
}
