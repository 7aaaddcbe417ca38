//! TOML-loadable bundle of the engine's renderer/tracker configs (§10.3,
//! §10.4). The library crates stay free of any filesystem or `toml`
//! dependency; only this binary knows how to read a config file.

use std::path::Path;

use serde::{Deserialize, Serialize};
use xmd_latex::LatexWriterConfig;
use xmd_render::HtmlRendererConfig;
use xmd_track::TrackerConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CliConfig {
    pub html: HtmlRendererConfig,
    pub latex: LatexWriterConfig,
    pub tracker: TrackerConfig,
}

impl CliConfig {
    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config file {}: {}", path.display(), e))?;
        toml::from_str(&text).map_err(|e| format!("invalid config file {}: {}", path.display(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_partial_config_filling_in_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[html]\nasset_scheme = \"custom://\"").unwrap();

        let config = CliConfig::load(file.path()).unwrap();
        assert_eq!(config.html.asset_scheme, "custom://");
        assert_eq!(config.latex.asset_scheme, LatexWriterConfig::default().asset_scheme);
    }

    #[test]
    fn missing_file_reports_a_readable_error() {
        let err = CliConfig::load(Path::new("/nonexistent/path/xmd.toml")).unwrap_err();
        assert!(err.contains("failed to read config file"));
    }

    #[test]
    fn empty_file_uses_all_defaults() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = CliConfig::load(file.path()).unwrap();
        assert_eq!(config.html.asset_scheme, HtmlRendererConfig::default().asset_scheme);
    }
}
