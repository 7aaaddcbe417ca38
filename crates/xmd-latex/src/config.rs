//! LaTeX writer configuration (§10.3). `Serialize`/`Deserialize` let a host
//! load this from a TOML config file without this crate depending on `toml`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LatexWriterConfig {
    /// Scheme prefix recognized as an internal asset reference.
    pub asset_scheme: String,
    /// Directory prefix assets are emitted under in the generated document.
    pub asset_dir: String,
}

impl Default for LatexWriterConfig {
    fn default() -> Self {
        Self {
            asset_scheme: "zadoox-asset://".to_string(),
            asset_dir: "assets/".to_string(),
        }
    }
}
