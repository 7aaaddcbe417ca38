//! Renderer configuration (§10.3). Plain structs with `Default` impls,
//! mirroring the teacher's `CompareConfig` pattern — no builder machinery.
//! `Serialize`/`Deserialize` let a host load these from a TOML config file
//! without this crate depending on `toml` itself.

use serde::{Deserialize, Serialize};

/// How a plain (non-directive) markdown image line is rendered when its
/// `source.raw` does not resolve to a recognized asset scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlainImageMode {
    /// Render the original markdown line through the inline renderer inside
    /// a `<span id="figure-...">`, matching the asset-scheme figure path.
    CaptionedSpan,
    /// Render a bare `<img src="...">` with no caption wrapper.
    BareImg,
}

impl Default for PlainImageMode {
    fn default() -> Self {
        PlainImageMode::CaptionedSpan
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HtmlRendererConfig {
    pub plain_image_mode: PlainImageMode,
    /// Asset scheme treated as resolvable inline markdown (others fall back
    /// to the `data-zx-asset-*` attribute form).
    pub asset_scheme: String,
}

impl Default for HtmlRendererConfig {
    fn default() -> Self {
        Self {
            plain_image_mode: PlainImageMode::default(),
            asset_scheme: "zadoox-asset://".to_string(),
        }
    }
}
