use std::path::Path;

use serde::Deserialize;

use crate::placement::PlacementParams;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// 署名画像をDCTDecodeで埋め込む際のJPEG品質 (1-100)
    pub jpeg_quality: u8,
    /// placementsにエントリのないページが使う配置（省略時は組み込みデフォルト）
    pub default_placement: Option<PlacementParams>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            jpeg_quality: 85,
            default_placement: None,
        }
    }
}

impl Settings {
    pub fn from_yaml(yaml: &str) -> crate::error::Result<Self> {
        serde_yml::from_str(yaml).map_err(|e| {
            crate::error::PdfSignError::config(format!("Failed to parse settings YAML: {e}"))
        })
    }

    pub fn from_file(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}
