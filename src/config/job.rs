use std::collections::HashMap;

use serde::Deserialize;

use crate::placement::{PlacementParams, PlacementTable};

#[derive(Debug, Clone, Deserialize)]
pub struct JobFile {
    pub jobs: Vec<Job>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    pub input: String,
    /// 省略時は入力と同じディレクトリの `signed_output.pdf`
    pub output: Option<String>,
    pub signature: String,
    /// 省略時はsettings.yamlの値
    pub jpeg_quality: Option<u8>,
    /// ページ番号(1-based)ごとの配置。ないページはデフォルト配置。
    #[serde(default)]
    pub placements: HashMap<u32, PlacementParams>,
}

impl Job {
    /// 1-basedのページ番号をコアの0-based PlacementTableへ変換する。
    pub fn placement_table(&self) -> crate::error::Result<PlacementTable> {
        let mut table = PlacementTable::new();
        for (&page_num, &params) in &self.placements {
            if page_num == 0 {
                return Err(crate::error::PdfSignError::config(
                    "placement page numbers are 1-based; page 0 is invalid",
                ));
            }
            table.set(page_num - 1, params);
        }
        Ok(table)
    }
}
