use std::collections::HashMap;

use serde::Deserialize;

use crate::error::PdfSignError;

/// 1インチ = 72ポイント (PDF標準単位)
pub const POINTS_PER_INCH: f64 = 72.0;

/// X位置の許容範囲（インチ）
pub const X_RANGE: (f64, f64) = (0.0, 8.0);
/// Y位置の許容範囲（インチ）
pub const Y_RANGE: (f64, f64) = (0.0, 11.0);
/// 署名幅の許容範囲（インチ）
pub const WIDTH_RANGE: (f64, f64) = (1.0, 4.0);

/// 1ページ分の署名配置パラメータ（単位: インチ）。
///
/// 高さは署名画像のネイティブアスペクト比から導出されるため保持しない。
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PlacementParams {
    /// 署名左下のX位置
    pub x: f64,
    /// 署名左下のY位置
    pub y: f64,
    /// 署名の幅
    #[serde(rename = "w")]
    pub width: f64,
}

impl Default for PlacementParams {
    fn default() -> Self {
        PlacementParams {
            x: 5.5,
            y: 1.0,
            width: 2.0,
        }
    }
}

impl PlacementParams {
    /// 各値が許容範囲内にあることを検証する。
    ///
    /// 範囲外の値はクランプせずエラーにする（不正なオーバーレイを
    /// 黙って生成しないため）。
    pub fn validate(&self) -> crate::error::Result<()> {
        check_range("x", self.x, X_RANGE)?;
        check_range("y", self.y, Y_RANGE)?;
        check_range("w", self.width, WIDTH_RANGE)?;
        Ok(())
    }

    /// ポイント単位の(x, y, width)を返す。
    pub fn to_points(&self) -> (f64, f64, f64) {
        (
            self.x * POINTS_PER_INCH,
            self.y * POINTS_PER_INCH,
            self.width * POINTS_PER_INCH,
        )
    }
}

fn check_range(name: &str, value: f64, (min, max): (f64, f64)) -> crate::error::Result<()> {
    if !value.is_finite() || value < min || value > max {
        return Err(PdfSignError::invalid_placement(format!(
            "{name} = {value} out of range [{min}, {max}]"
        )));
    }
    Ok(())
}

/// ページインデックス(0-based)から配置パラメータへのテーブル。
///
/// エントリのないページはデフォルト配置にフォールバックする。
/// デフォルトは組み込みの `{x: 5.5, y: 1.0, w: 2.0}` だが、
/// settings.yamlの `default_placement` で差し替えられる。
#[derive(Debug, Clone, Default)]
pub struct PlacementTable {
    entries: HashMap<u32, PlacementParams>,
    default: PlacementParams,
}

impl PlacementTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 指定ページの配置を設定する。
    pub fn set(&mut self, page_index: u32, params: PlacementParams) {
        self.entries.insert(page_index, params);
    }

    /// エントリのないページが使うデフォルト配置を差し替える。
    pub fn set_default(&mut self, params: PlacementParams) {
        self.default = params;
    }

    /// 指定ページの配置を返す。エントリがなければデフォルト。
    pub fn get(&self, page_index: u32) -> PlacementParams {
        self.entries
            .get(&page_index)
            .copied()
            .unwrap_or(self.default)
    }

    /// デフォルト配置と明示的に設定された全エントリを検証する。
    pub fn validate(&self) -> crate::error::Result<()> {
        self.default.validate().map_err(|e| {
            PdfSignError::invalid_placement(format!("default placement: {e}"))
        })?;
        let mut indices: Vec<&u32> = self.entries.keys().collect();
        indices.sort();
        for idx in indices {
            self.entries[idx].validate().map_err(|e| {
                PdfSignError::invalid_placement(format!("page {idx}: {e}"))
            })?;
        }
        Ok(())
    }

    /// 明示エントリのイテレータ（テスト・ログ用）。
    pub fn iter(&self) -> impl Iterator<Item = (&u32, &PlacementParams)> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(u32, PlacementParams)> for PlacementTable {
    fn from_iter<T: IntoIterator<Item = (u32, PlacementParams)>>(iter: T) -> Self {
        PlacementTable {
            entries: iter.into_iter().collect(),
            default: PlacementParams::default(),
        }
    }
}
