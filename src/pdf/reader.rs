use lopdf::{Document, ObjectId};

/// 読み込み専用のソースPDF。
///
/// 呼び出し元から渡されたバイト列をパースし、ページ数・ページ寸法の
/// 参照に使う。コアはソースドキュメントを変更しない。
pub struct PdfReader {
    doc: Document,
}

impl PdfReader {
    /// メモリ上のPDFバイト列からPdfReaderを作成する。
    pub fn from_bytes(bytes: &[u8]) -> crate::error::Result<Self> {
        let doc = Document::load_mem(bytes)?;
        Ok(Self { doc })
    }

    /// 内部のlopdf Documentへの参照を返す。
    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// ページ数を返す。
    pub fn page_count(&self) -> u32 {
        self.doc.get_pages().len() as u32
    }

    /// 指定ページ(0-indexed)のMediaBoxからページ寸法(width_pts, height_pts)を返す。
    pub fn page_dimensions(&self, page_index: u32) -> crate::error::Result<(f64, f64)> {
        let page_id = self.get_page_id(page_index)?;
        page_dimensions_of(&self.doc, page_id)
    }

    /// ページインデックス(0-based)からObjectIdを取得する。
    pub fn get_page_id(&self, page_index: u32) -> crate::error::Result<ObjectId> {
        // lopdfのページマップは1-based
        let pages = self.doc.get_pages();
        pages.get(&(page_index + 1)).copied().ok_or_else(|| {
            crate::error::PdfSignError::document_parse(format!(
                "page index {} not found",
                page_index
            ))
        })
    }
}

/// 指定ページ辞書からMediaBoxを取得する（Parent経由の継承も考慮）。
fn get_media_box(doc: &Document, dict: &lopdf::Dictionary) -> crate::error::Result<lopdf::Object> {
    // まず現在の辞書からMediaBoxを探す
    if let Ok(obj) = dict.get(b"MediaBox") {
        return Ok(obj.clone());
    }

    // 見つからなければParentをたどって継承を確認する
    if let Ok(lopdf::Object::Reference(parent_id)) = dict.get(b"Parent") {
        let parent_dict = doc.get_dictionary(*parent_id)?;
        return get_media_box(doc, parent_dict);
    }

    Err(crate::error::PdfSignError::document_parse(
        "MediaBox not found",
    ))
}

/// 指定ページのMediaBoxからページ寸法(width_pts, height_pts)を計算する。
pub(crate) fn page_dimensions_of(doc: &Document, page_id: ObjectId) -> crate::error::Result<(f64, f64)> {
    let page_dict = doc.get_dictionary(page_id)?;

    // MediaBoxを取得（継承も考慮）
    let media_box = get_media_box(doc, page_dict)?;

    let media_box_array = media_box.as_array()?;
    if media_box_array.len() < 4 {
        return Err(crate::error::PdfSignError::document_parse(
            "Invalid MediaBox",
        ));
    }

    // MediaBoxの値は整数または実数の可能性がある
    let to_f64 = |obj: &lopdf::Object| -> crate::error::Result<f64> {
        match obj {
            lopdf::Object::Integer(i) => Ok(*i as f64),
            lopdf::Object::Real(f) => Ok(*f as f64),
            _ => Err(crate::error::PdfSignError::document_parse(
                "Invalid MediaBox value",
            )),
        }
    };

    let x0 = to_f64(&media_box_array[0])?;
    let y0 = to_f64(&media_box_array[1])?;
    let x1 = to_f64(&media_box_array[2])?;
    let y1 = to_f64(&media_box_array[3])?;

    let width = (x1 - x0).abs();
    let height = (y1 - y0).abs();

    // Validate that the computed page dimensions are positive and reasonable.
    if width <= 0.0 || height <= 0.0 {
        return Err(crate::error::PdfSignError::document_parse(
            "Invalid MediaBox: non-positive page dimensions",
        ));
    }

    // Optionally enforce an upper bound based on typical PDF limits (14,400 pt ≈ 200 in).
    const PDF_MAX_DIMENSION_PT: f64 = 14_400.0;
    if width > PDF_MAX_DIMENSION_PT || height > PDF_MAX_DIMENSION_PT {
        return Err(crate::error::PdfSignError::document_parse(
            "Invalid MediaBox: page dimensions exceed PDF limits",
        ));
    }

    Ok((width, height))
}
