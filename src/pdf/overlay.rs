// 署名オーバーレイ構築: 画像XObject、SMask参照、コンテンツストリーム組立

use lopdf::{Document, Object, Stream, dictionary};

use crate::error::PdfSignError;
use crate::placement::PlacementParams;
use crate::signature::PreparedImage;

/// オーバーレイページ内の署名XObjectリソース名。
pub const SIGNATURE_XOBJECT_NAME: &str = "SigImg";

/// PreparedImageから単一ページのオーバーレイPDFを作成する。
pub struct OverlayWriter {
    doc: Document,
}

impl OverlayWriter {
    pub fn new() -> Self {
        Self {
            doc: Document::with_version("1.5"),
        }
    }

    /// SMask XObject（8bitグレーのアルファ平面）を追加する。
    ///
    /// 戻り値はXObjectのオブジェクトID。
    fn add_smask_xobject(&mut self, flate_data: &[u8], width: u32, height: u32) -> lopdf::ObjectId {
        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        };
        let stream = Stream::new(dict, flate_data.to_vec());
        self.doc.add_object(Object::Stream(stream))
    }

    /// 署名JPEG XObjectを追加する（SMaskがあれば参照を付ける）。
    ///
    /// 戻り値はXObjectのオブジェクトID。
    fn add_signature_xobject(
        &mut self,
        jpeg_data: &[u8],
        width: u32,
        height: u32,
        smask_id: Option<lopdf::ObjectId>,
    ) -> lopdf::ObjectId {
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        };
        if let Some(id) = smask_id {
            dict.set("SMask", Object::Reference(id));
        }
        let stream = Stream::new(dict, jpeg_data.to_vec());
        self.doc.add_object(Object::Stream(stream))
    }

    /// 署名描画用のコンテンツストリームバイト列を生成する。
    ///
    /// `q <w> 0 0 <h> <x> <y> cm /SigImg Do Q`
    /// 単位はすべてポイント。画像のアンカーは左下。
    pub fn build_signature_content_stream(
        name: &str,
        x_pt: f64,
        y_pt: f64,
        width_pt: f64,
        height_pt: f64,
    ) -> Vec<u8> {
        format!("q {width_pt} 0 0 {height_pt} {x_pt} {y_pt} cm /{name} Do Q").into_bytes()
    }

    /// 署名画像1枚だけを含む単一ページを構築する。
    #[allow(clippy::too_many_arguments)]
    pub fn write_overlay_page(
        &mut self,
        image: &PreparedImage,
        page_width_pt: f64,
        page_height_pt: f64,
        x_pt: f64,
        y_pt: f64,
        sig_width_pt: f64,
        sig_height_pt: f64,
    ) -> crate::error::Result<()> {
        // XObjectを追加（SMaskは画像にアルファがある場合のみ）
        let smask_id = image
            .smask_flate()
            .map(|data| self.add_smask_xobject(data, image.width(), image.height()));
        let sig_id =
            self.add_signature_xobject(image.jpeg_data(), image.width(), image.height(), smask_id);

        // Pagesノードを作成
        let pages_id = self.doc.new_object_id();

        // XObjectリソース辞書を構築
        // SMaskはSMaskエントリ経由で参照されるため、XObjectリソースには不要
        let mut xobject_dict = lopdf::Dictionary::new();
        xobject_dict.set(SIGNATURE_XOBJECT_NAME, Object::Reference(sig_id));

        let resources_id = self.doc.add_object(dictionary! {
            "XObject" => Object::Dictionary(xobject_dict),
        });

        // コンテンツストリームを生成
        let content_bytes = Self::build_signature_content_stream(
            SIGNATURE_XOBJECT_NAME,
            x_pt,
            y_pt,
            sig_width_pt,
            sig_height_pt,
        );
        let content_stream = Stream::new(dictionary! {}, content_bytes);
        let content_id = self.doc.add_object(Object::Stream(content_stream));

        // ページを作成（MediaBoxは対象ページの実寸）
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Real(0.0),
                Object::Real(0.0),
                Object::Real(page_width_pt as f32),
                Object::Real(page_height_pt as f32),
            ],
            "Resources" => resources_id,
            "Contents" => content_id,
        });

        // Pagesノードを設定
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        };
        self.doc.objects.insert(pages_id, Object::Dictionary(pages));

        // Catalogを作成
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        Ok(())
    }

    /// PDFドキュメントをバイト列として出力する。
    pub fn save_to_bytes(&self) -> crate::error::Result<Vec<u8>> {
        let mut buf = Vec::new();
        // clone to avoid borrowing issues with save_to (takes &mut self in lopdf)
        self.doc
            .clone()
            .save_to(&mut buf)
            .map_err(|e| PdfSignError::pdf_write(e.to_string()))?;
        Ok(buf)
    }
}

impl Default for OverlayWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// 署名画像を配置矩形に描画した単一ページPDF（オーバーレイ）を生成する。
///
/// ページ寸法は合成対象ページの実寸（ポイント）を渡すこと。配置は
/// インチ指定で、左下アンカー。高さは幅 × ネイティブアスペクト比。
/// 同一入力に対して出力はビット同一（決定的）。
pub fn render(
    image: &PreparedImage,
    page_width_pt: f64,
    page_height_pt: f64,
    placement: &PlacementParams,
) -> crate::error::Result<Vec<u8>> {
    placement.validate()?;

    if page_width_pt <= 0.0 || page_height_pt <= 0.0 {
        return Err(PdfSignError::invalid_placement(format!(
            "overlay canvas must be positive, got {page_width_pt}x{page_height_pt} pt"
        )));
    }

    let (x_pt, y_pt, sig_width_pt) = placement.to_points();
    let sig_height_pt = sig_width_pt * image.aspect_ratio();

    if sig_width_pt <= 0.0 || sig_height_pt <= 0.0 {
        return Err(PdfSignError::invalid_placement(format!(
            "signature rectangle must be positive, got {sig_width_pt}x{sig_height_pt} pt"
        )));
    }

    let mut writer = OverlayWriter::new();
    writer.write_overlay_page(
        image,
        page_width_pt,
        page_height_pt,
        x_pt,
        y_pt,
        sig_width_pt,
        sig_height_pt,
    )?;
    writer.save_to_bytes()
}
