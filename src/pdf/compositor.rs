// ページ合成: オーバーレイページを元ページの上に重ねる

use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use std::collections::HashMap;

use crate::error::PdfSignError;
use crate::pdf::reader;

/// オーバーレイと元ページの寸法一致を判定する許容誤差（ポイント）。
const DIM_TOLERANCE_PT: f64 = 0.1;

/// オーバーレイページから取り出した画像XObject。
struct OverlayXObject {
    name: String,
    stream: Stream,
    smask: Option<Stream>,
}

/// オーバーレイPDFの単一ページを対象ドキュメントの指定ページに合成する。
///
/// 元のコンテンツは完全に保持され、オーバーレイはその上に描画される
/// （重なった部分はオーバーレイが勝つ）。オーバーレイのMediaBoxが
/// 対象ページの寸法と一致しない場合は `DimensionMismatch`。
///
/// 部分的な合成状態は生じない: 失敗しうる抽出処理をすべて終えてから
/// 対象ページを変更する。エラー時は元ページは未変更のまま。
pub fn composite(
    doc: &mut Document,
    page_id: ObjectId,
    overlay_bytes: &[u8],
) -> crate::error::Result<()> {
    // --- 抽出フェーズ（対象ドキュメントは変更しない） ---
    let overlay = Document::load_mem(overlay_bytes)
        .map_err(|e| PdfSignError::document_parse(format!("overlay: {e}")))?;

    let overlay_pages = overlay.get_pages();
    let overlay_page_id = match overlay_pages.values().next() {
        Some(&id) if overlay_pages.len() == 1 => id,
        _ => {
            return Err(PdfSignError::document_parse(format!(
                "overlay must contain exactly one page, got {}",
                overlay_pages.len()
            )));
        }
    };

    let (overlay_w, overlay_h) = reader::page_dimensions_of(&overlay, overlay_page_id)?;
    let (page_w, page_h) = reader::page_dimensions_of(doc, page_id)?;
    if (overlay_w - page_w).abs() > DIM_TOLERANCE_PT || (overlay_h - page_h).abs() > DIM_TOLERANCE_PT
    {
        return Err(PdfSignError::dimension_mismatch(format!(
            "overlay is {overlay_w:.2}x{overlay_h:.2} pt but page is {page_w:.2}x{page_h:.2} pt"
        )));
    }

    let overlay_content = overlay.get_page_content(overlay_page_id)?;
    let overlay_xobjects = collect_image_xobjects(&overlay, overlay_page_id)?;
    if overlay_xobjects.is_empty() {
        return Err(PdfSignError::document_parse(
            "overlay page has no image XObject",
        ));
    }

    // 対象ページの実効リソースを複製（継承分も含めてページ直下に実体化する）
    let mut resources = effective_resources(doc, page_id)?;

    // XObjectエントリが参照なら、ページ専用の複製に実体化する
    // （参照先の共有辞書を変更すると他ページに波及するため）
    if let Ok(Object::Reference(id)) = resources.get(b"XObject") {
        let id = *id;
        let dict = doc.get_object(id).and_then(Object::as_dict)?.clone();
        resources.set("XObject", Object::Dictionary(dict));
    }

    // 既存XObject名と衝突しないリネーム表を作る
    let existing = xobject_names(&resources);
    let mut name_map: HashMap<String, String> = HashMap::new();
    for xobj in &overlay_xobjects {
        let unique = unique_name(&xobj.name, &existing, &name_map);
        name_map.insert(xobj.name.clone(), unique);
    }

    let rewritten_overlay = rewrite_do_operands(&overlay_content, &name_map)?;
    let original_content = doc.get_page_content(page_id)?;

    // ページ辞書が存在しなければここで失敗させる（変更フェーズ前）
    doc.get_dictionary(page_id)?;

    // --- 変更フェーズ ---
    let xobject_dict = ensure_xobject_dict(&mut resources);
    for xobj in overlay_xobjects {
        let mut stream = xobj.stream;
        if let Some(smask) = xobj.smask {
            let smask_id = doc.add_object(Object::Stream(smask));
            stream.dict.set("SMask", Object::Reference(smask_id));
        }
        let new_id = doc.add_object(Object::Stream(stream));
        let new_name = name_map[&xobj.name].clone();
        xobject_dict.set(new_name.into_bytes(), Object::Reference(new_id));
    }

    // 元コンテンツをq/Qで囲ってグラフィック状態を隔離し、
    // その後ろにオーバーレイを描画する（painter's algorithm）。
    let mut new_content = Vec::with_capacity(original_content.len() + rewritten_overlay.len() + 6);
    new_content.extend_from_slice(b"q\n");
    new_content.extend_from_slice(&original_content);
    new_content.extend_from_slice(b"\nQ\n");
    new_content.extend_from_slice(&rewritten_overlay);

    let content_id = doc.add_object(Object::Stream(Stream::new(dictionary! {}, new_content)));

    let page_dict = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| PdfSignError::document_parse(e.to_string()))?;
    page_dict.set("Contents", Object::Reference(content_id));
    page_dict.set("Resources", Object::Dictionary(resources));

    Ok(())
}

/// ページの実効リソース辞書を構築する。
///
/// 継承・参照されたリソースを先に、ページ直下のリソースを後にマージした
/// 複製を返す（直下の定義が優先）。
fn effective_resources(doc: &Document, page_id: ObjectId) -> crate::error::Result<lopdf::Dictionary> {
    let (direct, resource_ids) = doc.get_page_resources(page_id)?;

    let mut merged = lopdf::Dictionary::new();
    for res_id in resource_ids {
        let dict = doc.get_dictionary(res_id)?;
        for (key, value) in dict.iter() {
            merged.set(key.to_vec(), value.clone());
        }
    }
    if let Some(dict) = direct {
        for (key, value) in dict.iter() {
            merged.set(key.to_vec(), value.clone());
        }
    }

    Ok(merged)
}

/// リソース辞書のXObjectサブ辞書を直接辞書として確保して返す。
///
/// 参照エントリは呼び出し前に直接辞書へ実体化済みであること。
fn ensure_xobject_dict(resources: &mut lopdf::Dictionary) -> &mut lopdf::Dictionary {
    let needs_init = !matches!(resources.get(b"XObject"), Ok(Object::Dictionary(_)));
    if needs_init {
        resources.set("XObject", Object::Dictionary(lopdf::Dictionary::new()));
    }
    match resources.get_mut(b"XObject") {
        Ok(Object::Dictionary(dict)) => dict,
        _ => unreachable!("XObject entry was just initialized as a dictionary"),
    }
}

/// 実効リソース内の既存XObject名を集める（参照先は対象ドキュメント側）。
fn xobject_names(resources: &lopdf::Dictionary) -> Vec<String> {
    match resources.get(b"XObject") {
        Ok(Object::Dictionary(dict)) => dict
            .iter()
            .map(|(k, _)| String::from_utf8_lossy(k).into_owned())
            .collect(),
        _ => Vec::new(),
    }
}

/// 既存名・割当済み名と衝突しない名前を返す。
fn unique_name(base: &str, existing: &[String], assigned: &HashMap<String, String>) -> String {
    let taken = |candidate: &str| {
        existing.iter().any(|n| n == candidate) || assigned.values().any(|n| n == candidate)
    };

    if !taken(base) {
        return base.to_string();
    }
    let mut counter = 0u32;
    loop {
        let candidate = format!("{base}{counter}");
        if !taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// オーバーレイページのリソースからSubtype=Imageの XObjectを取り出す。
///
/// SMask参照があれば参照先ストリームも一緒に複製する。
fn collect_image_xobjects(
    overlay: &Document,
    page_id: ObjectId,
) -> crate::error::Result<Vec<OverlayXObject>> {
    let (direct, resource_ids) = overlay.get_page_resources(page_id)?;

    let mut dicts: Vec<&lopdf::Dictionary> = Vec::new();
    for res_id in &resource_ids {
        dicts.push(overlay.get_dictionary(*res_id)?);
    }
    if let Some(dict) = direct {
        dicts.push(dict);
    }

    let mut result = Vec::new();
    for dict in dicts {
        let xobject_dict = match dict.get(b"XObject") {
            Ok(Object::Dictionary(d)) => d,
            Ok(Object::Reference(id)) => overlay.get_object(*id).and_then(Object::as_dict)?,
            _ => continue,
        };

        for (name_bytes, value) in xobject_dict.iter() {
            let stream = match value {
                Object::Reference(id) => overlay.get_object(*id).and_then(Object::as_stream)?,
                Object::Stream(s) => s,
                _ => continue,
            };

            let is_image = stream
                .dict
                .get(b"Subtype")
                .and_then(Object::as_name)
                .map(|s| s == b"Image")
                .unwrap_or(false);
            if !is_image {
                continue;
            }

            let smask = match stream.dict.get(b"SMask") {
                Ok(Object::Reference(id)) => Some(
                    overlay
                        .get_object(*id)
                        .and_then(Object::as_stream)?
                        .clone(),
                ),
                _ => None,
            };

            result.push(OverlayXObject {
                name: String::from_utf8_lossy(name_bytes).into_owned(),
                stream: stream.clone(),
                smask,
            });
        }
    }

    Ok(result)
}

/// コンテンツストリームのDoオペランドをリネーム表に従って書き換える。
fn rewrite_do_operands(
    content_bytes: &[u8],
    name_map: &HashMap<String, String>,
) -> crate::error::Result<Vec<u8>> {
    let mut content = Content::decode(content_bytes)?;

    for op in &mut content.operations {
        if op.operator == "Do"
            && let Some(Object::Name(name)) = op.operands.first_mut()
        {
            let old = String::from_utf8_lossy(name).into_owned();
            if let Some(new_name) = name_map.get(&old) {
                *name = new_name.clone().into_bytes();
            }
        }
    }

    content
        .encode()
        .map_err(|e| PdfSignError::pdf_write(e.to_string()))
}
