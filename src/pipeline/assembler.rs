// ドキュメント組立: 全ページにオーバーレイ描画 -> 合成 -> 出力バイト列

use lopdf::Document;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::PdfSignError;
use crate::pdf::{compositor, overlay, reader};
use crate::placement::{PlacementParams, PlacementTable};
use crate::signature::PreparedImage;

/// Per-page rendering plan resolved before the parallel phase.
struct PagePlan {
    page_index: u32,
    page_id: lopdf::ObjectId,
    width_pt: f64,
    height_pt: f64,
    placement: PlacementParams,
}

/// Composite the signature onto every page and return the finished PDF bytes.
///
/// Per-page placement comes from `placements` (pages without an entry use
/// the default). Each overlay is rendered at that page's actual dimensions.
///
/// All pages succeed or the whole run aborts at the first failure: on error
/// `AssemblyAborted` carries the failing page index and no partial output
/// bytes are produced. Output page count and order match the input.
pub fn assemble(
    pdf_bytes: &[u8],
    image: &PreparedImage,
    placements: &PlacementTable,
) -> crate::error::Result<Vec<u8>> {
    // Validate all explicit placement entries up front
    placements.validate()?;

    let mut doc = Document::load_mem(pdf_bytes)
        .map_err(|e| PdfSignError::document_parse(e.to_string()))?;

    let page_ids: Vec<lopdf::ObjectId> = doc.get_pages().values().copied().collect();
    if page_ids.is_empty() {
        return Err(PdfSignError::document_parse("document has no pages"));
    }

    info!(pages = page_ids.len(), "assembling signed document");

    // --- Phase A: Page dimension + placement resolution (sequential) ---
    let mut plans: Vec<PagePlan> = Vec::with_capacity(page_ids.len());
    for (i, &page_id) in page_ids.iter().enumerate() {
        let page_index = i as u32;
        let (width_pt, height_pt) = reader::page_dimensions_of(&doc, page_id)
            .map_err(|e| PdfSignError::assembly_aborted(page_index, e))?;
        plans.push(PagePlan {
            page_index,
            page_id,
            width_pt,
            height_pt,
            placement: placements.get(page_index),
        });
    }

    // --- Phase B: Overlay rendering (rayon parallel, order kept by index) ---
    let overlays: Vec<crate::error::Result<Vec<u8>>> = plans
        .par_iter()
        .map(|plan| overlay::render(image, plan.width_pt, plan.height_pt, &plan.placement))
        .collect();

    // --- Phase C: Page compositing (sequential, page order) ---
    for (plan, rendered) in plans.iter().zip(overlays) {
        let overlay_bytes =
            rendered.map_err(|e| PdfSignError::assembly_aborted(plan.page_index, e))?;
        debug!(
            page = plan.page_index,
            x = plan.placement.x,
            y = plan.placement.y,
            w = plan.placement.width,
            "compositing signature"
        );
        compositor::composite(&mut doc, plan.page_id, &overlay_bytes)
            .map_err(|e| PdfSignError::assembly_aborted(plan.page_index, e))?;
    }

    // --- Phase D: Serialize to output bytes ---
    let mut buf = Vec::new();
    doc.save_to(&mut buf)
        .map_err(|e| PdfSignError::pdf_write(e.to_string()))?;

    Ok(buf)
}
