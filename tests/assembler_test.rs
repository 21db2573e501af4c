// ドキュメント組立（end-to-endのコア境界）テスト

use std::io::Cursor;

use image::{Rgba, RgbaImage};
use lopdf::{Document, Object, Stream, dictionary};

use pdf_signing::error::PdfSignError;
use pdf_signing::pipeline::assembler::assemble;
use pdf_signing::placement::{PlacementParams, PlacementTable};
use pdf_signing::signature::PreparedImage;

// ============================================================
// Helpers
// ============================================================

/// ページごとの寸法を指定してPDFバイト列を生成する。
fn create_pdf_bytes(page_sizes: &[(f64, f64)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.4");

    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::new();

    for &(width, height) in page_sizes {
        let content_stream = Stream::new(dictionary! {}, b"0 0 0 rg".to_vec());
        let content_id = doc.add_object(content_stream);

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Real(0.0),
                Object::Real(0.0),
                Object::Real(width as f32),
                Object::Real(height as f32),
            ],
            "Contents" => content_id,
            "Resources" => dictionary! {},
        });
        kids.push(page_id.into());
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => Object::Integer(page_sizes.len() as i64),
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("save test PDF");
    buf
}

fn prepared_image() -> PreparedImage {
    let mut img = RgbaImage::new(80, 40);
    for pixel in img.pixels_mut() {
        *pixel = Rgba([30, 30, 30, 255]);
    }
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .expect("encode test PNG");
    PreparedImage::prepare(&buf.into_inner(), 85).expect("prepare")
}

/// 出力の全ページについて署名XObjectが登録されていることを確認する。
fn assert_all_pages_signed(output: &[u8], expected_pages: usize) {
    let doc = Document::load_mem(output).expect("load output");
    let pages = doc.get_pages();
    assert_eq!(pages.len(), expected_pages, "page count must be preserved");

    for (page_num, page_id) in pages {
        let content = doc.get_page_content(page_id).expect("content");
        let content_str = String::from_utf8_lossy(&content);
        assert!(
            content_str.contains("/SigImg Do"),
            "page {page_num} must draw the signature: {content_str}"
        );
    }
}

// ============================================================
// assemble テスト
// ============================================================

#[test]
fn test_assemble_three_pages_with_mixed_table() {
    // page 0とpage 1は明示配置、page 2はデフォルト
    let pdf = create_pdf_bytes(&[(612.0, 792.0); 3]);
    let image = prepared_image();

    let table: PlacementTable = [
        (
            0,
            PlacementParams {
                x: 5.5,
                y: 1.0,
                width: 2.0,
            },
        ),
        (
            1,
            PlacementParams {
                x: 1.0,
                y: 1.0,
                width: 1.0,
            },
        ),
    ]
    .into_iter()
    .collect();

    let output = assemble(&pdf, &image, &table).expect("assemble");
    assert_all_pages_signed(&output, 3);

    // page 1の配置はx=1in=72pt、page 2はデフォルトx=5.5in=396pt
    let doc = Document::load_mem(&output).expect("load output");
    let pages = doc.get_pages();

    let page1 = String::from_utf8_lossy(&doc.get_page_content(pages[&2]).expect("content"))
        .into_owned();
    assert!(page1.contains("72"), "explicit x for page index 1: {page1}");

    let page2 = String::from_utf8_lossy(&doc.get_page_content(pages[&3]).expect("content"))
        .into_owned();
    assert!(page2.contains("396"), "default x for page index 2: {page2}");
}

#[test]
fn test_assemble_empty_table_uses_defaults() {
    let pdf = create_pdf_bytes(&[(612.0, 792.0); 2]);
    let output = assemble(&pdf, &prepared_image(), &PlacementTable::new()).expect("assemble");
    assert_all_pages_signed(&output, 2);
}

#[test]
fn test_assemble_is_idempotent() {
    let pdf = create_pdf_bytes(&[(612.0, 792.0); 2]);
    let image = prepared_image();
    let table = PlacementTable::new();

    let first = assemble(&pdf, &image, &table).expect("assemble");
    let second = assemble(&pdf, &image, &table).expect("assemble");
    assert_eq!(first, second, "identical inputs must yield identical bytes");
}

#[test]
fn test_assemble_uses_actual_page_dimensions() {
    // 非Letterサイズの混在ドキュメントでも各ページの実寸で合成される
    let pdf = create_pdf_bytes(&[(612.0, 792.0), (595.0, 842.0), (400.0, 400.0)]);
    let output = assemble(&pdf, &prepared_image(), &PlacementTable::new()).expect("assemble");
    assert_all_pages_signed(&output, 3);

    // ページ順と寸法が保持されていること
    let reader = pdf_signing::pdf::reader::PdfReader::from_bytes(&output).expect("reader");
    let expected = [(612.0, 792.0), (595.0, 842.0), (400.0, 400.0)];
    for (i, (ew, eh)) in expected.iter().enumerate() {
        let (w, h) = reader.page_dimensions(i as u32).expect("dimensions");
        assert!((w - ew).abs() < 0.1 && (h - eh).abs() < 0.1, "page {i}: {w}x{h}");
    }
}

#[test]
fn test_assemble_boundary_placements() {
    let pdf = create_pdf_bytes(&[(612.0, 792.0)]);
    let image = prepared_image();

    for params in [
        PlacementParams {
            x: 8.0,
            y: 11.0,
            width: 4.0,
        },
        PlacementParams {
            x: 0.0,
            y: 0.0,
            width: 1.0,
        },
    ] {
        let table: PlacementTable = [(0u32, params)].into_iter().collect();
        assemble(&pdf, &image, &table).expect("boundary placement must succeed");
    }
}

#[test]
fn test_assemble_rejects_invalid_placement_entry() {
    let pdf = create_pdf_bytes(&[(612.0, 792.0); 2]);
    let table: PlacementTable = [(
        1u32,
        PlacementParams {
            width: 4.1,
            ..Default::default()
        },
    )]
    .into_iter()
    .collect();

    let err = assemble(&pdf, &prepared_image(), &table).expect_err("must fail");
    assert!(matches!(err, PdfSignError::InvalidPlacement(_)), "{err}");
}

#[test]
fn test_assemble_rejects_corrupt_document() {
    let err = assemble(b"%PDF-garbage", &prepared_image(), &PlacementTable::new())
        .expect_err("must fail");
    assert!(matches!(err, PdfSignError::DocumentParseError(_)), "{err}");
}

#[test]
fn test_assemble_aborts_with_page_index_on_bad_page() {
    // 2ページ目のMediaBoxを壊し、失敗がページインデックス付きで報告されること
    let pdf = create_pdf_bytes(&[(612.0, 792.0); 2]);
    let mut doc = Document::load_mem(&pdf).expect("load");
    let pages = doc.get_pages();
    let bad_page_id = pages[&2];
    if let Ok(dict) = doc
        .get_object_mut(bad_page_id)
        .and_then(Object::as_dict_mut)
    {
        dict.set("MediaBox", vec![Object::Real(0.0), Object::Real(0.0)]);
    }
    let mut broken = Vec::new();
    doc.save_to(&mut broken).expect("save");

    let err = assemble(&broken, &prepared_image(), &PlacementTable::new())
        .expect_err("must fail");
    assert_eq!(err.failed_page(), Some(1), "{err}");
    assert!(matches!(err, PdfSignError::AssemblyAborted { .. }));
}
