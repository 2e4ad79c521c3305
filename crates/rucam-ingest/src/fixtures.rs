//! Small generated PDFs for adapter, builder, and end-to-end tests.
//!
//! Compiled for this crate's own tests and, behind the `test-fixtures`
//! feature, for downstream test suites. Helpers panic on I/O failure.

use std::path::{Path, PathBuf};

use lopdf::dictionary;
use lopdf::{Document, Object, Stream};

/// Build a PDF with one page per content stream. Every page shares a
/// Helvetica font registered as `/F1`.
pub fn pdf_bytes(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.4");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids: Vec<Object> = Vec::new();
    for content in pages {
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.as_bytes().to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! {
                    "F1" => font_id,
                },
            },
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// Write [`pdf_bytes`] output to `name` inside `dir`.
pub fn write_pdf(dir: impl AsRef<Path>, name: &str, pages: &[&str]) -> PathBuf {
    let path = dir.as_ref().join(name);
    std::fs::write(&path, pdf_bytes(pages)).unwrap();
    path
}
