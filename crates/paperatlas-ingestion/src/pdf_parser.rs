//! PDF text extraction via lopdf.

use anyhow::{bail, Context, Result};
use lopdf::Document as PdfDoc;
use tracing::debug;

/// Extract plain text from every page of an in-memory PDF.
///
/// Pages that fail to decode are skipped; a document with no extractable
/// text at all is an error.
pub fn parse_pdf_bytes(data: &[u8]) -> Result<String> {
    let pdf = PdfDoc::load_mem(data).context("not a readable PDF")?;

    let mut pages = Vec::new();
    for page_num in pdf.get_pages().keys() {
        match pdf.extract_text(&[*page_num]) {
            Ok(text) => pages.push(text),
            Err(e) => debug!(page = page_num, error = %e, "Skipping undecodable page"),
        }
    }

    let text = pages.join("\n").trim().to_string();
    if text.is_empty() {
        bail!("PDF contains no extractable text");
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    fn one_page_pdf(text: &str) -> Vec<u8> {
        let mut doc = PdfDoc::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    #[test]
    fn test_parse_generated_pdf() {
        let bytes = one_page_pdf("We propose AdaGraph");
        let text = parse_pdf_bytes(&bytes).unwrap();
        assert!(text.contains("AdaGraph"), "got: {text}");
    }

    #[test]
    fn test_garbage_is_error() {
        assert!(parse_pdf_bytes(b"definitely not a pdf").is_err());
        assert!(parse_pdf_bytes(&[]).is_err());
    }
}
