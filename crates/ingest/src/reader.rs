use docx_rs::{DocumentChild, ParagraphChild, RunChild};
use mailparse::{DispositionType, ParsedMail};

use crate::document::DocumentFormat;
use crate::error::IngestError;

/// Flattens a document into plain UTF-8 text, one line per page/paragraph
/// boundary.
pub struct TextExtractor;

impl TextExtractor {
    /// Extract on the blocking pool; parsers are CPU-bound and may panic on
    /// malformed input.
    pub async fn extract(format: DocumentFormat, bytes: Vec<u8>) -> Result<String, IngestError> {
        tokio::task::spawn_blocking(move || Self::extract_blocking(format, &bytes))
            .await
            .map_err(|e| extraction_error(format, format!("extraction task failed: {e}")))?
    }

    pub fn extract_blocking(format: DocumentFormat, bytes: &[u8]) -> Result<String, IngestError> {
        match format {
            DocumentFormat::Pdf => extract_pdf(bytes),
            DocumentFormat::Docx => extract_docx(bytes),
            DocumentFormat::Eml => extract_eml(bytes),
        }
    }
}

fn extraction_error(format: DocumentFormat, reason: String) -> IngestError {
    IngestError::Extraction {
        format: format.to_string(),
        reason,
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, IngestError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| extraction_error(DocumentFormat::Pdf, e.to_string()))?;

    // Layout alone does not separate pages
    Ok(pages.join("\n"))
}

fn extract_docx(bytes: &[u8]) -> Result<String, IngestError> {
    let docx = docx_rs::read_docx(bytes)
        .map_err(|e| extraction_error(DocumentFormat::Docx, format!("{e:?}")))?;

    let paragraphs: Vec<String> = docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(para) => Some(paragraph_text(para)),
            _ => None,
        })
        .collect();

    Ok(paragraphs.join("\n"))
}

/// Paragraph → Run → Text; runs of one paragraph are concatenated as-is.
/// Breaks and tabs inside a run become `\n` and `\t`.
fn paragraph_text(para: &docx_rs::Paragraph) -> String {
    let mut text = String::new();

    for child in &para.children {
        if let ParagraphChild::Run(run) = child {
            for rc in &run.children {
                match rc {
                    RunChild::Text(t) => text.push_str(&t.text),
                    RunChild::Break(_) => text.push('\n'),
                    RunChild::Tab(_) => text.push('\t'),
                    _ => {}
                }
            }
        }
    }

    text
}

fn extract_eml(bytes: &[u8]) -> Result<String, IngestError> {
    let mail = mailparse::parse_mail(bytes)
        .map_err(|e| extraction_error(DocumentFormat::Eml, e.to_string()))?;

    let mut parts = Vec::new();
    walk_parts(&mail, &mut parts);

    // Preferred body first, then any text/plain part (attachments included)
    let plain = parts
        .iter()
        .find(|part| is_plain_text(part) && !is_attachment(part))
        .or_else(|| parts.iter().find(|part| is_plain_text(part)));

    let body = match plain {
        Some(part) => Some(part.get_body()),
        None if mail.subparts.is_empty() => Some(mail.get_body()),
        None => None,
    };

    match body {
        Some(body) => body
            .map(|text| text.replace("\r\n", "\n"))
            .map_err(|e| extraction_error(DocumentFormat::Eml, e.to_string())),
        None => Ok(String::new()),
    }
}

fn walk_parts<'a, 'b>(part: &'b ParsedMail<'a>, out: &mut Vec<&'b ParsedMail<'a>>) {
    out.push(part);
    for sub in &part.subparts {
        walk_parts(sub, out);
    }
}

fn is_plain_text(part: &ParsedMail<'_>) -> bool {
    part.ctype.mimetype.eq_ignore_ascii_case("text/plain")
}

fn is_attachment(part: &ParsedMail<'_>) -> bool {
    part.get_content_disposition().disposition == DispositionType::Attachment
}

#[cfg(test)]
mod tests {
    use super::*;
    use docx_rs::{BreakType, Docx, Paragraph, Run};
    use lopdf::content::{Content, Operation};
    use lopdf::{Object, Stream, dictionary};
    use std::io::Cursor;

    /// A PDF with one page per entry, each word drawn at the same position.
    fn build_pdf(pages: &[&str]) -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for word in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![100.into(), 600.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*word)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
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
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
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

    fn build_docx(paragraphs: &[&[&str]]) -> Vec<u8> {
        let mut docx = Docx::new();
        for runs in paragraphs {
            let mut para = Paragraph::new();
            for run in *runs {
                para = para.add_run(Run::new().add_text(*run));
            }
            docx = docx.add_paragraph(para);
        }

        let mut buf = Cursor::new(Vec::new());
        docx.build().pack(&mut buf).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_docx_paragraphs_become_lines() {
        let bytes = build_docx(&[
            &["Section 3: ", "Exclusions"],
            &["Cosmetic surgery is not covered."],
        ]);

        let text = TextExtractor::extract_blocking(DocumentFormat::Docx, &bytes).unwrap();
        assert_eq!(text, "Section 3: Exclusions\nCosmetic surgery is not covered.");
    }

    #[test]
    fn test_docx_breaks_and_tabs_separate_words() {
        let run = Run::new()
            .add_text("Section 3")
            .add_break(BreakType::TextWrapping)
            .add_text("Exclusions")
            .add_tab()
            .add_text("apply");
        let docx = Docx::new().add_paragraph(Paragraph::new().add_run(run));
        let mut buf = Cursor::new(Vec::new());
        docx.build().pack(&mut buf).unwrap();

        let text = TextExtractor::extract_blocking(DocumentFormat::Docx, &buf.into_inner()).unwrap();
        assert_eq!(text, "Section 3\nExclusions\tapply");
        assert_eq!(
            text.split_whitespace().collect::<Vec<_>>(),
            vec!["Section", "3", "Exclusions", "apply"]
        );
    }

    #[test]
    fn test_invalid_docx_is_extraction_error() {
        let err = TextExtractor::extract_blocking(DocumentFormat::Docx, b"not a zip").unwrap_err();
        assert!(matches!(err, IngestError::Extraction { format, .. } if format == "docx"));
    }

    #[test]
    fn test_pdf_pages_are_separated() {
        let bytes = build_pdf(&["covered", "Exclusions"]);

        let text = TextExtractor::extract_blocking(DocumentFormat::Pdf, &bytes).unwrap();
        assert_eq!(text.split_whitespace().collect::<Vec<_>>(), vec!["covered", "Exclusions"]);
    }

    #[tokio::test]
    async fn test_pdf_extracts_on_blocking_pool() {
        let text = TextExtractor::extract(DocumentFormat::Pdf, build_pdf(&["Room rent capped"]))
            .await
            .unwrap();
        assert_eq!(text.split_whitespace().collect::<Vec<_>>(), vec!["Room", "rent", "capped"]);
    }

    #[tokio::test]
    async fn test_invalid_pdf_is_extraction_error() {
        let err = TextExtractor::extract(DocumentFormat::Pdf, b"%PDF-garbage".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Extraction { .. }));
    }

    #[test]
    fn test_eml_prefers_plain_part() {
        let raw = concat!(
            "From: insurer@example.com\r\n",
            "Subject: Policy update\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: multipart/alternative; boundary=\"b1\"\r\n",
            "\r\n",
            "--b1\r\n",
            "Content-Type: text/html\r\n",
            "\r\n",
            "<p>HTML body</p>\r\n",
            "--b1\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "Maternity cover starts after 24 months.\r\n",
            "--b1--\r\n",
        );

        let text = TextExtractor::extract_blocking(DocumentFormat::Eml, raw.as_bytes()).unwrap();
        assert_eq!(text.trim(), "Maternity cover starts after 24 months.");
    }

    #[test]
    fn test_eml_falls_back_to_plain_attachment() {
        let raw = concat!(
            "Subject: Clauses\r\n",
            "Content-Type: multipart/mixed; boundary=\"b2\"\r\n",
            "\r\n",
            "--b2\r\n",
            "Content-Type: text/html\r\n",
            "\r\n",
            "<p>See attached</p>\r\n",
            "--b2\r\n",
            "Content-Type: text/plain\r\n",
            "Content-Disposition: attachment; filename=\"clauses.txt\"\r\n",
            "\r\n",
            "Clause 7: Waiting period of 30 days.\r\n",
            "--b2--\r\n",
        );

        let text = TextExtractor::extract_blocking(DocumentFormat::Eml, raw.as_bytes()).unwrap();
        assert_eq!(text.trim(), "Clause 7: Waiting period of 30 days.");
    }

    #[test]
    fn test_eml_without_plain_part_is_empty() {
        let raw = concat!(
            "Subject: Html only\r\n",
            "Content-Type: multipart/alternative; boundary=\"b3\"\r\n",
            "\r\n",
            "--b3\r\n",
            "Content-Type: text/html\r\n",
            "\r\n",
            "<p>Only html</p>\r\n",
            "--b3--\r\n",
        );

        let text = TextExtractor::extract_blocking(DocumentFormat::Eml, raw.as_bytes()).unwrap();
        assert_eq!(text, "");
    }
}
