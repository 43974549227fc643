//! Assembly of the verification report document.
//!
//! Layout, top to bottom: brand header, centered verdict banner, the known
//! supplementary fields in display order, the captured document as an
//! exhibit, and an audit footer carrying the session token. Pagination is by
//! fixed count — seven field blocks per page — so a given result always
//! renders to the same number of pages.

use crate::capture::{ImageFormat, ImagePayload};
use idscan_common::model::{NamedField, VerificationResult};
use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, Mm, PdfDocument, Rgb,
    image_crate::codecs::{jpeg::JpegDecoder, png::PngDecoder},
};
use std::io::Cursor;
use thiserror::Error;

pub const REPORT_TITLE: &str = "Identity Verification Report";

/// Field blocks rendered per page before a page break.
pub const FIELDS_PER_PAGE: usize = 7;

/// The exhibit takes the room of three field blocks; it fits under at most
/// this many blocks on the last field page.
const EXHIBIT_FIT_MAX: usize = 4;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("pdf assembly failed: {0}")]
    Pdf(String),
}

/// Number of pages a report renders to for the given count of known fields.
/// Deterministic for deterministic input.
pub fn page_count(field_count: usize) -> usize {
    let field_pages = field_count.div_ceil(FIELDS_PER_PAGE).max(1);
    let last_load = if field_count == 0 {
        0
    } else {
        (field_count - 1) % FIELDS_PER_PAGE + 1
    };

    if last_load > EXHIBIT_FIT_MAX {
        field_pages + 1
    } else {
        field_pages
    }
}

/// Render the report for a passed verification to PDF bytes.
///
/// `audit_token` is the server-confirmed session token; it lands in the
/// audit footer so a stored report can be traced back to its session.
pub fn render_report(
    result: &VerificationResult,
    document_image: &ImagePayload,
    audit_token: &str,
) -> Result<Vec<u8>, RenderError> {
    let fields = result.ordered_fields();
    let passed = result.verdict().passed();

    let (doc, first_page, first_layer) =
        PdfDocument::new(REPORT_TITLE, Mm(210.0), Mm(297.0), "report");
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|error| RenderError::Pdf(error.to_string()))?;
    let font_bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|error| RenderError::Pdf(error.to_string()))?;

    let mut layer = doc.get_page(first_page).get_layer(first_layer);

    // Brand header.
    layer.set_fill_color(Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));
    layer.use_text("Rented123", 16.0, Mm(88.0), Mm(280.0), &font_bold);
    layer.set_fill_color(Color::Rgb(Rgb::new(0.4, 0.4, 0.4, None)));
    layer.use_text(REPORT_TITLE, 11.0, Mm(77.0), Mm(272.0), &font);

    // Verdict banner, prominently centered.
    let banner = if passed {
        layer.set_fill_color(Color::Rgb(Rgb::new(0.0, 0.5, 0.0, None)));
        "Verification Result: Passed"
    } else {
        layer.set_fill_color(Color::Rgb(Rgb::new(0.8, 0.0, 0.0, None)));
        "Verification Result: Failed"
    };
    layer.use_text(banner, 20.0, Mm(55.0), Mm(252.0), &font_bold);

    // Personal information blocks, paginated by fixed count.
    let mut y_top = 72.0;
    for (index, field) in fields.iter().enumerate() {
        if index > 0 && index % FIELDS_PER_PAGE == 0 {
            let (page, page_layer) = doc.add_page(Mm(210.0), Mm(297.0), "report");
            layer = doc.get_page(page).get_layer(page_layer);
            y_top = 22.0;
        }

        write_field_block(&layer, &font, &font_bold, field, y_top);
        y_top += 22.0;
    }

    // The document exhibit; moved to a fresh page when the last field page
    // is too full to hold it.
    let last_load = if fields.is_empty() {
        0
    } else {
        (fields.len() - 1) % FIELDS_PER_PAGE + 1
    };
    if last_load > EXHIBIT_FIT_MAX {
        let (page, page_layer) = doc.add_page(Mm(210.0), Mm(297.0), "report");
        layer = doc.get_page(page).get_layer(page_layer);
        y_top = 22.0;
    }

    layer.set_fill_color(Color::Rgb(Rgb::new(0.6, 0.6, 0.6, None)));
    layer.use_text("Document", 13.0, Mm(10.0), Mm(297.0 - y_top), &font_bold);
    embed_exhibit(&layer, &font, document_image, y_top + 5.0);

    // Audit footer on the final page.
    let surname = result.surname().unwrap_or("Unknown");
    let dob = result.date_of_birth().unwrap_or("Unknown");
    layer.set_fill_color(Color::Rgb(Rgb::new(0.6, 0.6, 0.6, None)));
    layer.use_text(
        format!("Session {audit_token} | {surname} | {dob}"),
        8.0,
        Mm(10.0),
        Mm(8.0),
        &font,
    );

    doc.save_to_bytes()
        .map_err(|error| RenderError::Pdf(error.to_string()))
}

fn write_field_block(
    layer: &printpdf::PdfLayerReference,
    font: &printpdf::IndirectFontRef,
    font_bold: &printpdf::IndirectFontRef,
    field: &NamedField,
    y_top: f32,
) {
    layer.set_fill_color(Color::Rgb(Rgb::new(0.6, 0.6, 0.6, None)));
    layer.use_text(field.name.as_str(), 13.0, Mm(10.0), Mm(297.0 - y_top), font_bold);
    layer.set_fill_color(Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));
    layer.use_text(
        field.value.as_str(),
        13.0,
        Mm(10.0),
        Mm(297.0 - (y_top + 10.0)),
        font,
    );
}

/// Draw the captured document below `y_top`. A payload that cannot be
/// decoded as an image, such as a PDF upload or a corrupt frame, degrades to
/// a placeholder note; the report itself still renders.
fn embed_exhibit(
    layer: &printpdf::PdfLayerReference,
    font: &printpdf::IndirectFontRef,
    payload: &ImagePayload,
    y_top: f32,
) {
    let image = match payload.format() {
        ImageFormat::Jpeg => JpegDecoder::new(Cursor::new(payload.bytes()))
            .map_err(|error| error.to_string())
            .and_then(|decoder| Image::try_from(decoder).map_err(|error| error.to_string())),
        ImageFormat::Png => PngDecoder::new(Cursor::new(payload.bytes()))
            .map_err(|error| error.to_string())
            .and_then(|decoder| Image::try_from(decoder).map_err(|error| error.to_string())),
        ImageFormat::Pdf => Err("document was supplied as a PDF".to_string()),
    };

    match image {
        Ok(image) => {
            image.add_to_layer(
                layer.clone(),
                ImageTransform {
                    translate_x: Some(Mm(10.0)),
                    translate_y: Some(Mm(297.0 - (y_top + 55.0))),
                    dpi: Some(300.0),
                    ..Default::default()
                },
            );
        }
        Err(reason) => {
            tracing::warn!(%reason, "document exhibit could not be embedded");
            layer.use_text(
                "Document image retained in the submission record.",
                10.0,
                Mm(10.0),
                Mm(297.0 - (y_top + 10.0)),
                font,
            );
        }
    }
}
