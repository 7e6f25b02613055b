//! PDF export of a single invoice.
//!
//! The renderer works from a fully loaded [`InvoiceDocument`]; it never touches
//! a store. VAT is derived here from the stored total and is never persisted.

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use thiserror::Error;

use facturo_auth::UserProfile;
use facturo_invoicing::{Invoice, InvoiceLine, VatBreakdown};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("failed to encode pdf content: {0}")]
    Encode(String),

    #[error("failed to write pdf: {0}")]
    Write(String),
}

/// Everything printed on an invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceDocument {
    pub invoice: Invoice,
    pub lines: Vec<InvoiceLine>,
    pub user: Option<UserProfile>,
}

impl InvoiceDocument {
    pub fn new(invoice: Invoice, lines: Vec<InvoiceLine>, user: Option<UserProfile>) -> Self {
        Self {
            invoice,
            lines,
            user,
        }
    }

    pub fn amounts(&self) -> VatBreakdown {
        self.invoice.vat_breakdown()
    }
}

pub trait InvoiceRenderer: Send + Sync {
    fn render(&self, document: &InvoiceDocument) -> Result<Vec<u8>, RenderError>;
}

/// Single A4 page, built-in Helvetica.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfRenderer;

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN_LEFT: i64 = 50;
const ROW_HEIGHT: i64 = 16;
/// Rows below this y are not drawn.
const BOTTOM_LIMIT: i64 = 140;

const COL_QUANTITY: i64 = 320;
const COL_UNIT_PRICE: i64 = 400;
const COL_TOTAL: i64 = 490;

impl LopdfRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl InvoiceRenderer for LopdfRenderer {
    fn render(&self, document: &InvoiceDocument) -> Result<Vec<u8>, RenderError> {
        let content = Content {
            operations: page_operations(document),
        };
        let encoded = content
            .encode()
            .map_err(|e| RenderError::Encode(e.to_string()))?;

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let bold_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
                "F2" => bold_id,
            },
        });
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.compress();

        let mut out = Vec::new();
        doc.save_to(&mut out)
            .map_err(|e| RenderError::Write(e.to_string()))?;
        Ok(out)
    }
}

fn page_operations(document: &InvoiceDocument) -> Vec<Operation> {
    let invoice = &document.invoice;
    let details = invoice.details();
    let mut ops = Vec::new();
    let mut y = PAGE_HEIGHT - 70;

    text(&mut ops, "F2", 22, MARGIN_LEFT, y, "FACTURE");
    y -= 30;
    text(&mut ops, "F1", 11, MARGIN_LEFT, y, &format!("Numero : {}", invoice.invoice_number()));
    y -= ROW_HEIGHT;
    text(&mut ops, "F1", 11, MARGIN_LEFT, y, &format!("Objet : {}", details.name));
    y -= ROW_HEIGHT;
    text(&mut ops, "F1", 11, MARGIN_LEFT, y, &format!("Date : {}", details.invoice_date));
    y -= ROW_HEIGHT;
    text(&mut ops, "F1", 11, MARGIN_LEFT, y, &format!("Echeance : {}", details.due_date));
    y -= ROW_HEIGHT;
    text(&mut ops, "F1", 11, MARGIN_LEFT, y, &format!("Statut : {}", invoice.status()));
    y -= 2 * ROW_HEIGHT;

    let block_top = y;
    text(&mut ops, "F2", 11, MARGIN_LEFT, y, "Emetteur");
    let issuer_name = details
        .issuer_name
        .clone()
        .or_else(|| document.user.as_ref().map(|u| u.name.clone()));
    let mut left_y = y - ROW_HEIGHT;
    for value in [issuer_name.as_deref(), details.issuer_address.as_deref()]
        .into_iter()
        .flatten()
    {
        text(&mut ops, "F1", 10, MARGIN_LEFT, left_y, value);
        left_y -= ROW_HEIGHT;
    }

    text(&mut ops, "F2", 11, COL_QUANTITY, block_top, "Client");
    let mut right_y = block_top - ROW_HEIGHT;
    for value in [details.client_name.as_deref(), details.client_address.as_deref()]
        .into_iter()
        .flatten()
    {
        text(&mut ops, "F1", 10, COL_QUANTITY, right_y, value);
        right_y -= ROW_HEIGHT;
    }
    y = left_y.min(right_y) - ROW_HEIGHT;

    text(&mut ops, "F2", 10, MARGIN_LEFT, y, "Description");
    text(&mut ops, "F2", 10, COL_QUANTITY, y, "Quantite");
    text(&mut ops, "F2", 10, COL_UNIT_PRICE, y, "Prix unitaire");
    text(&mut ops, "F2", 10, COL_TOTAL, y, "Total");
    y -= 4;
    rule(&mut ops, y);
    y -= ROW_HEIGHT;

    let mut drawn = 0;
    for line in &document.lines {
        if y < BOTTOM_LIMIT {
            break;
        }
        text(&mut ops, "F1", 10, MARGIN_LEFT, y, &truncate(line.description(), 45));
        text(&mut ops, "F1", 10, COL_QUANTITY, y, &format_number(line.quantity()));
        text(&mut ops, "F1", 10, COL_UNIT_PRICE, y, &format_amount(line.unit_price()));
        text(&mut ops, "F1", 10, COL_TOTAL, y, &format_amount(line.total()));
        y -= ROW_HEIGHT;
        drawn += 1;
    }
    let hidden = document.lines.len() - drawn;
    if hidden > 0 {
        text(&mut ops, "F1", 9, MARGIN_LEFT, y, &format!("... {hidden} ligne(s) supplementaire(s)"));
        y -= ROW_HEIGHT;
    }

    rule(&mut ops, y + ROW_HEIGHT - 4);
    y -= 4;

    let amounts = document.amounts();
    text(&mut ops, "F1", 11, COL_UNIT_PRICE, y, "Total HT");
    text(&mut ops, "F1", 11, COL_TOTAL, y, &format_amount(amounts.total_excl_vat));
    if let Some(vat) = amounts.vat {
        y -= ROW_HEIGHT;
        text(&mut ops, "F1", 11, COL_UNIT_PRICE, y, &format!("TVA ({}%)", format_number(vat.rate)));
        text(&mut ops, "F1", 11, COL_TOTAL, y, &format_amount(vat.amount));
        y -= ROW_HEIGHT;
        text(&mut ops, "F2", 11, COL_UNIT_PRICE, y, "Total TTC");
        text(&mut ops, "F2", 11, COL_TOTAL, y, &format_amount(vat.total_incl_vat));
    }

    ops
}

fn text(ops: &mut Vec<Operation>, font: &str, size: i64, x: i64, y: i64, value: &str) {
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new("Tf", vec![font.into(), size.into()]));
    ops.push(Operation::new("Td", vec![x.into(), y.into()]));
    ops.push(Operation::new("Tj", vec![Object::string_literal(pdf_text(value))]));
    ops.push(Operation::new("ET", vec![]));
}

fn rule(ops: &mut Vec<Operation>, y: i64) {
    ops.push(Operation::new("m", vec![MARGIN_LEFT.into(), y.into()]));
    ops.push(Operation::new("l", vec![(PAGE_WIDTH - MARGIN_LEFT).into(), y.into()]));
    ops.push(Operation::new("S", vec![]));
}

fn format_amount(value: f64) -> String {
    format!("{value:.2} EUR")
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut out: String = value.chars().take(max_chars.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

/// Built-in fonts only cover Latin-1 reliably; fold common accents and replace
/// anything else outside printable ASCII.
fn pdf_text(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            'à' | 'â' | 'ä' => 'a',
            'À' | 'Â' | 'Ä' => 'A',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'î' | 'ï' => 'i',
            'Î' | 'Ï' => 'I',
            'ô' | 'ö' => 'o',
            'Ô' | 'Ö' => 'O',
            'ù' | 'û' | 'ü' => 'u',
            'Ù' | 'Û' | 'Ü' => 'U',
            'ç' => 'c',
            'Ç' => 'C',
            '€' => 'E',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '?',
        })
        .collect()
}
