use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};
use rust_xlsxwriter::{Format, Workbook};

use aura_tenancy::ReportFormat;

use super::{Cell, RenderedReport, ReportError, ReportTable};

pub fn render(table: &ReportTable, format: ReportFormat) -> Result<RenderedReport, ReportError> {
    let bytes = match format {
        ReportFormat::Csv => to_csv(table)?,
        ReportFormat::Xlsx => to_xlsx(table)?,
        ReportFormat::Pdf => to_pdf(table)?,
    };
    Ok(RenderedReport::new(table, format, bytes))
}

fn to_csv(table: &ReportTable) -> Result<Vec<u8>, ReportError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(&table.headers)
        .map_err(|e| ReportError::Csv(e.to_string()))?;
    for row in &table.rows {
        wtr.write_record(row.iter().map(|c| c.to_string()))
            .map_err(|e| ReportError::Csv(e.to_string()))?;
    }
    wtr.into_inner().map_err(|e| ReportError::Csv(e.to_string()))
}

fn to_xlsx(table: &ReportTable) -> Result<Vec<u8>, ReportError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let money = Format::new().set_num_format("#,##0.00");

    let sheet = workbook.add_worksheet();
    sheet.set_name(table.kind.title())?;
    sheet.write_string_with_format(0, 0, &table.title, &bold)?;

    for (col, header) in table.headers.iter().enumerate() {
        sheet.write_string_with_format(2, col as u16, *header, &bold)?;
    }
    for (i, row) in table.rows.iter().enumerate() {
        let r = 3 + i as u32;
        for (col, cell) in row.iter().enumerate() {
            let c = col as u16;
            match cell {
                Cell::Text(s) => {
                    sheet.write_string(r, c, s)?;
                }
                Cell::Number(n) => {
                    sheet.write_number_with_format(r, c, *n, &money)?;
                }
                Cell::Integer(n) => {
                    sheet.write_number(r, c, *n as f64)?;
                }
                Cell::Empty => {}
            }
        }
    }
    sheet.autofit();

    Ok(workbook.save_to_buffer()?)
}

const PAGE_W: f32 = 297.0;
const PAGE_H: f32 = 210.0;
const MARGIN: f32 = 12.0;
const LINE: f32 = 6.0;
const FONT_SIZE: f32 = 8.0;

/// Landscape A4, fixed-width columns, one text line per row.
fn to_pdf(table: &ReportTable) -> Result<Vec<u8>, ReportError> {
    let (doc, page, layer) = PdfDocument::new(&table.title, Mm(PAGE_W), Mm(PAGE_H), "report");
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ReportError::Pdf(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ReportError::Pdf(e.to_string()))?;

    let cols = table.headers.len().max(1);
    let col_w = (PAGE_W - 2.0 * MARGIN) / cols as f32;
    // Helvetica at 8pt fits roughly 0.55 mm per character.
    let max_chars = ((col_w / 1.6) as usize).max(4);

    let mut current = doc.get_page(page).get_layer(layer);
    let mut y = PAGE_H - MARGIN;
    current.use_text(&table.title, 12.0, Mm(MARGIN), Mm(y), &bold);
    y -= LINE;
    current.use_text(
        format!("Generated {} UTC", table.generated_at.format("%Y-%m-%d %H:%M")),
        FONT_SIZE,
        Mm(MARGIN),
        Mm(y),
        &regular,
    );
    y -= LINE * 1.5;
    write_row(&current, table.headers.iter().map(|h| h.to_string()), y, col_w, max_chars, &bold);
    y -= LINE;

    for row in &table.rows {
        if y < MARGIN {
            let (p, l) = doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "report");
            current = doc.get_page(p).get_layer(l);
            y = PAGE_H - MARGIN;
            write_row(&current, table.headers.iter().map(|h| h.to_string()), y, col_w, max_chars, &bold);
            y -= LINE;
        }
        write_row(&current, row.iter().map(|c| c.to_string()), y, col_w, max_chars, &regular);
        y -= LINE;
    }

    if table.rows.is_empty() {
        current.use_text("No records.", FONT_SIZE, Mm(MARGIN), Mm(y), &regular);
    }

    doc.save_to_bytes().map_err(|e| ReportError::Pdf(e.to_string()))
}

fn write_row(
    layer: &PdfLayerReference,
    cells: impl Iterator<Item = String>,
    y: f32,
    col_w: f32,
    max_chars: usize,
    font: &IndirectFontRef,
) {
    for (i, text) in cells.enumerate() {
        let text: String = if text.chars().count() > max_chars {
            let mut t: String = text.chars().take(max_chars.saturating_sub(1)).collect();
            t.push('~');
            t
        } else {
            text
        };
        layer.use_text(text, FONT_SIZE, Mm(MARGIN + i as f32 * col_w), Mm(y), font);
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use aura_tenancy::ReportKind;

    use super::*;

    fn table() -> ReportTable {
        ReportTable {
            kind: ReportKind::Payroll,
            title: "Acme - Payroll Report".into(),
            headers: vec!["Code", "Net", "Note"],
            rows: vec![
                vec![Cell::text("E-001"), Cell::Number(1234.5), Cell::text("bonus, march")],
                vec![Cell::text("E-002"), Cell::Number(99.0), Cell::Empty],
            ],
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn csv_quotes_and_formats() {
        let out = render(&table(), ReportFormat::Csv).unwrap();
        let text = String::from_utf8(out.bytes).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "Code,Net,Note");
        assert_eq!(lines[1], "E-001,1234.50,\"bonus, march\"");
        assert_eq!(lines[2], "E-002,99.00,");
        assert!(out.filename.starts_with("payroll-") && out.filename.ends_with(".csv"));
    }

    #[test]
    fn xlsx_is_a_zip_container() {
        let out = render(&table(), ReportFormat::Xlsx).unwrap();
        assert_eq!(&out.bytes[..2], b"PK");
        assert!(out.content_type.contains("spreadsheetml"));
    }

    #[test]
    fn pdf_has_header_and_spills_to_new_pages() {
        let mut t = table();
        for i in 0..80 {
            t.rows.push(vec![Cell::text(format!("E-{i:03}")), Cell::Number(1.0), Cell::Empty]);
        }
        let out = render(&t, ReportFormat::Pdf).unwrap();
        assert!(out.bytes.starts_with(b"%PDF"));
        assert_eq!(out.content_type, "application/pdf");
    }
}
