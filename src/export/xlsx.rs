//! Excel workbook export
//!
//! Sheet "Deposits" lists List A in column A and List B in column B, each
//! cell filled green when matched and red when unmatched, with per-list
//! totals beside them. Sheet "Related Sets" lists every selected group.

use bigdecimal::{BigDecimal, ToPrimitive};
use rust_xlsxwriter::{Color, Format, FormatBorder, Workbook, Worksheet, XlsxError};
use std::path::Path;

use crate::reconciliation::ReconciliationReport;
use crate::traits::ReportExporter;
use crate::types::*;

const AMOUNT_FORMAT: &str = "#,##0.00########";

/// Writes a report as an `.xlsx` workbook
#[derive(Debug, Clone)]
pub struct XlsxExporter {
    matched_color: u32,
    unmatched_color: u32,
}

impl Default for XlsxExporter {
    fn default() -> Self {
        Self {
            matched_color: 0xC6EFCE,
            unmatched_color: 0xFFC7CE,
        }
    }
}

impl XlsxExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the fill colours (RGB, e.g. `0x00FF00`)
    pub fn with_colors(mut self, matched: u32, unmatched: u32) -> Self {
        self.matched_color = matched;
        self.unmatched_color = unmatched;
        self
    }

    fn build(&self, report: &ReconciliationReport) -> ReconcileResult<Workbook> {
        let mut workbook = Workbook::new();

        let header = Format::new()
            .set_bold()
            .set_border_bottom(FormatBorder::Thin);
        let matched = Format::new()
            .set_num_format(AMOUNT_FORMAT)
            .set_background_color(Color::RGB(self.matched_color));
        let unmatched = Format::new()
            .set_num_format(AMOUNT_FORMAT)
            .set_background_color(Color::RGB(self.unmatched_color));
        let amount = Format::new().set_num_format(AMOUNT_FORMAT);

        let deposits = workbook.add_worksheet();
        deposits.set_name("Deposits").map_err(xlsx_error)?;
        deposits.write_string_with_format(0, 0, "List A", &header).map_err(xlsx_error)?;
        deposits.write_string_with_format(0, 1, "List B", &header).map_err(xlsx_error)?;
        deposits.set_column_width(0, 16).map_err(xlsx_error)?;
        deposits.set_column_width(1, 16).map_err(xlsx_error)?;

        for (column, side) in [(0u16, ListSide::A), (1u16, ListSide::B)] {
            for (row, record) in report.entries(side).iter().enumerate() {
                let format = if record.status.is_matched() {
                    &matched
                } else {
                    &unmatched
                };
                write_amount(deposits, row as u32 + 1, column, &record.amount, format)?;
            }
        }

        // Totals block to the right of the lists
        deposits.write_string_with_format(0, 4, "List A", &header).map_err(xlsx_error)?;
        deposits.write_string_with_format(0, 5, "List B", &header).map_err(xlsx_error)?;
        deposits.set_column_width(3, 12).map_err(xlsx_error)?;
        deposits.set_column_width(4, 16).map_err(xlsx_error)?;
        deposits.set_column_width(5, 16).map_err(xlsx_error)?;

        let (a, b) = (&report.summary_a, &report.summary_b);
        let rows = [
            ("Total", &a.total, &b.total),
            ("Matched", &a.matched, &b.matched),
            ("Unmatched", &a.unmatched, &b.unmatched),
        ];
        for (offset, (label, value_a, value_b)) in rows.into_iter().enumerate() {
            let row = offset as u32 + 1;
            deposits.write_string_with_format(row, 3, label, &header).map_err(xlsx_error)?;
            write_amount(deposits, row, 4, value_a, &amount)?;
            write_amount(deposits, row, 5, value_b, &amount)?;
        }

        let sets = workbook.add_worksheet();
        sets.set_name("Related Sets").map_err(xlsx_error)?;
        let headings = ["Set", "List A entries", "List A values", "List B entries", "List B values", "Sum"];
        for (column, title) in headings.iter().enumerate() {
            sets.write_string_with_format(0, column as u16, *title, &header)
                .map_err(xlsx_error)?;
            sets.set_column_width(column as u16, 18).map_err(xlsx_error)?;
        }

        for (offset, set) in report.related_sets.iter().enumerate() {
            let row = offset as u32 + 1;
            sets.write_string(row, 0, set.id.to_string()).map_err(xlsx_error)?;
            sets.write_string(row, 1, set.describe(ListSide::A)).map_err(xlsx_error)?;
            sets.write_string(row, 2, join_values(&set.values_a)).map_err(xlsx_error)?;
            sets.write_string(row, 3, set.describe(ListSide::B)).map_err(xlsx_error)?;
            sets.write_string(row, 4, join_values(&set.values_b)).map_err(xlsx_error)?;
            write_amount(sets, row, 5, &set.sum, &amount)?;
        }

        let summary_row = report.related_sets.len() as u32 + 2;
        sets.write_string_with_format(summary_row, 0, "Matched total", &header)
            .map_err(xlsx_error)?;
        write_amount(sets, summary_row, 5, &report.matched_total, &amount)?;

        Ok(workbook)
    }
}

impl ReportExporter for XlsxExporter {
    fn export(&self, report: &ReconciliationReport, path: &Path) -> ReconcileResult<()> {
        let mut workbook = self.build(report)?;
        workbook.save(path).map_err(xlsx_error)?;
        tracing::info!(path = %path.display(), "wrote reconciliation workbook");
        Ok(())
    }

    fn export_to_buffer(&self, report: &ReconciliationReport) -> ReconcileResult<Vec<u8>> {
        let mut workbook = self.build(report)?;
        workbook.save_to_buffer().map_err(xlsx_error)
    }
}

/// Write an amount as a number, or as text if it has no `f64` form
fn write_amount(
    sheet: &mut Worksheet,
    row: u32,
    column: u16,
    value: &BigDecimal,
    format: &Format,
) -> ReconcileResult<()> {
    match value.to_f64() {
        Some(number) if number.is_finite() => {
            sheet.write_number_with_format(row, column, number, format)
        }
        _ => sheet.write_string_with_format(row, column, value.to_string(), format),
    }
    .map_err(xlsx_error)?;
    Ok(())
}

fn join_values(values: &[BigDecimal]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" + ")
}

fn xlsx_error(error: XlsxError) -> ReconcileError {
    ReconcileError::Export(error.to_string())
}
