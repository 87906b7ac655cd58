//! Row parsing with tenant and period consistency
//!
//! Runs after structural validation. Besides typing the rows it enforces
//! that every row belongs to the tenant folder the file sits in and to the
//! period encoded in the file name. Any violation discards the whole file.

use chrono::NaiveDate;

use crate::error::IngestError;
use crate::models::context::parse_iso_date;
use crate::models::{IngestionContext, RawStockRow};
use crate::services::csv_validator::{split_fields, split_lines, EXPECTED_HEADER};

/// Registration numbers are exactly this many digits
pub const CNPJ_DIGITS: usize = 14;

/// Keep only ASCII digits ("12.345.678/0001-99" -> "12345678000199")
pub fn only_digits(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Parse validated bytes into typed rows for the given context
pub fn parse(bytes: &[u8], ctx: &IngestionContext) -> Result<Vec<RawStockRow>, IngestError> {
    parse_rows(bytes, &ctx.file_name, &ctx.tenant_id, ctx.reference_date)
}

/// Parse with explicit expectations
pub fn parse_rows(
    bytes: &[u8],
    file_name: &str,
    expected_tenant: &str,
    expected_date: NaiveDate,
) -> Result<Vec<RawStockRow>, IngestError> {
    if bytes.is_empty() {
        return Err(IngestError::Validation(format!("Empty file: {}", file_name)));
    }

    let lines = split_lines(bytes);
    let header = split_fields(lines[0].trim());
    let header_matches = header.len() == EXPECTED_HEADER.len()
        && EXPECTED_HEADER
            .iter()
            .zip(&header)
            .all(|(expected, received)| expected.eq_ignore_ascii_case(received));
    if !header_matches {
        return Err(IngestError::Validation(format!(
            "Invalid CSV header. Expected: {} file={}",
            EXPECTED_HEADER.join(";"),
            file_name
        )));
    }

    let rows = lines
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            parse_line(line.trim(), index + 1, file_name, expected_tenant, expected_date)
        })
        .collect::<Result<Vec<_>, _>>()?;

    if rows.is_empty() {
        return Err(IngestError::Validation(format!(
            "CSV contains no data rows: {}",
            file_name
        )));
    }

    Ok(rows)
}

fn parse_line(
    line: &str,
    line_number: usize,
    file_name: &str,
    expected_tenant: &str,
    expected_date: NaiveDate,
) -> Result<RawStockRow, IngestError> {
    let fields = split_fields(line);
    if fields.len() != EXPECTED_HEADER.len() {
        return Err(IngestError::Validation(format!(
            "Invalid CSV line (expected {} columns) at line {} file={}",
            EXPECTED_HEADER.len(),
            line_number,
            file_name
        )));
    }

    let cnpj = only_digits(fields[0]);
    if cnpj.len() != CNPJ_DIGITS {
        return Err(IngestError::Consistency(format!(
            "Invalid CNPJ at line {}: {} file={}",
            line_number, fields[0], file_name
        )));
    }
    if cnpj != expected_tenant {
        return Err(IngestError::Consistency(format!(
            "CNPJ mismatch at line {}: csv={} expected={} file={}",
            line_number, cnpj, expected_tenant, file_name
        )));
    }

    let product_name = fields[1].to_string();
    if product_name.is_empty() {
        return Err(IngestError::Validation(format!(
            "medicine_name is required at line {} file={}",
            line_number, file_name
        )));
    }

    let quantity = fields[2]
        .parse::<i32>()
        .ok()
        .and_then(|q| u32::try_from(q).ok())
        .ok_or_else(|| {
            IngestError::Validation(format!(
                "Invalid quantity at line {}: {} file={}",
                line_number, fields[2], file_name
            ))
        })?;

    let reference_date = parse_iso_date(fields[3]).ok_or_else(|| {
        IngestError::Validation(format!(
            "Invalid reference_date at line {}: {} file={}",
            line_number, fields[3], file_name
        ))
    })?;
    if reference_date != expected_date {
        return Err(IngestError::Consistency(format!(
            "reference_date mismatch at line {}: csv={} expected={} file={}",
            line_number, reference_date, expected_date, file_name
        )));
    }

    Ok(RawStockRow {
        tenant_id: cnpj,
        product_name,
        quantity,
        reference_date,
    })
}
