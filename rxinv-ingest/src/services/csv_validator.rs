//! CSV structural validation
//!
//! Checks shape, header and per-row syntax of an inventory file before any
//! semantic use. Fail-fast: the first violation aborts with a message naming
//! the 1-based line number and the file.

use crate::error::IngestError;
use crate::models::context::parse_iso_date;

/// Column delimiter
pub const DELIMITER: char = ';';

/// Expected header columns, in order (compared case-insensitively)
pub const EXPECTED_HEADER: [&str; 4] = ["cnpj", "medicine_name", "quantity", "reference_date"];

/// Decode file bytes and split on any line terminator (`\r\n`, `\n`, `\r`)
pub fn split_lines(bytes: &[u8]) -> Vec<String> {
    let decoded = String::from_utf8_lossy(bytes);
    let content: &str = decoded.strip_prefix('\u{feff}').unwrap_or(&decoded);
    content
        .replace("\r\n", "\n")
        .split(&['\n', '\r'][..])
        .map(str::to_string)
        .collect()
}

/// Split one line on the delimiter, keeping empty fields, trimming each
pub fn split_fields(line: &str) -> Vec<&str> {
    line.split(DELIMITER).map(str::trim).collect()
}

/// Validate raw file bytes
pub fn validate(bytes: &[u8], blob_name: &str) -> Result<(), IngestError> {
    if !blob_name.to_lowercase().ends_with(".csv") {
        return Err(invalid(format!(
            "Invalid file extension (expected .csv): {}",
            blob_name
        )));
    }

    if String::from_utf8_lossy(bytes).trim().is_empty() {
        return Err(invalid(format!("File is empty: {}", blob_name)));
    }

    let lines = split_lines(bytes);
    validate_header(lines[0].trim(), blob_name)?;

    for (index, raw) in lines.iter().enumerate().skip(1) {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        validate_row(line, index + 1, blob_name)?;
    }

    Ok(())
}

fn validate_header(header: &str, blob_name: &str) -> Result<(), IngestError> {
    if header.is_empty() {
        return Err(invalid(format!("Line 1 header is empty: {}", blob_name)));
    }

    let columns = split_fields(header);
    if columns.len() != EXPECTED_HEADER.len() {
        return Err(invalid(format!(
            "Line 1 header with an invalid number of columns ({}): {}",
            columns.len(),
            blob_name
        )));
    }

    for (position, (expected, received)) in EXPECTED_HEADER.iter().zip(&columns).enumerate() {
        if !expected.eq_ignore_ascii_case(received) {
            return Err(invalid(format!(
                "Line 1 invalid header in column {}: expected value = {} received value = {} ({})",
                position + 1,
                expected,
                received,
                blob_name
            )));
        }
    }

    Ok(())
}

fn validate_row(line: &str, line_number: usize, blob_name: &str) -> Result<(), IngestError> {
    let fields = split_fields(line);
    if fields.len() != EXPECTED_HEADER.len() {
        return Err(invalid(format!(
            "Line {} with invalid columns ({}): {}",
            line_number,
            fields.len(),
            blob_name
        )));
    }

    let (cnpj, medicine_name, quantity, reference_date) =
        (fields[0], fields[1], fields[2], fields[3]);

    if cnpj.is_empty() {
        return Err(invalid(format!("Line {} cnpj is empty: {}", line_number, blob_name)));
    }

    if medicine_name.is_empty() {
        return Err(invalid(format!(
            "Line {} medicine_name is empty: {}",
            line_number, blob_name
        )));
    }

    match quantity.parse::<i32>() {
        Ok(q) if q < 0 => {
            return Err(invalid(format!(
                "Line {} quantity < 0: {} ({})",
                line_number, quantity, blob_name
            )))
        }
        Ok(_) => {}
        Err(_) => {
            return Err(invalid(format!(
                "Line {} quantity invalid: {} ({})",
                line_number, quantity, blob_name
            )))
        }
    }

    if parse_iso_date(reference_date).is_none() {
        return Err(invalid(format!(
            "Line {} reference_date invalid (yyyy-MM-dd): {} ({})",
            line_number, reference_date, blob_name
        )));
    }

    Ok(())
}

fn invalid(message: String) -> IngestError {
    IngestError::Validation(message)
}
