//! Medication code resolution
//!
//! Unlike structural validation this stage accumulates: every distinct
//! product name is looked up and all unknown names are reported together,
//! so one resubmission can fix them all.

use std::collections::{HashMap, HashSet};

use crate::db::medications::MedicationCatalog;
use crate::error::IngestError;
use crate::models::{EnrichedStockRow, RawStockRow};

/// Distinct trimmed product names, in first-seen order
pub fn distinct_names(rows: &[RawStockRow]) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.iter()
        .map(|row| row.product_name.trim().to_string())
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Attach canonical codes to every row
///
/// Lookup failures (database errors) abort immediately; unknown names are
/// collected and returned as a single `Resolution` error.
pub async fn resolve_codes(
    catalog: &dyn MedicationCatalog,
    rows: Vec<RawStockRow>,
) -> Result<Vec<EnrichedStockRow>, IngestError> {
    let names = distinct_names(&rows);

    let mut lookups = Vec::with_capacity(names.len());
    for name in names {
        let code = catalog.find_code_by_name(&name).await?;
        lookups.push((name, code));
    }

    let (found, missing): (Vec<_>, Vec<_>) =
        lookups.into_iter().partition(|(_, code)| code.is_some());

    if !missing.is_empty() {
        return Err(IngestError::Resolution {
            missing: missing.into_iter().map(|(name, _)| name).collect(),
        });
    }

    let code_by_name: HashMap<String, String> = found
        .into_iter()
        .filter_map(|(name, code)| code.map(|c| (name, c)))
        .collect();

    rows.into_iter()
        .map(|row| {
            let name = row.product_name.trim().to_string();
            match code_by_name.get(&name) {
                Some(code) => Ok(EnrichedStockRow::from_raw(row, code.clone())),
                None => Err(IngestError::Resolution {
                    missing: vec![name],
                }),
            }
        })
        .collect()
}
