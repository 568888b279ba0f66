//! Shared query-string helpers for API handlers.
//!
//! Handlers take the raw query as ordered pairs (`Query<Vec<(String, String)>>`)
//! so repeated and bracketed keys survive, then normalize it with
//! `ListQuery::from_pairs` / `ShowQuery::from_pairs`.

use backoffice_core::export::ExportFormat;
use backoffice_core::types::DbId;

use crate::error::{AppError, AppResult};

/// Decoded query-string pairs in request order.
pub type Pairs = Vec<(String, String)>;

/// Last value of `key`, trimmed; empty values count as absent.
pub fn param<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .rev()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.trim())
        .filter(|v| !v.is_empty())
}

/// `format=csv|xlsx|json`, CSV when absent.
pub fn export_format(pairs: &[(String, String)]) -> AppResult<ExportFormat> {
    match param(pairs, "format") {
        None => Ok(ExportFormat::Csv),
        Some(raw) => ExportFormat::parse(raw)
            .ok_or_else(|| AppError::BadRequest(format!("Unsupported export format: {raw}"))),
    }
}

/// `ids=3,1,2` or `ids[]=3&ids[]=1`; `None` when the request names no ids.
pub fn id_list(pairs: &[(String, String)]) -> AppResult<Option<Vec<DbId>>> {
    let mut ids = Vec::new();
    let mut present = false;
    for (key, value) in pairs {
        if key != "ids" && key != "ids[]" {
            continue;
        }
        present = true;
        for raw in value.split(',').map(str::trim).filter(|v| !v.is_empty()) {
            let id = raw
                .parse()
                .map_err(|_| AppError::BadRequest(format!("Invalid id: {raw}")))?;
            ids.push(id);
        }
    }
    Ok(present.then_some(ids))
}
