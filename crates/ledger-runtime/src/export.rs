//! CSV export of ledger entries.
//!
//! Fields containing a comma, a double quote, CR, or LF are wrapped in double
//! quotes with embedded quotes doubled (RFC 4180).  Rows end in CRLF.

use std::{borrow::Cow, io::Write};

use ledger_contracts::{LedgerEntry, LedgerResult};
use ledger_core::canonical_timestamp;

pub const CSV_HEADER: [&str; 7] = [
    "id",
    "action",
    "performedBy",
    "details",
    "origin",
    "sequenceHash",
    "occurredAt",
];

/// Write a header row and one row per entry.  Returns the number of entry
/// rows.
pub fn write_csv<W: Write>(entries: &[LedgerEntry], mut out: W) -> LedgerResult<usize> {
    write_row(&mut out, CSV_HEADER.iter().copied())?;

    for entry in entries {
        let id = entry.id.to_string();
        let occurred_at = canonical_timestamp(&entry.occurred_at);
        write_row(
            &mut out,
            [
                id.as_str(),
                &entry.action,
                &entry.performed_by,
                entry.details.as_deref().unwrap_or(""),
                entry.origin.as_deref().unwrap_or(""),
                &entry.sequence_hash,
                &occurred_at,
            ],
        )?;
    }

    out.flush()?;
    Ok(entries.len())
}

fn write_row<'a, W: Write>(out: &mut W, fields: impl IntoIterator<Item = &'a str>) -> LedgerResult<()> {
    let line = fields
        .into_iter()
        .map(quote_field)
        .collect::<Vec<_>>()
        .join(",");
    out.write_all(line.as_bytes())?;
    out.write_all(b"\r\n")?;
    Ok(())
}

/// Quote `field` if it needs it.
pub fn quote_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\r', '\n']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}
