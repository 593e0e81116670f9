//! CSV export of scan tables (RFC 4180)
//!
//! Every field is quoted and embedded quotes are doubled, so target
//! addresses containing commas, quotes or line breaks survive a round trip
//! through any conforming reader.

use crate::aggregate::TableRow;
use crate::error::Result;
use std::io::Write;
use std::path::Path;
use tracing::info;

pub const HEADER: &str = "URL,Timestamp,Violations,Passes,Inapplicable,Incomplete";

/// Quotes a field, doubling embedded quote characters
fn escape_csv(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

fn write_row(out: &mut String, row: &TableRow) {
    let fields = [
        escape_csv(&row.target),
        escape_csv(&row.timestamp.to_rfc3339()),
        escape_csv(&row.violation_count.to_string()),
        escape_csv(&row.pass_count.to_string()),
        escape_csv(&row.inapplicable_count.to_string()),
        escape_csv(&row.incomplete_count.to_string()),
    ];
    out.push_str(&fields.join(","));
    out.push('\n');
}

/// Renders rows as CSV text, header first
pub fn render(rows: &[TableRow]) -> String {
    let mut out = String::with_capacity(HEADER.len() + 1 + rows.len() * 96);
    out.push_str(HEADER);
    out.push('\n');
    for row in rows {
        write_row(&mut out, row);
    }
    out
}

/// Exports rows as a CSV file
pub fn export(rows: &[TableRow], output_path: &Path) -> Result<()> {
    let file = std::fs::File::create(output_path)?;
    let mut writer = std::io::BufWriter::new(file);
    writer.write_all(render(rows).as_bytes())?;
    writer.flush()?;
    info!("CSV report saved to {}", output_path.display());
    Ok(())
}
