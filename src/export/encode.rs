use super::{ExportColumn, ExportError};
use crate::record::{Record, display_value};

pub const CSV_MIME: &str = "text/csv;charset=utf-8";
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Encode `rows` as CSV: a header of column titles, then one line per row.
///
/// Fields are quoted only when they contain a comma, a quote or a line
/// break. Missing fields become empty cells. A line made of one empty cell is
/// written as `""` so readers that skip blank lines still count the row.
pub fn build_csv<T: Record>(
    rows: &[T],
    columns: &[ExportColumn],
    bom: bool,
) -> Result<Vec<u8>, ExportError> {
    if columns.is_empty() {
        return Err(ExportError::NoColumns);
    }
    let mut out = Vec::new();
    if bom {
        out.extend_from_slice(UTF8_BOM);
    }
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(out);

    writer
        .write_record(columns.iter().map(|column| column.title.as_str()))
        .map_err(encode_error)?;
    for row in rows {
        writer
            .write_record(columns.iter().map(|column| {
                row.field(&column.key)
                    .map(display_value)
                    .unwrap_or_default()
            }))
            .map_err(encode_error)?;
    }
    writer
        .into_inner()
        .map_err(|err| ExportError::Encode(err.to_string()))
}

fn encode_error(err: csv::Error) -> ExportError {
    ExportError::Encode(err.to_string())
}
