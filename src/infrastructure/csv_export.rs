// CSV export of the combined table
use crate::domain::table::CombinedTable;

pub const TIMESTAMP_COLUMN: &str = "timestamp";

/// Serialize the table as UTF-8 CSV with a header row. Missing cells are
/// written as empty fields; timestamps are RFC 3339 in display time.
pub fn combined_table_to_csv(table: &CombinedTable) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = Vec::with_capacity(table.columns().len() + 1);
    header.push(TIMESTAMP_COLUMN);
    header.extend(table.columns().iter().map(String::as_str));
    writer.write_record(&header)?;

    for row in table.rows() {
        let mut record = Vec::with_capacity(row.cells.len() + 1);
        record.push(row.timestamp.to_rfc3339());
        record.extend(
            row.cells
                .iter()
                .map(|cell| cell.map(|v| v.to_string()).unwrap_or_default()),
        );
        writer.write_record(&record)?;
    }

    writer.into_inner().map_err(|e| e.into_error().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::table::CombinedTableBuilder;
    use chrono::DateTime;

    #[test]
    fn test_csv_has_header_and_empty_missing_cells() {
        let t1 = DateTime::parse_from_rfc3339("2024-07-01T10:00:00+05:30").unwrap();
        let t2 = DateTime::parse_from_rfc3339("2024-07-01T10:05:00+05:30").unwrap();

        let mut builder = CombinedTableBuilder::new();
        builder.add_column("level", vec![(t1, 84.5)]);
        builder.add_column("rain", vec![(t2, 0.25)]);
        let csv = String::from_utf8(combined_table_to_csv(&builder.build()).unwrap()).unwrap();

        assert_eq!(
            csv,
            "timestamp,level,rain\n\
             2024-07-01T10:00:00+05:30,84.5,\n\
             2024-07-01T10:05:00+05:30,,0.25\n"
        );
    }

    #[test]
    fn test_column_names_are_quoted_when_needed() {
        let mut builder = CombinedTableBuilder::new();
        builder.add_column("flow, m3/s", Vec::new());
        let csv = String::from_utf8(combined_table_to_csv(&builder.build()).unwrap()).unwrap();
        assert_eq!(csv, "timestamp,\"flow, m3/s\"\n");
    }

    #[test]
    fn test_empty_table_is_header_only() {
        let csv = combined_table_to_csv(&CombinedTable::default()).unwrap();
        assert_eq!(String::from_utf8(csv).unwrap(), "timestamp\n");
    }
}
