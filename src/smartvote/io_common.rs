use std::path::Path;

use crate::smartvote::*;

/// A sheet read from a CSV or Excel file: a header row and the data rows,
/// each tagged with its line number in the file (starting at 1).
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Table {
    pub path: String,
    pub header: Vec<String>,
    pub rows: Vec<(usize, Vec<String>)>,
}

impl Table {
    /// The index of a required column.
    pub fn column_index(&self, column: &str) -> BSvResult<usize> {
        let idx = self
            .header
            .iter()
            .position(|h| h.trim() == column)
            .context(MissingColumnSnafu {
                path: self.path.clone(),
                column,
            })?;
        Ok(idx)
    }
}

/// The cell of a row, empty when the row is shorter than the header.
pub fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(|s| s.trim()).unwrap_or("")
}

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

pub fn read_table(path: &Path, cfs: &FileSource) -> BSvResult<Table> {
    let p = path.display().to_string();
    info!(
        "read_table: reading {} ({})",
        simplify_file_name(&p),
        cfs.provider
    );
    let table = match cfs.provider.as_str() {
        "csv" => io_csv::read_csv_table(&p)?,
        "xlsx" => io_excel::read_excel_table(&p, cfs)?,
        x => {
            return UnknownProviderSnafu {
                provider: x,
                path: p,
            }
            .fail()
            .map_err(Box::new);
        }
    };
    debug!(
        "read_table: {} columns, {} rows in {}",
        table.header.len(),
        table.rows.len(),
        p
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        Table {
            path: "units.csv".to_string(),
            header: vec!["戶號".to_string(), " 持分 ".to_string()],
            rows: vec![(2, vec!["101".to_string()])],
        }
    }

    #[test]
    fn columns() {
        let t = table();
        assert_eq!(t.column_index("戶號").unwrap(), 0);
        assert_eq!(t.column_index("持分").unwrap(), 1);
        match *t.column_index("議題").unwrap_err() {
            SmartVoteError::MissingColumn { column, .. } => assert_eq!(column, "議題"),
            e => panic!("unexpected error {:?}", e),
        }
        assert_eq!(cell(&t.rows[0].1, 1), "");
    }

    #[test]
    fn file_names() {
        assert_eq!(simplify_file_name("/data/round/units.csv"), "units.csv");
        assert_eq!(simplify_file_name("units.csv"), "units.csv");
    }

    #[test]
    fn unknown_provider() {
        let cfs = FileSource {
            provider: "ods".to_string(),
            file_path: "units.ods".to_string(),
            id_column: "戶號".to_string(),
            share_column: None,
            label_column: "議題".to_string(),
            excel_worksheet_name: None,
        };
        assert!(matches!(
            *read_table(Path::new("units.ods"), &cfs).unwrap_err(),
            SmartVoteError::UnknownProvider { .. }
        ));
    }
}
