// Primitives for reading CSV files.

use crate::smartvote::{io_common::Table, *};

const BOM: char = '\u{feff}';

/// Reads a CSV file with a header row. Rows may be shorter or longer than the
/// header, and a leading byte order mark is ignored.
pub fn read_csv_table(path: &str) -> BSvResult<Table> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let mut records = rdr.into_records();

    let header: Vec<String> = match records.next() {
        Some(line_r) => line_r
            .context(CsvLineParseSnafu { path, lineno: 1_usize })?
            .iter()
            .enumerate()
            .map(|(i, s)| {
                if i == 0 {
                    s.trim_start_matches(BOM).to_string()
                } else {
                    s.to_string()
                }
            })
            .collect(),
        None => {
            return EmptyFileSnafu { path }.fail().map_err(Box::new);
        }
    };

    let mut rows: Vec<(usize, Vec<String>)> = Vec::new();
    for (idx, line_r) in records.enumerate() {
        let line = line_r.context(CsvLineParseSnafu {
            path,
            lineno: idx + 2,
        })?;
        let lineno = line
            .position()
            .map(|pos| pos.line() as usize)
            .unwrap_or(idx + 2);
        debug!("read_csv_table: lineno: {:?} row: {:?}", lineno, line);
        rows.push((lineno, line.iter().map(|s| s.to_string()).collect()));
    }

    Ok(Table {
        path: path.to_string(),
        header,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("units.csv");
        fs::write(&p, "\u{feff}戶號,持分\n101,0.5\n102\n\n103,0.25,extra\n").unwrap();
        let t = read_csv_table(p.to_str().unwrap()).unwrap();
        assert_eq!(t.header, vec!["戶號", "持分"]);
        assert_eq!(t.column_index("戶號").unwrap(), 0);
        let linenos: Vec<usize> = t.rows.iter().map(|(l, _)| *l).collect();
        // Blank lines are skipped but still counted.
        assert_eq!(linenos, vec![2, 3, 5]);
        assert_eq!(t.rows[1].1, vec!["102"]);
        assert_eq!(t.rows[2].1.len(), 3);
    }

    #[test]
    fn empty_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("empty.csv");
        fs::write(&p, "").unwrap();
        assert!(matches!(
            *read_csv_table(p.to_str().unwrap()).unwrap_err(),
            SmartVoteError::EmptyFile { .. }
        ));
        let missing = dir.path().join("missing.csv");
        assert!(matches!(
            *read_csv_table(missing.to_str().unwrap()).unwrap_err(),
            SmartVoteError::CsvOpen { .. }
        ));
    }
}
