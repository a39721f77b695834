// Primitives for reading Excel files.

use calamine::{open_workbook, DataType, Reader, Xlsx};

use crate::smartvote::{io_common::Table, *};

/// Reads one worksheet of an Excel file: the first row is the header.
///
/// The worksheet is the one named by `excelWorksheetName`, or the only one of
/// the workbook.
pub fn read_excel_table(path: &str, cfs: &FileSource) -> BSvResult<Table> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let worksheet_name = match &cfs.excel_worksheet_name {
        Some(name) => name.clone(),
        None => {
            let names = workbook.sheet_names().to_vec();
            ensure!(names.len() <= 1, AmbiguousWorksheetSnafu { path });
            names
                .into_iter()
                .next()
                .context(EmptyFileSnafu { path })?
        }
    };
    let wrange = workbook
        .worksheet_range(&worksheet_name)
        .context(MissingWorksheetSnafu {
            path,
            worksheet: worksheet_name.clone(),
        })?
        .context(OpeningExcelSnafu { path })?;

    // Rows before the first used cell are not part of the range.
    let first_row = wrange.start().map(|(r, _)| r as usize).unwrap_or(0);
    let mut iter = wrange.rows();
    let header_row = iter.next().context(EmptyFileSnafu { path })?;
    let header_lineno = first_row + 1;
    let header = read_row(path, header_lineno, header_row)?;
    debug!("read_excel_table: header: {:?}", header);

    let mut rows: Vec<(usize, Vec<String>)> = Vec::new();
    for (idx, row) in iter.enumerate() {
        let lineno = header_lineno + idx + 1;
        let cells = read_row(path, lineno, row)?;
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        debug!("read_excel_table: lineno: {:?} row: {:?}", lineno, cells);
        rows.push((lineno, cells));
    }

    Ok(Table {
        path: path.to_string(),
        header,
        rows,
    })
}

fn read_row(path: &str, lineno: usize, row: &[DataType]) -> BSvResult<Vec<String>> {
    let mut res: Vec<String> = Vec::new();
    for cell in row.iter() {
        res.push(cell_to_string(path, lineno, cell)?);
    }
    Ok(res)
}

/// Household codes are often typed as numbers in spreadsheets: integral
/// floats are rendered without a fractional part.
fn cell_to_string(path: &str, lineno: usize, cell: &DataType) -> BSvResult<String> {
    match cell {
        DataType::String(s) => Ok(s.clone()),
        DataType::Empty => Ok("".to_string()),
        DataType::Int(i) => Ok(i.to_string()),
        DataType::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Ok(format!("{}", *f as i64)),
        DataType::Float(f) => Ok(f.to_string()),
        DataType::Bool(b) => Ok(b.to_string()),
        _ => WrongCellTypeSnafu {
            path,
            lineno,
            content: format!("{:?}", cell),
        }
        .fail()
        .map_err(Box::new),
    }
}
