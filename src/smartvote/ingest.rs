// Turns tables into the roster and the topic list.

use vote_ledger::builder::{topic_list, RosterBuilder};

use crate::smartvote::{
    io_common::{cell, Table},
    *,
};

/// Builds the roster from a table with a household column and an optional
/// share column. Rows without a household code are skipped. A blank share
/// counts as one share.
pub fn roster_from_table(table: &Table, cfs: &FileSource) -> BSvResult<Roster> {
    let id_idx = table.column_index(&cfs.id_column)?;
    let share_idx = match &cfs.share_column {
        Some(c) => Some(table.column_index(c)?),
        None => None,
    };

    let mut builder = RosterBuilder::new();
    let mut skipped: usize = 0;
    for (lineno, row) in table.rows.iter() {
        let id = cell(row, id_idx);
        if id.is_empty() {
            warn!(
                "roster_from_table: {}:{}: no household code, skipping row",
                table.path, lineno
            );
            skipped += 1;
            continue;
        }
        let share: Option<f64> = match share_idx.map(|idx| cell(row, idx)) {
            None | Some("") => None,
            Some(s) => Some(s.parse::<f64>().ok().context(ParsingShareSnafu {
                path: table.path.clone(),
                lineno: *lineno,
                value: s,
            })?),
        };
        builder
            .add_household(id, share)
            .context(InvalidRowSnafu {
                path: table.path.clone(),
                lineno: *lineno,
            })?;
    }
    let roster = builder.build();
    info!(
        "roster_from_table: {} households, total share {}, {} rows skipped",
        roster.len(),
        roster.total_share(),
        skipped
    );
    Ok(roster)
}

/// Builds the topic list, in file order. Blank rows are skipped.
pub fn topics_from_table(table: &Table, cfs: &FileSource) -> BSvResult<Vec<Topic>> {
    let label_idx = table.column_index(&cfs.label_column)?;
    let labels: Vec<&str> = table
        .rows
        .iter()
        .map(|(_, row)| cell(row, label_idx))
        .filter(|s| !s.is_empty())
        .collect();
    let topics = topic_list(&labels).context(InvalidTopicsSnafu {
        path: table.path.clone(),
    })?;
    info!("topics_from_table: {} topics", topics.len());
    Ok(topics)
}
