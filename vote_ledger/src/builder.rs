use std::collections::{HashMap, HashSet};

use log::debug;
use snafu::prelude::*;

pub use crate::config::*;

/// A builder for the roster of a voting round.
///
/// Households keep the order in which they are added. A share that is not
/// given defaults to 1.
///
/// ```
/// use vote_ledger::builder::RosterBuilder;
/// # use vote_ledger::LedgerError;
///
/// let mut builder = RosterBuilder::new();
/// builder.add_household("A-1", Some(0.5))?;
/// builder.add_household("A-2", None)?;
/// let roster = builder.build();
///
/// assert_eq!(roster.len(), 2);
/// assert_eq!(roster.total_share().as_f64(), 1.5);
/// # Ok::<(), LedgerError>(())
/// ```
#[derive(Debug, Default)]
pub struct RosterBuilder {
    households: Vec<Household>,
    index: HashMap<String, usize>,
}

impl RosterBuilder {
    pub fn new() -> RosterBuilder {
        RosterBuilder::default()
    }

    /// Adds a household. Empty ids, repeated ids and shares that are not
    /// strictly positive are rejected.
    pub fn add_household(&mut self, id: &str, share: Option<f64>) -> LedgerResult<()> {
        let id = id.trim();
        ensure!(!id.is_empty(), EmptyHouseholdSnafu {});
        ensure!(
            !self.index.contains_key(id),
            DuplicateHouseholdSnafu { household_id: id }
        );
        let share = match share {
            None => Share::ONE,
            Some(x) => Share::from_f64(x).context(InvalidShareSnafu {
                household_id: id,
                share: x,
            })?,
        };
        debug!("add_household: {} share {}", id, share);
        self.index.insert(id.to_string(), self.households.len());
        self.households.push(Household {
            id: id.to_string(),
            share,
        });
        Ok(())
    }

    pub fn build(self) -> Roster {
        Roster {
            households: self.households,
            index: self.index,
        }
    }
}

/// Validates an ordered list of topic labels. Labels are trimmed; empty or
/// repeated labels are rejected.
pub fn topic_list<S: AsRef<str>>(labels: &[S]) -> LedgerResult<Vec<Topic>> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut res: Vec<Topic> = Vec::new();
    for label in labels.iter() {
        let label = label.as_ref().trim();
        ensure!(!label.is_empty(), EmptyTopicSnafu {});
        ensure!(seen.insert(label), DuplicateTopicSnafu { topic_id: label });
        res.push(Topic::new(label));
    }
    Ok(res)
}
