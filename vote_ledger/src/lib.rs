pub mod builder;
mod config;
pub mod manual;
pub mod quick_start;
mod store;

use log::{debug, info, warn};

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use snafu::prelude::*;

pub use crate::config::*;
pub use crate::store::{MemoryStore, SqliteStore, VoteStore};

/// The ledger of all the votes of a round.
///
/// It holds at most one record per (household, topic): a new vote for the
/// same pair replaces the previous one. Roster and topics are reference data
/// owned by the caller and only read when computing a tally.
#[derive(Debug)]
pub struct VoteLedger<S: VoteStore = MemoryStore> {
    store: S,
}

impl VoteLedger<MemoryStore> {
    pub fn in_memory() -> VoteLedger<MemoryStore> {
        VoteLedger::new(MemoryStore::new())
    }
}

impl<S: VoteStore> VoteLedger<S> {
    pub fn new(store: S) -> VoteLedger<S> {
        VoteLedger { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Records the choice of a household on a topic, replacing any earlier
    /// choice for the same pair. Recording the same choice again is a no-op
    /// apart from the timestamp.
    ///
    /// Ids are trimmed, like the roster and topic ids. The timestamp defaults
    /// to the current time.
    pub fn record_vote(
        &self,
        household_id: &str,
        topic_id: &str,
        choice: Choice,
        timestamp: Option<DateTime<Utc>>,
    ) -> LedgerResult<()> {
        let household_id = household_id.trim();
        let topic_id = topic_id.trim();
        ensure!(!household_id.is_empty(), EmptyHouseholdSnafu {});
        ensure!(!topic_id.is_empty(), EmptyTopicSnafu {});
        let record = VoteRecord {
            household_id: household_id.to_string(),
            topic_id: topic_id.to_string(),
            choice,
            recorded_at: timestamp.unwrap_or_else(Utc::now),
        };
        debug!("record_vote: {:?}", record);
        self.store.upsert(&[record])
    }

    /// Records a whole ballot at once.
    ///
    /// The ballot is validated before anything is written, and the store
    /// applies it as a single batch: either every choice is recorded or none
    /// is. Returns the number of records written.
    pub fn record_ballot(
        &self,
        household_id: &str,
        choices: &[(String, Choice)],
        timestamp: Option<DateTime<Utc>>,
    ) -> LedgerResult<usize> {
        let household_id = household_id.trim();
        ensure!(!household_id.is_empty(), EmptyHouseholdSnafu {});
        ensure!(!choices.is_empty(), EmptyBallotSnafu { household_id });

        let recorded_at = timestamp.unwrap_or_else(Utc::now);
        let mut seen: HashSet<&str> = HashSet::new();
        let mut records: Vec<VoteRecord> = Vec::new();
        for (topic_id, choice) in choices.iter() {
            let topic_id = topic_id.trim();
            ensure!(!topic_id.is_empty(), EmptyTopicSnafu {});
            ensure!(
                seen.insert(topic_id),
                DuplicateBallotTopicSnafu {
                    household_id,
                    topic_id,
                }
            );
            records.push(VoteRecord {
                household_id: household_id.to_string(),
                topic_id: topic_id.to_string(),
                choice: *choice,
                recorded_at,
            });
        }

        self.store.upsert(&records)?;
        info!(
            "record_ballot: household {} recorded {} choices",
            household_id,
            records.len()
        );
        Ok(records.len())
    }

    /// True if the household has voted on at least one topic.
    pub fn has_voted(&self, household_id: &str) -> LedgerResult<bool> {
        Ok(!self.store.household_topics(household_id.trim())?.is_empty())
    }

    pub fn has_voted_on(&self, household_id: &str, topic_id: &str) -> LedgerResult<bool> {
        self.store.contains(household_id.trim(), topic_id.trim())
    }

    /// The topics a household has voted on, sorted.
    pub fn voted_topics(&self, household_id: &str) -> LedgerResult<Vec<String>> {
        self.store.household_topics(household_id.trim())
    }

    /// Computes the tally of every topic, in the order of `topics`.
    ///
    /// Arguments:
    /// * `roster` the eligible households and their shares. Votes of
    /// households that are not on the roster weigh one share.
    /// * `topics` the topics to report on
    pub fn compute_tally(
        &self,
        roster: &Roster,
        topics: &[Topic],
    ) -> LedgerResult<Vec<TallyResult>> {
        info!(
            "compute_tally: {} topics, {} households in roster",
            topics.len(),
            roster.len()
        );
        let mut res: Vec<TallyResult> = Vec::new();
        for topic in topics.iter() {
            let records = self.store.topic_records(topic.label.trim())?;
            let tally = tally_topic(&topic.label, &records, roster);
            debug!("compute_tally: {:?}", tally);
            res.push(tally);
        }
        Ok(res)
    }

    /// Like [`VoteLedger::compute_tally`], but never fails: when the votes
    /// cannot be read, every topic is reported with zero votes and the
    /// report carries the error.
    pub fn tally_report(&self, roster: &Roster, topics: &[Topic]) -> TallyReport {
        match self.compute_tally(roster, topics) {
            Ok(results) => TallyReport {
                results,
                error: None,
            },
            Err(e) => {
                warn!("tally_report: could not compute the tally: {}", e);
                TallyReport {
                    results: topics
                        .iter()
                        .map(|t| TallyResult::empty(&t.label, roster))
                        .collect(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// The roster households, in roster order, that have not voted on the
    /// topic.
    pub fn non_voters(&self, roster: &Roster, topic_id: &str) -> LedgerResult<Vec<String>> {
        let voters: HashSet<String> = self
            .store
            .topic_records(topic_id.trim())?
            .into_iter()
            .map(|r| r.household_id)
            .collect();
        Ok(roster
            .iter()
            .filter(|h| !voters.contains(&h.id))
            .map(|h| h.id.clone())
            .collect())
    }

    /// Every record, sorted by topic then household.
    pub fn records(&self) -> LedgerResult<Vec<VoteRecord>> {
        self.store.records()
    }

    /// Removes every vote, to open a new round. Returns the number of records
    /// removed.
    pub fn reset_ledger(&self) -> LedgerResult<usize> {
        let cleared = self.store.clear()?;
        warn!("reset_ledger: cleared {} vote records", cleared);
        Ok(cleared)
    }
}

/// Aggregates the records of one topic.
///
/// The records are deduplicated per household, keeping the latest one, so
/// the result does not depend on the order of the records.
fn tally_topic(topic: &str, records: &[VoteRecord], roster: &Roster) -> TallyResult {
    let mut latest: HashMap<&str, &VoteRecord> = HashMap::new();
    for r in records.iter() {
        let e = latest.entry(r.household_id.as_str()).or_insert(r);
        if (r.recorded_at, r.choice) > (e.recorded_at, e.choice) {
            *e = r;
        }
    }

    let mut res = TallyResult {
        topic: topic.to_string(),
        agree_count: 0,
        disagree_count: 0,
        agree_share: Share::EMPTY,
        disagree_share: Share::EMPTY,
        not_voted: 0,
        unrostered: 0,
    };
    let mut rostered_voters: u64 = 0;
    for (household_id, r) in latest.iter() {
        let share = roster.share_of(household_id);
        match r.choice {
            Choice::Agree => {
                res.agree_count += 1;
                res.agree_share += share;
            }
            Choice::Disagree => {
                res.disagree_count += 1;
                res.disagree_share += share;
            }
        }
        if roster.contains(household_id) {
            rostered_voters += 1;
        } else {
            res.unrostered += 1;
        }
    }
    res.not_voted = (roster.len() as u64).saturating_sub(rostered_voters);
    res
}
