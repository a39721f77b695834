// ********* Input data structures ***********

use std::collections::HashMap;
use std::fmt::Display;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use snafu::Snafu;

/// The answer a household gives on one topic.
///
/// Abstaining is not a choice: it is the absence of a vote record.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum Choice {
    Agree,
    Disagree,
}

impl Choice {
    /// The canonical spelling, as written to storage and exports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Choice::Agree => "agree",
            Choice::Disagree => "disagree",
        }
    }
}

impl Display for Choice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Choice {
    type Err = LedgerError;

    /// Accepts the canonical spellings plus the labels printed on the paper
    /// ballots (同意 / 不同意).
    fn from_str(s: &str) -> Result<Choice, LedgerError> {
        match s.trim().to_lowercase().as_str() {
            "agree" | "yes" | "同意" => Ok(Choice::Agree),
            "disagree" | "no" | "不同意" => Ok(Choice::Disagree),
            _ => InvalidChoiceSnafu { value: s }.fail(),
        }
    }
}

/// Number of fixed-point units in one ownership share.
pub const SHARE_SCALE: u64 = 1_000_000;

/// An ownership share, held in millionths so that sums do not depend on the
/// order in which votes are read back.
#[derive(Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord, Hash, Default)]
pub struct Share(u64);

impl Share {
    pub const EMPTY: Share = Share(0);
    pub const ONE: Share = Share(SHARE_SCALE);

    /// Converts a real-valued share. Returns None for values that are not
    /// finite or not positive. A positive share below one millionth counts
    /// as one millionth, and very large values saturate.
    pub fn from_f64(value: f64) -> Option<Share> {
        if !value.is_finite() || value <= 0.0 {
            return None;
        }
        let units = (value * SHARE_SCALE as f64).round().max(1.0);
        // The cast saturates at u64::MAX.
        Some(Share(units as u64))
    }

    pub fn from_units(units: u64) -> Share {
        Share(units)
    }

    pub fn units(self) -> u64 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / SHARE_SCALE as f64
    }
}

impl Sum for Share {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Share(iter.fold(0, |acc, s| acc.saturating_add(s.0)))
    }
}

impl AddAssign for Share {
    fn add_assign(&mut self, rhs: Share) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Add for Share {
    type Output = Share;
    fn add(self: Share, rhs: Share) -> Share {
        Share(self.0.saturating_add(rhs.0))
    }
}

impl Display for Share {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_f64())
    }
}

/// One voting unit of the roster.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Household {
    pub id: String,
    pub share: Share,
}

/// The eligible households of a voting round, in upload order.
///
/// Built with [`crate::builder::RosterBuilder`], which rejects duplicates.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Roster {
    pub(crate) households: Vec<Household>,
    pub(crate) index: HashMap<String, usize>,
}

impl Roster {
    pub fn len(&self) -> usize {
        self.households.len()
    }

    pub fn is_empty(&self) -> bool {
        self.households.is_empty()
    }

    pub fn contains(&self, household_id: &str) -> bool {
        self.index.contains_key(household_id)
    }

    /// The ownership share of a household. Households missing from the
    /// roster (for example removed since they voted) weigh one full share.
    pub fn share_of(&self, household_id: &str) -> Share {
        self.index
            .get(household_id)
            .map(|idx| self.households[*idx].share)
            .unwrap_or(Share::ONE)
    }

    pub fn total_share(&self) -> Share {
        self.households.iter().map(|h| h.share).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Household> {
        self.households.iter()
    }
}

/// A question put to every household. The label doubles as the topic id.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Topic {
    pub label: String,
}

impl Topic {
    pub fn new(label: &str) -> Topic {
        Topic {
            label: label.to_string(),
        }
    }
}

/// The single stored fact for a (household, topic) pair.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct VoteRecord {
    pub household_id: String,
    pub topic_id: String,
    pub choice: Choice,
    pub recorded_at: DateTime<Utc>,
}

// ******** Output data structures *********

/// Statistics for one topic.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TallyResult {
    pub topic: String,
    pub agree_count: u64,
    pub disagree_count: u64,
    pub agree_share: Share,
    pub disagree_share: Share,
    /// Roster households without a vote on this topic.
    pub not_voted: u64,
    /// Households that voted on this topic but are not on the roster.
    pub unrostered: u64,
}

impl TallyResult {
    /// An empty tally, used when nothing could be read for the topic.
    pub fn empty(topic: &str, roster: &Roster) -> TallyResult {
        TallyResult {
            topic: topic.to_string(),
            agree_count: 0,
            disagree_count: 0,
            agree_share: Share::EMPTY,
            disagree_share: Share::EMPTY,
            not_voted: roster.len() as u64,
            unrostered: 0,
        }
    }

    pub fn participated(&self) -> u64 {
        self.agree_count + self.disagree_count
    }

    pub fn total_share(&self) -> Share {
        self.agree_share + self.disagree_share
    }

    pub fn agree_share_percent(&self, rules: &TallyRules) -> f64 {
        rules.share_percent(self.agree_share, self.total_share())
    }

    pub fn disagree_share_percent(&self, rules: &TallyRules) -> f64 {
        rules.share_percent(self.disagree_share, self.total_share())
    }

    pub fn agree_count_percent(&self, rules: &TallyRules) -> f64 {
        rules.count_percent(self.agree_count, self.participated())
    }

    pub fn disagree_count_percent(&self, rules: &TallyRules) -> f64 {
        rules.count_percent(self.disagree_count, self.participated())
    }
}

/// A tally that always renders: if the votes could not be read, the results
/// are zeroed and `error` says why.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TallyReport {
    pub results: Vec<TallyResult>,
    pub error: Option<String>,
}

impl TallyReport {
    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

/// Errors that prevent a ledger operation from completing.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum LedgerError {
    #[snafu(display("household id may not be empty"))]
    EmptyHousehold {},
    #[snafu(display("topic id may not be empty"))]
    EmptyTopic {},
    #[snafu(display("unrecognized choice {value:?}: expected agree or disagree"))]
    InvalidChoice { value: String },
    #[snafu(display("ballot for household {household_id} is empty"))]
    EmptyBallot { household_id: String },
    #[snafu(display("ballot for household {household_id} names topic {topic_id} twice"))]
    DuplicateBallotTopic {
        household_id: String,
        topic_id: String,
    },
    #[snafu(display("invalid ownership share {share} for household {household_id}"))]
    InvalidShare { household_id: String, share: f64 },
    #[snafu(display("household {household_id} appears twice in the roster"))]
    DuplicateHousehold { household_id: String },
    #[snafu(display("topic {topic_id:?} appears twice in the topic list"))]
    DuplicateTopic { topic_id: String },

    #[snafu(display("vote storage failure: {source}"))]
    Storage { source: rusqlite::Error },
    #[snafu(display("vote storage lock was poisoned"))]
    StorageLock {},
    #[snafu(display(
        "stored vote of household {household_id} on topic {topic_id} is unreadable: {detail}"
    ))]
    CorruptRecord {
        household_id: String,
        topic_id: String,
        detail: String,
    },
}

impl LedgerError {
    /// True for malformed input, which is always rejected before any write.
    pub fn is_validation(&self) -> bool {
        !matches!(
            self,
            LedgerError::Storage { .. }
                | LedgerError::StorageLock {}
                | LedgerError::CorruptRecord { .. }
        )
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

// ********* Configuration **********

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum RoundingMode {
    /// Ties are rounded away from zero (12.345 -> 12.35).
    HalfUp,
    /// Ties are rounded to the even neighbour (12.345 -> 12.34).
    HalfEven,
}

/// Upper bound on decimal places, so that scaled ratios fit in 128 bits.
pub const MAX_DECIMAL_PLACES: u32 = 9;

/// How percentages of a report are rounded. The same rules apply to every
/// figure so that exported tallies are reproducible.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TallyRules {
    pub rounding: RoundingMode,
    pub share_decimal_places: u32,
    pub count_decimal_places: u32,
}

impl TallyRules {
    pub const DEFAULT_RULES: TallyRules = TallyRules {
        rounding: RoundingMode::HalfUp,
        share_decimal_places: 4,
        count_decimal_places: 1,
    };

    pub fn share_percent(&self, part: Share, total: Share) -> f64 {
        rounded_percent(
            part.units(),
            total.units(),
            self.share_decimal_places,
            self.rounding,
        )
    }

    pub fn count_percent(&self, part: u64, total: u64) -> f64 {
        rounded_percent(part, total, self.count_decimal_places, self.rounding)
    }
}

impl Default for TallyRules {
    fn default() -> Self {
        TallyRules::DEFAULT_RULES
    }
}

/// part / total * 100, rounded in integer arithmetic. A zero total gives 0.
fn rounded_percent(part: u64, total: u64, decimal_places: u32, mode: RoundingMode) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let scale = 10u128.pow(decimal_places.min(MAX_DECIMAL_PLACES));
    let numerator = part as u128 * 100 * scale;
    let denominator = total as u128;
    let quotient = numerator / denominator;
    let twice_remainder = 2 * (numerator % denominator);
    let round_up = match mode {
        RoundingMode::HalfUp => twice_remainder >= denominator,
        RoundingMode::HalfEven => {
            twice_remainder > denominator || (twice_remainder == denominator && quotient % 2 == 1)
        }
    };
    let rounded = if round_up { quotient + 1 } else { quotient };
    rounded as f64 / scale as f64
}
