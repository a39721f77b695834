use log::{debug, info, warn};

use vote_ledger::*;

use snafu::{prelude::*, Snafu};

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::args::{Args, Command};
use crate::smartvote::config_reader::*;

pub mod config_reader;
pub mod gate;
pub mod ingest;
pub mod io_common;
pub mod io_csv;
pub mod io_excel;
pub mod report;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SmartVoteError {
    #[snafu(display("Error opening Excel file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Excel file {path} has no worksheet {worksheet:?}"))]
    MissingWorksheet { path: String, worksheet: String },
    #[snafu(display(
        "Excel file {path} has several worksheets: excelWorksheetName must be provided"
    ))]
    AmbiguousWorksheet { path: String },
    #[snafu(display("File {path} is empty"))]
    EmptyFile { path: String },
    #[snafu(display("Line {lineno} of {path}: could not understand cell {content}"))]
    WrongCellType {
        path: String,
        lineno: usize,
        content: String,
    },
    #[snafu(display("Column {column:?} is missing from the header of {path}"))]
    MissingColumn { path: String, column: String },
    #[snafu(display("Line {lineno} of {path}: invalid ownership share {value:?}"))]
    ParsingShare {
        path: String,
        lineno: usize,
        value: String,
    },
    #[snafu(display("Line {lineno} of {path} was rejected"))]
    InvalidRow {
        source: LedgerError,
        path: String,
        lineno: usize,
    },
    #[snafu(display("The topic list {path} was rejected"))]
    InvalidTopics { source: LedgerError, path: String },
    #[snafu(display("Unknown provider {provider:?} for {path}: expected csv or xlsx"))]
    UnknownProvider { provider: String, path: String },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error reading line {lineno} of {path}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Error writing CSV output"))]
    CsvWrite { source: csv::Error },

    #[snafu(display("Error opening {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error writing {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Missing parent directory for {path}"))]
    MissingParentDir { path: String },
    #[snafu(display("Invalid deadline {value:?}: expected an RFC 3339 timestamp"))]
    ParsingDeadline {
        source: chrono::ParseError,
        value: String,
    },
    #[snafu(display("Unknown rounding mode {value:?}: expected halfUp or halfEven"))]
    UnknownRounding { value: String },
    #[snafu(display("Unknown output format {format:?}: expected json or csv"))]
    UnknownFormat { format: String },

    #[snafu(display("Invalid vote {value:?}: expected TOPIC=CHOICE"))]
    MalformedVote { value: String },
    #[snafu(display("Unknown topic {topic:?}"))]
    UnknownTopic { topic: String },
    #[snafu(display("Voting is paused"))]
    VotingPaused {},
    #[snafu(display("Voting closed at {deadline}"))]
    VotingClosed { deadline: String },
    #[snafu(display(
        "Household {household} has already voted on: {}",
        topics.join(", ")
    ))]
    AlreadyVoted {
        household: String,
        topics: Vec<String>,
    },
    #[snafu(display("Refusing to remove every vote without --yes"))]
    ResetNotConfirmed {},
    #[snafu(display("Difference detected between computed tally and reference tally"))]
    ReferenceMismatch {},

    #[snafu(display("Vote ledger error"))]
    Ledger { source: LedgerError },
}

pub type BSvResult<T> = Result<T, Box<SmartVoteError>>;

/// The configuration of a voting round, with paths resolved against the
/// directory of the configuration file.
pub struct Workspace {
    pub config: SmartVoteConfig,
    pub config_path: PathBuf,
    root: PathBuf,
}

impl Workspace {
    pub fn load(config_path: &str) -> BSvResult<Workspace> {
        let config = read_config(config_path)?;
        info!("config: {:?}", config);
        let root = Path::new(config_path)
            .parent()
            .context(MissingParentDirSnafu { path: config_path })?
            .to_path_buf();
        Ok(Workspace {
            config,
            config_path: PathBuf::from(config_path),
            root,
        })
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    pub fn ledger(&self) -> BSvResult<VoteLedger<SqliteStore>> {
        let p = self.resolve(&self.config.storage.database_path);
        let store = SqliteStore::open(p).context(LedgerSnafu {})?;
        Ok(VoteLedger::new(store))
    }

    pub fn roster(&self) -> BSvResult<Roster> {
        let source = &self.config.roster_source;
        let table = io_common::read_table(&self.resolve(&source.file_path), source)?;
        ingest::roster_from_table(&table, source)
    }

    pub fn topics(&self) -> BSvResult<Vec<Topic>> {
        let source = &self.config.topic_source;
        let table = io_common::read_table(&self.resolve(&source.file_path), source)?;
        ingest::topics_from_table(&table, source)
    }

    pub fn save(&self) -> BSvResult<()> {
        write_config(&self.config_path, &self.config)
    }

    /// The explicit output, or a file of the configured output directory.
    /// `None` means the standard output.
    pub fn output_path(&self, out: Option<&str>, file_name: &str) -> Option<String> {
        match out {
            Some(o) => Some(o.to_string()),
            None => self
                .config
                .output_settings
                .output_directory
                .as_ref()
                .map(|d| self.resolve(d).join(file_name).display().to_string()),
        }
    }
}

/// Parses a `TOPIC=CHOICE` argument. The last `=` separates the choice, so
/// topic labels may contain `=` themselves.
pub fn parse_vote_arg(value: &str) -> BSvResult<(String, Choice)> {
    let (topic, choice_s) = value
        .rsplit_once('=')
        .context(MalformedVoteSnafu { value })?;
    let topic = topic.trim();
    ensure!(!topic.is_empty(), MalformedVoteSnafu { value });
    let choice = choice_s.parse::<Choice>().context(LedgerSnafu {})?;
    Ok((topic.to_string(), choice))
}

/// Checks a ballot against the gate, the topic list and the earlier votes of
/// the household, then records it. Returns the number of recorded choices.
#[allow(clippy::too_many_arguments)]
pub fn submit_ballot<S: VoteStore>(
    ledger: &VoteLedger<S>,
    roster: &Roster,
    topics: &[Topic],
    voting_gate: &VotingGate,
    household: &str,
    ballot: &[(String, Choice)],
    revise: bool,
    now: DateTime<Utc>,
) -> BSvResult<usize> {
    gate::check_gate(voting_gate, now)?;
    let household = household.trim();

    let known: HashSet<&str> = topics.iter().map(|t| t.label.as_str()).collect();
    for (topic, _) in ballot.iter() {
        ensure!(known.contains(topic.as_str()), UnknownTopicSnafu { topic });
    }

    if !revise {
        let mut already: Vec<String> = Vec::new();
        for (topic, _) in ballot.iter() {
            if ledger.has_voted_on(household, topic).context(LedgerSnafu {})? {
                already.push(topic.clone());
            }
        }
        ensure!(
            already.is_empty(),
            AlreadyVotedSnafu {
                household,
                topics: already
            }
        );
    }

    if !roster.contains(household) {
        warn!(
            "submit_ballot: household {:?} is not on the roster, its vote will weigh one share",
            household
        );
    }

    let count = ledger
        .record_ballot(household, ballot, Some(now))
        .context(LedgerSnafu {})?;
    Ok(count)
}

fn run_submit(ws: &Workspace, household: &str, votes: &[String], revise: bool) -> BSvResult<()> {
    let mut ballot: Vec<(String, Choice)> = Vec::new();
    for v in votes.iter() {
        ballot.push(parse_vote_arg(v)?);
    }
    debug!("run_submit: household {} ballot {:?}", household, ballot);
    let roster = ws.roster()?;
    let topics = ws.topics()?;
    let ledger = ws.ledger()?;
    let count = submit_ballot(
        &ledger,
        &roster,
        &topics,
        &ws.config.gate,
        household,
        &ballot,
        revise,
        Utc::now(),
    )?;
    println!("Recorded {} choice(s) for household {}", count, household);
    Ok(())
}

fn run_status(ws: &Workspace, household: &str) -> BSvResult<()> {
    let household = household.trim();
    let topics = ws.topics()?;
    let ledger = ws.ledger()?;
    if !ledger.has_voted(household).context(LedgerSnafu {})? {
        println!("Household {} has not voted yet", household);
        return Ok(());
    }
    let voted: HashSet<String> = ledger
        .voted_topics(household)
        .context(LedgerSnafu {})?
        .into_iter()
        .collect();
    let done = topics.iter().filter(|t| voted.contains(&t.label)).count();
    println!(
        "Household {} has voted on {} of {} topics",
        household,
        done,
        topics.len()
    );
    for t in topics.iter() {
        let state = if voted.contains(&t.label) {
            "voted"
        } else {
            "not voted"
        };
        println!("  {}: {}", t.label, state);
    }
    Ok(())
}

fn run_tally(
    ws: &Workspace,
    out: Option<&str>,
    format: &str,
    reference: Option<&str>,
) -> BSvResult<()> {
    let rules = ws.config.rules.tally_rules()?;
    let roster = ws.roster()?;
    let topics = ws.topics()?;
    let ledger = ws.ledger()?;
    let tally = ledger.tally_report(&roster, &topics);
    if let Some(e) = &tally.error {
        warn!("run_tally: the tally is degraded: {}", e);
    }

    match format {
        "json" => {
            let summary = report::build_summary_js(&ws.config, &roster, &tally, &rules);
            let pretty = serde_json::to_string_pretty(&summary).context(ParsingJsonSnafu {
                path: "<tally summary>",
            })?;
            let out = ws.output_path(out, "tally.json");
            report::write_output(out.as_deref(), pretty.as_bytes())?;
            if let Some(reference_p) = reference {
                report::check_reference(&pretty, reference_p)?;
            }
        }
        "csv" => {
            let bytes = report::tally_to_csv(&tally.results, &rules)?;
            let out = ws.output_path(out, "tally.csv");
            report::write_output(out.as_deref(), &bytes)?;
        }
        x => {
            return UnknownFormatSnafu { format: x }.fail().map_err(Box::new);
        }
    }
    Ok(())
}

fn run_non_voters(ws: &Workspace, topic: &str) -> BSvResult<()> {
    let topic = topic.trim();
    let roster = ws.roster()?;
    let topics = ws.topics()?;
    ensure!(
        topics.iter().any(|t| t.label == topic),
        UnknownTopicSnafu { topic }
    );
    let ledger = ws.ledger()?;
    let missing = ledger.non_voters(&roster, topic).context(LedgerSnafu {})?;
    println!(
        "{} of {} households have not voted on {}",
        missing.len(),
        roster.len(),
        topic
    );
    for h in missing.iter() {
        println!("{}", h);
    }
    Ok(())
}

fn run_export_votes(ws: &Workspace, out: Option<&str>) -> BSvResult<()> {
    let ledger = ws.ledger()?;
    let records = ledger.records().context(LedgerSnafu {})?;
    info!("run_export_votes: exporting {} votes", records.len());
    let bytes = report::votes_to_csv(&records)?;
    let out = ws.output_path(out, "votes.csv");
    report::write_output(out.as_deref(), &bytes)
}

fn run_reset(ws: &Workspace, yes: bool) -> BSvResult<()> {
    ensure!(yes, ResetNotConfirmedSnafu {});
    let ledger = ws.ledger()?;
    let cleared = ledger.reset_ledger().context(LedgerSnafu {})?;
    warn!(
        "run_reset: {} votes removed from {}",
        cleared, ws.config.storage.database_path
    );
    println!("Removed {} vote(s)", cleared);
    Ok(())
}

fn run_deadline(ws: &mut Workspace, at: Option<&str>, clear: bool) -> BSvResult<()> {
    if clear {
        ws.config.gate.deadline = None;
        ws.save()?;
        println!("Deadline removed");
    } else if let Some(value) = at {
        let deadline = gate::parse_deadline(value)?;
        ws.config.gate.deadline = Some(deadline.to_rfc3339());
        ws.save()?;
        println!("Deadline set to {}", deadline.to_rfc3339());
    } else {
        match ws.config.gate.deadline()? {
            Some(d) => println!("Deadline: {}", d.to_rfc3339()),
            None => println!("No deadline"),
        }
    }
    Ok(())
}

fn run_set_active(ws: &mut Workspace, active: bool) -> BSvResult<()> {
    ws.config.gate.active = active;
    ws.save()?;
    if active {
        println!("Voting is open");
    } else {
        warn!("run_set_active: voting paused");
        println!("Voting is paused");
    }
    Ok(())
}

fn run_check(ws: &Workspace) -> BSvResult<()> {
    let roster = ws.roster()?;
    let topics = ws.topics()?;
    let rules = ws.config.rules.tally_rules()?;
    println!("Contest: {}", ws.config.output_settings.contest_name);
    println!(
        "Roster: {} households, total share {}",
        roster.len(),
        roster.total_share()
    );
    println!("Topics: {}", topics.len());
    for t in topics.iter() {
        println!("  {}", t.label);
    }
    println!("Rules: {:?}", rules);
    match gate::check_gate(&ws.config.gate, Utc::now()) {
        Ok(()) => println!("Voting is open"),
        Err(e) => println!("{}", e),
    }
    Ok(())
}

pub fn run(args: &Args) -> BSvResult<()> {
    let mut ws = Workspace::load(&args.config)?;
    match &args.command {
        Command::Submit {
            household,
            votes,
            revise,
        } => run_submit(&ws, household, votes, *revise),
        Command::Status { household } => run_status(&ws, household),
        Command::Tally {
            out,
            format,
            reference,
        } => run_tally(&ws, out.as_deref(), format, reference.as_deref()),
        Command::NonVoters { topic } => run_non_voters(&ws, topic),
        Command::ExportVotes { out } => run_export_votes(&ws, out.as_deref()),
        Command::Reset { yes } => run_reset(&ws, *yes),
        Command::Open => run_set_active(&mut ws, true),
        Command::Close => run_set_active(&mut ws, false),
        Command::Deadline { at, clear } => run_deadline(&mut ws, at.as_deref(), *clear),
        Command::Check => run_check(&ws),
    }
}
