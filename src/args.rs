use clap::{Parser, Subcommand};

/// This is the ledger and tabulation program for household referendums.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, default smartvote.json) The JSON file describing the voting round: roster and topic files,
    /// vote database, voting gate and rounding rules. Relative paths inside it are resolved against its directory.
    #[clap(short, long, value_parser, default_value = "smartvote.json")]
    pub config: String,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Records the choices of one household. Topics the household already voted on are refused
    /// unless --revise is given.
    Submit {
        /// The household code, as printed on its QR code.
        #[clap(long, value_parser)]
        household: String,
        /// (repeatable) A choice, written TOPIC=CHOICE. CHOICE is one of agree, disagree, yes, no, 同意, 不同意.
        #[clap(long = "vote", value_parser, required = true)]
        votes: Vec<String>,
        /// Replaces earlier choices of the household instead of refusing them.
        #[clap(long, takes_value = false)]
        revise: bool,
    },
    /// Shows which topics a household has voted on.
    Status {
        #[clap(long, value_parser)]
        household: String,
    },
    /// Computes the tally of every topic.
    Tally {
        /// (file path, 'stdout' or empty) Where to write the tally.
        #[clap(short, long, value_parser)]
        out: Option<String>,
        /// (default json) The output format: json or csv.
        #[clap(long, value_parser, default_value = "json")]
        format: String,
        /// (file path) A reference file containing a tally in JSON format. If provided, smartvote will
        /// check that the computed tally matches the reference.
        #[clap(short, long, value_parser)]
        reference: Option<String>,
    },
    /// Lists the roster households that have not voted on a topic.
    NonVoters {
        #[clap(long, value_parser)]
        topic: String,
    },
    /// Writes every recorded vote as CSV.
    ExportVotes {
        /// (file path, 'stdout' or empty) Where to write the votes.
        #[clap(short, long, value_parser)]
        out: Option<String>,
    },
    /// Removes every recorded vote, to start a new round.
    Reset {
        /// Confirms the reset.
        #[clap(long, takes_value = false)]
        yes: bool,
    },
    /// Accepts submissions again.
    Open,
    /// Pauses submissions.
    Close,
    /// Shows, sets or clears the submission deadline.
    Deadline {
        /// (RFC 3339 timestamp) The new deadline, for example 2025-10-20T18:00:00+08:00.
        #[clap(long, value_parser, conflicts_with = "clear")]
        at: Option<String>,
        /// Removes the deadline.
        #[clap(long, takes_value = false)]
        clear: bool,
    },
    /// Loads the roster and the topics and prints a summary of the round.
    Check,
}
