use crate::smartvote::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;
use std::fs;
use std::path::Path;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "contestName")]
    pub contest_name: String,
    #[serde(rename = "contestDate", default, skip_serializing_if = "Option::is_none")]
    pub contest_date: Option<String>,
    #[serde(rename = "organizer", default, skip_serializing_if = "Option::is_none")]
    pub organizer: Option<String>,
    #[serde(
        rename = "outputDirectory",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub output_directory: Option<String>,
}

/// The fields of the summary header.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub contest: String,
    pub date: Option<String>,
    pub organizer: Option<String>,
    pub households: usize,
    #[serde(rename = "totalShare")]
    pub total_share: String,
}

fn default_id_column() -> String {
    "戶號".to_string()
}

fn default_label_column() -> String {
    "議題".to_string()
}

/// A roster or topic file.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct FileSource {
    /// csv or xlsx
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "idColumn", default = "default_id_column")]
    pub id_column: String,
    #[serde(rename = "shareColumn", default, skip_serializing_if = "Option::is_none")]
    pub share_column: Option<String>,
    #[serde(rename = "labelColumn", default = "default_label_column")]
    pub label_column: String,
    #[serde(
        rename = "excelWorksheetName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub excel_worksheet_name: Option<String>,
}

fn default_database_path() -> String {
    "votes.db".to_string()
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(rename = "databasePath", default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            database_path: default_database_path(),
        }
    }
}

fn default_active() -> bool {
    true
}

/// Whether submissions are accepted. Only the CLI consults it.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct VotingGate {
    #[serde(default = "default_active")]
    pub active: bool,
    /// RFC 3339
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
}

impl Default for VotingGate {
    fn default() -> Self {
        VotingGate {
            active: true,
            deadline: None,
        }
    }
}

impl VotingGate {
    pub fn deadline(&self) -> BSvResult<Option<DateTime<Utc>>> {
        match &self.deadline {
            Some(s) => Ok(Some(gate::parse_deadline(s)?.with_timezone(&Utc))),
            None => Ok(None),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct RoundRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rounding: Option<String>,
    #[serde(
        rename = "shareDecimalPlaces",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub share_decimal_places: Option<u32>,
    #[serde(
        rename = "countDecimalPlaces",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub count_decimal_places: Option<u32>,
}

impl RoundRules {
    pub fn tally_rules(&self) -> BSvResult<TallyRules> {
        let defaults = TallyRules::DEFAULT_RULES;
        let rounding = match self.rounding.as_deref() {
            None | Some("halfUp") => RoundingMode::HalfUp,
            Some("halfEven") => RoundingMode::HalfEven,
            Some(x) => {
                return UnknownRoundingSnafu { value: x }.fail().map_err(Box::new);
            }
        };
        let share_decimal_places = self
            .share_decimal_places
            .unwrap_or(defaults.share_decimal_places)
            .min(MAX_DECIMAL_PLACES);
        let count_decimal_places = self
            .count_decimal_places
            .unwrap_or(defaults.count_decimal_places)
            .min(MAX_DECIMAL_PLACES);
        Ok(TallyRules {
            rounding,
            share_decimal_places,
            count_decimal_places,
        })
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SmartVoteConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: OutputSettings,
    #[serde(rename = "rosterSource")]
    pub roster_source: FileSource,
    #[serde(rename = "topicSource")]
    pub topic_source: FileSource,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub gate: VotingGate,
    #[serde(default)]
    pub rules: RoundRules,
}

pub fn read_config(path: &str) -> BSvResult<SmartVoteConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: SmartVoteConfig =
        serde_json::from_str(&contents).context(ParsingJsonSnafu { path })?;
    Ok(config)
}

/// Rewrites the configuration file, after a gate change.
pub fn write_config(path: &Path, config: &SmartVoteConfig) -> BSvResult<()> {
    let p = path.display().to_string();
    let pretty =
        serde_json::to_string_pretty(config).context(ParsingJsonSnafu { path: p.clone() })?;
    fs::write(path, pretty + "\n").context(WritingOutputSnafu { path: p })?;
    Ok(())
}

/// Reads a reference tally summary.
pub fn read_summary(path: &str) -> BSvResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(&contents).context(ParsingJsonSnafu { path })?;
    Ok(js)
}
