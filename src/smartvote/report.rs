// Rendering of tallies and raw votes.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::smartvote::*;

/// Spreadsheet tools need the byte order mark to detect UTF-8.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

fn tally_to_json(tr: &TallyResult, rules: &TallyRules) -> JSValue {
    json!({
        "topic": tr.topic,
        "agree": {
            "count": tr.agree_count,
            "share": tr.agree_share.to_string(),
            "countPercent": tr.agree_count_percent(rules),
            "sharePercent": tr.agree_share_percent(rules),
        },
        "disagree": {
            "count": tr.disagree_count,
            "share": tr.disagree_share.to_string(),
            "countPercent": tr.disagree_count_percent(rules),
            "sharePercent": tr.disagree_share_percent(rules),
        },
        "participated": tr.participated(),
        "notVoted": tr.not_voted,
        "unrostered": tr.unrostered,
    })
}

pub fn build_summary_js(
    config: &SmartVoteConfig,
    roster: &Roster,
    report: &TallyReport,
    rules: &TallyRules,
) -> JSValue {
    let c = OutputConfig {
        contest: config.output_settings.contest_name.clone(),
        date: config.output_settings.contest_date.clone(),
        organizer: config.output_settings.organizer.clone(),
        households: roster.len(),
        total_share: roster.total_share().to_string(),
    };
    let results: Vec<JSValue> = report
        .results
        .iter()
        .map(|tr| tally_to_json(tr, rules))
        .collect();
    let mut js = json!({
        "config": c,
        "results": results,
    });
    if let Some(e) = &report.error {
        js["error"] = json!(e);
    }
    js
}

fn finish_csv(wtr: csv::Writer<Vec<u8>>) -> BSvResult<Vec<u8>> {
    let bytes = wtr
        .into_inner()
        .map_err(|e| e.into_error())
        .context(WritingOutputSnafu {
            path: "<csv buffer>",
        })?;
    Ok(bytes)
}

/// One line per topic, with the rounded percentages.
pub fn tally_to_csv(results: &[TallyResult], rules: &TallyRules) -> BSvResult<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(UTF8_BOM.to_vec());
    wtr.write_record([
        "topic",
        "agree_count",
        "agree_share",
        "agree_count_percent",
        "agree_share_percent",
        "disagree_count",
        "disagree_share",
        "disagree_count_percent",
        "disagree_share_percent",
        "not_voted",
        "unrostered",
    ])
    .context(CsvWriteSnafu {})?;
    for tr in results.iter() {
        wtr.write_record(&[
            tr.topic.clone(),
            tr.agree_count.to_string(),
            tr.agree_share.to_string(),
            tr.agree_count_percent(rules).to_string(),
            tr.agree_share_percent(rules).to_string(),
            tr.disagree_count.to_string(),
            tr.disagree_share.to_string(),
            tr.disagree_count_percent(rules).to_string(),
            tr.disagree_share_percent(rules).to_string(),
            tr.not_voted.to_string(),
            tr.unrostered.to_string(),
        ])
        .context(CsvWriteSnafu {})?;
    }
    finish_csv(wtr)
}

/// Every record, in the order given.
pub fn votes_to_csv(records: &[VoteRecord]) -> BSvResult<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(UTF8_BOM.to_vec());
    wtr.write_record(["household", "topic", "choice", "recorded_at"])
        .context(CsvWriteSnafu {})?;
    for r in records.iter() {
        wtr.write_record(&[
            r.household_id.as_str(),
            r.topic_id.as_str(),
            r.choice.as_str(),
            r.recorded_at.to_rfc3339().as_str(),
        ])
        .context(CsvWriteSnafu {})?;
    }
    finish_csv(wtr)
}

/// Writes to a file, or to the standard output for `None`, an empty path or
/// `stdout`. Missing parent directories are created.
pub fn write_output(out: Option<&str>, bytes: &[u8]) -> BSvResult<()> {
    match out {
        None | Some("") | Some("stdout") => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(bytes)
                .and_then(|_| stdout.write_all(b"\n"))
                .context(WritingOutputSnafu { path: "stdout" })?;
        }
        Some(path) => {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).context(WritingOutputSnafu { path })?;
                }
            }
            fs::write(path, bytes).context(WritingOutputSnafu { path })?;
            info!("write_output: wrote {} bytes to {}", bytes.len(), path);
        }
    }
    Ok(())
}

/// Compares a rendered summary with a reference summary, and prints the
/// differences.
pub fn check_reference(pretty_js_stats: &str, reference_path: &str) -> BSvResult<()> {
    let summary_ref = read_summary(reference_path)?;
    info!("summary: {:?}", summary_ref);
    let pretty_js_summary_ref =
        serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {
            path: reference_path,
        })?;
    if pretty_js_summary_ref != pretty_js_stats {
        warn!("Found differences with the reference summary");
        print_diff(pretty_js_summary_ref.as_str(), pretty_js_stats, "\n");
        return ReferenceMismatchSnafu {}.fail().map_err(Box::new);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use vote_ledger::builder::RosterBuilder;

    fn sample() -> (SmartVoteConfig, Roster, TallyReport) {
        let config: SmartVoteConfig = serde_json::from_str(
            r#"{
                "outputSettings": {"contestName": "Autumn meeting", "contestDate": "2025-10-20"},
                "rosterSource": {"provider": "csv", "filePath": "units.csv"},
                "topicSource": {"provider": "csv", "filePath": "issues.csv"}
            }"#,
        )
        .unwrap();
        let mut b = RosterBuilder::new();
        b.add_household("A", Some(0.5)).unwrap();
        b.add_household("B", Some(0.3)).unwrap();
        b.add_household("C", Some(0.2)).unwrap();
        let roster = b.build();
        let report = TallyReport {
            results: vec![TallyResult {
                topic: "X".to_string(),
                agree_count: 2,
                disagree_count: 1,
                agree_share: Share::from_units(800_000),
                disagree_share: Share::from_units(200_000),
                not_voted: 0,
                unrostered: 0,
            }],
            error: None,
        };
        (config, roster, report)
    }

    #[test]
    fn summary() {
        let (config, roster, report) = sample();
        let js = build_summary_js(&config, &roster, &report, &TallyRules::DEFAULT_RULES);
        assert_eq!(js["config"]["contest"], "Autumn meeting");
        assert_eq!(js["config"]["households"], 3);
        assert_eq!(js["config"]["totalShare"], "1");
        let x = &js["results"][0];
        assert_eq!(x["agree"]["share"], "0.8");
        assert_eq!(x["agree"]["sharePercent"], 80.0);
        assert_eq!(x["agree"]["countPercent"], 66.7);
        assert_eq!(x["participated"], 3);
        assert!(js.get("error").is_none());
    }

    #[test]
    fn degraded_summary() {
        let (config, roster, mut report) = sample();
        report.results = vec![TallyResult::empty("X", &roster)];
        report.error = Some("Vote storage is unavailable".to_string());
        let js = build_summary_js(&config, &roster, &report, &TallyRules::DEFAULT_RULES);
        assert_eq!(js["error"], "Vote storage is unavailable");
        assert_eq!(js["results"][0]["notVoted"], 3);
        assert_eq!(js["results"][0]["agree"]["sharePercent"], 0.0);
    }

    #[test]
    fn csv_outputs_start_with_bom() {
        let (_, _, report) = sample();
        let bytes = tally_to_csv(&report.results, &TallyRules::DEFAULT_RULES).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "X,2,0.8,66.7,80,1,0.2,33.3,20,0,0");

        let records = vec![VoteRecord {
            household_id: "101".to_string(),
            topic_id: "Repaint, lobby".to_string(),
            choice: Choice::Agree,
            recorded_at: Utc.with_ymd_and_hms(2025, 10, 1, 8, 30, 0).unwrap(),
        }];
        let bytes = votes_to_csv(&records).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
        assert_eq!(
            text,
            format!(
                "household,topic,choice,recorded_at\n101,\"Repaint, lobby\",{},2025-10-01T08:30:00+00:00\n",
                Choice::Agree.as_str()
            )
        );
    }

    #[test]
    fn reference_comparison() {
        let (config, roster, report) = sample();
        let js = build_summary_js(&config, &roster, &report, &TallyRules::DEFAULT_RULES);
        let pretty = serde_json::to_string_pretty(&js).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("reports").join("tally.json");
        write_output(out.to_str(), pretty.as_bytes()).unwrap();
        assert!(check_reference(&pretty, out.to_str().unwrap()).is_ok());

        let mut other = report.clone();
        other.results[0].agree_count = 3;
        let js2 = build_summary_js(&config, &roster, &other, &TallyRules::DEFAULT_RULES);
        let pretty2 = serde_json::to_string_pretty(&js2).unwrap();
        assert!(matches!(
            *check_reference(&pretty2, out.to_str().unwrap()).unwrap_err(),
            SmartVoteError::ReferenceMismatch {}
        ));
    }
}
