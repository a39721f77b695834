/*!

This is the long-form manual for `vote_ledger` and `smartvote`.

## Voting model

A round has a roster of households and a list of topics. Each household may
vote `agree` or `disagree` on each topic, independently of the other topics.
The ledger keeps at most one record per (household, topic): voting again on
the same topic replaces the earlier choice (last write wins).

Each household carries an ownership share (for example `0.125` of the
building). A tally reports, per topic:
* the number of households that agreed and disagreed
* the sum of their shares
* the roster households that did not vote on the topic (`notVoted`)
* the voters that are not on the roster (`unrostered`). Their vote counts
  with a share of 1.

Shares are held in millionths of a share, so a tally does not depend on the
order in which votes are read. A positive share smaller than one millionth
counts as one millionth.

Household codes and topic labels are compared after trimming surrounding
spaces, so ` 101 ` and `101` are the same household.

Percentages are computed against the households that voted on the topic
(agree + disagree), rounded half up by default. A topic without any vote
reports 0%.

## Choices

The following spellings are accepted, ignoring case and surrounding spaces:

| choice     | spellings                    |
|------------|------------------------------|
| `agree`    | `agree`, `yes`, `同意`        |
| `disagree` | `disagree`, `no`, `不同意`    |

## Configuration file

`smartvote` reads a JSON file, `smartvote.json` by default. Paths inside it are
relative to the directory of the file.

```json
{
  "outputSettings": {
    "contestName": "Autumn general meeting",
    "contestDate": "2025-10-20",
    "organizer": "Management committee",
    "outputDirectory": "reports"
  },
  "rosterSource": {
    "provider": "xlsx",
    "filePath": "households.xlsx",
    "excelWorksheetName": "Roster",
    "idColumn": "戶號",
    "shareColumn": "持分"
  },
  "topicSource": {
    "provider": "csv",
    "filePath": "topics.csv",
    "labelColumn": "議題"
  },
  "storage": { "databasePath": "votes.db" },
  "gate": { "active": true, "deadline": "2025-10-20T18:00:00+08:00" },
  "rules": { "rounding": "halfUp", "shareDecimalPlaces": 4, "countDecimalPlaces": 1 }
}
```

Only `outputSettings.contestName`, `rosterSource` and `topicSource` are
required.

### `rosterSource`

* `provider`: `csv` or `xlsx`
* `filePath`: the file to read
* `idColumn` (default `戶號`): the header of the household column
* `shareColumn` (optional): the header of the share column. When it is set,
  the column must exist. Blank cells count as one share.
* `excelWorksheetName` (optional): required when the workbook has several
  worksheets

The first row of the file is the header. Rows without a household code are
skipped with a warning. A household code that appears twice is an error, and
so is a share that is not a positive number.

### `topicSource`

Same fields, with `labelColumn` (default `議題`) instead of `idColumn`. Topics
are reported in file order. Blank rows are skipped; repeated topics are an
error.

### `gate`

* `active` (default `true`): `smartvote close` sets it to false to pause
  submissions, `smartvote open` sets it back.
* `deadline` (optional): an RFC 3339 timestamp. Submissions after the
  deadline are refused. A round past its deadline reports closed even when it
  is also paused.

The gate only applies to `submit`. Tallies and exports are always available.

### `rules`

* `rounding`: `halfUp` (default) or `halfEven`
* `shareDecimalPlaces` (default 4) and `countDecimalPlaces` (default 1): the
  decimal places of share and count percentages, at most 9.

## Commands

* `smartvote submit --household 101 --vote "Repaint lobby=agree" --vote "Solar panels=no"`
  records a ballot. Every topic must be on the topic list. If the household
  already voted on one of the topics the whole ballot is refused, unless
  `--revise` is passed. A household that is not on the roster is accepted with
  a warning.
* `smartvote status --household 101` shows which topics the household voted on.
* `smartvote tally [--format json|csv] [--out FILE] [--reference FILE]` computes
  the tally. `--reference` compares the JSON output with a stored summary and
  fails on any difference, printing the diff.
* `smartvote non-voters --topic "Repaint lobby"` lists the roster households
  that have not voted on the topic.
* `smartvote export-votes [--out FILE]` writes every record as CSV.
* `smartvote open`, `smartvote close`, `smartvote deadline [--at TIMESTAMP | --clear]`
  change the gate.
* `smartvote reset --yes` removes every vote.
* `smartvote check` loads the roster and the topics and prints a summary.

Without `--out`, outputs go to `outputDirectory` when it is configured, and
to the standard output otherwise. CSV outputs start with a UTF-8 byte order
mark so that spreadsheet tools read the Chinese headers correctly.

Pass `--verbose` for debug logs. `RUST_LOG` overrides the log level.

## Storage

Votes are kept in a SQLite database, one row per (household, topic). A ballot
is written in a single transaction: either every choice of the ballot is
recorded or none is. The library also provides an in-memory store, used by
tests and by programs that do not need persistence.

*/
