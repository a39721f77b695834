/*!

# Quick start

This example runs a small round end to end: three households vote on two
topics at a general meeting.

**Preparing the files** Create a directory with the roster, `households.csv`:

```text
戶號,持分
101,0.5
102,0.3
103,0.2
```

the topics, `topics.csv`:

```text
議題
Repaint lobby
Install solar panels
```

and the configuration, `smartvote.json`:

```json
{
  "outputSettings": { "contestName": "Autumn general meeting" },
  "rosterSource": { "provider": "csv", "filePath": "households.csv", "shareColumn": "持分" },
  "topicSource": { "provider": "csv", "filePath": "topics.csv" }
}
```

The roster may also be an Excel file exported from the management software:
use `"provider": "xlsx"`.

Check that everything is read correctly:

```bash
smartvote check
```

```text
Contest: Autumn general meeting
Roster: 3 households, total share 1
Topics: 2
  Repaint lobby
  Install solar panels
...
Voting is open
```

**Voting** Each household submits its ballot, usually from the kiosk after
scanning its QR code:

```bash
smartvote submit --household 101 --vote "Repaint lobby=agree" --vote "Install solar panels=agree"
smartvote submit --household 102 --vote "Repaint lobby=同意"
smartvote submit --household 103 --vote "Repaint lobby=disagree"
```

Submitting again for a topic is refused:

```bash
smartvote submit --household 103 --vote "Repaint lobby=agree"
```

```text
An error occured: Household 103 has already voted on: Repaint lobby
```

Pass `--revise` to replace the earlier choice. Close the round with
`smartvote close`, or set a deadline beforehand with
`smartvote deadline --at 2025-10-20T18:00:00+08:00`.

**Getting the results**

```bash
smartvote tally
```

```json
{
  "config": {
    "contest": "Autumn general meeting",
    "date": null,
    "households": 3,
    "organizer": null,
    "totalShare": "1"
  },
  "results": [
    {
      "agree": {
        "count": 2,
        "countPercent": 66.7,
        "share": "0.8",
        "sharePercent": 80.0
      },
      "disagree": {
        "count": 1,
        "countPercent": 33.3,
        "share": "0.2",
        "sharePercent": 20.0
      },
      "notVoted": 0,
      "participated": 3,
      "topic": "Repaint lobby",
      "unrostered": 0
    },
    ...
  ]
}
```

`smartvote non-voters --topic "Install solar panels"` lists 102 and 103, and
`smartvote export-votes --out votes.csv` writes the raw records for the
minutes. Keep the JSON tally: `smartvote tally --reference tally.json` checks
later that the stored votes still give the same result.

*/
