use std::thread;

use chrono::{TimeZone, Utc};
use vote_ledger::builder::{topic_list, RosterBuilder};
use vote_ledger::*;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn roster(entries: &[(&str, Option<f64>)]) -> Roster {
    let mut b = RosterBuilder::new();
    for (id, share) in entries {
        b.add_household(id, *share).unwrap();
    }
    b.build()
}

fn ten_households() -> Roster {
    let mut b = RosterBuilder::new();
    for i in 0..10 {
        b.add_household(&format!("H{:02}", i), None).unwrap();
    }
    b.build()
}

type VoteFn<'a> = &'a dyn Fn(&str, &str, Choice);
type TallyFn<'a> = &'a dyn Fn(&Roster, &[Topic]) -> Vec<TallyResult>;
type HasVotedFn<'a> = &'a dyn Fn(&str) -> bool;

// Runs the same scenario against both backends.
fn with_ledgers(f: impl Fn(VoteFn, TallyFn, HasVotedFn)) {
    init();
    let memory = VoteLedger::in_memory();
    f(
        &|h, t, c| memory.record_vote(h, t, c, None).unwrap(),
        &|r, ts| memory.compute_tally(r, ts).unwrap(),
        &|h| memory.has_voted(h).unwrap(),
    );
    let sqlite = VoteLedger::new(SqliteStore::open_in_memory().unwrap());
    f(
        &|h, t, c| sqlite.record_vote(h, t, c, None).unwrap(),
        &|r, ts| sqlite.compute_tally(r, ts).unwrap(),
        &|h| sqlite.has_voted(h).unwrap(),
    );
}

#[test]
fn idempotent_submission() {
    with_ledgers(|vote, tally, has_voted| {
        let r = roster(&[("h", None)]);
        let topics = topic_list(&["t"]).unwrap();
        vote("h", "t", Choice::Agree);
        assert!(has_voted("h"));
        vote("h", "t", Choice::Agree);
        assert!(has_voted("h"));
        let res = tally(&r, &topics);
        assert_eq!(res[0].agree_count, 1);
        assert_eq!(res[0].disagree_count, 0);
        assert_eq!(res[0].participated(), 1);
    });
}

#[test]
fn last_write_wins() {
    with_ledgers(|vote, tally, _| {
        let r = roster(&[("h", None)]);
        let topics = topic_list(&["t"]).unwrap();
        vote("h", "t", Choice::Agree);
        vote("h", "t", Choice::Disagree);
        let res = tally(&r, &topics);
        assert_eq!(res[0].agree_count, 0);
        assert_eq!(res[0].disagree_count, 1);
        assert_eq!(res[0].disagree_share, Share::ONE);
    });
}

#[test]
fn weighted_sums() {
    with_ledgers(|vote, tally, _| {
        let r = roster(&[("A", Some(0.5)), ("B", Some(0.3)), ("C", Some(0.2))]);
        let topics = topic_list(&["X"]).unwrap();
        vote("A", "X", Choice::Agree);
        vote("B", "X", Choice::Agree);
        vote("C", "X", Choice::Disagree);
        let res = tally(&r, &topics);
        let x = &res[0];
        assert_eq!(x.topic, "X");
        assert_eq!(x.agree_share.as_f64(), 0.8);
        assert_eq!(x.disagree_share.as_f64(), 0.2);
        assert_eq!(x.agree_count, 2);
        assert_eq!(x.disagree_count, 1);
        assert_eq!(x.not_voted, 0);
        let rules = TallyRules::DEFAULT_RULES;
        assert_eq!(x.agree_share_percent(&rules), 80.0);
        assert_eq!(x.disagree_share_percent(&rules), 20.0);
    });
}

#[test]
fn non_participation_is_per_topic() {
    with_ledgers(|vote, tally, _| {
        let r = ten_households();
        let topics = topic_list(&["X", "Y"]).unwrap();
        for i in 0..10 {
            vote(&format!("H{:02}", i), "X", Choice::Agree);
        }
        for i in 0..4 {
            vote(&format!("H{:02}", i), "Y", Choice::Disagree);
        }
        let res = tally(&r, &topics);
        assert_eq!(res[0].not_voted, 0);
        assert_eq!(res[1].not_voted, 6);
        assert_eq!(res[1].disagree_count, 4);
    });
}

#[test]
fn unknown_household_weighs_one_share() {
    with_ledgers(|vote, tally, _| {
        let r = roster(&[("A", Some(0.25))]);
        let topics = topic_list(&["X"]).unwrap();
        vote("A", "X", Choice::Agree);
        vote("gone", "X", Choice::Agree);
        let res = tally(&r, &topics);
        assert_eq!(res[0].agree_share.as_f64(), 1.25);
        assert_eq!(res[0].agree_count, 2);
        assert_eq!(res[0].unrostered, 1);
        assert_eq!(res[0].not_voted, 0);
    });
}

#[test]
fn padded_ids_name_the_same_household() {
    with_ledgers(|vote, tally, has_voted| {
        let r = roster(&[(" A ", Some(0.5)), ("B", Some(0.5))]);
        let topics = topic_list(&["X"]).unwrap();
        vote(" A ", "X", Choice::Agree);
        vote("A", " X", Choice::Disagree);
        assert!(has_voted("A"));
        assert!(has_voted(" A"));
        let res = tally(&r, &topics);
        assert_eq!(res[0].participated(), 1);
        assert_eq!(res[0].agree_count, 0);
        assert_eq!(res[0].disagree_count, 1);
        assert_eq!(res[0].disagree_share.as_f64(), 0.5);
        assert_eq!(res[0].not_voted, 1);
        assert_eq!(res[0].unrostered, 0);
    });
}

#[test]
fn tally_is_deterministic_and_ordered() {
    with_ledgers(|vote, tally, _| {
        let r = roster(&[("A", Some(0.5)), ("B", Some(0.3)), ("C", Some(0.2))]);
        vote("C", "X", Choice::Disagree);
        vote("A", "Y", Choice::Agree);
        vote("B", "X", Choice::Agree);
        let xy = topic_list(&["X", "Y"]).unwrap();
        let yx = topic_list(&["Y", "X"]).unwrap();
        let first = tally(&r, &xy);
        assert_eq!(first, tally(&r, &xy));
        let mut reordered = tally(&r, &yx);
        reordered.reverse();
        assert_eq!(first, reordered);
    });
}

#[test]
fn empty_state() {
    with_ledgers(|_, tally, has_voted| {
        let r = Roster::default();
        let topics = topic_list(&["X", "Y"]).unwrap();
        let res = tally(&r, &topics);
        assert_eq!(res.len(), 2);
        let rules = TallyRules::DEFAULT_RULES;
        for t in res.iter() {
            assert_eq!(t.participated(), 0);
            assert_eq!(t.total_share(), Share::EMPTY);
            assert_eq!(t.not_voted, 0);
            assert_eq!(t.agree_share_percent(&rules), 0.0);
            assert_eq!(t.disagree_count_percent(&rules), 0.0);
        }
        assert!(!has_voted("anyone"));
    });
}

#[test]
fn ballot_then_reset() {
    init();
    let ledger = VoteLedger::new(SqliteStore::open_in_memory().unwrap());
    let ts = Utc.with_ymd_and_hms(2025, 10, 1, 12, 0, 0).unwrap();
    let ballot = vec![
        ("X".to_string(), Choice::Agree),
        ("Y".to_string(), Choice::Disagree),
    ];
    assert_eq!(ledger.record_ballot("A", &ballot, Some(ts)).unwrap(), 2);
    assert!(ledger.has_voted_on("A", "Y").unwrap());
    assert!(!ledger.has_voted_on("A", "Z").unwrap());
    let records = ledger.records().unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.recorded_at == ts));

    assert_eq!(ledger.reset_ledger().unwrap(), 2);
    assert!(!ledger.has_voted("A").unwrap());
    assert_eq!(ledger.reset_ledger().unwrap(), 0);
}

#[test]
fn concurrent_writers() {
    init();
    let ledger = VoteLedger::in_memory();
    thread::scope(|s| {
        for worker in 0..8 {
            let ledger = &ledger;
            s.spawn(move || {
                for i in 0..50 {
                    let h = format!("W{}-{}", worker, i);
                    ledger.record_vote(&h, "X", Choice::Agree, None).unwrap();
                    let c = if i % 2 == 0 { Choice::Agree } else { Choice::Disagree };
                    ledger.record_vote("shared", "X", c, None).unwrap();
                }
            });
        }
    });
    let res = ledger
        .compute_tally(&Roster::default(), &topic_list(&["X"]).unwrap())
        .unwrap();
    // 400 distinct households plus the shared one, exactly once.
    assert_eq!(res[0].participated(), 401);
    assert_eq!(ledger.records().unwrap().len(), 401);
}

#[test]
fn tally_reads_while_writing() {
    init();
    let ledger = VoteLedger::in_memory();
    let r = ten_households();
    let topics = topic_list(&["X"]).unwrap();
    thread::scope(|s| {
        s.spawn(|| {
            for i in 0..10 {
                ledger
                    .record_vote(&format!("H{:02}", i), "X", Choice::Agree, None)
                    .unwrap();
            }
        });
        s.spawn(|| {
            for _ in 0..20 {
                let res = ledger.compute_tally(&r, &topics).unwrap();
                assert_eq!(res[0].agree_count + res[0].not_voted, 10);
            }
        });
    });
}

struct BrokenStore;

impl VoteStore for BrokenStore {
    fn upsert(&self, _records: &[VoteRecord]) -> LedgerResult<()> {
        Err(LedgerError::StorageLock {})
    }
    fn topic_records(&self, _topic_id: &str) -> LedgerResult<Vec<VoteRecord>> {
        Err(LedgerError::StorageLock {})
    }
    fn household_topics(&self, _household_id: &str) -> LedgerResult<Vec<String>> {
        Err(LedgerError::StorageLock {})
    }
    fn contains(&self, _household_id: &str, _topic_id: &str) -> LedgerResult<bool> {
        Err(LedgerError::StorageLock {})
    }
    fn records(&self) -> LedgerResult<Vec<VoteRecord>> {
        Err(LedgerError::StorageLock {})
    }
    fn clear(&self) -> LedgerResult<usize> {
        Err(LedgerError::StorageLock {})
    }
}

#[test]
fn storage_failures_degrade_the_report() {
    init();
    let ledger = VoteLedger::new(BrokenStore);
    let r = ten_households();
    let topics = topic_list(&["X", "Y"]).unwrap();

    let err = ledger.record_vote("A", "X", Choice::Agree, None).unwrap_err();
    assert!(!err.is_validation());
    assert!(ledger.compute_tally(&r, &topics).is_err());

    let report = ledger.tally_report(&r, &topics);
    assert!(report.is_degraded());
    assert_eq!(report.results.len(), 2);
    assert_eq!(report.results[1].topic, "Y");
    assert_eq!(report.results[1].not_voted, 10);
    assert_eq!(report.results[1].participated(), 0);
}

#[test]
fn rejected_ballot_leaves_disk_unchanged() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("votes.db");
    let ledger = VoteLedger::new(SqliteStore::open(&path).unwrap());
    let ballot = vec![
        ("X".to_string(), Choice::Agree),
        ("Y".to_string(), Choice::Agree),
    ];
    ledger.record_ballot("A", &ballot, None).unwrap();
    let revised = vec![
        ("X".to_string(), Choice::Disagree),
        ("".to_string(), Choice::Disagree),
    ];
    assert!(ledger.record_ballot("A", &revised, None).is_err());
    drop(ledger);

    let reopened = VoteLedger::new(SqliteStore::open(&path).unwrap());
    let records = reopened.records().unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.choice == Choice::Agree));
}
