//! Edge case tests for concurrent voting and lifecycle races
//!
//! These exercise the guarantees that matter under load:
//! - At most one ballot per aadhar, however many requests race
//! - Independent voters never lose ballots to each other
//! - Transitions and votes interleave without half-applied results

use std::collections::HashSet;
use std::sync::{Arc, Barrier, Mutex};
use tempfile::TempDir;
use votebox::{
    ElectionService, Error, Result,
    config::Config,
    types::{ElectionPhase, Transition},
};

const ADMIN: &str = "admin123";

fn open_live_election(voters: &[(String, String)]) -> (TempDir, Arc<ElectionService>) {
    let dir = TempDir::new().expect("tempdir");
    let config = Config::for_testing(dir.path());
    std::fs::write(&config.admin.credential_file, ADMIN).expect("write credential");
    std::fs::write(
        config.storage.candidates_path(),
        "1,Alice,Blue,uploads/1.jpg\n2,Bob,Green,uploads/2.jpg\n",
    )
    .expect("seed candidates");

    let service = ElectionService::open(&config).expect("open election store");
    for (aadhar, name) in voters {
        service.add_voter(ADMIN, aadhar, name).expect("register voter");
    }
    service
        .change_state(ADMIN, Transition::Start)
        .expect("start election");
    (dir, Arc::new(service))
}

fn ballot_lines(service: &ElectionService) -> Vec<String> {
    std::fs::read_to_string(service.ledgers().ballot_path())
        .expect("read ballots")
        .lines()
        .map(str::to_string)
        .collect()
}

fn turnout_lines(service: &ElectionService) -> Vec<String> {
    std::fs::read_to_string(service.ledgers().turnout_path())
        .expect("read turnout")
        .lines()
        .map(str::to_string)
        .collect()
}

// =============================================================================
// CONCURRENT VOTING
// =============================================================================

#[tokio::test]
async fn test_concurrent_double_vote_race() -> Result<()> {
    println!("🏁 Testing concurrent votes for one aadhar...");

    let voters = vec![("123456789012".to_string(), "Jane Doe".to_string())];
    let (_dir, service) = open_live_election(&voters);

    for round in 0..5 {
        if round > 0 {
            service.change_state(ADMIN, Transition::Stop)?;
            service.change_state(ADMIN, Transition::Reset)?;
            service.change_state(ADMIN, Transition::Start)?;
        }

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = ["1", "2"]
            .into_iter()
            .map(|choice| {
                let service = service.clone();
                let barrier = barrier.clone();
                tokio::task::spawn_blocking(move || {
                    barrier.wait();
                    service.cast_vote("123456789012", "Jane Doe", Some(choice))
                })
            })
            .collect();

        let mut accepted = 0;
        let mut already_voted = 0;
        for handle in handles {
            match handle.await.expect("join vote task") {
                Ok(_) => accepted += 1,
                Err(Error::AlreadyVoted) => already_voted += 1,
                Err(e) => panic!("unexpected vote error: {e}"),
            }
        }

        assert_eq!(accepted, 1, "round {round}");
        assert_eq!(already_voted, 1, "round {round}");
        assert_eq!(ballot_lines(&service).len(), 1, "round {round}");
        assert_eq!(turnout_lines(&service), vec!["123456789012"]);
    }

    println!("✅ Exactly one ballot per aadhar in every round");
    Ok(())
}

#[tokio::test]
async fn test_many_concurrent_attempts_same_voter() -> Result<()> {
    let voters = vec![("5555".to_string(), "Sam".to_string())];
    let (_dir, service) = open_live_election(&voters);
    let results = Arc::new(Mutex::new(Vec::new()));
    let barrier = Arc::new(Barrier::new(16));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let service = service.clone();
            let results = results.clone();
            let barrier = barrier.clone();
            tokio::task::spawn_blocking(move || {
                let choice = if i % 2 == 0 { "1" } else { "2" };
                barrier.wait();
                let outcome = service.cast_vote("5555", "Sam", Some(choice));
                results.lock().unwrap().push(outcome.is_ok());
            })
        })
        .collect();
    for handle in handles {
        handle.await.expect("join vote task");
    }

    let results = results.lock().unwrap();
    assert_eq!(results.iter().filter(|ok| **ok).count(), 1);
    assert_eq!(ballot_lines(&service).len(), 1);
    assert_eq!(turnout_lines(&service).len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_distinct_voters_all_counted() -> Result<()> {
    println!("👥 Testing concurrent votes from distinct voters...");

    let voters: Vec<(String, String)> = (0..24)
        .map(|i| (format!("9000{i:04}"), format!("Voter {i}")))
        .collect();
    let (_dir, service) = open_live_election(&voters);

    let handles: Vec<_> = voters
        .iter()
        .cloned()
        .enumerate()
        .map(|(i, (aadhar, name))| {
            let service = service.clone();
            tokio::task::spawn_blocking(move || {
                let choice = if i % 3 == 0 { "2" } else { "1" };
                service.cast_vote(&aadhar, &name, Some(choice))
            })
        })
        .collect();
    for handle in handles {
        handle.await.expect("join vote task")?;
    }

    let turnout: HashSet<String> = turnout_lines(&service).into_iter().collect();
    assert_eq!(turnout.len(), 24);
    assert_eq!(ballot_lines(&service).len(), 24);

    let report = service.results(ADMIN)?;
    assert_eq!(report.tally.total_votes, 24);
    assert_eq!(report.tally.votes_for(1), Some(16));
    assert_eq!(report.tally.votes_for(2), Some(8));
    println!("✅ All 24 ballots recorded without loss");
    Ok(())
}

// =============================================================================
// LIFECYCLE RACES
// =============================================================================

#[tokio::test]
async fn test_stop_racing_votes_keeps_ledgers_consistent() -> Result<()> {
    println!("⛔ Testing stop() racing incoming votes...");

    let voters: Vec<(String, String)> = (0..20)
        .map(|i| (format!("7000{i:04}"), format!("Racer {i}")))
        .collect();
    let (_dir, service) = open_live_election(&voters);
    let barrier = Arc::new(Barrier::new(voters.len() + 1));

    let mut handles: Vec<_> = voters
        .iter()
        .cloned()
        .map(|(aadhar, name)| {
            let service = service.clone();
            let barrier = barrier.clone();
            tokio::task::spawn_blocking(move || {
                barrier.wait();
                match service.cast_vote(&aadhar, &name, Some("1")) {
                    Ok(_) => Ok(true),
                    Err(Error::ElectionNotLive { .. }) => Ok(false),
                    Err(e) => Err(e),
                }
            })
        })
        .collect();

    let stopper = {
        let service = service.clone();
        let barrier = barrier.clone();
        tokio::task::spawn_blocking(move || {
            barrier.wait();
            service.change_state(ADMIN, Transition::Stop).map(|_| true)
        })
    };
    handles.push(stopper);

    let mut accepted = 0;
    for (i, handle) in handles.into_iter().enumerate() {
        let result = handle.await.expect("join task")?;
        if i < voters.len() && result {
            accepted += 1;
        }
    }

    // Every accepted vote has both halves; nothing landed after the stop
    assert_eq!(ballot_lines(&service).len(), accepted);
    assert_eq!(turnout_lines(&service).len(), accepted);
    assert_eq!(service.phase()?, ElectionPhase::Closed);
    println!("✅ {accepted} votes landed before stop, ledgers agree");
    Ok(())
}

#[tokio::test]
async fn test_reset_refused_while_live_under_load() -> Result<()> {
    let voters = vec![("1234".to_string(), "Lee".to_string())];
    let (_dir, service) = open_live_election(&voters);
    service.cast_vote("1234", "Lee", Some("2"))?;

    let result = service.change_state(ADMIN, Transition::Reset);
    assert!(matches!(
        result,
        Err(Error::InvalidTransition {
            transition: Transition::Reset,
            phase: ElectionPhase::Live
        })
    ));
    assert_eq!(ballot_lines(&service), vec!["2"]);
    assert_eq!(turnout_lines(&service), vec!["1234"]);
    Ok(())
}

// =============================================================================
// INPUT EDGE CASES
// =============================================================================

#[tokio::test]
async fn test_identity_must_match_exactly() -> Result<()> {
    let voters = vec![("1234".to_string(), "Lee Chan".to_string())];
    let (_dir, service) = open_live_election(&voters);

    for (aadhar, name) in [("1234", "lee chan"), ("1234 ", "Lee Chan"), ("12345", "Lee Chan")] {
        assert!(
            matches!(
                service.cast_vote(aadhar, name, Some("1")),
                Err(Error::NotRegistered)
            ),
            "{aadhar:?}/{name:?} should not match"
        );
    }
    assert!(turnout_lines(&service).is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unknown_candidate_counts_toward_total_only() -> Result<()> {
    let voters = vec![("1234".to_string(), "Lee".to_string())];
    let (_dir, service) = open_live_election(&voters);

    service.cast_vote("1234", "Lee", Some("42"))?;
    let report = service.results(ADMIN)?;
    assert_eq!(report.tally.total_votes, 1);
    assert_eq!(report.tally.unattributed_votes, 1);
    assert_eq!(report.outcome, votebox::types::Outcome::NoVotes);
    Ok(())
}

#[tokio::test]
async fn test_storage_failure_surfaces() -> Result<()> {
    let voters = vec![("1234".to_string(), "Lee".to_string())];
    let (_dir, service) = open_live_election(&voters);

    // Replace the turnout ledger with a directory so opening it fails
    let turnout = service.ledgers().turnout_path().to_path_buf();
    std::fs::remove_file(&turnout).expect("remove turnout");
    std::fs::create_dir(&turnout).expect("block turnout path");

    let result = service.cast_vote("1234", "Lee", Some("1"));
    match result {
        Err(e @ Error::Storage { .. }) => assert!(!e.is_rejection()),
        other => panic!("expected storage error, got {other:?}"),
    }
    assert!(ballot_lines(&service).is_empty());
    Ok(())
}

#[tokio::test]
async fn test_ballot_failure_does_not_consume_turnout() -> Result<()> {
    println!("💾 Testing a ballot ledger failure mid-vote...");
    let voters = vec![("1234".to_string(), "Lee".to_string())];
    let (_dir, service) = open_live_election(&voters);

    let ballots = service.ledgers().ballot_path().to_path_buf();
    std::fs::remove_file(&ballots).expect("remove ballots");
    std::fs::create_dir(&ballots).expect("block ballot path");

    let result = service.cast_vote("1234", "Lee", Some("1"));
    assert!(matches!(result, Err(Error::Storage { .. })));
    assert!(turnout_lines(&service).is_empty());

    // Once storage recovers the same voter can still vote, exactly once
    std::fs::remove_dir(&ballots).expect("unblock ballot path");
    std::fs::write(&ballots, "").expect("restore ballots");
    service.cast_vote("1234", "Lee", Some("1"))?;
    assert_eq!(ballot_lines(&service), vec!["1"]);
    assert_eq!(turnout_lines(&service), vec!["1234"]);
    println!("✅ Turnout untouched by the failed ballot, retry accepted");
    Ok(())
}
