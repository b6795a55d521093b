use sg_core::{CheatKind, Config, Direction, Heartbeat, Move, Submission};

use crate::detectors::{run, RuleVerdict};

fn cfg() -> Config {
    Config::default()
}

fn mv(direction: Direction, frame: u32, time_ms: f64) -> Move {
    Move {
        direction,
        frame,
        time_ms,
    }
}

fn base_submission() -> Submission {
    Submission {
        player_id: "p1".to_string(),
        score: 0,
        speed_level: 1,
        food_eaten: 0,
        game_duration_s: 2.0,
        seed: 42,
        moves: Vec::new(),
        heartbeats: Vec::new(),
        total_frames: 15,
    }
}

fn kind_of(v: &RuleVerdict) -> Option<CheatKind> {
    match v {
        RuleVerdict::Legit => None,
        RuleVerdict::Cheat(f) => Some(f.kind),
    }
}

#[test]
fn zero_game_with_no_moves_is_legit_without_replay() {
    let c = cfg();
    let sub = base_submission();
    let v = run(&c.game, &c.detect, &sub, Some(42));
    assert!(!v.is_cheat(), "verdict: {v:?}");
}

#[test]
fn score_food_identity_is_enforced_first() {
    let c = cfg();
    let mut sub = base_submission();
    sub.score = 500;
    sub.food_eaten = 3;
    // Also missing a session; score mismatch must still win (fixed order).
    let v = run(&c.game, &c.detect, &sub, None);
    assert_eq!(kind_of(&v), Some(CheatKind::ScoreMismatch));
}

#[test]
fn low_food_score_window_is_tolerated() {
    let c = cfg();
    let mut sub = base_submission();
    sub.food_eaten = 2;
    for score in [0u32, 20, 40] {
        sub.score = score;
        let v = run(&c.game, &c.detect, &sub, Some(42));
        assert_ne!(kind_of(&v), Some(CheatKind::ScoreMismatch), "score {score}");
    }
    sub.score = 41;
    let v = run(&c.game, &c.detect, &sub, Some(42));
    assert_eq!(kind_of(&v), Some(CheatKind::ScoreMismatch));
}

#[test]
fn speed_hack_fires_without_touching_replay() {
    let c = cfg();
    let mut sub = base_submission();
    sub.score = 100;
    sub.food_eaten = 10;
    sub.speed_level = 20;
    sub.game_duration_s = 10.0;
    let v = run(&c.game, &c.detect, &sub, Some(42));
    match v {
        RuleVerdict::Cheat(f) => {
            assert_eq!(f.kind, CheatKind::SpeedHack);
            assert!(f.replay.is_none());
        }
        RuleVerdict::Legit => panic!("expected speed_hack"),
    }
}

#[test]
fn missing_session_and_seed_mismatch_are_invalid_session() {
    let c = cfg();
    let sub = base_submission();
    let v = run(&c.game, &c.detect, &sub, None);
    assert_eq!(kind_of(&v), Some(CheatKind::InvalidSession));

    let v = run(&c.game, &c.detect, &sub, Some(43));
    assert_eq!(kind_of(&v), Some(CheatKind::InvalidSession));
}

#[test]
fn single_long_pause_rejects() {
    let c = cfg();
    let mut sub = base_submission();
    sub.moves = vec![
        mv(Direction::Up, 5, 750.0),
        mv(Direction::Right, 10, 1500.0),
        // 15s silence.
        mv(Direction::Down, 120, 16_500.0),
    ];
    sub.game_duration_s = 180.0;
    let v = run(&c.game, &c.detect, &sub, Some(42));
    match v {
        RuleVerdict::Cheat(f) => {
            assert_eq!(f.kind, CheatKind::PauseAbuse);
            assert!(f.reason.contains("15s"), "reason: {}", f.reason);
        }
        RuleVerdict::Legit => panic!("expected pause_abuse"),
    }
}

#[test]
fn bot_ratio_needs_high_score() {
    let c = cfg();
    let mut sub = base_submission();

    // 78 moves / 60 food at score 600: ratio fine, score too low either way.
    sub.score = 600;
    sub.food_eaten = 60;
    sub.moves = (0..78)
        .map(|i| mv(Direction::Up, i + 1, (i as f64 + 1.0) * 200.0))
        .collect();
    let v = run(&c.game, &c.detect, &sub, Some(42));
    assert_ne!(kind_of(&v), Some(CheatKind::BotUsage));

    // 750 moves / 150 food at score 1500: fires at ratio 5.
    sub.score = 1500;
    sub.food_eaten = 150;
    sub.moves = (0..750)
        .map(|i| mv(Direction::Up, i + 1, (i as f64 + 1.0) * 100.0))
        .collect();
    let v = run(&c.game, &c.detect, &sub, Some(42));
    assert_eq!(kind_of(&v), Some(CheatKind::BotUsage));
}

fn beat(time_ms: f64, perf_ms: f64, frame: u32, speed_ms: f64) -> Heartbeat {
    Heartbeat {
        time_ms,
        perf_ms,
        frame,
        speed_ms,
        score: None,
    }
}

#[test]
fn heartbeat_detector_abstains_below_two_beats() {
    let c = cfg();
    let mut sub = base_submission();
    sub.score = 200;
    sub.food_eaten = 20;
    sub.moves = vec![mv(Direction::Up, 1, 150.0)];
    sub.heartbeats = vec![beat(1000.0, 1000.0, 7, 150.0)];
    let v = run(&c.game, &c.detect, &sub, Some(42));
    assert_ne!(kind_of(&v), Some(CheatKind::TimingManipulation));
}

#[test]
fn compressed_heartbeat_intervals_are_timing_manipulation() {
    let c = cfg();
    let mut sub = base_submission();
    sub.score = 200;
    sub.food_eaten = 20;
    sub.moves = vec![mv(Direction::Up, 1, 150.0)];
    // 40 frames at ~150ms should take ~6s; the client reports 1s.
    sub.heartbeats = vec![
        beat(1000.0, 1000.0, 10, 150.0),
        beat(2000.0, 2000.0, 50, 150.0),
    ];
    let v = run(&c.game, &c.detect, &sub, Some(42));
    assert_eq!(kind_of(&v), Some(CheatKind::TimingManipulation));
}

#[test]
fn wall_vs_monotonic_divergence_is_flagged() {
    let c = cfg();
    let mut sub = base_submission();
    sub.score = 200;
    sub.food_eaten = 20;
    sub.moves = vec![mv(Direction::Up, 1, 150.0)];
    sub.heartbeats = vec![
        beat(1500.0, 1500.0, 10, 150.0),
        beat(3000.0, 9000.0, 20, 150.0),
    ];
    let v = run(&c.game, &c.detect, &sub, Some(42));
    assert_eq!(kind_of(&v), Some(CheatKind::TimingManipulation));
}

#[test]
fn consistent_heartbeats_pass() {
    let c = cfg();
    let mut sub = base_submission();
    sub.score = 100;
    sub.food_eaten = 10;
    sub.moves = vec![mv(Direction::Up, 1, 150.0)];
    sub.heartbeats = vec![
        beat(1500.0, 1501.0, 10, 150.0),
        beat(3010.0, 3012.0, 20, 150.0),
        beat(4490.0, 4493.0, 30, 148.0),
    ];
    let v = run(&c.game, &c.detect, &sub, Some(42));
    assert_ne!(kind_of(&v), Some(CheatKind::TimingManipulation));
}

#[test]
fn nonzero_score_with_empty_moves_is_missing_moves() {
    let c = cfg();
    let mut sub = base_submission();
    sub.score = 100;
    sub.food_eaten = 10;
    let v = run(&c.game, &c.detect, &sub, Some(42));
    assert_eq!(kind_of(&v), Some(CheatKind::MissingMoves));
}

#[test]
fn replay_divergence_carries_the_frame_log() {
    let c = cfg();
    let mut sub = base_submission();
    sub.seed = 7;
    sub.score = 50;
    sub.food_eaten = 5;
    sub.moves = vec![mv(Direction::Up, 1, 150.0)];
    sub.total_frames = 30;
    let v = run(&c.game, &c.detect, &sub, Some(7));
    match v {
        RuleVerdict::Cheat(f) => {
            assert_eq!(f.kind, CheatKind::ReplayFail);
            assert_eq!(
                f.reason,
                "Score mismatch: replay calculated 0, client sent 50"
            );
            let replay = f.replay.expect("replay verdict attached");
            assert!(!replay.frame_log.first.is_empty());
        }
        RuleVerdict::Legit => panic!("expected replay_fail"),
    }
}
