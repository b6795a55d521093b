//! End-to-end pipeline scenarios against a real service graph (temp data
//! dir, background workers running).

use std::sync::Arc;

use sg_core::{CheatKind, Config};
use sg_features::Normalizer;
use sg_logging::MetricsV1;
use sg_ml::{Mlp, ModelBundle, ModelVersionMeta};
use sg_server::{PipelineError, ScoreRequest, Services, SubmitOutcome};

fn test_config(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.server.data_dir = dir.to_string_lossy().to_string();
    // Predict on every submission so shadow behavior is observable at any
    // score, and keep background training cheap.
    config.ml.min_score_for_prediction = 0;
    config.training.epochs = 2;
    config.training.debounce_s = 3600;
    config
}

fn services() -> (tempfile::TempDir, Arc<Services>) {
    let dir = tempfile::tempdir().unwrap();
    let s = Services::build(test_config(dir.path())).unwrap();
    (dir, s)
}

/// A short honest game on seed 1: steer onto the first food at (21,29),
/// then curl into a self-collision on frame 23. Replays to score 10.
fn honest_game(fingerprint: &str) -> ScoreRequest {
    ScoreRequest {
        score: 10,
        speed_level: 1,
        fingerprint: fingerprint.to_string(),
        game_duration: 3.4,
        food_eaten: 1,
        seed: 1,
        moves: "2,7,1050;3,21,3090;0,22,3237;1,23,3384".to_string(),
        total_frames: 25,
        heartbeats: String::new(),
    }
}

/// Publish a model that calls everything a cheat (p ≈ 0.95) regardless of
/// features: zero final weights, large positive bias.
fn publish_paranoid_model(services: &Services) {
    let mut mlp = Mlp::init(0);
    mlp.w3.fill(0.0);
    mlp.b3[0] = 3.0;
    services.active.publish(ModelBundle {
        meta: ModelVersionMeta {
            version_id: "v999-rigged".to_string(),
            created_ts_ms: 0,
            arch: "dense_v1".to_string(),
            feature_schema_id: sg_features::FEATURE_SCHEMA_ID,
            metrics: MetricsV1::default(),
            train_samples: 0,
            val_samples: 0,
            synthetic_samples: 0,
            epochs: 0,
        },
        normalizer: Normalizer::identity(),
        mlp,
    });
}

#[test]
fn legitimate_short_game_is_accepted_and_ranked() {
    let (_dir, s) = services();
    s.registry.start("alice", 1);

    let outcome = s.pipeline.submit(honest_game("alice")).unwrap();
    match outcome {
        SubmitOutcome::Accepted(ack) => {
            assert_eq!(ack.best_score, 10);
            assert_eq!(ack.rank, 1);
            assert!(ack.is_new_best);
        }
        other => panic!("expected acceptance, got {other:?}"),
    }

    // Single-live-session invariant: the session is consumed.
    assert_eq!(s.registry.seed("alice"), None);
    assert!(s.registry.is_empty());

    let fame = s.store.hall_of_fame(10).unwrap();
    assert_eq!(fame.len(), 1);
    assert_eq!(fame[0].player_id, "alice");

    s.shutdown();
}

#[test]
fn speed_hack_rejects_without_replay_and_records_everything() {
    let (dir, s) = services();
    s.registry.start("mallory", 5);

    let req = ScoreRequest {
        score: 100,
        speed_level: 20,
        fingerprint: "mallory".to_string(),
        game_duration: 10.0,
        food_eaten: 10,
        seed: 5,
        moves: "1,5,750".to_string(),
        total_frames: 40,
        heartbeats: String::new(),
    };
    let outcome = s.pipeline.submit(req).unwrap();
    match outcome {
        SubmitOutcome::CheatDetected { kind, .. } => assert_eq!(kind, CheatKind::SpeedHack),
        other => panic!("expected speed_hack, got {other:?}"),
    }

    // Cheat recorded, labeled sample stored, operator event written.
    let shame = s.store.hall_of_shame(10).unwrap();
    assert_eq!(shame.len(), 1);
    assert_eq!(shame[0].last.kind, "speed_hack");
    assert!(s.samples.count().unwrap() >= 1);
    let events: Vec<serde_json::Value> =
        sg_logging::read_ndjson(dir.path().join("cheat_detections.ndjson")).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["kind"], "speed_hack");

    // The rejected session is kept until TTL or a successful run.
    assert_eq!(s.registry.seed("mallory"), Some(5));

    s.shutdown();
}

#[test]
fn replay_divergence_reports_the_calculated_score() {
    let (_dir, s) = services();
    s.registry.start("trudy", 7);

    let req = ScoreRequest {
        score: 50,
        speed_level: 1,
        fingerprint: "trudy".to_string(),
        game_duration: 2.0,
        food_eaten: 5,
        seed: 7,
        moves: "0,1,150".to_string(),
        total_frames: 30,
        heartbeats: String::new(),
    };
    match s.pipeline.submit(req).unwrap() {
        SubmitOutcome::CheatDetected { kind, reason } => {
            assert_eq!(kind, CheatKind::ReplayFail);
            assert_eq!(reason, "Score mismatch: replay calculated 0, client sent 50");
        }
        other => panic!("expected replay_fail, got {other:?}"),
    }
    s.shutdown();
}

#[test]
fn fifteen_second_pause_is_pause_abuse() {
    let (_dir, s) = services();
    s.registry.start("pauser", 9);

    let req = ScoreRequest {
        score: 0,
        speed_level: 1,
        fingerprint: "pauser".to_string(),
        game_duration: 180.0,
        food_eaten: 0,
        seed: 9,
        moves: "0,5,750;1,10,1500;2,120,16500".to_string(),
        total_frames: 130,
        heartbeats: String::new(),
    };
    match s.pipeline.submit(req).unwrap() {
        SubmitOutcome::CheatDetected { kind, .. } => assert_eq!(kind, CheatKind::PauseAbuse),
        other => panic!("expected pause_abuse, got {other:?}"),
    }
    s.shutdown();
}

#[test]
fn excessive_moves_per_food_at_high_score_is_bot_usage() {
    let (_dir, s) = services();
    s.registry.start("bot", 3);

    // 750 moves for 150 food: ratio 5.
    let mut moves = String::new();
    let dirs = [0u8, 1, 2, 1];
    for i in 0..750u32 {
        if i > 0 {
            moves.push(';');
        }
        let d = dirs[(i % 4) as usize];
        moves.push_str(&format!("{d},{},{}", i + 1, (i + 1) * 100));
    }
    let req = ScoreRequest {
        score: 1500,
        speed_level: 16,
        fingerprint: "bot".to_string(),
        game_duration: 150.0,
        food_eaten: 150,
        seed: 3,
        moves,
        total_frames: 800,
        heartbeats: String::new(),
    };
    match s.pipeline.submit(req).unwrap() {
        SubmitOutcome::CheatDetected { kind, .. } => assert_eq!(kind, CheatKind::BotUsage),
        other => panic!("expected bot_usage, got {other:?}"),
    }
    s.shutdown();
}

#[test]
fn suspicious_probability_on_accepted_run_logs_a_flagged_edge_case() {
    let (_dir, s) = services();
    publish_paranoid_model(&s);
    s.registry.start("bob", 1);

    let before = s.edge_log.count();
    match s.pipeline.submit(honest_game("bob")).unwrap() {
        SubmitOutcome::Accepted(_) => {}
        other => panic!("shadow mode must not reject, got {other:?}"),
    }
    assert_eq!(s.edge_log.count(), before + 1);

    let recent = s.edge_log.recent(1).unwrap();
    assert_eq!(recent[0].edge_type, sg_edge::EdgeType::RulesNegativeMlPositive);
    assert!(recent[0].should_flag);
    assert!(recent[0].ml_probability > 0.9);
    assert_eq!(recent[0].rule_verdict, "legit");

    s.shutdown();
}

#[test]
fn acceptance_is_independent_of_the_model_probability() {
    // Same game, no model (p=0.5) vs paranoid model (p≈0.95): both accept.
    let (_dir, a) = services();
    a.registry.start("carol", 1);
    assert!(matches!(
        a.pipeline.submit(honest_game("carol")).unwrap(),
        SubmitOutcome::Accepted(_)
    ));
    a.shutdown();

    let (_dir2, b) = services();
    publish_paranoid_model(&b);
    b.registry.start("carol", 1);
    assert!(matches!(
        b.pipeline.submit(honest_game("carol")).unwrap(),
        SubmitOutcome::Accepted(_)
    ));
    b.shutdown();
}

#[test]
fn eleventh_submission_in_the_window_is_rate_limited() {
    let (_dir, s) = services();
    for _ in 0..10 {
        // Out-of-range scores fail validation but still consume the window.
        let req = ScoreRequest {
            score: 20_000,
            speed_level: 1,
            fingerprint: "spammer".to_string(),
            game_duration: 1.0,
            food_eaten: 0,
            seed: 1,
            moves: String::new(),
            total_frames: 10,
            heartbeats: String::new(),
        };
        assert!(matches!(
            s.pipeline.submit(req),
            Err(PipelineError::Validation(_))
        ));
    }
    let req = ScoreRequest {
        score: 0,
        speed_level: 1,
        fingerprint: "spammer".to_string(),
        game_duration: 1.0,
        food_eaten: 0,
        seed: 1,
        moves: String::new(),
        total_frames: 10,
        heartbeats: String::new(),
    };
    assert!(matches!(
        s.pipeline.submit(req),
        Err(PipelineError::RateLimited)
    ));
    s.shutdown();
}

#[test]
fn missing_session_is_an_invalid_session_cheat() {
    let (_dir, s) = services();
    let req = honest_game("ghost");
    match s.pipeline.submit(req).unwrap() {
        SubmitOutcome::CheatDetected { kind, .. } => {
            assert_eq!(kind, CheatKind::InvalidSession)
        }
        other => panic!("expected invalid_session, got {other:?}"),
    }
    s.shutdown();
}

#[test]
fn game_start_issues_a_session_with_that_seed() {
    let (_dir, s) = services();
    let seed = s.pipeline.start_game("dave").unwrap();
    assert_eq!(s.registry.seed("dave"), Some(seed));
    // A second start replaces the first (single live session).
    let seed2 = s.pipeline.start_game("dave").unwrap();
    assert_eq!(s.registry.len(), 1);
    assert_eq!(s.registry.seed("dave"), Some(seed2));
    s.shutdown();
}
