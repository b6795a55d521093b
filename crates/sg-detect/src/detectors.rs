//! Detector chain implementation.

use serde::{Deserialize, Serialize};
use sg_core::{CheatKind, DetectConfig, GameRules, Submission};
use sg_replay::ReplayVerdict;

/// What a fired detector found.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheatFinding {
    pub kind: CheatKind,
    pub reason: String,
    /// Present only when the replay rule fired; carries the capped frame log
    /// for the operator cheat log.
    pub replay: Option<ReplayVerdict>,
}

impl CheatFinding {
    fn new(kind: CheatKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
            replay: None,
        }
    }
}

/// Outcome of the full detector chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RuleVerdict {
    Legit,
    Cheat(CheatFinding),
}

impl RuleVerdict {
    pub fn is_cheat(&self) -> bool {
        matches!(self, RuleVerdict::Cheat(_))
    }
}

/// Run the detector chain over a submission.
///
/// `session_seed` is the seed of the player's live session, or `None` when
/// no session exists. Order is fixed: score-vs-food, speed floor, session
/// seed, pause gaps, bot ratio, heartbeat consistency, missing moves, and
/// finally full replay. The first finding wins.
pub fn run(
    rules: &GameRules,
    cfg: &DetectConfig,
    sub: &Submission,
    session_seed: Option<u32>,
) -> RuleVerdict {
    let checks: [fn(&DetectConfig, &Submission, Option<u32>) -> Option<CheatFinding>; 7] = [
        check_score_vs_food,
        check_speed_floor,
        check_session_seed,
        check_pause_gaps,
        check_bot_ratio,
        check_heartbeats,
        check_missing_moves,
    ];
    for check in checks {
        if let Some(finding) = check(cfg, sub, session_seed) {
            return RuleVerdict::Cheat(finding);
        }
    }

    // A zero game with no moves has nothing to replay.
    if sub.moves.is_empty() && sub.score == 0 && sub.food_eaten == 0 {
        return RuleVerdict::Legit;
    }

    let verdict = sg_replay::verify(rules, cfg, sub);
    if verdict.passed {
        RuleVerdict::Legit
    } else {
        let mut finding = CheatFinding::new(CheatKind::ReplayFail, verdict.reason());
        finding.replay = Some(verdict);
        RuleVerdict::Cheat(finding)
    }
}

fn check_score_vs_food(
    cfg: &DetectConfig,
    sub: &Submission,
    _session_seed: Option<u32>,
) -> Option<CheatFinding> {
    let expected = sub.food_eaten.saturating_mul(10);
    let tolerance = if sub.food_eaten <= cfg.low_food_threshold {
        cfg.score_tolerance
    } else {
        0
    };
    if sub.score.abs_diff(expected) > tolerance {
        return Some(CheatFinding::new(
            CheatKind::ScoreMismatch,
            format!(
                "score {} does not match food eaten {} (expected {})",
                sub.score, sub.food_eaten, expected
            ),
        ));
    }
    None
}

fn check_speed_floor(
    cfg: &DetectConfig,
    sub: &Submission,
    _session_seed: Option<u32>,
) -> Option<CheatFinding> {
    if sub.speed_level > cfg.speed_floor_level
        && sub.game_duration_s < sub.speed_level as f64 * cfg.speed_floor_factor
    {
        return Some(CheatFinding::new(
            CheatKind::SpeedHack,
            format!(
                "speed level {} unreachable in {}s",
                sub.speed_level, sub.game_duration_s
            ),
        ));
    }
    None
}

fn check_session_seed(
    _cfg: &DetectConfig,
    sub: &Submission,
    session_seed: Option<u32>,
) -> Option<CheatFinding> {
    match session_seed {
        None => Some(CheatFinding::new(
            CheatKind::InvalidSession,
            "no active game session for player",
        )),
        Some(seed) if seed != sub.seed => Some(CheatFinding::new(
            CheatKind::InvalidSession,
            format!("submitted seed {} does not match session seed {seed}", sub.seed),
        )),
        Some(_) => None,
    }
}

fn check_pause_gaps(
    cfg: &DetectConfig,
    sub: &Submission,
    _session_seed: Option<u32>,
) -> Option<CheatFinding> {
    let mut suspicious = 0u32;
    let mut largest_ms = 0.0f64;
    for pair in sub.moves.windows(2) {
        let gap = pair[1].time_ms - pair[0].time_ms;
        if gap > cfg.pause_gap_ms {
            suspicious += 1;
            if gap > largest_ms {
                largest_ms = gap;
            }
        }
    }
    if suspicious >= cfg.max_suspicious_gaps {
        return Some(CheatFinding::new(
            CheatKind::PauseAbuse,
            format!(
                "{suspicious} suspicious gap(s), largest {:.0}s",
                largest_ms / 1000.0
            ),
        ));
    }
    None
}

fn check_bot_ratio(
    cfg: &DetectConfig,
    sub: &Submission,
    _session_seed: Option<u32>,
) -> Option<CheatFinding> {
    if sub.score <= cfg.bot_min_score {
        return None;
    }
    let ratio = sub.moves.len() as f64 / sub.food_eaten.max(1) as f64;
    if ratio > cfg.bot_moves_per_food {
        return Some(CheatFinding::new(
            CheatKind::BotUsage,
            format!("{:.1} moves per food at score {}", ratio, sub.score),
        ));
    }
    None
}

fn check_heartbeats(
    cfg: &DetectConfig,
    sub: &Submission,
    _session_seed: Option<u32>,
) -> Option<CheatFinding> {
    // Abstains on short games and sparse telemetry.
    if sub.score < cfg.heartbeat_min_score || sub.heartbeats.len() < 2 {
        return None;
    }

    for (i, pair) in sub.heartbeats.windows(2).enumerate() {
        let (a, b) = (&pair[0], &pair[1]);
        let frame_delta = b.frame.saturating_sub(a.frame) as f64;
        let avg_speed = (a.speed_ms + b.speed_ms) / 2.0;
        let expected = frame_delta * avg_speed;
        let observed = b.time_ms - a.time_ms;
        let tolerance = cfg
            .heartbeat_tolerance_floor_ms
            .max(expected * cfg.heartbeat_tolerance_frac);
        if (observed - expected).abs() > tolerance {
            return Some(CheatFinding::new(
                CheatKind::TimingManipulation,
                format!(
                    "heartbeat {i}: observed {observed:.0}ms vs expected {expected:.0}ms over {frame_delta} frames"
                ),
            ));
        }
    }

    for (i, h) in sub.heartbeats.iter().enumerate() {
        if (h.time_ms - h.perf_ms).abs() > cfg.clock_divergence_ms {
            return Some(CheatFinding::new(
                CheatKind::TimingManipulation,
                format!(
                    "heartbeat {i}: wall clock diverges {:.0}ms from monotonic clock",
                    (h.time_ms - h.perf_ms).abs()
                ),
            ));
        }
    }

    let first = &sub.heartbeats[0];
    let last = &sub.heartbeats[sub.heartbeats.len() - 1];
    let frames = last.frame.saturating_sub(first.frame) as f64;
    if frames > 0.0 {
        let ms_per_frame = (last.time_ms - first.time_ms) / frames;
        if ms_per_frame < cfg.ms_per_frame_min || ms_per_frame > cfg.ms_per_frame_max {
            return Some(CheatFinding::new(
                CheatKind::TimingManipulation,
                format!("global pace {ms_per_frame:.1}ms/frame outside plausible band"),
            ));
        }
    }
    None
}

fn check_missing_moves(
    _cfg: &DetectConfig,
    sub: &Submission,
    _session_seed: Option<u32>,
) -> Option<CheatFinding> {
    if sub.moves.is_empty() && (sub.score > 0 || sub.food_eaten > 0) {
        return Some(CheatFinding::new(
            CheatKind::MissingMoves,
            format!("score {} submitted with an empty move log", sub.score),
        ));
    }
    None
}
