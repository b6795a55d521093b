//! Seeded synthetic submissions for training bootstrap.
//!
//! Four cheat archetypes and three skill archetypes, each emitting full
//! move/heartbeat sequences that go through the real feature extractor.
//! Everything is a pure function of the seed so tests (and reruns of the
//! same training set) are reproducible. Parameter ranges are chosen so the
//! archetypes land in distinct feature regions; they still overlap at the
//! edges, which is a known limit of bootstrap-only training.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;

use sg_core::{Direction, Heartbeat, Move, Submission};
use sg_store::TrainingSample;

/// The seven generator profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Archetype {
    SpeedHack,
    Bot,
    PauseAbuse,
    TimingManipulation,
    Beginner,
    Intermediate,
    Expert,
}

impl Archetype {
    pub const ALL: [Archetype; 7] = [
        Archetype::SpeedHack,
        Archetype::Bot,
        Archetype::PauseAbuse,
        Archetype::TimingManipulation,
        Archetype::Beginner,
        Archetype::Intermediate,
        Archetype::Expert,
    ];

    pub fn is_cheat(&self) -> bool {
        matches!(
            self,
            Archetype::SpeedHack
                | Archetype::Bot
                | Archetype::PauseAbuse
                | Archetype::TimingManipulation
        )
    }

    pub fn label(&self) -> f64 {
        if self.is_cheat() {
            1.0
        } else {
            0.0
        }
    }

    pub fn source(&self) -> &'static str {
        match self {
            Archetype::SpeedHack => "synthetic_speed_hack",
            Archetype::Bot => "synthetic_bot",
            Archetype::PauseAbuse => "synthetic_pause_abuse",
            Archetype::TimingManipulation => "synthetic_timing_manipulation",
            Archetype::Beginner => "synthetic_beginner",
            Archetype::Intermediate => "synthetic_intermediate",
            Archetype::Expert => "synthetic_expert",
        }
    }
}

/// Generate `per_archetype` submissions per profile and extract features.
///
/// Deterministic in `seed`: the same seed yields identical samples.
pub fn generate_synthetic(seed: u64, per_archetype: usize) -> Vec<TrainingSample> {
    let mut out = Vec::with_capacity(per_archetype * Archetype::ALL.len());
    for (ai, archetype) in Archetype::ALL.iter().enumerate() {
        for i in 0..per_archetype {
            let mut rng = ChaCha8Rng::seed_from_u64(seed ^ ((ai as u64) << 32) ^ i as u64);
            let sub = generate_one(*archetype, &mut rng);
            out.push(TrainingSample {
                ts_ms: 0,
                player_id: format!("synthetic:{}:{i}", archetype.source()),
                label: archetype.label(),
                source: archetype.source().to_string(),
                synthetic: true,
                features: sg_features::extract(&sub),
            });
        }
    }
    out
}

/// One synthetic submission for a profile.
pub fn generate_one(archetype: Archetype, rng: &mut ChaCha8Rng) -> Submission {
    match archetype {
        Archetype::SpeedHack => speed_hack(rng),
        Archetype::Bot => bot(rng),
        Archetype::PauseAbuse => pause_abuse(rng),
        Archetype::TimingManipulation => timing_manipulation(rng),
        Archetype::Beginner => skill(rng, 1..9, 250.0..900.0, 60.0),
        Archetype::Intermediate => skill(rng, 10..41, 150.0..500.0, 25.0),
        Archetype::Expert => skill(rng, 40..121, 80.0..250.0, 8.0),
    }
}

fn random_direction(rng: &mut ChaCha8Rng, prev: Direction) -> Direction {
    // Anything but the inverse; the client never commits a reversal.
    loop {
        let d = Direction::from_u8(rng.gen_range(0..4)).expect("in range");
        if d != prev.inverse() {
            return d;
        }
    }
}

/// Build a move log with inter-move deltas drawn from `delta_range`,
/// frames advancing at roughly `speed_ms` per frame.
fn gen_moves(
    rng: &mut ChaCha8Rng,
    count: usize,
    delta_range: std::ops::Range<f64>,
    speed_ms: f64,
) -> Vec<Move> {
    let mut moves = Vec::with_capacity(count);
    let mut t = 0.0f64;
    let mut dir = Direction::Right;
    for _ in 0..count {
        t += rng.gen_range(delta_range.clone());
        dir = random_direction(rng, dir);
        let frame = (t / speed_ms).max(1.0) as u32;
        moves.push(Move {
            direction: dir,
            frame,
            time_ms: t,
        });
    }
    moves
}

/// Heartbeats at ~1s cadence with the given jitter and clock drift.
fn gen_heartbeats(
    rng: &mut ChaCha8Rng,
    duration_ms: f64,
    speed_ms: f64,
    jitter_ms: f64,
    drift_ms: f64,
) -> Vec<Heartbeat> {
    let beats = (duration_ms / 1000.0) as usize;
    let mut out = Vec::with_capacity(beats);
    for i in 1..=beats {
        let t = i as f64 * 1000.0 + rng.gen_range(-jitter_ms..=jitter_ms);
        let frame = (t / speed_ms).max(1.0) as u32;
        out.push(Heartbeat {
            time_ms: t,
            perf_ms: t + rng.gen_range(-drift_ms..=drift_ms),
            frame,
            speed_ms,
            score: None,
        });
    }
    out
}

fn assemble(
    seed: u32,
    score: u32,
    food: u32,
    speed_level: u32,
    duration_s: f64,
    moves: Vec<Move>,
    heartbeats: Vec<Heartbeat>,
) -> Submission {
    let total_frames = moves
        .last()
        .map(|m| m.frame.saturating_add(5))
        .unwrap_or(10)
        .min(10_000);
    Submission {
        player_id: "synthetic".to_string(),
        score,
        speed_level,
        food_eaten: food,
        game_duration_s: duration_s,
        seed,
        moves,
        heartbeats,
        total_frames,
    }
}

/// Impossible pace: a high speed level reached in far too little wall time.
fn speed_hack(rng: &mut ChaCha8Rng) -> Submission {
    let food = rng.gen_range(30..121u32);
    let score = food * 10;
    let speed_level = (food / 10 + 1).max(8);
    let duration_s = speed_level as f64 * rng.gen_range(0.4..1.2);
    let moves = gen_moves(rng, (food as usize) * 2, 35.0..90.0, 50.0);
    let heartbeats = gen_heartbeats(rng, duration_s * 1000.0, 50.0, 30.0, 20.0);
    assemble(rng.gen(), score, food, speed_level, duration_s, moves, heartbeats)
}

/// Machine-regular input: many moves per food with near-zero timing
/// variance at a score no human reaches that inefficiently.
fn bot(rng: &mut ChaCha8Rng) -> Submission {
    let food = rng.gen_range(110..251u32);
    let score = food * 10;
    let ratio = rng.gen_range(4.5..7.0);
    let base = rng.gen_range(120.0..200.0);
    let moves = gen_moves(
        rng,
        (food as f64 * ratio) as usize,
        base..(base + 6.0),
        140.0,
    );
    let duration_s = moves.last().map(|m| m.time_ms / 1000.0).unwrap_or(60.0);
    let heartbeats = gen_heartbeats(rng, duration_s * 1000.0, 140.0, 15.0, 10.0);
    assemble(
        rng.gen(),
        score,
        food,
        food / 10 + 1,
        duration_s,
        moves,
        heartbeats,
    )
}

/// Ordinary play interrupted by long silences.
fn pause_abuse(rng: &mut ChaCha8Rng) -> Submission {
    let food = rng.gen_range(10..41u32);
    let score = food * 10;
    let mut moves = gen_moves(rng, (food as usize) * 3, 200.0..600.0, 145.0);
    // Shift everything after a random cut by one long pause.
    let pauses = rng.gen_range(1..4);
    for _ in 0..pauses {
        if moves.len() < 2 {
            break;
        }
        let cut = rng.gen_range(1..moves.len());
        let pause = rng.gen_range(12_000.0..30_000.0);
        for m in &mut moves[cut..] {
            m.time_ms += pause;
            m.frame = (m.time_ms / 145.0).max(1.0) as u32;
        }
    }
    let duration_s = moves.last().map(|m| m.time_ms / 1000.0).unwrap_or(60.0);
    // Heartbeats inherit the same silences: cadence beats with the pause
    // windows removed.
    let mut heartbeats = gen_heartbeats(rng, duration_s * 1000.0, 145.0, 25.0, 15.0);
    // Drop two consecutive beats periodically so each silence is a clear
    // multi-second heartbeat gap.
    let keep_every = rng.gen_range(6..12);
    let mut i = 0usize;
    heartbeats.retain(|_| {
        i += 1;
        i < 3 || (i % keep_every) >= 2
    });
    assemble(
        rng.gen(),
        score,
        food,
        food / 10 + 1,
        duration_s,
        moves,
        heartbeats,
    )
}

/// Believable play but the wall clock and the monotonic clock disagree.
fn timing_manipulation(rng: &mut ChaCha8Rng) -> Submission {
    let food = rng.gen_range(20..81u32);
    let score = food * 10;
    let moves = gen_moves(rng, (food as usize) * 3, 150.0..450.0, 145.0);
    let duration_s = moves.last().map(|m| m.time_ms / 1000.0).unwrap_or(60.0);
    let drift = rng.gen_range(6_000.0..20_000.0);
    let mut heartbeats = gen_heartbeats(rng, duration_s * 1000.0, 145.0, 25.0, 10.0);
    for h in &mut heartbeats {
        h.perf_ms += drift;
    }
    assemble(
        rng.gen(),
        score,
        food,
        food / 10 + 1,
        duration_s,
        moves,
        heartbeats,
    )
}

/// Honest play at a given skill band.
fn skill(
    rng: &mut ChaCha8Rng,
    food_range: std::ops::Range<u32>,
    delta_range: std::ops::Range<f64>,
    jitter_ms: f64,
) -> Submission {
    let food = rng.gen_range(food_range);
    let score = food * 10;
    let ratio = rng.gen_range(2.0..3.5);
    let moves = gen_moves(rng, (food as f64 * ratio).max(2.0) as usize, delta_range, 145.0);
    let duration_s = moves.last().map(|m| m.time_ms / 1000.0).unwrap_or(10.0);
    let heartbeats = gen_heartbeats(rng, duration_s * 1000.0, 145.0, jitter_ms, 20.0);
    assemble(
        rng.gen(),
        score,
        food,
        food / 10 + 1,
        duration_s,
        moves,
        heartbeats,
    )
}
