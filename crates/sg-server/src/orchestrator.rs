//! The submission pipeline.
//!
//! A linear sequence of fallible stages: rate limit → field validation →
//! session lookup → rule detectors (replay last) → feature extraction →
//! shadow prediction → edge-case arbitration → persistence. The accept or
//! reject decision is fixed by the rule verdict before the predictor is
//! consulted; the probability only feeds the edge log and training signal.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;
use thiserror::Error;

use sg_core::{CheatKind, Config, Submission};
use sg_detect::RuleVerdict;
use sg_edge::{EdgeCaseLog, EdgeCaseRecord};
use sg_logging::{CheatEventV1, EventLog};
use sg_ml::Predictor;
use sg_store::{CheatIncident, ScoreAck, ScoreStore, TrainingSample, TrainingSampleStore};
use sg_train::TrainingWorker;

use crate::ratelimit::RateLimiter;
use crate::session::SessionRegistry;

/// Wire shape of a score submission (§ external interfaces). `moves` and
/// `heartbeats` are the compact semicolon-delimited logs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRequest {
    pub score: u32,
    pub speed_level: u32,
    pub fingerprint: String,
    pub game_duration: f64,
    pub food_eaten: u32,
    pub seed: u32,
    pub moves: String,
    pub total_frames: u32,
    #[serde(default)]
    pub heartbeats: String,
}

/// A decided submission. Both arms are ordinary outcomes, not errors.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    Accepted(ScoreAck),
    CheatDetected { kind: CheatKind, reason: String },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("rate limited")]
    RateLimited,
    #[error("invalid submission: {0}")]
    Validation(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub struct Pipeline {
    config: Config,
    registry: Arc<SessionRegistry>,
    limiter: Arc<RateLimiter>,
    store: Arc<dyn ScoreStore>,
    samples: Arc<TrainingSampleStore>,
    edge_log: Arc<EdgeCaseLog>,
    predictor: Predictor,
    worker: Arc<TrainingWorker>,
    cheat_log: Mutex<EventLog>,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        registry: Arc<SessionRegistry>,
        limiter: Arc<RateLimiter>,
        store: Arc<dyn ScoreStore>,
        samples: Arc<TrainingSampleStore>,
        edge_log: Arc<EdgeCaseLog>,
        predictor: Predictor,
        worker: Arc<TrainingWorker>,
        cheat_log: EventLog,
    ) -> Self {
        Self {
            config,
            registry,
            limiter,
            store,
            samples,
            edge_log,
            predictor,
            worker,
            cheat_log: Mutex::new(cheat_log),
        }
    }

    /// Handle `game/start`: issue a seed and open (or replace) the session.
    pub fn start_game(&self, fingerprint: &str) -> Result<u32, PipelineError> {
        let player_id = player_id_from(fingerprint)?;
        let seed: u32 = rand::random();
        self.registry.start(&player_id, seed);
        tracing::debug!(player = %player_id, seed, "game session started");
        Ok(seed)
    }

    /// Handle a `score` submission end to end.
    pub fn submit(&self, req: ScoreRequest) -> Result<SubmitOutcome, PipelineError> {
        let player_id = player_id_from(&req.fingerprint)?;

        if !self.limiter.check(&player_id) {
            return Err(PipelineError::RateLimited);
        }

        let sub = self.validate(&player_id, &req)?;
        let session_seed = self.registry.seed(&player_id);

        // The decision is made here, by rules alone.
        let verdict = sg_detect::run(&self.config.game, &self.config.detect, &sub, session_seed);

        // Shadow branch: never changes the decision above.
        let features = sg_features::extract(&sub);
        let probability = self.predictor.predict(sub.score, &features);
        if let Some(p) = probability {
            let ml = &self.config.ml;
            if let Some(edge_type) =
                sg_edge::classify(verdict.is_cheat(), p, ml.low_threshold, ml.high_threshold)
            {
                let record = EdgeCaseRecord::new(
                    player_id.clone(),
                    sub.score,
                    verdict.is_cheat(),
                    p,
                    edge_type,
                    features,
                );
                if record.should_flag {
                    tracing::info!(player = %player_id, probability = p, ?edge_type,
                        "submission flagged for human review");
                }
                if let Err(e) = self.edge_log.append(&record) {
                    tracing::warn!(error = %e, "failed to append edge case");
                }
            }
        }

        match verdict {
            RuleVerdict::Cheat(finding) => {
                self.store
                    .record_cheat(
                        &player_id,
                        CheatIncident {
                            kind: finding.kind.as_str().to_string(),
                            reason: finding.reason.clone(),
                            score: sub.score,
                            ts_ms: sg_logging::now_ms(),
                        },
                    )
                    .map_err(|e| PipelineError::Internal(e.to_string()))?;

                self.append_sample(&sub, 1.0, finding.kind.as_str());
                self.log_cheat_event(&sub, &finding);
                self.worker.request("cheat_event");

                tracing::info!(player = %player_id, kind = finding.kind.as_str(),
                    reason = %finding.reason, "submission rejected");
                Ok(SubmitOutcome::CheatDetected {
                    kind: finding.kind,
                    reason: finding.reason,
                })
            }
            RuleVerdict::Legit => {
                self.registry.remove(&player_id);
                let ack = self
                    .store
                    .record_score(&player_id, sub.score)
                    .map_err(|e| PipelineError::Internal(e.to_string()))?;
                self.append_sample(&sub, 0.0, "legit");
                tracing::debug!(player = %player_id, score = sub.score, rank = ack.rank,
                    "submission accepted");
                Ok(SubmitOutcome::Accepted(ack))
            }
        }
    }

    fn validate(&self, player_id: &str, req: &ScoreRequest) -> Result<Submission, PipelineError> {
        if req.score > 10_000 {
            return Err(PipelineError::Validation(format!(
                "score {} out of range",
                req.score
            )));
        }
        if req.total_frames > self.config.game.max_frames {
            return Err(PipelineError::Validation(format!(
                "totalFrames {} out of range",
                req.total_frames
            )));
        }
        if req.speed_level == 0 {
            return Err(PipelineError::Validation("speedLevel must be positive".into()));
        }
        if !req.game_duration.is_finite() || req.game_duration < 0.0 {
            return Err(PipelineError::Validation("gameDuration out of range".into()));
        }

        let moves = sg_codec::decode_moves(&req.moves)
            .map_err(|e| PipelineError::Validation(e.to_string()))?;
        let heartbeats = sg_codec::decode_heartbeats(&req.heartbeats)
            .map_err(|e| PipelineError::Validation(e.to_string()))?;

        Ok(Submission {
            player_id: player_id.to_string(),
            score: req.score,
            speed_level: req.speed_level,
            food_eaten: req.food_eaten,
            game_duration_s: req.game_duration,
            seed: req.seed,
            moves,
            heartbeats,
            total_frames: req.total_frames,
        })
    }

    /// Training signal is best-effort: a full sample store must never block
    /// a player's result.
    fn append_sample(&self, sub: &Submission, label: f64, source: &str) {
        let sample = TrainingSample {
            ts_ms: sg_logging::now_ms(),
            player_id: sub.player_id.clone(),
            label,
            source: source.to_string(),
            synthetic: false,
            features: sg_features::extract(sub),
        };
        if let Err(e) = self.samples.append(&sample) {
            tracing::warn!(error = %e, "failed to store training sample");
        }
    }

    /// Operator record with the capped replay log; best-effort as well.
    fn log_cheat_event(&self, sub: &Submission, finding: &sg_detect::CheatFinding) {
        let replay = finding
            .replay
            .as_ref()
            .and_then(|v| serde_json::to_value(&v.frame_log).ok());
        let event = CheatEventV1 {
            event: CheatEventV1::EVENT,
            ts_ms: sg_logging::now_ms(),
            player_id: sub.player_id.clone(),
            kind: finding.kind.as_str().to_string(),
            reason: finding.reason.clone(),
            score: sub.score,
            food_eaten: sub.food_eaten,
            seed: sub.seed,
            game_duration_s: sub.game_duration_s,
            replay,
        };
        let mut log = self.cheat_log.lock();
        if let Err(e) = log.append(&event) {
            tracing::warn!(error = %e, "failed to append cheat event");
        }
    }
}

fn player_id_from(fingerprint: &str) -> Result<String, PipelineError> {
    let fp = fingerprint.trim();
    if fp.is_empty() {
        return Err(PipelineError::Auth("missing fingerprint".into()));
    }
    Ok(fp.to_string())
}
