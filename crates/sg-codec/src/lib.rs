//! sg-codec: Text codec for the compact move and heartbeat logs.
//!
//! The browser records every direction change as a `d,f,t` triple and every
//! heartbeat as a `t,p,f,s[,score]` tuple, each joined with `;`. The format
//! is fixed by deployed clients; this crate only adds server-side bounds.
//!
//! Decoding is lenient entry-by-entry (a garbled entry is dropped, the rest
//! of the log still parses) but strict on payload size: oversized payloads
//! are rejected before any parsing.

use sg_core::{Direction, Heartbeat, Move};
use thiserror::Error;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum accepted size of an encoded move log.
pub const MAX_MOVES_BYTES: usize = 50_000;

/// Maximum accepted size of an encoded heartbeat log.
pub const MAX_HEARTBEATS_BYTES: usize = 10_000;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("payload too large: {len} > {max} bytes")]
    PayloadTooLarge { len: usize, max: usize },
}

/// Decode a `;`-separated move log.
///
/// Accepts the current `d,f,t` form and the legacy `d,t` form (treated as
/// frame 0). Entries that fail numeric parse are dropped silently, matching
/// the tolerance deployed clients rely on.
pub fn decode_moves(s: &str) -> Result<Vec<Move>, CodecError> {
    if s.len() > MAX_MOVES_BYTES {
        return Err(CodecError::PayloadTooLarge {
            len: s.len(),
            max: MAX_MOVES_BYTES,
        });
    }
    let mut out = Vec::new();
    for entry in s.split(';') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        if let Some(m) = parse_move(entry) {
            out.push(m);
        }
    }
    Ok(out)
}

fn parse_move(entry: &str) -> Option<Move> {
    let mut parts = entry.split(',');
    let d: u8 = parts.next()?.trim().parse().ok()?;
    let direction = Direction::from_u8(d)?;
    let second = parts.next()?.trim();
    match parts.next() {
        Some(third) => {
            // d,f,t
            let frame: u32 = second.parse().ok()?;
            let time_ms: f64 = third.trim().parse().ok()?;
            if parts.next().is_some() || !time_ms.is_finite() || time_ms < 0.0 {
                return None;
            }
            Some(Move {
                direction,
                frame,
                time_ms,
            })
        }
        None => {
            // Legacy d,t: no frame information.
            let time_ms: f64 = second.parse().ok()?;
            if !time_ms.is_finite() || time_ms < 0.0 {
                return None;
            }
            Some(Move {
                direction,
                frame: 0,
                time_ms,
            })
        }
    }
}

/// Encode a move log in canonical `d,f,t` form.
pub fn encode_moves(moves: &[Move]) -> String {
    let mut out = String::new();
    for (i, m) in moves.iter().enumerate() {
        if i > 0 {
            out.push(';');
        }
        out.push_str(&format!("{},{},{}", m.direction as u8, m.frame, m.time_ms));
    }
    out
}

/// Decode a `;`-separated heartbeat log (`t,p,f,s[,score]` tuples).
pub fn decode_heartbeats(s: &str) -> Result<Vec<Heartbeat>, CodecError> {
    if s.len() > MAX_HEARTBEATS_BYTES {
        return Err(CodecError::PayloadTooLarge {
            len: s.len(),
            max: MAX_HEARTBEATS_BYTES,
        });
    }
    let mut out = Vec::new();
    for entry in s.split(';') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        if let Some(h) = parse_heartbeat(entry) {
            out.push(h);
        }
    }
    Ok(out)
}

fn parse_heartbeat(entry: &str) -> Option<Heartbeat> {
    let mut parts = entry.split(',');
    let time_ms: f64 = parts.next()?.trim().parse().ok()?;
    let perf_ms: f64 = parts.next()?.trim().parse().ok()?;
    let frame: u32 = parts.next()?.trim().parse().ok()?;
    let speed_ms: f64 = parts.next()?.trim().parse().ok()?;
    let score = match parts.next() {
        Some(v) => Some(v.trim().parse::<u32>().ok()?),
        None => None,
    };
    if parts.next().is_some() {
        return None;
    }
    if !time_ms.is_finite() || !perf_ms.is_finite() || !speed_ms.is_finite() {
        return None;
    }
    Some(Heartbeat {
        time_ms,
        perf_ms,
        frame,
        speed_ms,
        score,
    })
}

/// Encode a heartbeat log in canonical form.
pub fn encode_heartbeats(beats: &[Heartbeat]) -> String {
    let mut out = String::new();
    for (i, h) in beats.iter().enumerate() {
        if i > 0 {
            out.push(';');
        }
        out.push_str(&format!(
            "{},{},{},{}",
            h.time_ms, h.perf_ms, h.frame, h.speed_ms
        ));
        if let Some(score) = h.score {
            out.push_str(&format!(",{score}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(d: u8, frame: u32, time_ms: f64) -> Move {
        Move {
            direction: Direction::from_u8(d).unwrap(),
            frame,
            time_ms,
        }
    }

    #[test]
    fn decodes_triples() {
        let moves = decode_moves("1,5,750;2,9,1350;0,14,2100").unwrap();
        assert_eq!(
            moves,
            vec![mv(1, 5, 750.0), mv(2, 9, 1350.0), mv(0, 14, 2100.0)]
        );
    }

    #[test]
    fn legacy_two_field_form_gets_frame_zero() {
        let moves = decode_moves("3,1200").unwrap();
        assert_eq!(moves, vec![mv(3, 0, 1200.0)]);
    }

    #[test]
    fn malformed_entries_are_dropped_silently() {
        let moves = decode_moves("1,5,750;garbage;9,1,1;2,,x;;2,9,1350").unwrap();
        // "9,1,1" has an out-of-range direction; "2,,x" fails numeric parse.
        assert_eq!(moves, vec![mv(1, 5, 750.0), mv(2, 9, 1350.0)]);
    }

    #[test]
    fn negative_or_nonfinite_times_are_dropped() {
        let moves = decode_moves("1,5,-3;0,2,NaN;2,9,10").unwrap();
        assert_eq!(moves, vec![mv(2, 9, 10.0)]);
    }

    #[test]
    fn oversized_move_payload_is_rejected() {
        let payload = "1,2,3;".repeat(MAX_MOVES_BYTES / 6 + 2);
        let err = decode_moves(&payload).unwrap_err();
        assert!(matches!(err, CodecError::PayloadTooLarge { .. }));
    }

    #[test]
    fn move_roundtrip_is_identity() {
        let moves = vec![mv(0, 1, 150.0), mv(1, 2, 300.5), mv(3, 40, 6000.0)];
        let decoded = decode_moves(&encode_moves(&moves)).unwrap();
        assert_eq!(decoded, moves);
    }

    #[test]
    fn encode_of_decode_is_canonical() {
        // Legacy + whitespace-laden input canonicalizes to stable output.
        let messy = " 1 ,5, 750 ;3,1200;junk";
        let canon = encode_moves(&decode_moves(messy).unwrap());
        assert_eq!(canon, "1,5,750;3,0,1200");
        // A second pass is a fixed point.
        assert_eq!(encode_moves(&decode_moves(&canon).unwrap()), canon);
    }

    #[test]
    fn heartbeat_roundtrip_with_and_without_score() {
        let beats = vec![
            Heartbeat {
                time_ms: 1000.0,
                perf_ms: 1001.5,
                frame: 7,
                speed_ms: 150.0,
                score: None,
            },
            Heartbeat {
                time_ms: 2000.0,
                perf_ms: 2003.0,
                frame: 14,
                speed_ms: 147.0,
                score: Some(20),
            },
        ];
        let decoded = decode_heartbeats(&encode_heartbeats(&beats)).unwrap();
        assert_eq!(decoded, beats);
    }

    #[test]
    fn heartbeat_extra_fields_are_dropped() {
        let beats = decode_heartbeats("1,2,3,4,5,6;1000,1001,7,150").unwrap();
        assert_eq!(beats.len(), 1);
        assert_eq!(beats[0].frame, 7);
    }

    #[test]
    fn oversized_heartbeat_payload_is_rejected() {
        let payload = "1,2,3,4;".repeat(MAX_HEARTBEATS_BYTES / 8 + 2);
        assert!(decode_heartbeats(&payload).is_err());
    }

    #[test]
    fn empty_strings_decode_to_empty_logs() {
        assert!(decode_moves("").unwrap().is_empty());
        assert!(decode_heartbeats("").unwrap().is_empty());
    }
}
