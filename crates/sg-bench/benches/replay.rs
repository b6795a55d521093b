use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sg_core::{Direction, GameRules, Move};

/// A square-loop move log: the snake survives to the frame cap, which is
/// the replay engine's worst case.
fn gen_loop_moves(frames: u32) -> Vec<Move> {
    let cycle = [
        Direction::Down,
        Direction::Left,
        Direction::Up,
        Direction::Right,
    ];
    (1..=frames)
        .map(|frame| Move {
            direction: cycle[((frame - 1) % 4) as usize],
            frame,
            time_ms: frame as f64 * 150.0,
        })
        .collect()
}

fn bench_replay(c: &mut Criterion) {
    let rules = GameRules::default();
    let mut g = c.benchmark_group("sg_replay");
    for &frames in &[500u32, 10_000u32] {
        let moves = gen_loop_moves(frames);
        g.bench_with_input(BenchmarkId::new("square_loop", frames), &moves, |b, m| {
            b.iter(|| black_box(sg_replay::replay(&rules, black_box(1), m, frames)))
        });
    }
    g.finish();
}

criterion_group!(benches, bench_replay);
criterion_main!(benches);
