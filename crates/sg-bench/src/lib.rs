//! sg-bench: benchmark-only crate; see `benches/`.
