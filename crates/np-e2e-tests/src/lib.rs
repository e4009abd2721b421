//! Test-only crate: cross-crate scenarios live in `tests/`.
