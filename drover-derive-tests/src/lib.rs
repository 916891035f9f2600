//! Integration tests for the `#[unit_interface]` macro live under `tests/`.
