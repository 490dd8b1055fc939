//! Activity logging: JSONL sink plus the bounded-channel coordinator.

pub mod activity;
pub mod jsonl;
