//! Append-only JSONL event logging with graceful degradation.

pub mod jsonl;
