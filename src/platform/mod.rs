//! OS seams: external utility capability traits and mount-table inspection.

pub mod exec;
pub mod mounts;
