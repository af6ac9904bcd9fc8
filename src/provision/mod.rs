//! Idempotent fixture provisioning.

pub mod provisioner;
