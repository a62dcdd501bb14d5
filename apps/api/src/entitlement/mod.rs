//! Entitlement model: plan catalog lookups, the pure allow/deny evaluator,
//! and the usage gate that enforces its decisions against Postgres.

pub mod evaluator;
pub mod gate;
