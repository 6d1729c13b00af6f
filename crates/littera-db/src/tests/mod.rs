//! Test suites for the lifecycle manager.

mod lifecycle_behaviour;
mod support;
mod unit;
