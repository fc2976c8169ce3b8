//! Tokio backend for the `pi_bench` engine: worker units run as tasks and
//! the foreground frame loop is paced by a tokio interval.

pub mod driver;
pub mod worker;

pub use driver::drive;
pub use pi_bench::Outcome;
pub use worker::TokioSpawner;
