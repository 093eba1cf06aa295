pub mod cancel;
pub mod cluster;
pub mod commands;
pub mod commit;
pub mod driver_type;
pub mod engine;
pub mod error;
pub mod local;
pub mod outcome;
pub mod store;
pub mod telemetry;
#[cfg(test)]
pub mod test_utils;
