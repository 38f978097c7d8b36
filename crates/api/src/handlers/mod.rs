pub mod health;
pub mod leads;
pub mod metrics;
pub mod sweeps;
pub mod tasks;
