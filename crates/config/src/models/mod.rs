pub mod api_observability;
pub mod app_config;
pub mod database;
pub mod followup;
pub mod notifications;
pub mod sweeps;

pub use api_observability::*;
pub use app_config::*;
pub use database::*;
pub use followup::*;
pub use notifications::*;
pub use sweeps::*;
