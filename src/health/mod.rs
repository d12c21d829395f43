pub mod checks;
pub mod monitor;

pub use checks::{HealthCheck, HealthCheckResult, HealthStatus};
pub use monitor::{HealthMonitor, HealthReport, OverallHealth, ServiceHealth};
