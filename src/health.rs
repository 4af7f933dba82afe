//! Health check module
//! Reports whether the ledger answers and which gateway environment is wired in

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::database::OrderRepository;

const LEDGER_TIMEOUT: Duration = Duration::from_secs(2);
const LEDGER_SLOW_MS: u128 = 500;
const LEDGER_PROBE_KEY: &str = "__health__";

/// Health status response
#[derive(Debug, Serialize, Clone)]
pub struct HealthStatus {
    pub status: HealthState,
    pub version: &'static str,
    /// True while the gateway points at the SSLCommerz sandbox
    pub sandbox: bool,
    pub checks: HashMap<String, ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Overall health state
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Individual component health status
#[derive(Debug, Serialize, Clone)]
pub struct ComponentHealth {
    pub status: ComponentState,
    pub response_time_ms: Option<u128>,
    pub details: Option<String>,
}

/// Component state
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub enum ComponentState {
    Up,
    Down,
    Warning,
}

impl HealthStatus {
    pub fn new() -> Self {
        Self {
            status: HealthState::Healthy,
            version: env!("CARGO_PKG_VERSION"),
            sandbox: false,
            checks: HashMap::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        !matches!(self.status, HealthState::Unhealthy)
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentHealth {
    pub fn up(response_time_ms: Option<u128>, details: Option<String>) -> Self {
        Self {
            status: ComponentState::Up,
            response_time_ms,
            details,
        }
    }

    pub fn down(details: Option<String>) -> Self {
        Self {
            status: ComponentState::Down,
            response_time_ms: None,
            details,
        }
    }

    pub fn warning(response_time_ms: Option<u128>, details: Option<String>) -> Self {
        Self {
            status: ComponentState::Warning,
            response_time_ms,
            details,
        }
    }
}

#[derive(Clone)]
pub struct HealthChecker {
    orders: Arc<dyn OrderRepository>,
    gateway: &'static str,
    sandbox: bool,
}

impl HealthChecker {
    pub fn new(orders: Arc<dyn OrderRepository>, gateway: &'static str, sandbox: bool) -> Self {
        Self {
            orders,
            gateway,
            sandbox,
        }
    }

    pub async fn check_health(&self) -> HealthStatus {
        let mut health_status = HealthStatus::new();
        health_status.sandbox = self.sandbox;

        let ledger = match timeout(LEDGER_TIMEOUT, check_ledger_health(self.orders.as_ref())).await
        {
            Ok(Ok(elapsed_ms)) if elapsed_ms > LEDGER_SLOW_MS => {
                warn!(elapsed_ms, "ledger health check slow");
                ComponentHealth::warning(Some(elapsed_ms), Some("Slow response".to_string()))
            }
            Ok(Ok(elapsed_ms)) => {
                info!(elapsed_ms, "ledger health check: OK");
                ComponentHealth::up(Some(elapsed_ms), None)
            }
            Ok(Err(e)) => {
                error!(error = %e, "ledger health check failed");
                ComponentHealth::down(Some(e.to_string()))
            }
            Err(_) => {
                error!("ledger health check timed out");
                ComponentHealth::down(Some("Timeout".to_string()))
            }
        };
        health_status.checks.insert("ledger".to_string(), ledger);

        let mode = if self.sandbox { "sandbox" } else { "live" };
        health_status.checks.insert(
            self.gateway.to_string(),
            ComponentHealth::up(None, Some(mode.to_string())),
        );

        let states: Vec<&ComponentState> =
            health_status.checks.values().map(|c| &c.status).collect();
        health_status.status = if states.contains(&&ComponentState::Down) {
            HealthState::Unhealthy
        } else if states.contains(&&ComponentState::Warning) {
            HealthState::Degraded
        } else {
            HealthState::Healthy
        };

        health_status
    }
}

/// Single keyed lookup; the answer itself is ignored.
async fn check_ledger_health(
    orders: &dyn OrderRepository,
) -> Result<u128, crate::database::LedgerError> {
    let start = Instant::now();
    orders.get(LEDGER_PROBE_KEY).await?;
    Ok(start.elapsed().as_millis())
}
