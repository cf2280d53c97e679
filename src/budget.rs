//! Spend-limiting admission control for conversation sessions
//!
//! Consulted synchronously before a session opens; fails closed when the day's
//! spend plus a conservative estimate would exceed the configured limit.

use crate::cost::CostLedger;

/// Outcome of a budget check
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetDecision {
    /// Whether the session may start
    pub allowed: bool,

    /// Budget remaining after the reservation (USD)
    pub remaining: f64,

    /// Denial reason, present when `allowed` is false
    pub reason: Option<String>,
}

impl BudgetDecision {
    /// An approval with the given remaining budget
    #[must_use]
    pub const fn approved(remaining: f64) -> Self {
        Self {
            allowed: true,
            remaining,
            reason: None,
        }
    }

    /// A denial with the given reason
    #[must_use]
    pub const fn denied(remaining: f64, reason: String) -> Self {
        Self {
            allowed: false,
            remaining,
            reason: Some(reason),
        }
    }
}

/// Admission control consulted by the session manager
pub trait BudgetGate: Send + Sync {
    /// May a session with this estimated cost start?
    fn check_and_reserve(&self, estimated_cost: f64) -> BudgetDecision;

    /// Record the actual spend of a finished session. Called exactly once per
    /// session close.
    fn finalize(&self, duration_sec: f64, actual_cost: f64);
}

/// Daily budget gate backed by the cost ledger
#[derive(Debug, Clone)]
pub struct DailyBudgetGate {
    daily_budget_usd: f64,
    ledger: CostLedger,
}

impl DailyBudgetGate {
    /// Create a gate over `ledger` with the given daily ceiling
    #[must_use]
    pub const fn new(daily_budget_usd: f64, ledger: CostLedger) -> Self {
        Self {
            daily_budget_usd,
            ledger,
        }
    }
}

impl BudgetGate for DailyBudgetGate {
    fn check_and_reserve(&self, estimated_cost: f64) -> BudgetDecision {
        // Fail closed: a ledger read failure counts as the budget being spent
        let daily_total = match self.ledger.daily_total() {
            Ok(total) => total,
            Err(e) => {
                tracing::error!(error = %e, "ledger read failed, denying session");
                return BudgetDecision::denied(0.0, format!("ledger unavailable: {e}"));
            }
        };

        if daily_total + estimated_cost > self.daily_budget_usd {
            let reason = format!(
                "daily budget exceeded: ${daily_total:.4} spent + ${estimated_cost:.4} estimated > ${:.2} limit",
                self.daily_budget_usd
            );
            tracing::warn!(
                spent = daily_total,
                estimate = estimated_cost,
                budget = self.daily_budget_usd,
                "session denied"
            );
            return BudgetDecision::denied(self.daily_budget_usd - daily_total, reason);
        }

        let remaining = self.daily_budget_usd - daily_total - estimated_cost;
        tracing::debug!(remaining, "budget reservation approved");
        BudgetDecision::approved(remaining)
    }

    fn finalize(&self, duration_sec: f64, actual_cost: f64) {
        if let Err(e) = self.ledger.record_session(duration_sec, actual_cost) {
            tracing::error!(error = %e, cost = actual_cost, "failed to record session spend");
        } else {
            tracing::info!(
                duration_sec,
                cost = format!("{actual_cost:.4}"),
                "session spend recorded"
            );
        }
    }
}
