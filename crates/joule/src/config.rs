use serde::Deserialize;

use crate::energy::PowerModel;
use crate::{Error, Result};

/// Scheduling policy selector.
///
/// `Fcfs` and `EasyBackfilling` run without a budget; the other three gate
/// admissions on power or energy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    Fcfs,
    EasyBackfilling,
    PowerCap,
    EnergyBudget,
    ReducePc,
}

/// Options recognised in the initialisation blob. Every field has a default,
/// so an empty blob selects plain EASY backfilling with the reference
/// estimation constants.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    #[serde(default = "default_policy")]
    pub policy: Policy,
    /// Fraction of the theoretical maximum budget to honour, in (0, 1].
    #[serde(default = "default_budget_fraction")]
    pub budget_fraction: f64,
    /// Budget period (s) used to derive the replenishment rate.
    #[serde(default = "default_period_length")]
    pub period_length: f64,
    /// Estimated idle power per host (W).
    #[serde(default = "default_idle_watts")]
    pub p_idle: f64,
    /// Estimated compute power per host (W).
    #[serde(default = "default_comp_watts")]
    pub p_comp: f64,
}

fn default_policy() -> Policy {
    Policy::EasyBackfilling
}

fn default_budget_fraction() -> f64 {
    1.0
}

fn default_period_length() -> f64 {
    600.0
}

fn default_idle_watts() -> f64 {
    100.0
}

fn default_comp_watts() -> f64 {
    203.12
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            policy: default_policy(),
            budget_fraction: default_budget_fraction(),
            period_length: default_period_length(),
            p_idle: default_idle_watts(),
            p_comp: default_comp_watts(),
        }
    }
}

impl SchedulerConfig {
    /// Parses the initialisation blob. An empty blob means "all defaults".
    pub fn from_json(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Ok(Default::default());
        }
        let config: SchedulerConfig = serde_json::from_slice(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.budget_fraction > 0.0 && self.budget_fraction <= 1.0) {
            return Err(Error::ConfigError(format!(
                "budget_fraction {} is not in (0, 1]",
                self.budget_fraction
            )));
        }
        if self.period_length <= 0.0 {
            return Err(Error::ConfigError(format!(
                "period_length {} must be positive",
                self.period_length
            )));
        }
        if self.p_idle < 0.0 || self.p_comp <= 0.0 {
            return Err(Error::ConfigError(format!(
                "power parameters must be non-negative (p_idle={}, p_comp={})",
                self.p_idle, self.p_comp
            )));
        }
        if self.p_idle > self.p_comp {
            return Err(Error::ConfigError(format!(
                "p_idle {} exceeds p_comp {}",
                self.p_idle, self.p_comp
            )));
        }
        Ok(())
    }

    pub fn power_model(&self) -> PowerModel {
        PowerModel::new(self.p_idle, self.p_comp)
    }
}
