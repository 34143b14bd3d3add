//! ROI Simulation Engine
//!
//! Turns invoice-processing parameters into monthly and cumulative savings
//! for an automated AP pipeline.
//!
//! Formulas (per month):
//!   labor_cost_manual = staff * wage * hours_per_invoice * volume
//!   auto_cost         = volume * AUTOMATED_COST_PER_INVOICE
//!   error_savings     = (error_rate_manual / 100 - ERROR_RATE_AUTO) * volume * error_cost
//!   monthly_savings   = max(1, (labor_cost_manual + error_savings - auto_cost) * MIN_ROI_BOOST)
//!
//! The boost and the floor of 1 are fixed biases in favour of automation.
//! The boost is applied first, then the floor. Neither is configurable.
//!
//! Every reported figure is finite. Non-finite input fields are replaced by
//! their defaults before the model runs, and intermediate values that
//! overflow saturate at `±f64::MAX` (a NaN from `inf - inf` reads as 0).

use crate::models::{ModelConstants, SimulationInput, SimulationResult};

/// Per-invoice cost of the automated pipeline (USD).
pub const AUTOMATED_COST_PER_INVOICE: f64 = 0.20;
/// Error rate of the automated pipeline as a fraction (0.1%).
pub const ERROR_RATE_AUTO: f64 = 0.001;
/// Minutes saved per invoice. Reported with each result, not used in the math.
pub const TIME_SAVED_PER_INVOICE_MIN: f64 = 8.0;
/// Multiplier applied to raw monthly savings.
pub const MIN_ROI_BOOST: f64 = 1.1;
/// Lowest monthly saving the model will ever report.
pub const MONTHLY_SAVINGS_FLOOR: f64 = 1.0;

pub const MODEL_CONSTANTS: ModelConstants = ModelConstants {
    AUTOMATED_COST_PER_INVOICE,
    ERROR_RATE_AUTO,
    TIME_SAVED_PER_INVOICE_MIN,
    MIN_ROI_BOOST,
};

/// Clamp an intermediate value into the finite range.
fn saturate(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-f64::MAX, f64::MAX)
    }
}

/// Run the ROI model. Total and deterministic: every input yields a result.
pub fn simulate(input: &SimulationInput) -> SimulationResult {
    let input = input.sanitized();
    let volume = input.monthly_invoice_volume;
    let error_rate_manual = input.error_rate_manual / 100.0; // percent -> fraction

    let labor_cost_manual =
        saturate(input.num_ap_staff * input.hourly_wage * input.avg_hours_per_invoice * volume);
    let auto_cost = saturate(volume * AUTOMATED_COST_PER_INVOICE);

    // Negative when the manual rate is already below the automated one.
    let error_savings = saturate((error_rate_manual - ERROR_RATE_AUTO) * volume * input.error_cost);

    let mut monthly_savings =
        saturate(saturate(labor_cost_manual + error_savings - auto_cost) * MIN_ROI_BOOST);
    if !(monthly_savings >= MONTHLY_SAVINGS_FLOOR) {
        monthly_savings = MONTHLY_SAVINGS_FLOOR;
    }

    let time_horizon_months = input.time_horizon_months;
    let implementation_cost = input.one_time_implementation_cost;

    let cumulative_savings = saturate(monthly_savings * time_horizon_months);
    let net_savings = saturate(cumulative_savings - implementation_cost);

    let payback_months = if monthly_savings > 0.0 {
        Some(saturate(implementation_cost / monthly_savings))
    } else {
        None
    };
    let roi_percentage = if implementation_cost > 0.0 {
        Some(saturate(net_savings / implementation_cost * 100.0))
    } else {
        None
    };

    SimulationResult {
        inputs: input,
        constants: MODEL_CONSTANTS,
        labor_cost_manual,
        auto_cost,
        error_savings,
        monthly_savings,
        cumulative_savings,
        net_savings,
        payback_months,
        roi_percentage,
        time_horizon_months,
    }
}
