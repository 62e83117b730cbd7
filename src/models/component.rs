//! The component interface.
//!
//! A component is a named unit that contributes an additive term to the
//! simulated series. It owns its parameter metadata and maps a parameter
//! slice plus a time grid to a contribution aligned with that grid.
//!
//! Optional abilities (response curves, stress reconstruction) are declared
//! up front through `capabilities()`. The registry records them at
//! registration time; accessors consult that record rather than probing.

use chrono::NaiveDateTime;

use crate::engine::params::ParameterRow;
use crate::error::{Capability, ModelError, ModelResult};
use crate::series::TimeSeries;

/// Statically declared optional abilities of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub response_curve: bool,
    pub stress: bool,
}

impl Capabilities {
    pub fn supports(self, capability: Capability) -> bool {
        match capability {
            Capability::ResponseCurve => self.response_curve,
            Capability::Stress => self.stress,
        }
    }
}

pub trait TimeSeriesComponent: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// Parameter fragment in the order `simulate` expects its slice.
    fn parameters(&self) -> Vec<ParameterRow>;

    fn nparam(&self) -> usize {
        self.parameters().len()
    }

    /// Contribution over `grid`; the result must be indexed by exactly `grid`.
    fn simulate(&self, params: &[f64], grid: &[NaiveDateTime]) -> ModelResult<TimeSeries>;

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    /// Block response sampled at the component's native step.
    fn response_curve(&self, _params: &[f64]) -> ModelResult<Vec<f64>> {
        Err(ModelError::CapabilityNotSupported {
            name: self.name().to_string(),
            capability: Capability::ResponseCurve,
        })
    }

    /// Input stress as seen by the component.
    fn reconstruct_stress(&self, _params: &[f64]) -> ModelResult<TimeSeries> {
        Err(ModelError::CapabilityNotSupported {
            name: self.name().to_string(),
            capability: Capability::Stress,
        })
    }
}

/// Shared guard for component implementations.
pub(crate) fn expect_params(name: &str, params: &[f64], nparam: usize) -> ModelResult<()> {
    if params.len() != nparam {
        return Err(ModelError::validation(format!(
            "`{name}` expects {nparam} parameters, got {}",
            params.len()
        )));
    }
    Ok(())
}
