// src/experiment/params.rs

//! Parameter extraction shared by every fault kind.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::errors::{ChaosError, Result};
use crate::types::FaultType;

/// Resolved parameters for a single fault run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultParams {
    pub namespace: String,
    pub selector: String,
    /// Name of the numeric parameter (`percentage`, `delay`, `load`, `size`).
    pub value_name: &'static str,
    pub value: u32,
    pub unit: &'static str,
}

/// Numeric parameter name, default and unit for a fault kind.
///
/// Returns `None` for kinds that have no algorithm.
pub fn value_spec(fault: FaultType) -> Option<(&'static str, u32, &'static str)> {
    match fault {
        FaultType::PodFailure => Some(("percentage", 100, "%")),
        FaultType::NetworkDelay => Some(("delay", 100, "ms")),
        FaultType::CpuStress => Some(("load", 80, "%")),
        FaultType::MemoryStress => Some(("size", 256, "MB")),
        FaultType::DiskFailure | FaultType::ServiceFailure | FaultType::ExternalTarget => None,
    }
}

/// Extract `namespace`, `selector` and the fault's numeric parameter.
///
/// `namespace` and `selector` are required and must be non-empty. The numeric
/// parameter is optional; an unparsable or non-positive value falls back to
/// the default with a warning.
pub fn extract_params(fault: FaultType, params: &BTreeMap<String, String>) -> Result<FaultParams> {
    let (value_name, default, unit) =
        value_spec(fault).ok_or_else(|| ChaosError::UnsupportedType(fault.to_string()))?;

    let namespace = required(params, "namespace")?;
    let selector = required(params, "selector")?;

    let value = match params.get(value_name).map(|s| s.trim()) {
        None | Some("") => default,
        Some(raw) => match raw.parse::<i64>() {
            Ok(parsed) if parsed > 0 => u32::try_from(parsed).unwrap_or(u32::MAX),
            Ok(parsed) => {
                warn!(param = value_name, value = parsed, default, "non-positive parameter, using default");
                default
            }
            Err(err) => {
                warn!(param = value_name, raw, error = %err, default, "invalid parameter, using default");
                default
            }
        },
    };

    debug!(fault = %fault, param = value_name, value, unit, "resolved fault parameter");

    Ok(FaultParams {
        namespace,
        selector,
        value_name,
        value,
        unit,
    })
}

fn required(params: &BTreeMap<String, String>, key: &'static str) -> Result<String> {
    match params.get(key).map(|s| s.trim()) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ChaosError::MissingParameter(key)),
    }
}
