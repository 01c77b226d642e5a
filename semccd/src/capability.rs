//! Energy filter capability discovery.
//!
//! Filter control has moved between script namespaces over GMS releases
//! (`AF*`, `IFC*`, `IF*`, `GT_*`). Each logical capability is bound once
//! per session to the first historically known function name that exists
//! on the peer.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::client::Client;
use crate::error::Result;

/// A logical energy filter operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum FilterCapability {
    /// Read whether the slit is in.
    SlitState,
    /// Move the slit in or out.
    SetSlitState,
    /// Read the slit width in eV.
    SlitWidth,
    /// Set the slit width in eV.
    SetSlitWidth,
    /// Read the widest allowed slit.
    MaxSlitWidth,
    /// Read the energy offset.
    EnergyOffset,
    /// Set the energy offset.
    SetEnergyOffset,
    /// Center the zero-loss peak in the slit.
    AlignZeroLoss,
}

impl fmt::Display for FilterCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Known remote names, in probe order.
pub const FILTER_CANDIDATES: &[(&str, FilterCapability)] = &[
    ("AFGetSlitState", FilterCapability::SlitState),
    ("AFSetSlitState", FilterCapability::SetSlitState),
    ("AFGetSlitWidth", FilterCapability::SlitWidth),
    ("AFSetSlitWidth", FilterCapability::SetSlitWidth),
    ("AFDoAlignZeroLoss", FilterCapability::AlignZeroLoss),
    ("IFCGetSlitState", FilterCapability::SlitState),
    ("IFCSetSlitState", FilterCapability::SetSlitState),
    ("IFCGetSlitWidth", FilterCapability::SlitWidth),
    ("IFCSetSlitWidth", FilterCapability::SetSlitWidth),
    ("IFCDoAlignZeroLoss", FilterCapability::AlignZeroLoss),
    ("IFGetSlitIn", FilterCapability::SlitState),
    ("IFSetSlitIn", FilterCapability::SetSlitState),
    ("IFGetEnergyLoss", FilterCapability::EnergyOffset),
    ("IFSetEnergyOffset", FilterCapability::SetEnergyOffset),
    ("IFGetMaximumSlitWidth", FilterCapability::MaxSlitWidth),
    ("IFGetSlitWidth", FilterCapability::SlitWidth),
    ("IFSetSlitWidth", FilterCapability::SetSlitWidth),
    ("GT_CenterZLP", FilterCapability::AlignZeroLoss),
];

/// Slit mover that returns before the slit has settled.
const ASYNC_SLIT_SETTER: &str = "IFSetSlitIn";

/// Script statement waiting for [`ASYNC_SLIT_SETTER`] to finish.
const WAIT_FOR_FILTER: &str = "IFWaitForFilter();";

/// Capability to remote function name, for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    /// Bound names; unresolved capabilities are absent.
    map: HashMap<FilterCapability, &'static str>,
}

impl Bindings {
    /// Binds each capability to its first candidate for which `exists`
    /// returns true.
    ///
    /// Candidates for an already bound capability are not probed. Probe
    /// errors abort resolution.
    pub fn resolve(
        candidates: &[(&'static str, FilterCapability)],
        mut exists: impl FnMut(&str) -> Result<bool>,
    ) -> Result<Self> {
        let mut map = HashMap::new();
        for &(name, capability) in candidates {
            if map.contains_key(&capability) {
                continue;
            }
            if exists(name)? {
                debug!(%capability, name, "bound filter function");
                map.insert(capability, name);
            }
        }
        Ok(Self { map })
    }

    /// Remote name bound to `capability`.
    pub fn get(&self, capability: FilterCapability) -> Option<&'static str> {
        self.map.get(&capability).copied()
    }

    /// Whether `capability` resolved.
    pub fn is_bound(&self, capability: FilterCapability) -> bool {
        self.map.contains_key(&capability)
    }

    /// Statement to append after moving the slit.
    pub fn wait_suffix(&self) -> &'static str {
        if self.get(FilterCapability::SetSlitState) == Some(ASYNC_SLIT_SETTER) {
            WAIT_FOR_FILTER
        } else {
            ""
        }
    }
}

impl Client {
    /// Probes the peer for energy filter functions and rebinds them.
    pub fn resolve_filter(&mut self) -> Result<&Bindings> {
        let bindings = Bindings::resolve(FILTER_CANDIDATES, |name| self.has_function(name))?;
        debug!(bound = bindings.map.len(), "filter capabilities resolved");
        self.bindings = bindings;
        Ok(&self.bindings)
    }
}
