//! One-shot revision probe and the resulting driver binding.
//!
//! The revision is decided exactly once, before any other driver call, and
//! never re-probed: all later dispatch is a `match` on the cached
//! [`DriverRevision`] tag.

use std::sync::Arc;

use tracing::debug;

use crate::error::{HarkError, Result};
use crate::hal::{
    DriverEndpoint, DriverRevision, SoundTriggerHwV0, SoundTriggerHwV1, SoundTriggerHwV2,
    SoundTriggerHwV3,
};

/// A probed driver connection: fixed revision tag plus the per-revision entry
/// point handles the probe resolved.
pub(crate) struct Binding {
    revision: DriverRevision,
    endpoint: Arc<dyn DriverEndpoint>,
    v0: Arc<dyn SoundTriggerHwV0>,
    v1: Option<Arc<dyn SoundTriggerHwV1>>,
    v2: Option<Arc<dyn SoundTriggerHwV2>>,
    v3: Option<Arc<dyn SoundTriggerHwV3>>,
}

impl Binding {
    /// Probes `endpoint` in descending revision order; the first match fixes
    /// the binding's revision for its whole lifetime.
    ///
    /// # Errors
    ///
    /// [`HarkError::NoSupportedRevision`] when the endpoint implements no
    /// revision of the interface (v0 is the required base).
    pub(crate) fn probe(endpoint: Arc<dyn DriverEndpoint>) -> Result<Self> {
        let v3 = endpoint.clone().as_v3();
        let v2 = endpoint.clone().as_v2();
        let v1 = endpoint.clone().as_v1();
        let v0 = endpoint.clone().as_v0().ok_or(HarkError::NoSupportedRevision)?;

        let revision = if v3.is_some() {
            DriverRevision::V3
        } else if v2.is_some() {
            DriverRevision::V2
        } else if v1.is_some() {
            DriverRevision::V1
        } else {
            DriverRevision::V0
        };
        debug!(revision = %revision, "driver revision probe complete");

        Ok(Self {
            revision,
            endpoint,
            v0,
            v1,
            v2,
            v3,
        })
    }

    pub(crate) fn revision(&self) -> DriverRevision {
        self.revision
    }

    pub(crate) fn endpoint(&self) -> &dyn DriverEndpoint {
        self.endpoint.as_ref()
    }

    /// Base entry points; present on every bound driver.
    pub(crate) fn v0(&self) -> &dyn SoundTriggerHwV0 {
        self.v0.as_ref()
    }

    /// v1 entry points. Callers gate on `revision()`; the error covers a
    /// driver whose revision chain is inconsistent.
    pub(crate) fn v1(&self) -> Result<&dyn SoundTriggerHwV1> {
        self.v1.as_deref().ok_or(HarkError::NotSupported {
            revision: self.revision,
        })
    }

    pub(crate) fn v2(&self) -> Result<&dyn SoundTriggerHwV2> {
        self.v2.as_deref().ok_or(HarkError::NotSupported {
            revision: self.revision,
        })
    }

    pub(crate) fn v3(&self) -> Result<&dyn SoundTriggerHwV3> {
        self.v3.as_deref().ok_or(HarkError::NotSupported {
            revision: self.revision,
        })
    }
}
