//! Two-state gate arbitrating recognition starts against external capture.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptureGate {
    Free,
    Busy,
}

/// Edge produced by feeding a notifier update into the arbiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CaptureEdge {
    BecameBusy,
    BecameFree,
}

pub(crate) struct CaptureArbiter {
    gate: CaptureGate,
}

impl CaptureArbiter {
    pub(crate) fn new(initially_busy: bool) -> Self {
        let gate = if initially_busy {
            CaptureGate::Busy
        } else {
            CaptureGate::Free
        };
        Self { gate }
    }

    pub(crate) fn permits_start(&self) -> bool {
        self.gate == CaptureGate::Free
    }

    /// Applies a notifier update and reports the edge, if the state changed.
    /// Repeats of the current state are absorbed here so the adapter acts
    /// exactly once per transition.
    pub(crate) fn observe(&mut self, active: bool) -> Option<CaptureEdge> {
        match (self.gate, active) {
            (CaptureGate::Free, true) => {
                self.gate = CaptureGate::Busy;
                Some(CaptureEdge::BecameBusy)
            }
            (CaptureGate::Busy, false) => {
                self.gate = CaptureGate::Free;
                Some(CaptureEdge::BecameFree)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_permitted_only_while_free() {
        assert!(CaptureArbiter::new(false).permits_start());
        assert!(!CaptureArbiter::new(true).permits_start());
    }

    #[test]
    fn edges_fire_once_per_transition() {
        let mut arbiter = CaptureArbiter::new(false);
        assert_eq!(arbiter.observe(true), Some(CaptureEdge::BecameBusy));
        assert_eq!(arbiter.observe(true), None);
        assert!(!arbiter.permits_start());
        assert_eq!(arbiter.observe(false), Some(CaptureEdge::BecameFree));
        assert_eq!(arbiter.observe(false), None);
        assert!(arbiter.permits_start());
    }
}
