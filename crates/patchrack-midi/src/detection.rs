//! Synthesizer auto-detection
//!
//! Broadcasts every model's identity probe on every reachable endpoint,
//! then collects identity responses until the listen window closes. Each
//! response is offered to every descriptor; the first descriptor that
//! claims it yields a `DeviceIdentity`. Duplicate responses coalesce, so a
//! device that answers a probe twice still registers once.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::synths::{all_descriptors, DeviceDescriptor};
use crate::transport::MidiTransport;
use crate::types::{DeviceIdentity, EndpointId};
use patchrack_core::SynthModel;

/// Default listen window after the probes go out
pub const DEFAULT_DETECTION_WINDOW: Duration = Duration::from_millis(2000);

/// How often the listen loop wakes up to check for cancellation
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Shared flag to abort a running detection pass early
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A probe that could not be sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeFailure {
    pub model: SynthModel,
    pub endpoint: EndpointId,
    pub reason: String,
}

/// Outcome of one detection pass
#[derive(Debug, Clone, Default)]
pub struct DetectionReport {
    /// Identified devices, sorted and deduplicated
    pub devices: Vec<DeviceIdentity>,
    /// Probes that failed to send; the pass continues past these
    pub probe_failures: Vec<ProbeFailure>,
    /// True if the pass was cancelled before the window closed
    pub cancelled: bool,
}

/// Run one detection pass over every endpoint of the transport
///
/// Probes with every registered descriptor. Blocks for up to `window`
/// after the probes are sent. A send failure on one endpoint never aborts
/// the pass; the failure is recorded and the remaining probes still go out.
pub fn detect_devices(
    transport: &dyn MidiTransport,
    window: Duration,
    cancel: &CancelToken,
) -> DetectionReport {
    detect_devices_with(transport, &all_descriptors(), window, cancel)
}

/// Detection pass restricted to the given descriptors
pub fn detect_devices_with(
    transport: &dyn MidiTransport,
    descriptors: &[Arc<dyn DeviceDescriptor>],
    window: Duration,
    cancel: &CancelToken,
) -> DetectionReport {
    let receiver = transport.receiver();
    let mut report = DetectionReport::default();

    // Drain anything queued before the probes, it cannot be a response
    while receiver.try_recv().is_ok() {}

    for endpoint in transport.endpoints() {
        for descriptor in descriptors {
            if cancel.is_cancelled() {
                report.cancelled = true;
                return report;
            }
            let probe = descriptor.identity_request();
            if let Err(err) = transport.send(&endpoint, &probe) {
                log::warn!(
                    "Identity probe for {} failed on {}: {}",
                    descriptor.model(),
                    endpoint,
                    err
                );
                report.probe_failures.push(ProbeFailure {
                    model: descriptor.model(),
                    endpoint: endpoint.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }

    let deadline = Instant::now() + window;
    let mut found = BTreeSet::new();

    loop {
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        let slice = deadline.min(now + CANCEL_POLL_INTERVAL);
        let msg = match receiver.recv_deadline(slice) {
            Ok(msg) => msg,
            Err(flume::RecvTimeoutError::Timeout) => continue,
            Err(flume::RecvTimeoutError::Disconnected) => break,
        };
        if let Some(identity) = classify_response(descriptors, &msg) {
            if found.insert(identity.clone()) {
                log::info!("Detected {} on {}", identity.display_name, identity.endpoint);
            }
        }
    }

    report.devices = found.into_iter().collect();
    report
}

fn classify_response(
    descriptors: &[Arc<dyn DeviceDescriptor>],
    msg: &crate::types::RawMessage,
) -> Option<DeviceIdentity> {
    descriptors
        .iter()
        .find_map(|d| d.match_identity_response(msg))
}
