use metrics::counter;
use std::sync::atomic::{AtomicU64, Ordering};

/// Request counters for the `/metrics` endpoint.
#[derive(Debug, Default)]
pub struct Metrics {
    requests_total: AtomicU64,
    detections_total: AtomicU64,
    objects_total: AtomicU64,
    failures_total: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        counter!("ecovision_detect_requests_total").increment(1);
    }

    /// A request that produced a response with `objects` detections.
    pub fn record_detection(&self, objects: usize) {
        self.detections_total.fetch_add(1, Ordering::Relaxed);
        self.objects_total.fetch_add(objects as u64, Ordering::Relaxed);
        counter!("ecovision_detections_total").increment(1);
        counter!("ecovision_objects_total").increment(objects as u64);
    }

    pub fn record_failure(&self) {
        self.failures_total.fetch_add(1, Ordering::Relaxed);
        counter!("ecovision_detect_failures_total").increment(1);
    }

    pub fn requests(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn detections(&self) -> u64 {
        self.detections_total.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures_total.load(Ordering::Relaxed)
    }

    /// Prometheus text exposition. Segmentation fallbacks live in the segmenter
    /// adapter and are passed in by the caller.
    pub fn get_prometheus_metrics(&self, segmentation_fallbacks: u64) -> String {
        format!(
            "# HELP ecovision_detect_requests_total Total /detect requests\n\
             # TYPE ecovision_detect_requests_total counter\n\
             ecovision_detect_requests_total {}\n\
             # HELP ecovision_detections_total Successful /detect responses\n\
             # TYPE ecovision_detections_total counter\n\
             ecovision_detections_total {}\n\
             # HELP ecovision_objects_total Objects returned across all responses\n\
             # TYPE ecovision_objects_total counter\n\
             ecovision_objects_total {}\n\
             # HELP ecovision_detect_failures_total Failed /detect requests\n\
             # TYPE ecovision_detect_failures_total counter\n\
             ecovision_detect_failures_total {}\n\
             # HELP ecovision_segmentation_fallbacks_total Empty masks substituted for failed predictions\n\
             # TYPE ecovision_segmentation_fallbacks_total counter\n\
             ecovision_segmentation_fallbacks_total {}\n",
            self.requests(),
            self.detections(),
            self.objects_total.load(Ordering::Relaxed),
            self.failures(),
            segmentation_fallbacks
        )
    }
}
