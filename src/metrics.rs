use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing session activity across the process.
#[derive(Debug, Default)]
pub struct SessionMetrics {
    documents_processed: AtomicU64,
    documents_failed: AtomicU64,
    questions_answered: AtomicU64,
    questions_failed: AtomicU64,
    searches_degraded: AtomicU64,
}

impl SessionMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a document that reached the ready state.
    pub fn record_document_processed(&self) {
        self.documents_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a document whose upload, processing, or summary failed.
    pub fn record_document_failed(&self) {
        self.documents_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of one question/answer round-trip.
    pub fn record_question(&self, answered: bool) {
        let counter = if answered {
            &self.questions_answered
        } else {
            &self.questions_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a related-article search that fell back to the degraded state.
    pub fn record_search_degraded(&self) {
        self.searches_degraded.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_processed: self.documents_processed.load(Ordering::Relaxed),
            documents_failed: self.documents_failed.load(Ordering::Relaxed),
            questions_answered: self.questions_answered.load(Ordering::Relaxed),
            questions_failed: self.questions_failed.load(Ordering::Relaxed),
            searches_degraded: self.searches_degraded.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of session counters used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents that reached the ready state.
    pub documents_processed: u64,
    /// Documents abandoned on the critical path.
    pub documents_failed: u64,
    /// Questions that received an answer.
    pub questions_answered: u64,
    /// Questions whose round-trip failed.
    pub questions_failed: u64,
    /// Related-article searches that returned no results.
    pub searches_degraded: u64,
}
