use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

pub struct Metrics {
    // Requests
    total_requests: AtomicUsize,
    successful_requests: AtomicUsize,
    failed_requests: AtomicUsize,
    rejected_requests: AtomicUsize,

    // Timing (in microseconds)
    total_ingest_time_us: AtomicU64,
    total_answer_time_us: AtomicU64,

    // Counts
    documents_ingested: AtomicUsize,
    chunks_processed: AtomicUsize,
    clauses_extracted: AtomicUsize,
    failed_chunks: AtomicUsize,
    questions_answered: AtomicUsize,
    query_fallbacks: AtomicUsize,
    decision_fallbacks: AtomicUsize,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            total_requests: AtomicUsize::new(0),
            successful_requests: AtomicUsize::new(0),
            failed_requests: AtomicUsize::new(0),
            rejected_requests: AtomicUsize::new(0),
            total_ingest_time_us: AtomicU64::new(0),
            total_answer_time_us: AtomicU64::new(0),
            documents_ingested: AtomicUsize::new(0),
            chunks_processed: AtomicUsize::new(0),
            clauses_extracted: AtomicUsize::new(0),
            failed_chunks: AtomicUsize::new(0),
            questions_answered: AtomicUsize::new(0),
            query_fallbacks: AtomicUsize::new(0),
            decision_fallbacks: AtomicUsize::new(0),
        })
    }

    pub fn record_request(&self, success: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Requests turned away by the bearer check never count as processed.
    pub fn record_rejected(&self) {
        self.rejected_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_document(&self, duration: Duration, chunks: usize, clauses: usize, failed_chunks: usize) {
        self.total_ingest_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.documents_ingested.fetch_add(1, Ordering::Relaxed);
        self.chunks_processed.fetch_add(chunks, Ordering::Relaxed);
        self.clauses_extracted.fetch_add(clauses, Ordering::Relaxed);
        self.failed_chunks.fetch_add(failed_chunks, Ordering::Relaxed);
    }

    pub fn record_answer(&self, duration: Duration, query_fallback: bool, decision_fallback: bool) {
        self.total_answer_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.questions_answered.fetch_add(1, Ordering::Relaxed);
        if query_fallback {
            self.query_fallbacks.fetch_add(1, Ordering::Relaxed);
        }
        if decision_fallback {
            self.decision_fallbacks.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            rejected_requests: self.rejected_requests.load(Ordering::Relaxed),
            avg_ingest_time_ms: self.avg_time_ms(&self.total_ingest_time_us, &self.documents_ingested),
            avg_answer_time_ms: self.avg_time_ms(&self.total_answer_time_us, &self.questions_answered),
            documents_ingested: self.documents_ingested.load(Ordering::Relaxed),
            chunks_processed: self.chunks_processed.load(Ordering::Relaxed),
            clauses_extracted: self.clauses_extracted.load(Ordering::Relaxed),
            failed_chunks: self.failed_chunks.load(Ordering::Relaxed),
            questions_answered: self.questions_answered.load(Ordering::Relaxed),
            query_fallbacks: self.query_fallbacks.load(Ordering::Relaxed),
            decision_fallbacks: self.decision_fallbacks.load(Ordering::Relaxed),
        }
    }

    fn avg_time_ms(&self, total_us: &AtomicU64, count: &AtomicUsize) -> f64 {
        let total = total_us.load(Ordering::Relaxed) as f64;
        let cnt = count.load(Ordering::Relaxed) as f64;
        if cnt > 0.0 {
            total / cnt / 1000.0 // Convert to ms
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsSnapshot {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub rejected_requests: usize,
    pub avg_ingest_time_ms: f64,
    pub avg_answer_time_ms: f64,
    pub documents_ingested: usize,
    pub chunks_processed: usize,
    pub clauses_extracted: usize,
    pub failed_chunks: usize,
    pub questions_answered: usize,
    pub query_fallbacks: usize,
    pub decision_fallbacks: usize,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
