use tracing::trace;

// Trace-based counters; a subscriber or log pipeline aggregates them.

pub fn inc_requests(route: &'static str) {
    trace!(
        target = "hungry.metrics",
        route = route,
        "requests_total_inc"
    );
}

pub fn stage_elapsed(stage: &'static str, elapsed_ms: u128) {
    trace!(
        target = "hungry.metrics",
        stage = stage,
        elapsed_ms = elapsed_ms as u64,
        "stage_elapsed"
    );
}

pub fn unresolved_title() {
    trace!(target = "hungry.metrics", "unresolved_title_inc");
}
