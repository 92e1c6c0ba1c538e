use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static HTTP_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static SESSION_LOGINS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static SESSION_REFRESHES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static SESSION_FORCED_LOGOUTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Register all collectors. Calling it again is a no-op.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    if REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let requests_total = IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "path", "status"],
    )?;
    let request_duration = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        ),
        &["method", "path", "status"],
    )?;
    let logins = IntCounterVec::new(
        Opts::new("session_logins_total", "Login attempts by outcome"),
        &["outcome"],
    )?;
    let refreshes = IntCounterVec::new(
        Opts::new("session_refreshes_total", "Token refreshes by outcome"),
        &["outcome"],
    )?;
    let forced_logouts = IntCounterVec::new(
        Opts::new(
            "session_forced_logouts_total",
            "Sessions ended without the user asking",
        ),
        &["reason"],
    )?;

    registry.register(Box::new(requests_total.clone()))?;
    registry.register(Box::new(request_duration.clone()))?;
    registry.register(Box::new(logins.clone()))?;
    registry.register(Box::new(refreshes.clone()))?;
    registry.register(Box::new(forced_logouts.clone()))?;

    let _ = REGISTRY.set(registry);
    let _ = HTTP_REQUESTS_TOTAL.set(requests_total);
    let _ = HTTP_REQUEST_DURATION_SECONDS.set(request_duration);
    let _ = SESSION_LOGINS_TOTAL.set(logins);
    let _ = SESSION_REFRESHES_TOTAL.set(refreshes);
    let _ = SESSION_FORCED_LOGOUTS_TOTAL.set(forced_logouts);

    Ok(())
}

pub fn record_http_request(method: &str, path: &str, status: &str, seconds: f64) {
    let labels = [method, path, status];
    if let Some(counter) = HTTP_REQUESTS_TOTAL.get() {
        counter.with_label_values(&labels).inc();
    }
    if let Some(histogram) = HTTP_REQUEST_DURATION_SECONDS.get() {
        histogram.with_label_values(&labels).observe(seconds);
    }
}

pub fn record_login(outcome: &str) {
    if let Some(counter) = SESSION_LOGINS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn record_refresh(outcome: &str) {
    if let Some(counter) = SESSION_REFRESHES_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn record_forced_logout(reason: &str) {
    if let Some(counter) = SESSION_FORCED_LOGOUTS_TOTAL.get() {
        counter.with_label_values(&[reason]).inc();
    }
}

pub fn get_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return String::new();
    };

    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_counters_show_up_in_exposition() {
        init_metrics().unwrap();
        init_metrics().unwrap();

        record_login("success");
        record_refresh("failure");
        record_forced_logout("rejected");

        let text = get_metrics();
        assert!(text.contains("session_logins_total"));
        assert!(text.contains("session_refreshes_total"));
        assert!(text.contains("session_forced_logouts_total"));
    }
}
