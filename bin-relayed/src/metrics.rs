use axum::{http::StatusCode, routing};
use prometheus::{
    opts, register_histogram, register_int_counter, Histogram, IntCounter, TextEncoder,
};
use std::net::SocketAddr;
use std::sync::LazyLock;

use dns_relay::Metrics;

/// Buckets sized for a pipeline whose slowest paths are a few sequential 2s
/// nameserver timeouts.
pub const RESPONSE_TIME_BUCKETS: &[f64] = &[
    0.0010, // 1   ms
    0.0025, // 2.5 ms
    0.0050, // 5   ms
    0.0100, // 10  ms
    0.0250, // 25  ms
    0.0500, // 50  ms
    0.1000, // 100 ms
    0.2500, // 250 ms
    0.5000, // 500 ms
    1.0000, // 1    s
    2.0000, // 2    s
    4.0000, // 4    s
    6.0000, // 6    s
    8.0000, // 8    s
];

pub static DNS_REQUESTS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(opts!(
        "dns_requests_total",
        "Total number of DNS requests received, whether valid or invalid."
    ))
    .unwrap()
});

pub static DNS_REQUESTS_DROPPED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(opts!(
        "dns_requests_dropped_total",
        "Total number of DNS requests dropped at the in-flight bound."
    ))
    .unwrap()
});

pub static DNS_RESPONSES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(opts!(
        "dns_responses_total",
        "Total number of DNS responses sent."
    ))
    .unwrap()
});

pub static DNS_RESPONSE_TIME_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "dns_response_time_seconds",
        "Time from receiving a request to having its response ready.",
        RESPONSE_TIME_BUCKETS.to_vec()
    )
    .unwrap()
});

pub static DNS_RESOLVER_UNSUPPORTED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(opts!(
        "dns_resolver_unsupported_total",
        "Total number of ANY and TXT questions declined with an empty response."
    ))
    .unwrap()
});

pub static DNS_RESOLVER_NAMESERVER_HIT_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(opts!(
        "dns_resolver_nameserver_hit_total",
        "Total number of successful exchanges with the upstream nameserver."
    ))
    .unwrap()
});

pub static DNS_RESOLVER_NAMESERVER_MISS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(opts!(
        "dns_resolver_nameserver_miss_total",
        "Total number of failed exchanges with the upstream nameserver."
    ))
    .unwrap()
});

pub static DNS_RESOLVER_FAILOVER_HIT_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(opts!(
        "dns_resolver_failover_hit_total",
        "Total number of successful exchanges with the failover nameserver."
    ))
    .unwrap()
});

pub static DNS_RESOLVER_FAILOVER_MISS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(opts!(
        "dns_resolver_failover_miss_total",
        "Total number of failed exchanges with the failover nameserver."
    ))
    .unwrap()
});

pub static DNS_RESOLVER_CNAME_CHASE_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(opts!(
        "dns_resolver_cname_chase_total",
        "Total number of CNAME chases attempted."
    ))
    .unwrap()
});

pub static DNS_RESOLVER_CNAME_CHASE_HIT_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(opts!(
        "dns_resolver_cname_chase_hit_total",
        "Total number of CNAME chases which produced an address."
    ))
    .unwrap()
});

pub static DNS_RESOLVER_DEFAULT_ANSWER_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(opts!(
        "dns_resolver_default_answer_total",
        "Total number of responses synthesised from the configured default IP."
    ))
    .unwrap()
});

pub static DNS_RESOLVER_PASSTHROUGH_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(opts!(
        "dns_resolver_passthrough_total",
        "Total number of upstream replies relayed to clients unmodified."
    ))
    .unwrap()
});

/// Fold one resolution's counters into the process-wide registry.
pub fn observe_resolution(metrics: &Metrics) {
    DNS_RESOLVER_UNSUPPORTED_TOTAL.inc_by(metrics.unsupported_queries);
    DNS_RESOLVER_NAMESERVER_HIT_TOTAL.inc_by(metrics.nameserver_hits);
    DNS_RESOLVER_NAMESERVER_MISS_TOTAL.inc_by(metrics.nameserver_misses);
    DNS_RESOLVER_FAILOVER_HIT_TOTAL.inc_by(metrics.failover_hits);
    DNS_RESOLVER_FAILOVER_MISS_TOTAL.inc_by(metrics.failover_misses);
    DNS_RESOLVER_CNAME_CHASE_TOTAL.inc_by(metrics.cname_chases);
    DNS_RESOLVER_CNAME_CHASE_HIT_TOTAL.inc_by(metrics.cname_chase_hits);
    DNS_RESOLVER_DEFAULT_ANSWER_TOTAL.inc_by(metrics.default_answers);
    DNS_RESOLVER_PASSTHROUGH_TOTAL.inc_by(metrics.passthroughs);
}

async fn get_metrics() -> (StatusCode, String) {
    match TextEncoder::new().encode_to_string(&prometheus::gather()) {
        Ok(metrics_str) => (StatusCode::OK, metrics_str),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

pub async fn serve_prometheus_endpoint_task(address: SocketAddr) -> std::io::Result<()> {
    let app = axum::Router::new().route("/metrics", routing::get(get_metrics));
    let listener = tokio::net::TcpListener::bind(address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
