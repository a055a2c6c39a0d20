use metrics::{describe_counter, describe_gauge};

// this is for accepted connections, labeled by protocol
pub const METRICS_PROXY_CONN_COUNT: &str = "mixed_proxy_conn_count";
pub const METRICS_PROXY_CONN_ERROR_COUNT: &str = "mixed_proxy_conn_error_count";

// this is for connections which reached the relay stage
pub const METRICS_PROXY_RELAY_LIVE: &str = "mixed_proxy_relay_live";

// this is for outgoing connections made by connectors
pub const METRICS_BACKEND_CONNECT_ERROR_COUNT: &str = "mixed_proxy_backend_connect_error_count";

pub fn describe_metrics() {
    describe_counter!(METRICS_PROXY_CONN_COUNT, "Number of accepted proxy connections");
    describe_counter!(METRICS_PROXY_CONN_ERROR_COUNT, "Number of proxy connections closed by error");

    describe_gauge!(METRICS_PROXY_RELAY_LIVE, "Live relayed proxy connections");

    describe_counter!(METRICS_BACKEND_CONNECT_ERROR_COUNT, "Number of failed backend connects");
}
