use std::{net::SocketAddr, sync::Arc, time::Duration};

use clap::Parser;
use mixed_proxy::{describe_metrics, Connector, DirectConnector, ProxyServer, ProxyServerConfig};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Forward proxy serving SOCKS5 and HTTP/HTTP-CONNECT clients on one port
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TCP address for accepting proxy clients
    #[arg(env, long, default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    /// Timeout for dialing destinations, in milliseconds
    #[arg(env, long, default_value_t = 5000)]
    dial_timeout_ms: u64,

    /// Reject SOCKS5 clients
    #[arg(env, long)]
    disable_socks5: bool,

    /// Reject HTTP and HTTP-CONNECT clients
    #[arg(env, long)]
    disable_http: bool,
}

#[tokio::main]
async fn main() {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }
    if std::env::var_os("RUST_BACKTRACE").is_none() {
        std::env::set_var("RUST_BACKTRACE", "1");
    }
    let args: Args = Args::parse();
    tracing_subscriber::registry().with(fmt::layer()).with(EnvFilter::from_default_env()).init();
    describe_metrics();

    let connector: Arc<dyn Connector> = Arc::new(DirectConnector::new(Duration::from_millis(args.dial_timeout_ms)));
    let cfg = ProxyServerConfig {
        listen: args.listen,
        socks5: Some(connector.clone()),
        http: Some(connector),
        disable_socks5: args.disable_socks5,
        disable_http: args.disable_http,
    };
    let server = match ProxyServer::new(cfg).await {
        Ok(server) => server,
        Err(e) => {
            log::error!("[Main] start proxy server on {} error {e}", args.listen);
            std::process::exit(1);
        }
    };
    server.run().await;
}
