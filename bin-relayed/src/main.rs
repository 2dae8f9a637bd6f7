use bytes::BytesMut;
use clap::Parser;
use std::net::{Ipv4Addr, SocketAddr};
use std::process;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Semaphore};
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dns_relay::util::net::send_udp_bytes_to;
use dns_relay::{handle_raw_message, ForwardingConfig};

mod metrics;

/// Upper bound on queries being resolved at once.  Datagrams arriving beyond
/// it are dropped, not queued.
const MAX_IN_FLIGHT_QUERIES: usize = 512;

// the doc comments for this struct turn into the CLI help text
#[derive(Debug, Parser)]
/// A forwarding DNS resolver for small networks.
///
/// relayed answers every query, one way or another:
///
/// - queries are forwarded to an upstream nameserver
///
/// - a CNAME in the reply is chased one level to an address
///
/// - a failover nameserver is consulted when the upstream has nothing
///
/// - when every path fails, a configured default IP is the answer
///
/// Only A-record resolution over UDP is supported: ANY and TXT questions are
/// answered empty, and there is no caching, no DNSSEC, and no TCP.
struct Args {
    /// Interface to listen on
    #[arg(short, long, env = "RELAYED_INTERFACE", default_value_t = Ipv4Addr::UNSPECIFIED)]
    interface: Ipv4Addr,

    /// Port to listen on
    #[arg(short, long, env = "RELAYED_PORT", default_value_t = 53)]
    port: u16,

    /// Nameserver to forward queries to
    #[arg(short, long, env = "RELAYED_UPSTREAM", default_value = "8.8.8.8:53")]
    upstream: SocketAddr,

    /// Nameserver to fall back to when the upstream has no answer
    #[arg(short, long, env = "RELAYED_FAILOVER", default_value = "1.1.1.1:53")]
    failover: SocketAddr,

    /// Address to answer with when resolution fails entirely
    #[arg(short, long, env = "RELAYED_DEFAULT_IP", default_value_t = Ipv4Addr::LOCALHOST)]
    default_ip: Ipv4Addr,

    /// Address to serve prometheus metrics on
    #[arg(short, long, env = "RELAYED_METRICS_ADDRESS", default_value = "127.0.0.1:9420")]
    metrics_address: SocketAddr,

    /// Log in JSON format
    #[arg(long, env = "RELAYED_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    initialise_tracing(args.log_json);

    let config = ForwardingConfig {
        upstream: args.upstream,
        failover: args.failover,
        default_ip: args.default_ip,
    };

    let socket = match UdpSocket::bind((args.interface, args.port)).await {
        Ok(socket) => socket,
        Err(error) => {
            eprintln!("error binding UDP socket: {error:?}");
            process::exit(1);
        }
    };

    tracing::info!(
        interface = %args.interface,
        port = %args.port,
        upstream = %config.upstream,
        failover = %config.failover,
        default_ip = %config.default_ip,
        "listening"
    );

    tokio::spawn(async move {
        if let Err(error) = metrics::serve_prometheus_endpoint_task(args.metrics_address).await {
            tracing::error!(?error, "prometheus endpoint failed");
        }
    });

    tokio::select! {
        () = listen_udp(config, socket) => (),
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }
}

/// The transport loop: datagrams in, responses out.  Each query is resolved
/// on its own task so a slow upstream only stalls its own client, with the
/// semaphore capping how many resolutions can be outstanding at once; the
/// mpsc channel funnels responses back through the one socket.  Responses go
/// out in completion order, not arrival order.
async fn listen_udp(config: ForwardingConfig, socket: UdpSocket) {
    let (tx, mut rx) = mpsc::channel::<(Vec<u8>, SocketAddr)>(32);
    let semaphore = Arc::new(Semaphore::new(MAX_IN_FLIGHT_QUERIES));
    let mut buf = vec![0u8; 512];

    loop {
        tokio::select! {
            Ok((size, peer)) = socket.recv_from(&mut buf) => {
                metrics::DNS_REQUESTS_TOTAL.inc();

                let Ok(permit) = semaphore.clone().try_acquire_owned() else {
                    metrics::DNS_REQUESTS_DROPPED_TOTAL.inc();
                    tracing::warn!(%peer, "dropping query, too many in flight");
                    continue;
                };

                let bytes = BytesMut::from(&buf[..size]);
                let reply = tx.clone();
                tokio::spawn(async move {
                    let started = Instant::now();
                    let (resolution_metrics, response) =
                        handle_raw_message(&config, bytes.as_ref()).await;
                    metrics::observe_resolution(&resolution_metrics);
                    metrics::DNS_RESPONSE_TIME_SECONDS.observe(started.elapsed().as_secs_f64());

                    if let Some(response) = response {
                        if let Err(error) = reply.send((response, peer)).await {
                            tracing::warn!(%peer, ?error, "reply channel closed");
                        }
                    }

                    drop(permit);
                });
            }

            Some((mut response, peer)) = rx.recv() => {
                metrics::DNS_RESPONSES_TOTAL.inc();
                if let Err(error) = send_udp_bytes_to(&socket, peer, &mut response).await {
                    tracing::warn!(%peer, ?error, "could not send response");
                }
            }
        }
    }
}

/// Logging goes to stderr, filtered by `RUST_LOG`, defaulting to info.
fn initialise_tracing(json: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
