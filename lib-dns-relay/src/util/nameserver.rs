use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use hickory_proto::op::Message;
use hickory_proto::ProtoError;

use crate::util::types::NameserverReply;

/// How long to wait on a remote nameserver before giving up on it.
pub const NAMESERVER_TIMEOUT: Duration = Duration::from_secs(2);

/// Ways an exchange with a remote nameserver can fail.  All of these are
/// expected failures: callers map them into their fallback logic rather than
/// propagating them.
#[derive(Debug)]
pub enum QueryError {
    /// The request does not fit in a single UDP datagram.
    RequestTooLong { len: usize },
    /// The nameserver did not answer within `NAMESERVER_TIMEOUT`.
    Timeout,
    /// Socket-level failure while sending or receiving.
    Network(io::Error),
    /// The reply could not be parsed as a DNS message.
    Parse(ProtoError),
}

/// Send a serialised message to a remote nameserver over UDP, returning the
/// reply.  The request octets are sent exactly as given.  The reply is not
/// validated beyond parsing - consumers decide what to trust.
///
/// This has a 2s timeout.
pub async fn query_nameserver_udp(
    address: SocketAddr,
    serialised_request: &[u8],
) -> Result<NameserverReply, QueryError> {
    if serialised_request.len() > 512 {
        return Err(QueryError::RequestTooLong {
            len: serialised_request.len(),
        });
    }

    match timeout(
        NAMESERVER_TIMEOUT,
        query_nameserver_udp_notimeout(address, serialised_request),
    )
    .await
    {
        Ok(res) => res,
        Err(_) => Err(QueryError::Timeout),
    }
}

/// Timeout-less version of `query_nameserver_udp`.
async fn query_nameserver_udp_notimeout(
    address: SocketAddr,
    serialised_request: &[u8],
) -> Result<NameserverReply, QueryError> {
    let sock = UdpSocket::bind("0.0.0.0:0")
        .await
        .map_err(QueryError::Network)?;
    sock.connect(address).await.map_err(QueryError::Network)?;
    sock.send(serialised_request)
        .await
        .map_err(QueryError::Network)?;

    let mut buf = vec![0u8; 512];
    let len = sock.recv(&mut buf).await.map_err(QueryError::Network)?;
    buf.truncate(len);

    let message = Message::from_vec(&buf).map_err(QueryError::Parse)?;

    Ok(NameserverReply { bytes: buf, message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_util::*;
    use hickory_proto::rr::RecordType;
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn query_nameserver_udp_returns_reply_bytes_and_message() {
        let nameserver = MockNameserver::start(MockBehaviour::Answer {
            answers: vec![a_record("www.example.com.", Ipv4Addr::new(1, 1, 1, 1))],
        })
        .await;

        let request = serialise(&query_message(1234, "www.example.com.", RecordType::A));
        let reply = query_nameserver_udp(nameserver.address, &request)
            .await
            .unwrap();

        assert_eq!(reply.message.id(), 1234);
        assert_eq!(reply.message.answers().len(), 1);
        // the raw octets are the reply as received, not a re-serialisation
        assert_eq!(Message::from_vec(&reply.bytes).unwrap(), reply.message);
    }

    #[tokio::test]
    async fn query_nameserver_udp_rejects_oversized_requests() {
        let nameserver = MockNameserver::start(MockBehaviour::Silent).await;

        let request = vec![0u8; 600];
        let res = query_nameserver_udp(nameserver.address, &request).await;

        assert!(matches!(res, Err(QueryError::RequestTooLong { len: 600 })));
        assert_eq!(nameserver.hits(), 0);
    }

    #[tokio::test]
    async fn query_nameserver_udp_maps_garbage_replies_to_parse_errors() {
        let nameserver = MockNameserver::start(MockBehaviour::Garbage).await;

        let request = serialise(&query_message(1234, "www.example.com.", RecordType::A));
        let res = query_nameserver_udp(nameserver.address, &request).await;

        assert!(matches!(res, Err(QueryError::Parse(_))));
    }

    #[tokio::test]
    async fn query_nameserver_udp_times_out_on_a_silent_nameserver() {
        let nameserver = MockNameserver::start(MockBehaviour::Silent).await;

        let request = serialise(&query_message(1234, "www.example.com.", RecordType::A));
        let res = query_nameserver_udp(nameserver.address, &request).await;

        assert!(matches!(res, Err(QueryError::Timeout)));
        assert_eq!(nameserver.hits(), 1);
    }
}
