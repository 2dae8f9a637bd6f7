use std::io;
use std::net::SocketAddr;
use tokio::net::UdpSocket;

use hickory_proto::op::Message;
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};
use hickory_proto::ProtoError;

/// Serialise a message to wire format.
pub fn serialise_message(message: &Message) -> Result<Vec<u8>, ProtoError> {
    let mut buf = Vec::with_capacity(512);
    let mut encoder = BinEncoder::new(&mut buf);
    message.emit(&mut encoder)?;

    Ok(buf)
}

/// Write a serialised message to a UDP channel, addressed to `target`.  This
/// sets or clears the TC flag as appropriate: a message over 512 octets is
/// truncated and flagged rather than oversent.
pub async fn send_udp_bytes_to(
    sock: &UdpSocket,
    target: SocketAddr,
    bytes: &mut [u8],
) -> Result<(), io::Error> {
    if bytes.len() < 12 {
        tracing::error!(length = %bytes.len(), "message too short");
        return Ok(());
    }

    if bytes.len() > 512 {
        bytes[2] |= 0b00000010;
        sock.send_to(&bytes[..512], target).await?;
    } else {
        bytes[2] &= 0b11111101;
        sock.send_to(bytes, target).await?;
    }

    Ok(())
}
