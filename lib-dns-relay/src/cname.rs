use rand::Rng;
use std::net::Ipv4Addr;

use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};

use crate::util::nameserver::query_nameserver_udp;
use crate::util::net::serialise_message;
use crate::util::types::ForwardingConfig;

/// Resolve the target of a CNAME record to an address, by asking the
/// configured nameservers directly: the primary first, then the failover.
/// The first A record of the first reply that has one wins; later records
/// are ignored.
///
/// Every failure along the way - a timeout, an unreachable nameserver, a
/// garbage reply, an A-less reply from both - collapses into `None`.  A
/// failed chase is not an error: the pipeline falls back to its other
/// answers.
pub async fn resolve_cname(config: &ForwardingConfig, canonical_name: &Name) -> Option<Ipv4Addr> {
    let query = build_address_query(canonical_name);
    let serialised = match serialise_message(&query) {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::debug!(?error, "could not serialise chase query");
            return None;
        }
    };

    for address in [config.upstream, config.failover] {
        match query_nameserver_udp(address, &serialised).await {
            Ok(reply) => {
                if let Some(found) = first_a_record(reply.message.answers()) {
                    return Some(found);
                }
                tracing::debug!(nameserver = %address, "no A record in chase reply");
            }
            Err(error) => {
                tracing::debug!(nameserver = %address, ?error, "chase exchange failed");
            }
        }
    }

    None
}

/// An A-type question for the given name, with a fresh transaction id.
fn build_address_query(name: &Name) -> Message {
    let mut question = Query::new();
    question.set_name(name.clone());
    question.set_query_type(RecordType::A);
    question.set_query_class(DNSClass::IN);

    let mut message = Message::new(rand::thread_rng().gen(), MessageType::Query, OpCode::Query);
    message.set_recursion_desired(true);
    message.add_query(question);
    message
}

/// The first A record in an answer section, in server order.
fn first_a_record(answers: &[Record]) -> Option<Ipv4Addr> {
    answers.iter().find_map(|record| match record.data() {
        RData::A(address) => Some(address.0),
        _ => None,
    })
}
