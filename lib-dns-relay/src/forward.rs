use std::net::{Ipv4Addr, SocketAddr};

use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{Name, RData, Record, RecordType};

use crate::cname::resolve_cname;
use crate::metrics::Metrics;
use crate::util::nameserver::{query_nameserver_udp, QueryError};
use crate::util::net::serialise_message;
use crate::util::types::ForwardingConfig;

/// TTL of synthesised A records: chased CNAMEs and default-IP answers.
pub const SYNTHETIC_TTL: u32 = 15;

/// What one resolution produced: a message of our own making, or an upstream
/// reply to relay byte-for-byte.
enum Outcome {
    Build(Message),
    Relay(Vec<u8>),
}

/// Answer a raw DNS request.
///
/// This is the whole decision pipeline: ANY and TXT questions are declined
/// with an empty authoritative response; everything else is forwarded
/// verbatim to the primary nameserver; a CNAME in its reply is chased one
/// level and, when the chase succeeds, answered as a single A record for the
/// name the client asked for; an answerless reply gets one failover attempt;
/// and when no nameserver produces an answer - or any exchange times out,
/// errors, or returns garbage - the configured default IP is the answer.
///
/// Resolution failures never escape: the only way to get `None` back is a
/// request so mangled that no transaction id could be recovered from it, in
/// which case there is nothing well-formed to respond to.
pub async fn handle_raw_message(
    config: &ForwardingConfig,
    buf: &[u8],
) -> (Metrics, Option<Vec<u8>>) {
    let mut metrics = Metrics::new();

    let outcome = match Message::from_vec(buf) {
        Ok(request) => Some(resolve(config, &mut metrics, buf, &request).await),
        Err(error) => {
            tracing::debug!(?error, "unparseable request");
            recover_id(buf).map(|id| Outcome::Build(format_error_response(id)))
        }
    };

    let bytes = outcome.and_then(|outcome| match outcome {
        Outcome::Relay(bytes) => Some(bytes),
        Outcome::Build(message) => match serialise_message(&message) {
            Ok(bytes) => Some(bytes),
            Err(error) => {
                tracing::error!(?error, "could not serialise response");
                None
            }
        },
    });

    (metrics, bytes)
}

/// The decision pipeline for one parsed request.
async fn resolve(
    config: &ForwardingConfig,
    metrics: &mut Metrics,
    buf: &[u8],
    request: &Message,
) -> Outcome {
    if request.message_type() == MessageType::Response {
        return Outcome::Build(format_error_response(request.id()));
    }
    if request.op_code() != OpCode::Query {
        return Outcome::Build(error_response(request, ResponseCode::NotImp));
    }
    let Some(question) = request.queries().first().cloned() else {
        return Outcome::Build(format_error_response(request.id()));
    };

    tracing::debug!(question = %question.name(), qtype = %question.query_type(), "query received");

    // ANY and TXT are deliberately not handled: an empty authoritative
    // response, without contacting any nameserver.
    if matches!(question.query_type(), RecordType::ANY | RecordType::TXT) {
        metrics.unsupported_query();
        return Outcome::Build(response_skeleton(request, &question));
    }

    // Forward to the primary, byte-for-byte as the request arrived.  A
    // failed exchange goes straight to the default IP: the failover is only
    // for well-formed answerless replies.
    let reply = match query_nameserver_udp(config.upstream, buf).await {
        Ok(reply) => {
            metrics.nameserver_hit();
            reply
        }
        Err(error) => {
            metrics.nameserver_miss();
            metrics.default_answer();
            log_exchange_failure(config.upstream, &error);
            return Outcome::Build(address_response(request, &question, config.default_ip));
        }
    };

    // A CNAME in the reply gets chased, and a successful chase wins
    // outright, whatever else the reply contained.  The answer maps the name
    // the client asked for, not the canonical name.  A failed chase falls
    // through to judge the primary reply as if there were no CNAME in it.
    if let Some(canonical_name) = first_cname(reply.message.answers()) {
        metrics.cname_chase();
        tracing::debug!(%canonical_name, "CNAME record found, chasing");
        if let Some(address) = resolve_cname(config, &canonical_name).await {
            metrics.cname_chase_hit();
            return Outcome::Build(address_response(request, &question, address));
        }
        tracing::debug!(%canonical_name, "chase failed, continuing with the primary reply");
    }

    // An answerless reply gets one failover attempt with the same raw
    // request.
    let reply = if reply.message.answers().is_empty() {
        tracing::debug!(nameserver = %config.upstream, "empty reply, trying the failover");
        match query_nameserver_udp(config.failover, buf).await {
            Ok(failover_reply) => {
                metrics.failover_hit();
                failover_reply
            }
            Err(error) => {
                metrics.failover_miss();
                metrics.default_answer();
                log_exchange_failure(config.failover, &error);
                return Outcome::Build(address_response(request, &question, config.default_ip));
            }
        }
    } else {
        reply
    };

    if reply.message.answers().is_empty() {
        metrics.default_answer();
        tracing::debug!(question = %question.name(), "no nameserver had an answer, using the default IP");
        return Outcome::Build(address_response(request, &question, config.default_ip));
    }

    metrics.pass_through();
    Outcome::Relay(reply.bytes)
}

/// Timeouts are routine; anything else is worth a louder note, even though
/// it degrades the same way.
fn log_exchange_failure(nameserver: SocketAddr, error: &QueryError) {
    match error {
        QueryError::Timeout => tracing::debug!(%nameserver, "exchange timed out"),
        error => tracing::warn!(%nameserver, ?error, "exchange failed"),
    }
}

/// The first CNAME target in an answer section, in server order.
fn first_cname(answers: &[Record]) -> Option<Name> {
    answers.iter().find_map(|record| match record.data() {
        RData::CNAME(canonical_name) => Some(canonical_name.0.clone()),
        _ => None,
    })
}

/// Authoritative, recursion available, question echoed, no answers.  This is
/// both the skeleton of the synthesised answers and, as-is, the response to
/// an unsupported question type.
fn response_skeleton(request: &Message, question: &Query) -> Message {
    let mut response = Message::new(request.id(), MessageType::Response, OpCode::Query);
    response.set_authoritative(true);
    response.set_recursion_available(true);
    response.add_query(question.clone());
    response
}

/// A response answering the question with a single fixed address.
fn address_response(request: &Message, question: &Query, address: Ipv4Addr) -> Message {
    let mut response = response_skeleton(request, question);
    response.add_answer(Record::from_rdata(
        question.name().clone(),
        SYNTHETIC_TTL,
        RData::A(A(address)),
    ));
    response
}

/// A header-only error response, echoing the request's id and opcode.
fn error_response(request: &Message, rcode: ResponseCode) -> Message {
    let mut response = Message::new(request.id(), MessageType::Response, request.op_code());
    response.set_response_code(rcode);
    response
}

/// A header-only FORMERR response for requests that did not parse.
fn format_error_response(id: u16) -> Message {
    let mut response = Message::new(id, MessageType::Response, OpCode::Query);
    response.set_response_code(ResponseCode::FormErr);
    response
}

/// Fish the transaction id out of a request that would not parse.  Twelve
/// octets is a full header; anything shorter is not worth answering.
fn recover_id(buf: &[u8]) -> Option<u16> {
    if buf.len() >= 12 {
        Some(u16::from_be_bytes([buf[0], buf[1]]))
    } else {
        None
    }
}
