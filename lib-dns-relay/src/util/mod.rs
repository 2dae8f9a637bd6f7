pub mod nameserver;
pub mod net;
pub mod types;

#[cfg(test)]
pub mod test_util {
    use hickory_proto::op::{Message, MessageType, OpCode, Query};
    use hickory_proto::rr::rdata::{A, CNAME};
    use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};
    use std::net::{Ipv4Addr, SocketAddr};
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::net::UdpSocket;
    use tokio::sync::oneshot;

    use crate::util::net::serialise_message;

    pub fn domain(name: &str) -> Name {
        Name::from_str(name).unwrap()
    }

    pub fn a_record(name: &str, address: Ipv4Addr) -> Record {
        Record::from_rdata(domain(name), 300, RData::A(A(address)))
    }

    pub fn cname_record(name: &str, target: &str) -> Record {
        Record::from_rdata(domain(name), 300, RData::CNAME(CNAME(domain(target))))
    }

    pub fn query_message(id: u16, name: &str, qtype: RecordType) -> Message {
        let mut question = Query::new();
        question.set_name(domain(name));
        question.set_query_type(qtype);
        question.set_query_class(DNSClass::IN);

        let mut message = Message::new(id, MessageType::Query, OpCode::Query);
        message.set_recursion_desired(true);
        message.add_query(question);
        message
    }

    pub fn serialise(message: &Message) -> Vec<u8> {
        serialise_message(message).unwrap()
    }

    /// What a `MockNameserver` does with a request.
    #[derive(Debug, Clone)]
    pub enum MockBehaviour {
        /// Echo the request's id and question, with the given answer section.
        Answer { answers: Vec<Record> },
        /// Reply with these exact octets, whatever the request was.
        Raw(Vec<u8>),
        /// Reply with octets that do not parse as a DNS message.
        Garbage,
        /// Never reply.
        Silent,
    }

    /// An in-process nameserver on an ephemeral localhost port, following a
    /// script of behaviours (the last entry repeats).  Counts the requests it
    /// receives, so tests can assert which endpoints were contacted.
    pub struct MockNameserver {
        pub address: SocketAddr,
        hits: Arc<AtomicUsize>,
        shutdown: Option<oneshot::Sender<()>>,
    }

    impl MockNameserver {
        pub async fn start(behaviour: MockBehaviour) -> Self {
            Self::start_scripted(vec![behaviour]).await
        }

        pub async fn start_scripted(script: Vec<MockBehaviour>) -> Self {
            assert!(!script.is_empty());

            let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
            let address = socket.local_addr().unwrap();
            let hits = Arc::new(AtomicUsize::new(0));
            let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

            let counter = hits.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 512];
                let mut step = 0;
                loop {
                    tokio::select! {
                        _ = &mut shutdown_rx => break,
                        res = socket.recv_from(&mut buf) => {
                            let Ok((size, peer)) = res else { break };
                            counter.fetch_add(1, Ordering::SeqCst);
                            let behaviour = script.get(step).unwrap_or_else(|| script.last().unwrap());
                            step += 1;
                            match behaviour {
                                MockBehaviour::Silent => (),
                                MockBehaviour::Garbage => {
                                    let _ = socket.send_to(&[0xff, 0xff, 0xff], peer).await;
                                }
                                MockBehaviour::Raw(bytes) => {
                                    let _ = socket.send_to(bytes, peer).await;
                                }
                                MockBehaviour::Answer { answers } => {
                                    let Ok(request) = Message::from_vec(&buf[..size]) else { continue };
                                    let mut response = Message::new(
                                        request.id(),
                                        MessageType::Response,
                                        OpCode::Query,
                                    );
                                    response.set_recursion_available(true);
                                    for question in request.queries() {
                                        response.add_query(question.clone());
                                    }
                                    for answer in answers {
                                        response.add_answer(answer.clone());
                                    }
                                    if let Ok(bytes) = serialise_message(&response) {
                                        let _ = socket.send_to(&bytes, peer).await;
                                    }
                                }
                            }
                        }
                    }
                }
            });

            MockNameserver {
                address,
                hits,
                shutdown: Some(shutdown_tx),
            }
        }

        /// How many requests have arrived so far.
        pub fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }
    }

    impl Drop for MockNameserver {
        fn drop(&mut self) {
            if let Some(tx) = self.shutdown.take() {
                let _ = tx.send(());
            }
        }
    }
}
