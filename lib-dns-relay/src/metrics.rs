/// Counters from one resolution attempt.  The pipeline builds this structure
/// rather than updating the Prometheus metrics directly, which keeps the
/// library free of process-wide registry state.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Metrics {
    /// ANY and TXT questions, declined without contacting any nameserver.
    pub unsupported_queries: u64,
    /// Exchanges where the primary nameserver produced a parseable reply.
    pub nameserver_hits: u64,
    /// Exchanges where the primary nameserver timed out, was unreachable, or
    /// produced garbage.
    pub nameserver_misses: u64,
    /// CNAME chases attempted.
    pub cname_chases: u64,
    /// CNAME chases which produced an address.
    pub cname_chase_hits: u64,
    /// Exchanges where the failover nameserver produced a parseable reply.
    pub failover_hits: u64,
    /// Exchanges where the failover nameserver timed out, was unreachable,
    /// or produced garbage.
    pub failover_misses: u64,
    /// Responses synthesised from the configured default IP.
    pub default_answers: u64,
    /// Upstream replies relayed to the client unmodified.
    pub passthroughs: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            unsupported_queries: 0,
            nameserver_hits: 0,
            nameserver_misses: 0,
            cname_chases: 0,
            cname_chase_hits: 0,
            failover_hits: 0,
            failover_misses: 0,
            default_answers: 0,
            passthroughs: 0,
        }
    }

    pub fn unsupported_query(&mut self) {
        self.unsupported_queries += 1;
    }

    pub fn nameserver_hit(&mut self) {
        self.nameserver_hits += 1;
    }

    pub fn nameserver_miss(&mut self) {
        self.nameserver_misses += 1;
    }

    pub fn cname_chase(&mut self) {
        self.cname_chases += 1;
    }

    pub fn cname_chase_hit(&mut self) {
        self.cname_chase_hits += 1;
    }

    pub fn failover_hit(&mut self) {
        self.failover_hits += 1;
    }

    pub fn failover_miss(&mut self) {
        self.failover_misses += 1;
    }

    pub fn default_answer(&mut self) {
        self.default_answers += 1;
    }

    pub fn pass_through(&mut self) {
        self.passthroughs += 1;
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
