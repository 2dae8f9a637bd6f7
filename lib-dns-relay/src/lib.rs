#![warn(clippy::pedantic)]
// TODO: fix
#![allow(clippy::missing_errors_doc)]
// Don't care enough to fix
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::similar_names)]

pub mod cname;
pub mod forward;
pub mod metrics;
pub mod util;

pub use self::forward::handle_raw_message;
pub use self::metrics::Metrics;
pub use self::util::types::ForwardingConfig;
