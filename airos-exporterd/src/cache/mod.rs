pub mod clock;
pub mod ttl;

pub use clock::{Clock, SystemClock};
pub use ttl::TtlCache;
