//! Types shared between the exporter daemon and its tests: the dotted-key
//! store that remote query output is decoded into, metric readings, and the
//! wire-level constants of the airOS management shell.

pub mod protocol;
pub mod reading;
pub mod store;

pub use reading::{MetricKind, MetricReading, Scope};
pub use store::{Node, Shape, Store, StoreError};
