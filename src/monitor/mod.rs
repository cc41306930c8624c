// Live dashboard state
//
// Refreshers poll read-only resources on an interval; the query runner owns
// a single cancellable query. Both publish state over watch channels.

mod query;
mod refresher;

pub use query::{QueryRunner, QueryState};
pub use refresher::{Refresher, ResourceState};
