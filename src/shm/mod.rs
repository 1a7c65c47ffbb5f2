pub mod region;
pub mod sync;

pub use region::SharedRegion;
pub use sync::{MutexGuard, NamedEvent, NamedMutex, SyncSet};
