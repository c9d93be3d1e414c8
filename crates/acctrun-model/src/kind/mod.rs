mod backoff;
pub use backoff::{BackoffStrategy, JitterStrategy};

mod phase;
pub use phase::RunPhase;
