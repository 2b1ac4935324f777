mod clock;
mod driver;
mod engine;
mod format;
mod listeners;

pub use clock::{Clock, ManualClock, SystemClock};
pub use driver::{ManualDriver, TaskId, TickDriver, TokioDriver};
pub use engine::{
    CountdownEngine, CountdownPhase, CountdownState, CountdownStatus, EngineServices,
};
pub use format::format_remaining;
pub use listeners::{Listener, ListenerId, Listeners};
