mod clock;
mod machine;

pub use clock::{Clock, ManualClock, SystemClock};
pub use machine::{CaptureEvent, CaptureState, CaptureStateMachine, CaptureStatus, TickInput};
