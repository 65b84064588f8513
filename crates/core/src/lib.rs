#![forbid(unsafe_code)]

pub mod clock;
pub mod paths;
pub mod protocol;
pub mod validation;

mod role;

pub use clock::{Clock, ManualClock, SystemClock};
pub use role::{ParseRoleError, Role};
