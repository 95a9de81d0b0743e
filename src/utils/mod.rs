pub mod clock;
pub mod error;
pub mod logging;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AppError, AppResult};
