pub mod clock;
pub mod config;
pub mod duration;
pub mod error;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ClaimConfig, CommitPolicy, Config, ExpirationBasis};
pub use duration::{format_duration, parse_duration, parse_duration_secs};
pub use error::*;
