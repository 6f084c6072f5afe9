//! # poolscale-events
//!
//! Event types delivered by the scale-set message session to the listener.
//!
//! ## Design Principles
//!
//! - Events arrive in session order and are handled one at a time
//! - Job lifecycle events identify exactly one ephemeral runner
//! - Desired-count events carry the number of jobs currently asking for a runner
//!
//! ## Wire Format
//!
//! The session client hands events over as one JSON object per line, tagged
//! by `type`:
//!
//! ```text
//! {"type":"job_started","runner_name":"pool-abc12","owner_name":"acme",...}
//! {"type":"job_completed","runner_name":"pool-abc12","result":"succeeded",...}
//! {"type":"desired_count","count":3}
//! ```

mod envelope;
mod error;
mod types;

pub use envelope::*;
pub use error::EventError;
pub use types::*;
