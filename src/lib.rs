#![warn(clippy::pedantic)]
// Noisy doc/signature lints — would require annotating most pub functions
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
// Style preference — keeping format!("{}", x) over format!("{x}") for readability with complex exprs
#![allow(clippy::uninlined_format_args)]
// Intentional casts around epoch timestamps and counters
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
// Module structure — store::TaskStore, scheduler::SchedulerService by design
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod comm;
pub mod config;
pub mod errors;
pub mod relay;
pub mod scheduler;
pub mod store;
pub(crate) mod utils;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
