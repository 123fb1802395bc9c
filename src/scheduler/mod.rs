pub mod gate;
pub mod service;
pub mod transition;

pub use gate::DaemonGate;
pub use service::SchedulerService;
pub use transition::{plan_tick, FireEffect, TerminalReason, TickDecision, TickOutcome};
