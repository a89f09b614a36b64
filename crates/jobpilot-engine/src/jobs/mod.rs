pub mod discovery;
pub mod outcome;
pub mod trigger;

pub use discovery::{DiscoveryReport, JobDiscovery};
pub use outcome::{JobOutcome, JobOutcomes, JobRecord};
pub use trigger::{JobTrigger, TriggerOutcome};
