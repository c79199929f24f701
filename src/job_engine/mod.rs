pub mod launcher;
pub mod monitor;
pub mod post_action;
pub mod preflight;
pub mod types;

pub use launcher::{launch, JobHandle};
pub use monitor::ProgressMonitor;
pub use post_action::{CountdownHandle, PostActionPlan, PostActionScheduler};
pub use types::{
    split_exclusion_list, AppEvent, CountdownPhase, CountdownState, ExclusionSet, JobConfig,
    JobOutcome, PostAction, PowerAction, PreflightReport, PreflightResult, ProgressState,
};
