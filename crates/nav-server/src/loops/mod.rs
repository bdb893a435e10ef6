//! Background loops.

pub mod detection_loop;

pub use detection_loop::{
    run_detection_loop, scheduler_channel, DetectionDeps, SchedulerCommand, SchedulerHandle,
    SchedulerInbox,
};
