mod task;

pub use task::PeriodicTask;
