mod maintenance;
mod pipeline_jobs;
mod tracker;

pub use maintenance::*;
pub use pipeline_jobs::*;
