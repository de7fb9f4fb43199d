mod tracker;

pub use tracker::RestartTracker;
