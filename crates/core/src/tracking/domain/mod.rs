pub mod tracker_set;
pub mod visual_tracker;
