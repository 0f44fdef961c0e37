pub mod attendance;
pub mod camera;
pub mod detection;
pub mod pipeline;
pub mod recognition;
pub mod settings;
pub mod shared;
pub mod storage;
pub mod tracking;
