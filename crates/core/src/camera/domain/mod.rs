pub mod backoff;
pub mod camera_config;
pub mod camera_connection;
pub mod camera_registry;
pub mod frame_source;
