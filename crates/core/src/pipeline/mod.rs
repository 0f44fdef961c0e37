pub mod annotation;
pub mod attendance_pipeline;
pub mod capture_loop;
pub mod detection_loop;
pub mod frame_stream;
pub mod infrastructure;
pub mod pipeline_config;
pub mod pipeline_logger;
pub mod shared_state;
