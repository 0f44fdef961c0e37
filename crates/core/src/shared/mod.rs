pub mod clock;
pub mod constants;
pub mod detection_result;
pub mod face_box;
pub mod frame;
pub mod stop_signal;
pub mod store_error;
