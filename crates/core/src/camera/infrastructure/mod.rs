pub mod ffmpeg_camera;
pub mod sqlite_camera_registry;
