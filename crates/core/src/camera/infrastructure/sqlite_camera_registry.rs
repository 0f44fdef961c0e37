use rusqlite::{params, Row};

use crate::camera::domain::camera_config::{CameraConfig, VideoSource};
use crate::camera::domain::camera_registry::CameraRegistry;
use crate::shared::store_error::StoreError;
use crate::storage::infrastructure::database::Database;

/// Camera registry backed by the `cameras` table.
#[derive(Clone)]
pub struct SqliteCameraRegistry {
    db: Database,
}

impl SqliteCameraRegistry {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Register a camera and return its row id.
    pub fn add_camera(&self, camera: &CameraConfig) -> Result<i64, StoreError> {
        let (name, source, enabled, priority) = (
            camera.name.clone(),
            camera.source.to_string(),
            camera.enabled,
            camera.priority,
        );
        self.db.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO cameras (name, source, is_active, priority) VALUES (?1, ?2, ?3, ?4)",
                params![name, source, enabled, priority],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }
}

fn row_to_camera(row: &Row) -> Result<CameraConfig, StoreError> {
    let raw_source: String = row.get("source")?;
    let source = raw_source
        .parse::<VideoSource>()
        .map_err(StoreError::Invalid)?;
    Ok(CameraConfig {
        name: row.get("name")?,
        source,
        enabled: row.get("is_active")?,
        priority: row.get("priority")?,
    })
}

impl CameraRegistry for SqliteCameraRegistry {
    fn list_active(&self) -> Result<Vec<CameraConfig>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name, source, is_active, priority FROM cameras
                 WHERE is_active = 1
                 ORDER BY priority ASC, id ASC",
            )?;
            let mut rows = stmt.query([])?;
            let mut cameras = Vec::new();
            while let Some(row) = rows.next()? {
                match row_to_camera(row) {
                    Ok(camera) => cameras.push(camera),
                    Err(e) => log::warn!("Skipping camera row: {e}"),
                }
            }
            Ok(cameras)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera(name: &str, source: &str, enabled: bool, priority: i64) -> CameraConfig {
        CameraConfig {
            name: name.to_string(),
            source: source.parse().unwrap(),
            enabled,
            priority,
        }
    }

    #[test]
    fn test_lists_enabled_cameras_by_priority_then_creation() {
        let registry = SqliteCameraRegistry::new(Database::open_in_memory().unwrap());
        registry.add_camera(&camera("Back", "1", true, 5)).unwrap();
        registry.add_camera(&camera("Off", "2", false, 0)).unwrap();
        registry
            .add_camera(&camera("Door", "rtsp://door/stream", true, 1))
            .unwrap();
        registry.add_camera(&camera("Side", "3", true, 1)).unwrap();

        let names: Vec<_> = registry
            .list_active()
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Door", "Side", "Back"]);
    }

    #[test]
    fn test_round_trips_source_kinds() {
        let registry = SqliteCameraRegistry::new(Database::open_in_memory().unwrap());
        registry.add_camera(&camera("Usb", "0", true, 0)).unwrap();
        registry
            .add_camera(&camera("Ip", "http://10.0.0.9/video", true, 0))
            .unwrap();

        let cameras = registry.list_active().unwrap();
        assert_eq!(cameras[0].source, VideoSource::Device(0));
        assert_eq!(
            cameras[1].source,
            VideoSource::Uri("http://10.0.0.9/video".into())
        );
    }

    #[test]
    fn test_unparseable_rows_are_skipped() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute("INSERT INTO cameras (name, source) VALUES ('Broken', '')", [])?;
            Ok(())
        })
        .unwrap();
        let registry = SqliteCameraRegistry::new(db);
        registry.add_camera(&camera("Good", "0", true, 0)).unwrap();

        let cameras = registry.list_active().unwrap();
        assert_eq!(cameras.len(), 1);
        assert_eq!(cameras[0].name, "Good");
    }
}
