pub mod sqlite_settings_source;
