pub mod setting_key;
pub mod settings_source;
pub mod settings_store;
