pub mod database;
mod migrations;
