pub mod attendance;
pub mod export;
pub mod monitoring;
pub mod schema;
pub mod settings;
pub mod table_editor;
pub mod users;
