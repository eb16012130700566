pub mod anki;
pub mod core;
pub mod notion;
pub mod persistence;
pub mod settings;
