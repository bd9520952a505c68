pub mod connected;
pub mod core;
pub mod directory;
pub mod params;
pub mod sessions;
pub mod setup;
