/// Low-level async networking helpers
pub mod async_read;
