pub mod discord;
pub mod relay;
