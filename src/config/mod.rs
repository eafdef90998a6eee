pub mod schema;

pub use schema::{BotConfig, Config, LinksConfig, RelayConfig};
