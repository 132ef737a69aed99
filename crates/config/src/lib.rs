//! Configuration for the botch host process.
//!
//! Discovery, `${ENV}` substitution and environment overrides. The gateway
//! client itself never reads configuration; the host resolves a
//! [`GatewayConfig`] here and passes its values into the client options.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{
        apply_env_overrides, clear_config_dir, config_dir, discover_and_load, load_config,
        set_config_dir,
    },
    schema::{BotchConfig, DEFAULT_GATEWAY_URL, GatewayConfig},
};
