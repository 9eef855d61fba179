// Infrastructure layer - External dependencies and adapters
pub mod collector_client;
pub mod config;
pub mod credentials;
pub mod file_sink;
pub mod handshake;
pub mod inverter_client;
pub mod scram;
