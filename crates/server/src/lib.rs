pub mod app;
pub mod bootstrap;
pub mod chat;
pub mod error;
pub mod health;
pub mod pages;
pub mod slack;

pub use app::build_router;
pub use bootstrap::{bootstrap, bootstrap_with_config, Application, BootstrapError};
