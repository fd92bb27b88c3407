pub mod codegen;
pub mod config;
pub mod error;
pub mod geo;
pub mod handlers;
pub mod models;
pub mod oplog;
pub mod service;
pub mod store;

use crate::config::AppConfig;
use crate::oplog::OperatorLog;
use crate::service::LinkService;

/// Shared application state handed to every handler.
pub struct AppState {
    pub config: AppConfig,
    pub service: LinkService,
    pub oplog: OperatorLog,
}
