pub mod appconfig;
pub mod iac;
pub mod loader;
pub mod openapi;
pub mod sql;

pub use appconfig::ConfigAnalyzer;
pub use iac::IacAnalyzer;
pub use openapi::OpenApiAnalyzer;
pub use sql::SqlAnalyzer;
