pub mod conn_fig;
pub mod core;
pub mod error;
pub mod indices;
pub mod parser;
pub mod route;
