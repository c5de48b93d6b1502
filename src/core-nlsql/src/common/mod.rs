pub mod config;
pub mod db_env;
pub mod logging;
