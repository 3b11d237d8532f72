pub mod access_token;
pub mod application;
pub mod env_file;
pub mod history;
pub mod permission;
pub mod tier;
pub mod user;
pub mod variable;
