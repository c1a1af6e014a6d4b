pub mod app_token;
pub mod credentials;
