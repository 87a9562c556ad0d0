pub mod clear_session;
pub mod login;
