pub mod broker;
pub mod db;
pub mod mailer;
