pub mod access;
pub mod init;
pub mod store;
