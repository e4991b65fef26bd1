pub mod import;
pub mod init;
pub mod split;
pub mod status;
