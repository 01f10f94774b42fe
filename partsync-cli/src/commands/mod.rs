pub mod check;
pub mod control;
pub mod daemon;
pub mod init;
