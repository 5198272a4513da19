//! opsmon-tools: the HTTP layer shared by the binaries and their tests.

pub mod server;
