mod common;
mod data;
mod handshake;
mod resume;
mod retransmit;
mod server;
