pub mod app;
pub mod client;
pub mod output;

pub use client::{ClientError, RecBoardClient};
