pub mod audio;
pub mod errors;
pub mod handlers;
pub mod ipc_server;
pub mod reclist;

pub use audio::{AudioConverter, CommandConverter};
pub use errors::HandlerError;
pub use handlers::{register_handlers, AudioSaveHandler, ReclistHandler};
pub use ipc_server::{run_server, serve};
