// Shared pieces used by both sides of the RecBoard channel:
// - Configuration loading
// - Message type names and their detail payloads
// - Shared error types

// Export config module - Configuration loading
pub mod config;
pub use config::*;

// Export types module - Request/reply detail payloads
pub mod types;
pub use types::*;

// Export errors module - Shared error types
pub mod errors;
pub use errors::*;
