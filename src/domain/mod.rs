// Chat commands and updates
pub mod chat;

// Market data domain
pub mod market;

// Feature schema shared by inference and dataset export
pub mod ml;

// Port interfaces
pub mod ports;

// Core trading domain
pub mod trading;

// Domain-specific error types
pub mod errors;
