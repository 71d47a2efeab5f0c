// HTTP routers and handlers
pub mod api;

// Admin token gate
pub mod auth;

// File + environment configuration
pub mod config;

// Per-user refresh token storage
pub mod credentials;

// Step-by-step credential diagnostics
pub mod diagnostics;

// Delegated drive operations
pub mod drive;

// OAuth token endpoint client
pub mod token;
