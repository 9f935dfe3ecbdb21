// Data model and shared plumbing
pub mod domain;
pub mod shared;
pub mod config;

// Normalization, branch graph and current-branch selection
pub mod history;

// User overlays (marks, stars, renames, custom order)
pub mod overlay;

// Exporters
pub mod export;
pub mod pdf;
