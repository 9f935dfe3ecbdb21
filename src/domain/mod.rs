// Domain layer: parsed conversation data, no I/O
pub mod models;
