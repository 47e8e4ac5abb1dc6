//! Built-in check plugins

pub mod aws;
pub mod proxmox_ve;
