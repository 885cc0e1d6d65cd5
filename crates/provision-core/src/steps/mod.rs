//! Provisioning steps
//!
//! Each step is a free function over the collaborator traits so the
//! sequencer stays a thin ordering layer.

mod cluster;
mod image;
mod propagation;
mod repository;
mod rotation;

pub use cluster::ensure_cluster;
pub use image::publish_image;
pub use propagation::{export_environment, wait_for_propagation, ENV_ACCESS_KEY_ID, ENV_REGION, ENV_SECRET_ACCESS_KEY};
pub use repository::ensure_repository;
pub use rotation::rotate_credentials;
