//! Provision Core - bootstrap sequencer for a cloud account
//!
//! Rotates the access keys of an administrative principal, waits for the
//! new key to propagate, then makes sure the container image repository
//! and the container cluster exist.
//!
//! # Example
//!
//! ```rust,ignore
//! use provision_core::{ProvisionConfig, ProvisioningSequencer};
//!
//! # async fn example(identity: Arc<dyn IdentityProvider>, connector: Arc<dyn ServiceConnector>)
//! #     -> Result<(), Box<dyn std::error::Error>> {
//! let sequencer = ProvisioningSequencer::new(ProvisionConfig::new(), identity, connector);
//! let report = sequencer.run().await?;
//! println!("issued {}", report.rotation.issued_key_id);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod sequencer;
pub mod steps;
pub mod types;

pub use api::{
    ClusterManager, ConnectedServices, IdentityProvider, ImagePublisher, NoopImagePublisher,
    RepositoryRegistry, ServiceConnector, StatusSink, StdoutSink,
};
pub use config::{PropagationPolicy, ProvisionConfig, RepositoryCheck};
pub use error::{IdentityOperation, ProvisionError, RegistryOperation, Result, Severity};
pub use sequencer::ProvisioningSequencer;
pub use types::{
    AccessKeySummary, ClusterDescriptor, ClusterOutcome, ImagePushOutcome, IssuedCredential,
    KeyStatus, ProvisionReport, RepositoryDescriptor, RepositoryOutcome, RotationSummary,
    StatusLine,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the provisioner
    pub use crate::{
        IdentityProvider, ProvisionConfig, ProvisionError, ProvisionReport, ProvisioningSequencer,
        ServiceConnector, StatusSink,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
