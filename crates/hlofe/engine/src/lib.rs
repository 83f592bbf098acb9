//! HLO-FE Engine - Compile, publish and manage services
//!
//! This crate turns validated descriptors into continuum entities and drives
//! their lifecycle in the entity store:
//!
//! - **EntityCompiler**: Descriptor to entity graph
//! - **EntityPublisher**: Best-effort creation of a graph in the store
//! - **LifecycleController**: Allocate, re-allocate, update, deallocate, purge
//! - **Notifier**: Tells the placement engine which service changed

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod compiler;
pub mod error;
pub mod lifecycle;
pub mod notify;
pub mod publisher;

// Re-exports
pub use compiler::{resolve_image, EntityCompiler, ImageRef, SERVICE_NAME_PREFIX};
pub use error::{CompileError, LifecycleError, Result};
pub use lifecycle::{
    AllocateOutcome, DeallocateReport, LifecycleController, PurgeReport, ReallocateOutcome,
    UpdateReport,
};
pub use notify::{
    notify_best_effort, BroadcastNotifier, DisabledNotifier, Notifier, NotifyError,
    PandaproxyNotifier, ServiceNotification, KAFKA_JSON_CONTENT_TYPE,
};
pub use publisher::{EntityPublisher, PublishOutcome};
