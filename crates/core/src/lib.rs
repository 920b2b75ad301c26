//! bfs-core: Filesystem semantics over S3-compatible object stores
//!
//! This crate provides the core functionality of bucketfs, including:
//! - Bucket region and endpoint discovery
//! - Translation of prefix listings into directory entries
//! - Multipart upload orchestration
//! - Translation between ACLs and permission bits
//! - Classification of store failures
//! - The filesystem session a host drives
//! - Configuration and alias management
//!
//! The crate is independent of any specific S3 SDK; the store is reached
//! through the [`StoreClient`] trait.

pub mod acl;
pub mod alias;
pub mod capability;
pub mod classify;
pub mod config;
pub mod error;
pub mod listing;
pub mod multipart;
pub mod path;
pub mod resolver;
pub mod session;
pub mod store;
pub mod transfer;

pub use acl::{PermissionView, Rights, RightsChange};
pub use alias::{Alias, AliasManager, Credentials};
pub use capability::{Capabilities, Capability};
pub use classify::{FailureClass, StoreCode, StoreFailure, StoreResult};
pub use config::{Config, ConfigManager, ListMaxKeys, RetryConfig, StoreDefaults};
pub use error::{Error, Result};
pub use listing::{DirEntry, EntryKind, ListProgress, Listing};
pub use path::{ParsedPath, RemotePath, parse_path};
pub use resolver::{BucketResolver, ResolverConfig};
pub use session::{Session, SessionSettings};
pub use store::{BucketAddress, PutProperties, ServiceEndpoint, StoreClient, UrlStyle};
pub use transfer::{Cancel, TransferOutcome, TransferProgress};
