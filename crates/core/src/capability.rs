//! Filesystem capabilities
//!
//! What an object store can and cannot emulate is fixed, so the capability set
//! is a constant descriptor rather than something probed per connection.
//! Hosts query it before offering an operation and use [`require_capability`]
//! to fail early with `UnsupportedFeature`.

use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};

/// Individual filesystem capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Open a file by name without first listing its directory
    ResolveSymlink,
    RemoteCopy,
    Rename,
    RemoteMove,
    MoveToQueue,
    SkipTransfer,
    ParallelTransfers,
    LoadingAdditionalProperties,
    AclChangingFiles,
    MoveOverExistingFile,
    PreservingTimestampUpload,
    CheckingSpaceAvailable,
    UserGroupListing,
    ModeChanging,
    ModeChangingUpload,
    GroupChanging,
    OwnerChanging,
    AnyCommand,
    HardLink,
    SymbolicLink,
    TextMode,
    NewerOnlyUpload,
    TimestampChanging,
    CalculatingChecksum,
    PreservingTimestampDirs,
    ResumeSupport,
    Locking,
    ParallelFileTransfers,
}

impl Capability {
    pub const ALL: [Capability; 28] = [
        Capability::ResolveSymlink,
        Capability::RemoteCopy,
        Capability::Rename,
        Capability::RemoteMove,
        Capability::MoveToQueue,
        Capability::SkipTransfer,
        Capability::ParallelTransfers,
        Capability::LoadingAdditionalProperties,
        Capability::AclChangingFiles,
        Capability::MoveOverExistingFile,
        Capability::PreservingTimestampUpload,
        Capability::CheckingSpaceAvailable,
        Capability::UserGroupListing,
        Capability::ModeChanging,
        Capability::ModeChangingUpload,
        Capability::GroupChanging,
        Capability::OwnerChanging,
        Capability::AnyCommand,
        Capability::HardLink,
        Capability::SymbolicLink,
        Capability::TextMode,
        Capability::NewerOnlyUpload,
        Capability::TimestampChanging,
        Capability::CalculatingChecksum,
        Capability::PreservingTimestampDirs,
        Capability::ResumeSupport,
        Capability::Locking,
        Capability::ParallelFileTransfers,
    ];

    const fn bit(self) -> u32 {
        1 << (self as u32)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Capability::ResolveSymlink => "resolve_symlink",
            Capability::RemoteCopy => "remote_copy",
            Capability::Rename => "rename",
            Capability::RemoteMove => "remote_move",
            Capability::MoveToQueue => "move_to_queue",
            Capability::SkipTransfer => "skip_transfer",
            Capability::ParallelTransfers => "parallel_transfers",
            Capability::LoadingAdditionalProperties => "loading_additional_properties",
            Capability::AclChangingFiles => "acl_changing_files",
            Capability::MoveOverExistingFile => "move_over_existing_file",
            Capability::PreservingTimestampUpload => "preserving_timestamp_upload",
            Capability::CheckingSpaceAvailable => "checking_space_available",
            Capability::UserGroupListing => "user_group_listing",
            Capability::ModeChanging => "mode_changing",
            Capability::ModeChangingUpload => "mode_changing_upload",
            Capability::GroupChanging => "group_changing",
            Capability::OwnerChanging => "owner_changing",
            Capability::AnyCommand => "any_command",
            Capability::HardLink => "hard_link",
            Capability::SymbolicLink => "symbolic_link",
            Capability::TextMode => "text_mode",
            Capability::NewerOnlyUpload => "newer_only_upload",
            Capability::TimestampChanging => "timestamp_changing",
            Capability::CalculatingChecksum => "calculating_checksum",
            Capability::PreservingTimestampDirs => "preserving_timestamp_dirs",
            Capability::ResumeSupport => "resume_support",
            Capability::Locking => "locking",
            Capability::ParallelFileTransfers => "parallel_file_transfers",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u32);

impl Capabilities {
    /// What a bucket/key store supports when viewed as a filesystem
    pub const OBJECT_STORE: Capabilities = Capabilities::empty()
        .with(Capability::ResolveSymlink)
        .with(Capability::RemoteCopy)
        .with(Capability::Rename)
        .with(Capability::RemoteMove)
        .with(Capability::MoveToQueue)
        .with(Capability::SkipTransfer)
        .with(Capability::ParallelTransfers)
        .with(Capability::LoadingAdditionalProperties)
        .with(Capability::AclChangingFiles)
        .with(Capability::MoveOverExistingFile);

    pub const fn empty() -> Self {
        Capabilities(0)
    }

    pub const fn with(self, capability: Capability) -> Self {
        Capabilities(self.0 | capability.bit())
    }

    pub const fn supports(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    /// Supported capabilities in declaration order
    pub fn supported(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |c| self.supports(*c))
    }

    /// Unsupported capabilities in declaration order
    pub fn unsupported(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |c| !self.supports(*c))
    }
}

/// Check if an operation is supported, returning appropriate error
pub fn require_capability(caps: Capabilities, capability: Capability) -> Result<()> {
    if caps.supports(capability) {
        Ok(())
    } else {
        Err(Error::UnsupportedFeature(format!(
            "The object store does not support '{capability}'"
        )))
    }
}
