//! Filesystem session over one store connection
//!
//! A [`Session`] is what a file manager talks to: absolute and relative
//! paths, directory listings, folders, renames and permissions. Underneath
//! it drives the bucket resolver, the listing walker, the upload
//! orchestrator and the ACL translator against a [`StoreClient`].
//!
//! All operations take `&mut self`; a session serves one caller at a time.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncSeek, AsyncWrite};

use crate::acl::{PermissionView, RightsChange};
use crate::alias::Alias;
use crate::capability::{Capabilities, Capability, require_capability};
use crate::classify::{StoreFailure, StoreResult, into_error};
use crate::config::{DEFAULT_REGION, ListMaxKeys, RetryConfig};
use crate::error::{Error, Result};
use crate::listing::{
    DirEntry, ListCursor, ListLimit, ListProgress, Listing, NoProgress, entries_from_service,
    finish, walk,
};
use crate::multipart::{UploadReceipt, UploadRequest, Uploader};
use crate::path::{ROOT, absolute_path, folder_key, is_root, split_name, split_path};
use crate::resolver::{BucketResolver, ResolverConfig};
use crate::store::{
    BucketAddress, CannedAcl, CreateBucketRequest, PutProperties, ServiceEndpoint, StoreClient,
    timed,
};
use crate::transfer::{DownloadReceipt, TransferOutcome, TransferProgress, download};

/// Service calls repeated after an authentication-region switch, at most
const MAX_REGION_SWITCHES: usize = 3;

/// Per-session behavior settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Applied to every store call
    pub timeout: Duration,
    /// Per-chunk transfer retry
    pub retry: RetryConfig,
    pub list_max_keys: ListMaxKeys,
    /// Directory probed by [`Session::open`]
    pub initial_directory: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            list_max_keys: ListMaxKeys::default(),
            initial_directory: ROOT.to_string(),
        }
    }
}

impl SessionSettings {
    pub fn from_alias(alias: &Alias) -> Self {
        Self {
            timeout: alias.timeout(),
            retry: alias.retry_config(),
            list_max_keys: alias.list_max_keys(),
            initial_directory: ROOT.to_string(),
        }
    }
}

/// A filesystem view of one store connection
pub struct Session {
    store: Arc<dyn StoreClient>,
    resolver: BucketResolver,
    settings: SessionSettings,
    active: bool,
    cwd: String,
}

impl Session {
    pub fn new(
        store: Arc<dyn StoreClient>,
        config: ResolverConfig,
        settings: SessionSettings,
    ) -> Self {
        let resolver = BucketResolver::new(config, settings.timeout);
        let cwd = absolute_path(ROOT, &settings.initial_directory);
        Self {
            store,
            resolver,
            settings,
            active: false,
            cwd,
        }
    }

    /// Session for an alias; the caller supplies the store client
    pub fn for_alias(store: Arc<dyn StoreClient>, alias: &Alias) -> Result<Self> {
        Ok(Self::new(
            store,
            alias.resolver_config()?,
            SessionSettings::from_alias(alias),
        ))
    }

    pub fn resolver(&self) -> &BucketResolver {
        &self.resolver
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::OBJECT_STORE
    }

    /// Establish the session by probing the initial directory
    ///
    /// Any failure is fatal: the session stays inactive.
    pub async fn open(&mut self) -> Result<()> {
        self.resolver.reset_auth_region();
        let initial = absolute_path(ROOT, &self.settings.initial_directory);
        tracing::info!(
            host = %self.resolver.config().host,
            directory = %initial,
            "Opening session"
        );

        if let Err(err) = self.probe_directory(&initial).await {
            tracing::error!(error = %err, "Could not open session");
            return Err(match err {
                Error::Fatal { .. } => err,
                other => Error::Fatal {
                    message: "Connection failed".into(),
                    details: other.to_string(),
                },
            });
        }

        self.cwd = initial;
        self.active = true;
        Ok(())
    }

    pub fn close(&mut self) {
        if self.active {
            tracing::info!(host = %self.resolver.config().host, "Session closed");
        }
        self.active = false;
    }

    /// Forget learned bucket addressing
    pub fn clear_caches(&mut self) {
        tracing::debug!("Clearing learned bucket regions and endpoints");
        self.resolver.clear();
    }

    pub fn current_directory(&self) -> &str {
        &self.cwd
    }

    pub fn home_directory(&self) -> &'static str {
        ROOT
    }

    /// Resolve a path against the current directory
    pub fn absolute_path(&self, path: &str) -> String {
        absolute_path(&self.cwd, path)
    }

    /// Enter a directory after verifying it exists
    pub async fn change_directory(&mut self, path: &str) -> Result<()> {
        let target = self.absolute_path(path);
        self.probe_directory(&target).await?;
        tracing::debug!(directory = %target, "Changed directory");
        self.cwd = target;
        Ok(())
    }

    /// List a directory; the root lists buckets
    pub async fn list(&mut self, path: &str) -> Result<Listing> {
        self.list_with_progress(path, &mut NoProgress).await
    }

    pub async fn list_with_progress(
        &mut self,
        path: &str,
        progress: &mut dyn ListProgress,
    ) -> Result<Listing> {
        let path = self.absolute_path(path);
        self.read_directory(&path, None, ListLimit::Unbounded, progress)
            .await
    }

    /// Look up a single entry by its full path
    pub async fn read_single(&mut self, path: &str) -> Result<DirEntry> {
        let path = self.absolute_path(path);
        if is_root(&path) {
            return Ok(DirEntry::directory(ROOT));
        }
        let (dir, name) = split_name(&path);
        // An exact name can sort after longer names sharing it as a prefix
        // ("b.txt" before "b/"), so the filtered listing is walked in full.
        let listing = self
            .read_directory(dir, Some(name), ListLimit::Unbounded, &mut NoProgress)
            .await?;
        listing
            .find(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("'{path}' does not exist")))
    }

    /// Delete a file, an (empty) folder marker or a bucket
    pub async fn delete(&mut self, path: &str, is_dir: bool) -> Result<()> {
        let path = self.absolute_path(path);
        let (bucket, key) = split_path(&path);
        if bucket.is_empty() {
            return Err(Error::InvalidPath("Cannot delete the root".into()));
        }
        let key = key.trim_end_matches('/');

        let addr = self.resolve(bucket, key).await;
        let result = if key.is_empty() {
            tracing::info!(bucket, "Deleting bucket");
            timed(self.settings.timeout, self.store.delete_bucket(&addr)).await
        } else {
            let object_key = if is_dir {
                folder_key(key)
            } else {
                key.to_string()
            };
            tracing::debug!(bucket, key = %object_key, "Deleting object");
            timed(
                self.settings.timeout,
                self.store.delete_object(&addr, &object_key),
            )
            .await
        };

        let Err(failure) = result else {
            return Ok(());
        };
        if self.active && is_dir && !key.is_empty() {
            match self.probe_directory(&path).await {
                Err(Error::NotFound(_)) => {
                    tracing::info!(
                        path = %path,
                        "Folder does not exist anymore, it was probably only virtual"
                    );
                    return Ok(());
                }
                Err(err) => {
                    tracing::debug!(path = %path, error = %err, "Could not re-check folder");
                }
                Ok(()) => {}
            }
        }
        Err(self.fail(failure, &addr.host))
    }

    /// Server-side copy of a file
    pub async fn copy(&mut self, source: &str, is_dir: bool, target: &str) -> Result<()> {
        if is_dir {
            return Err(Error::UnsupportedFeature(
                "Duplicating folders is not supported".into(),
            ));
        }
        require_capability(self.capabilities(), Capability::RemoteCopy)?;

        let source = self.absolute_path(source);
        let target = self.absolute_path(target);
        let (source_bucket, source_key) = split_path(&source);
        let (target_bucket, target_key) = split_path(&target);
        if source_bucket.is_empty() || source_key.is_empty() {
            return Err(Error::InvalidPath(format!("'{source}' is not a file")));
        }
        if target_bucket.is_empty() || target_key.is_empty() {
            return Err(Error::InvalidPath(format!(
                "Target '{target}' must name a file inside a bucket"
            )));
        }

        let addr = self.resolve(target_bucket, target_key).await;
        tracing::debug!(from = %source, to = %target, "Copying object");
        timed(
            self.settings.timeout,
            self.store
                .copy_object(&addr, source_bucket, source_key, target_key),
        )
        .await
        .map_err(|f| self.fail(f, &addr.host))
    }

    /// Move a file: copy, then delete the source
    pub async fn rename(&mut self, source: &str, is_dir: bool, target: &str) -> Result<()> {
        if is_dir {
            return Err(Error::UnsupportedFeature(
                "Renaming folders is not supported".into(),
            ));
        }
        require_capability(self.capabilities(), Capability::Rename)?;
        self.copy(source, false, target).await?;
        self.delete(source, false).await
    }

    /// Create a folder marker, or a bucket directly under the root
    pub async fn create_directory(&mut self, path: &str) -> Result<()> {
        let path = self.absolute_path(path);
        let (bucket, key) = split_path(&path);
        if bucket.is_empty() {
            return Err(Error::InvalidPath("The root already exists".into()));
        }
        let key = key.trim_end_matches('/');

        if key.is_empty() {
            return self.create_bucket(bucket).await;
        }

        let addr = self.resolve(bucket, key).await;
        let marker = folder_key(key);
        tracing::debug!(bucket, key = %marker, "Creating folder marker");
        timed(
            self.settings.timeout,
            self.store
                .put_object(&addr, &marker, Vec::new(), &PutProperties::default()),
        )
        .await
        .map_err(|f| self.fail(f, &addr.host))
    }

    async fn create_bucket(&mut self, bucket: &str) -> Result<()> {
        let region = &self.resolver.config().default_region;
        let location_constraint =
            (!region.is_empty() && region != DEFAULT_REGION).then(|| region.clone());
        let request = CreateBucketRequest {
            bucket: bucket.to_string(),
            location_constraint,
            canned_acl: CannedAcl::Private,
        };
        tracing::info!(
            bucket,
            location = ?request.location_constraint,
            "Creating bucket"
        );

        let store = Arc::clone(&self.store);
        self.service_call(move |endpoint| {
            let store = Arc::clone(&store);
            let request = request.clone();
            async move { store.create_bucket(&endpoint, &request).await }
        })
        .await
    }

    /// Read the permissions of a file or folder
    ///
    /// Buckets and the root have none; `None` is returned for them.
    pub async fn load_properties(
        &mut self,
        path: &str,
        is_dir: bool,
    ) -> Result<Option<PermissionView>> {
        let path = self.absolute_path(path);
        let (bucket, key) = split_path(&path);
        let key = key.trim_end_matches('/');
        if bucket.is_empty() || key.is_empty() {
            return Ok(None);
        }
        let object_key = if is_dir {
            folder_key(key)
        } else {
            key.to_string()
        };

        let addr = self.resolve(bucket, key).await;
        let acl = timed(self.settings.timeout, self.store.get_acl(&addr, &object_key))
            .await
            .map_err(|f| self.fail(f, &addr.host))?;
        Ok(Some(PermissionView::from_acl(&acl)))
    }

    /// Apply a rights change to a file's ACL, returning the new view
    pub async fn change_permissions(
        &mut self,
        path: &str,
        is_dir: bool,
        change: &RightsChange,
    ) -> Result<PermissionView> {
        let path = self.absolute_path(path);
        let (bucket, key) = split_path(&path);
        if is_dir || bucket.is_empty() || key.is_empty() || key.ends_with('/') {
            return Err(Error::UnsupportedFeature(
                "Permissions can only be changed on files".into(),
            ));
        }
        require_capability(self.capabilities(), Capability::AclChangingFiles)?;

        let addr = self.resolve(bucket, key).await;
        let current = timed(self.settings.timeout, self.store.get_acl(&addr, key))
            .await
            .map_err(|f| self.fail(f, &addr.host))?;
        let view = PermissionView::from_acl(&current);
        let rights = change.apply(view.rights);
        let acl = view.to_acl(rights)?;
        tracing::debug!(path = %path, rights = %rights, "Setting permissions");

        timed(self.settings.timeout, self.store.set_acl(&addr, key, &acl))
            .await
            .map_err(|f| self.fail(f, &addr.host))?;
        Ok(PermissionView::from_acl(&acl))
    }

    /// Upload `size` bytes from `source` to a file path
    pub async fn upload<R>(
        &mut self,
        source: &mut R,
        path: &str,
        size: u64,
        properties: PutProperties,
        progress: &mut dyn TransferProgress,
    ) -> Result<TransferOutcome<UploadReceipt>>
    where
        R: AsyncRead + AsyncSeek + Unpin + Send,
    {
        let path = self.absolute_path(path);
        let (bucket, key) = split_path(&path);
        if bucket.is_empty() || key.is_empty() || key.ends_with('/') {
            return Err(Error::InvalidPath(format!(
                "'{path}' must name a file inside a bucket"
            )));
        }

        let addr = self.resolve(bucket, key).await;
        let request = UploadRequest {
            key: key.to_string(),
            size,
            properties,
        };
        let mut uploader = Uploader::new(
            self.store.as_ref(),
            &addr,
            self.settings.timeout,
            self.settings.retry.clone(),
        );
        uploader.upload(source, &request, progress).await
    }

    /// Download a file into `sink`
    pub async fn download<W>(
        &mut self,
        path: &str,
        sink: &mut W,
        progress: &mut dyn TransferProgress,
    ) -> Result<TransferOutcome<DownloadReceipt>>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let path = self.absolute_path(path);
        let (bucket, key) = split_path(&path);
        if bucket.is_empty() || key.is_empty() || key.ends_with('/') {
            return Err(Error::InvalidPath(format!("'{path}' is not a file")));
        }

        let addr = self.resolve(bucket, key).await;
        download(
            self.store.as_ref(),
            &addr,
            key,
            sink,
            self.settings.timeout,
            &self.settings.retry,
            progress,
        )
        .await
    }

    async fn resolve(&mut self, bucket: &str, prefix: &str) -> BucketAddress {
        self.resolver
            .resolve(self.store.as_ref(), bucket, prefix)
            .await
    }

    /// Existence check with a one-key listing
    async fn probe_directory(&mut self, path: &str) -> Result<()> {
        self.read_directory(path, None, ListLimit::ExistenceProbe, &mut NoProgress)
            .await
            .map(|_| ())
    }

    async fn read_directory(
        &mut self,
        path: &str,
        name_filter: Option<&str>,
        limit: ListLimit,
        progress: &mut dyn ListProgress,
    ) -> Result<Listing> {
        let (bucket, key) = split_path(path);
        if bucket.is_empty() {
            return self.read_root(name_filter, limit).await;
        }

        let key = key.trim_end_matches('/');
        let mut prefix = if key.is_empty() {
            String::new()
        } else {
            folder_key(key)
        };
        if let Some(filter) = name_filter {
            prefix.push_str(filter);
        }

        let addr = self.resolve(bucket, &prefix).await;
        let mut cursor = ListCursor::new(prefix.as_str());
        let entries = walk(
            self.store.as_ref(),
            &addr,
            &mut cursor,
            limit,
            self.settings.timeout,
            progress,
        )
        .await
        .map_err(|f| self.fail(f, &addr.host))?;

        finish(path, &prefix, &cursor, entries, name_filter)
    }

    async fn read_root(&mut self, name_filter: Option<&str>, limit: ListLimit) -> Result<Listing> {
        let max_buckets = if self
            .settings
            .list_max_keys
            .enabled_for(&self.resolver.config().host)
        {
            limit.max_keys()
        } else {
            None
        };

        let store = Arc::clone(&self.store);
        let listing = self
            .service_call(move |endpoint| {
                let store = Arc::clone(&store);
                async move { store.list_service(&endpoint, max_buckets).await }
            })
            .await?;

        Ok(Listing {
            entries: entries_from_service(&listing, name_filter),
            exists: true,
        })
    }

    /// Run a service-level call, switching the authentication region when
    /// the store names a different one
    async fn service_call<T, F, Fut>(&mut self, call: F) -> Result<T>
    where
        F: Fn(ServiceEndpoint) -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let mut switches = 0;
        loop {
            let endpoint = self.resolver.service_endpoint();
            let failure = match timed(self.settings.timeout, call(endpoint.clone())).await {
                Ok(value) => return Ok(value),
                Err(failure) => failure,
            };
            if switches < MAX_REGION_SWITCHES && self.resolver.switch_auth_region(&failure) {
                switches += 1;
                continue;
            }
            return Err(self.fail(failure, &endpoint.host));
        }
    }

    /// Store failures before the session is established are fatal
    fn fail(&self, failure: StoreFailure, host: &str) -> Error {
        into_error(failure, host, !self.active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::{AccessControlList, Grant, Grantee, Owner, Permission, Rights};
    use crate::classify::StoreCode;
    use crate::store::{
        BucketRecord, ListPage, MockStoreClient, ObjectRecord, Protocol, ServiceListing, UrlStyle,
    };
    use mockall::Sequence;

    fn config(region: &str) -> ResolverConfig {
        ResolverConfig {
            host: "s3.example.com".into(),
            port: None,
            protocol: Protocol::Https,
            url_style: UrlStyle::Path,
            default_region: region.into(),
        }
    }

    fn session(store: MockStoreClient) -> Session {
        Session::new(Arc::new(store), config("us-east-1"), SessionSettings::default())
    }

    fn one_key_page() -> ListPage {
        ListPage {
            contents: vec![ObjectRecord {
                key: "dir/a".into(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_open_lists_root() {
        let mut store = MockStoreClient::new();
        store
            .expect_list_service()
            .withf(|_, max| *max == Some(1))
            .times(1)
            .returning(|_, _| {
                Ok(ServiceListing {
                    buckets: vec![BucketRecord {
                        name: "b".into(),
                        creation_date: None,
                    }],
                    ..Default::default()
                })
            });

        let mut session = session(store);
        session.open().await.unwrap();
        assert!(session.is_active());
        assert_eq!(session.current_directory(), "/");
    }

    #[tokio::test]
    async fn test_open_failure_is_fatal() {
        let mut store = MockStoreClient::new();
        store
            .expect_list_service()
            .returning(|_, _| Err(StoreFailure::new(StoreCode::AccessDenied)));

        let mut session = session(store);
        let err = session.open().await.unwrap_err();
        assert!(err.is_fatal());
        assert!(err.details().is_some_and(|d| d.starts_with("Access denied")));
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn test_service_listing_switches_auth_region() {
        let mut store = MockStoreClient::new();
        let mut seq = Sequence::new();
        store
            .expect_list_service()
            .withf(|endpoint, _| endpoint.signing_region == "us-east-1")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| {
                Err(StoreFailure::new(StoreCode::AuthorizationHeaderMalformed)
                    .with_extra("Region", "eu-west-1"))
            });
        store
            .expect_list_service()
            .withf(|endpoint, _| endpoint.signing_region == "eu-west-1")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(ServiceListing::default()));

        let mut session = session(store);
        let listing = session.list("/").await.unwrap();
        assert!(listing.entries.is_empty());
        assert_eq!(session.resolver().auth_region(), "eu-west-1");
    }

    #[tokio::test]
    async fn test_google_endpoint_gets_no_bucket_limit() {
        let mut store = MockStoreClient::new();
        store
            .expect_list_service()
            .withf(|_, max| max.is_none())
            .times(1)
            .returning(|_, _| Ok(ServiceListing::default()));

        let mut config = config("us-east-1");
        config.host = "storage.googleapis.com".into();
        let mut session = Session::new(Arc::new(store), config, SessionSettings::default());
        session.open().await.unwrap();
    }

    #[tokio::test]
    async fn test_change_directory_requires_existence() {
        let mut store = MockStoreClient::new();
        store
            .expect_list_bucket()
            .withf(|_, req| req.prefix == "dir/")
            .returning(|_, _| Ok(one_key_page()));
        store
            .expect_list_bucket()
            .withf(|_, req| req.prefix == "missing/")
            .returning(|_, _| Ok(ListPage::default()));

        let mut session = session(store);
        session.change_directory("/b/dir").await.unwrap();
        assert_eq!(session.current_directory(), "/b/dir");
        assert_eq!(session.absolute_path("x.txt"), "/b/dir/x.txt");

        let err = session.change_directory("../missing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(session.current_directory(), "/b/dir");
    }

    #[tokio::test]
    async fn test_create_bucket_location_constraint() {
        let mut store = MockStoreClient::new();
        store
            .expect_create_bucket()
            .withf(|_, req| {
                req.bucket == "new"
                    && req.location_constraint.as_deref() == Some("eu-central-1")
                    && req.canned_acl == CannedAcl::Private
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let mut session = Session::new(
            Arc::new(store),
            config("eu-central-1"),
            SessionSettings::default(),
        );
        session.create_directory("/new").await.unwrap();
    }

    #[tokio::test]
    async fn test_create_bucket_in_default_region_has_no_constraint() {
        let mut store = MockStoreClient::new();
        store
            .expect_create_bucket()
            .withf(|_, req| req.location_constraint.is_none())
            .times(1)
            .returning(|_, _| Ok(()));

        let mut session = session(store);
        session.create_directory("/new/").await.unwrap();
    }

    #[tokio::test]
    async fn test_create_folder_puts_marker() {
        let mut store = MockStoreClient::new();
        store
            .expect_list_bucket()
            .returning(|_, _| Ok(ListPage::default()));
        store
            .expect_put_object()
            .withf(|_, key, body, _| key == "photos/2024/" && body.is_empty())
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let mut session = session(store);
        session.create_directory("/b/photos/2024").await.unwrap();
    }

    #[tokio::test]
    async fn test_rename_folder_is_unsupported() {
        let mut session = session(MockStoreClient::new());
        let err = session.rename("/b/dir", true, "/b/other").await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedFeature(_)));
    }

    #[tokio::test]
    async fn test_copy_requires_target_key() {
        let mut session = session(MockStoreClient::new());
        let err = session.copy("/b/a.txt", false, "/other").await.unwrap_err();
        assert!(matches!(err, Error::InvalidPath(_)));
    }

    #[tokio::test]
    async fn test_rename_copies_then_deletes() {
        let mut store = MockStoreClient::new();
        let mut seq = Sequence::new();
        store
            .expect_list_bucket()
            .returning(|_, _| Ok(one_key_page()));
        store
            .expect_copy_object()
            .withf(|addr, sb, sk, key| {
                addr.bucket == "dst" && sb == "src" && sk == "a.txt" && key == "b.txt"
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok(()));
        store
            .expect_delete_object()
            .withf(|addr, key| addr.bucket == "src" && key == "a.txt")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let mut session = session(store);
        session.rename("/src/a.txt", false, "/dst/b.txt").await.unwrap();
    }

    #[tokio::test]
    async fn test_load_properties_not_applicable_for_buckets() {
        let mut session = session(MockStoreClient::new());
        assert!(session.load_properties("/b", true).await.unwrap().is_none());
        assert!(session.load_properties("/", true).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_change_permissions_grants_public_read() {
        let owner = Owner {
            id: "owner-id".into(),
            display_name: None,
        };
        let acl = AccessControlList {
            owner: Some(owner.clone()),
            grants: vec![Grant {
                grantee: Grantee::CanonicalUser {
                    id: "owner-id".into(),
                    display_name: None,
                },
                permission: Permission::FullControl,
            }],
        };

        let mut store = MockStoreClient::new();
        store
            .expect_list_bucket()
            .returning(|_, _| Ok(one_key_page()));
        store
            .expect_get_acl()
            .times(1)
            .returning(move |_, _| Ok(acl.clone()));
        store
            .expect_set_acl()
            .withf(|_, key, acl| key == "a.txt" && acl.grants.len() == 2)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut session = session(store);
        let change = RightsChange {
            grant: "E:R".parse::<Rights>().unwrap(),
            revoke: Rights::NONE,
        };
        let view = session
            .change_permissions("/b/a.txt", false, &change)
            .await
            .unwrap();
        assert_eq!(view.summary, "O:F,E:R");
    }

    #[tokio::test]
    async fn test_change_permissions_rejects_folders() {
        let mut session = session(MockStoreClient::new());
        let err = session
            .change_permissions("/b/dir", true, &RightsChange::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedFeature(_)));
    }
}
