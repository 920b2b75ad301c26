//! StoreClient trait definition
//!
//! This trait is the object-store collaborator the core drives. Every call
//! takes an explicit addressing context so the core can steer region,
//! endpoint and URL style per bucket. Implementations report failure as a
//! [`StoreFailure`] and never interpret it themselves.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::acl::AccessControlList;
use crate::classify::{StoreCode, StoreFailure, StoreResult};

/// Transport protocol for store requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    #[default]
    Https,
}

impl Protocol {
    pub const fn scheme(self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

/// How the bucket name is placed in request URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UrlStyle {
    /// `https://host/bucket/key`
    #[default]
    Path,
    /// `https://bucket.host/key`
    Virtual,
}

/// Addressing context for calls against one bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketAddress {
    pub bucket: String,
    /// Endpoint host (with optional `:port`)
    pub host: String,
    pub protocol: Protocol,
    pub url_style: UrlStyle,
    pub signing_region: String,
}

impl BucketAddress {
    /// Base URL of the endpoint, without the bucket
    pub fn endpoint_url(&self) -> String {
        format!("{}://{}", self.protocol.scheme(), self.host)
    }
}

/// Addressing context for service-level calls (no bucket)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    pub host: String,
    pub protocol: Protocol,
    pub signing_region: String,
}

impl ServiceEndpoint {
    pub fn endpoint_url(&self) -> String {
        format!("{}://{}", self.protocol.scheme(), self.host)
    }
}

/// A bucket as reported by the service listing
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BucketRecord {
    pub name: String,
    pub creation_date: Option<String>,
}

/// Service listing: the caller's buckets plus their owner
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServiceListing {
    pub owner_id: Option<String>,
    pub owner_display_name: Option<String>,
    pub buckets: Vec<BucketRecord>,
}

/// One prefix-listing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub prefix: String,
    pub delimiter: String,
    pub continuation: Option<String>,
    /// Maximum keys for this page; `None` leaves it to the store
    pub max_keys: Option<u32>,
}

/// A key returned by a prefix listing
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectRecord {
    pub key: String,
    /// `YYYY-MM-DDTHH:MM:SS[.fff]Z` as sent by the store
    pub last_modified: String,
    pub size: u64,
    pub owner_id: Option<String>,
    pub owner_display_name: Option<String>,
}

/// One page of a prefix listing
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListPage {
    pub truncated: bool,
    pub next_continuation: Option<String>,
    pub contents: Vec<ObjectRecord>,
    pub common_prefixes: Vec<String>,
}

impl ListPage {
    /// Number of items (keys plus common prefixes) this page carried
    pub fn item_count(&self) -> usize {
        self.contents.len() + self.common_prefixes.len()
    }
}

/// Store-defined default ACL applied on creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CannedAcl {
    #[default]
    Private,
}

/// Bucket creation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateBucketRequest {
    pub bucket: String,
    pub location_constraint: Option<String>,
    pub canned_acl: CannedAcl,
}

/// Properties sent with a new object
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PutProperties {
    pub content_type: Option<String>,
}

/// Receipt for one uploaded part
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    pub part_number: i32,
    pub etag: String,
}

/// Object body delivered chunk by chunk
pub type ByteChunks = BoxStream<'static, StoreResult<Vec<u8>>>;

/// Object-store operations the core depends on
///
/// This trait is implemented by the S3 adapter and can be mocked for testing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// List the caller's buckets
    async fn list_service(
        &self,
        endpoint: &ServiceEndpoint,
        max_buckets: Option<u32>,
    ) -> StoreResult<ServiceListing>;

    /// List one page of keys and common prefixes in a bucket
    async fn list_bucket(&self, addr: &BucketAddress, request: &ListRequest)
    -> StoreResult<ListPage>;

    /// Create a bucket
    async fn create_bucket(
        &self,
        endpoint: &ServiceEndpoint,
        request: &CreateBucketRequest,
    ) -> StoreResult<()>;

    /// Delete an (empty) bucket
    async fn delete_bucket(&self, addr: &BucketAddress) -> StoreResult<()>;

    /// Store an object in one request
    async fn put_object(
        &self,
        addr: &BucketAddress,
        key: &str,
        body: Vec<u8>,
        properties: &PutProperties,
    ) -> StoreResult<()>;

    /// Delete an object
    async fn delete_object(&self, addr: &BucketAddress, key: &str) -> StoreResult<()>;

    /// Server-side copy into the bucket addressed by `addr`
    async fn copy_object(
        &self,
        addr: &BucketAddress,
        source_bucket: &str,
        source_key: &str,
        key: &str,
    ) -> StoreResult<()>;

    /// Read an object starting at `offset`
    async fn get_object(
        &self,
        addr: &BucketAddress,
        key: &str,
        offset: u64,
    ) -> StoreResult<ByteChunks>;

    /// Start a multipart upload, returning its upload id
    async fn initiate_multipart(
        &self,
        addr: &BucketAddress,
        key: &str,
        properties: &PutProperties,
    ) -> StoreResult<String>;

    /// Upload one part, returning its ETag
    async fn upload_part(
        &self,
        addr: &BucketAddress,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Vec<u8>,
    ) -> StoreResult<String>;

    /// Commit a multipart upload; `parts` is in ascending part order
    async fn complete_multipart(
        &self,
        addr: &BucketAddress,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StoreResult<()>;

    /// Discard a multipart upload and its parts
    async fn abort_multipart(
        &self,
        addr: &BucketAddress,
        key: &str,
        upload_id: &str,
    ) -> StoreResult<()>;

    /// Read the ACL of an object (or of the bucket when `key` is empty)
    async fn get_acl(&self, addr: &BucketAddress, key: &str) -> StoreResult<AccessControlList>;

    /// Replace the ACL of an object (or of the bucket when `key` is empty)
    async fn set_acl(
        &self,
        addr: &BucketAddress,
        key: &str,
        acl: &AccessControlList,
    ) -> StoreResult<()>;
}

/// Run one store call under the session's uniform timeout
///
/// Expiry is reported as a broken connection.
pub async fn timed<T, F>(limit: Duration, call: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreFailure::new(StoreCode::ConnectionFailed)
            .with_message(format!("Timeout after {} s", limit.as_secs()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url() {
        let addr = BucketAddress {
            bucket: "photos".into(),
            host: "localhost:9000".into(),
            protocol: Protocol::Http,
            url_style: UrlStyle::Path,
            signing_region: "us-east-1".into(),
        };
        assert_eq!(addr.endpoint_url(), "http://localhost:9000");
    }

    #[test]
    fn test_list_page_item_count() {
        let page = ListPage {
            contents: vec![ObjectRecord::default(), ObjectRecord::default()],
            common_prefixes: vec!["a/".into()],
            ..Default::default()
        };
        assert_eq!(page.item_count(), 3);
    }

    #[tokio::test]
    async fn test_timed_expiry_is_connection_failure() {
        let result: StoreResult<()> = timed(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert_eq!(result.unwrap_err().code, StoreCode::ConnectionFailed);
    }

    #[tokio::test]
    async fn test_timed_passes_result_through() {
        let result = timed(Duration::from_secs(1), async { Ok::<_, StoreFailure>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
