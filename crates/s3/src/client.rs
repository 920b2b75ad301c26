//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the StoreClient trait from bfs-core.
//! Every call carries its own endpoint, signing region and addressing
//! style as a per-operation config override.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    self as s3types, BucketCannedAcl, BucketLocationConstraint, CompletedMultipartUpload,
    CreateBucketConfiguration, Type,
};
use aws_smithy_types::date_time::Format;
use futures::StreamExt;

use bfs_core::acl::{AccessControlList, Grant, Grantee, Owner, Permission};
use bfs_core::classify::{StoreCode, StoreFailure, StoreResult};
use bfs_core::store::{
    BucketAddress, BucketRecord, ByteChunks, CannedAcl, CompletedPart, CreateBucketRequest,
    ListPage, ListRequest, ObjectRecord, PutProperties, ServiceEndpoint, ServiceListing,
    StoreClient, UrlStyle,
};
use bfs_core::{Alias, Result};

use crate::failure::failure_from_sdk;

/// Store client backed by aws-sdk-s3
pub struct S3Store {
    inner: aws_sdk_s3::Client,
}

impl S3Store {
    /// Create a new S3 client from an alias configuration
    pub async fn new(alias: &Alias) -> Result<Self> {
        let credentials = alias.credentials()?;
        tracing::debug!(
            alias = %alias.name,
            source = %credentials.source,
            "Using credentials"
        );

        let provider = aws_credential_types::Credentials::new(
            credentials.access_key_id,
            credentials.secret_access_key,
            credentials.session_token,
            None,
            "bfs-alias",
        );

        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(provider)
            .region(aws_config::Region::new(alias.region().to_string()))
            .endpoint_url(&alias.endpoint)
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(alias.url_style() == UrlStyle::Path)
            .build();

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
        })
    }

    /// Wrap an already configured SDK client
    pub fn from_client(inner: aws_sdk_s3::Client) -> Self {
        Self { inner }
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }
}

/// Per-call overrides addressing one bucket
fn bucket_override(addr: &BucketAddress) -> aws_sdk_s3::config::Builder {
    aws_sdk_s3::config::Builder::default()
        .endpoint_url(addr.endpoint_url())
        .region(aws_sdk_s3::config::Region::new(addr.signing_region.clone()))
        .force_path_style(addr.url_style == UrlStyle::Path)
}

/// Per-call overrides for service-level calls
fn service_override(endpoint: &ServiceEndpoint) -> aws_sdk_s3::config::Builder {
    aws_sdk_s3::config::Builder::default()
        .endpoint_url(endpoint.endpoint_url())
        .region(aws_sdk_s3::config::Region::new(
            endpoint.signing_region.clone(),
        ))
        .force_path_style(true)
}

fn format_time(time: &aws_smithy_types::DateTime) -> String {
    time.fmt(Format::DateTime).unwrap_or_default()
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[allow(deprecated)]
fn owner_from_sdk(owner: Option<&s3types::Owner>) -> (Option<String>, Option<String>) {
    match owner {
        Some(owner) => (
            owner.id().map(str::to_string),
            owner.display_name().map(str::to_string),
        ),
        None => (None, None),
    }
}

#[allow(deprecated)]
fn raw_grantee(grantee: &s3types::Grantee) -> Grantee {
    Grantee::Raw {
        kind: grantee.r#type().as_str().to_string(),
        id: grantee.id().map(str::to_string),
        display_name: grantee.display_name().map(str::to_string),
        uri: grantee.uri().map(str::to_string),
        email: grantee.email_address().map(str::to_string),
    }
}

/// Translate one grant; grantees that do not fit a modelled shape are kept raw
#[allow(deprecated)]
fn grant_from_sdk(grant: &s3types::Grant) -> StoreResult<Grant> {
    let (Some(grantee), Some(permission)) = (grant.grantee(), grant.permission()) else {
        return Err(invalid_acl(
            "ACL holds a grant without grantee or permission; refusing to rewrite it",
        ));
    };
    let modelled = match grantee.r#type() {
        Type::CanonicalUser => grantee.id().map(|id| Grantee::CanonicalUser {
            id: id.to_string(),
            display_name: grantee.display_name().map(str::to_string),
        }),
        Type::Group => grantee.uri().map(|uri| Grantee::Group {
            uri: uri.to_string(),
        }),
        Type::AmazonCustomerByEmail => grantee.email_address().map(|address| Grantee::Email {
            address: address.to_string(),
        }),
        _ => None,
    };
    let grantee = modelled.unwrap_or_else(|| {
        tracing::debug!(grantee_type = %grantee.r#type().as_str(), "Keeping grant verbatim");
        raw_grantee(grantee)
    });
    Ok(Grant {
        grantee,
        permission: Permission::parse(permission.as_str()),
    })
}

fn acl_from_sdk(
    owner: Option<&s3types::Owner>,
    grants: &[s3types::Grant],
) -> StoreResult<AccessControlList> {
    let (id, display_name) = owner_from_sdk(owner);
    Ok(AccessControlList {
        owner: id.map(|id| Owner { id, display_name }),
        grants: grants.iter().map(grant_from_sdk).collect::<StoreResult<_>>()?,
    })
}

fn invalid_acl(message: impl Into<String>) -> StoreFailure {
    StoreFailure::new(StoreCode::Other("InvalidArgument".into())).with_message(message)
}

#[allow(deprecated)]
fn acl_to_sdk(acl: &AccessControlList) -> StoreResult<s3types::AccessControlPolicy> {
    let mut grants = Vec::with_capacity(acl.grants.len());
    for grant in &acl.grants {
        let grantee = match &grant.grantee {
            Grantee::CanonicalUser { id, display_name } => s3types::Grantee::builder()
                .r#type(Type::CanonicalUser)
                .id(id)
                .set_display_name(display_name.clone()),
            Grantee::Group { uri } => s3types::Grantee::builder().r#type(Type::Group).uri(uri),
            Grantee::Email { address } => s3types::Grantee::builder()
                .r#type(Type::AmazonCustomerByEmail)
                .email_address(address),
            Grantee::Raw {
                kind,
                id,
                display_name,
                uri,
                email,
            } => s3types::Grantee::builder()
                .r#type(Type::from(kind.as_str()))
                .set_id(id.clone())
                .set_display_name(display_name.clone())
                .set_uri(uri.clone())
                .set_email_address(email.clone()),
        }
        .build()
        .map_err(|e| invalid_acl(e.to_string()))?;

        grants.push(
            s3types::Grant::builder()
                .grantee(grantee)
                .permission(s3types::Permission::from(grant.permission.as_str()))
                .build(),
        );
    }

    let owner = acl.owner.as_ref().map(|owner| {
        s3types::Owner::builder()
            .id(&owner.id)
            .set_display_name(owner.display_name.clone())
            .build()
    });

    Ok(s3types::AccessControlPolicy::builder()
        .set_grants(Some(grants))
        .set_owner(owner)
        .build())
}

#[async_trait]
impl StoreClient for S3Store {
    async fn list_service(
        &self,
        endpoint: &ServiceEndpoint,
        max_buckets: Option<u32>,
    ) -> StoreResult<ServiceListing> {
        let response = self
            .inner
            .list_buckets()
            .set_max_buckets(max_buckets.map(to_i32))
            .customize()
            .config_override(service_override(endpoint))
            .send()
            .await
            .map_err(failure_from_sdk)?;

        let (owner_id, owner_display_name) = owner_from_sdk(response.owner());
        let buckets = response
            .buckets()
            .iter()
            .map(|b| BucketRecord {
                name: b.name().unwrap_or_default().to_string(),
                creation_date: b.creation_date().map(format_time),
            })
            .collect();

        Ok(ServiceListing {
            owner_id,
            owner_display_name,
            buckets,
        })
    }

    async fn list_bucket(
        &self,
        addr: &BucketAddress,
        request: &ListRequest,
    ) -> StoreResult<ListPage> {
        let mut call = self
            .inner
            .list_objects_v2()
            .bucket(&addr.bucket)
            .fetch_owner(true)
            .set_continuation_token(request.continuation.clone())
            .set_max_keys(request.max_keys.map(to_i32));
        if !request.prefix.is_empty() {
            call = call.prefix(&request.prefix);
        }
        if !request.delimiter.is_empty() {
            call = call.delimiter(&request.delimiter);
        }

        let response = call
            .customize()
            .config_override(bucket_override(addr))
            .send()
            .await
            .map_err(failure_from_sdk)?;

        let contents = response
            .contents()
            .iter()
            .map(|object| {
                let (owner_id, owner_display_name) = owner_from_sdk(object.owner());
                ObjectRecord {
                    key: object.key().unwrap_or_default().to_string(),
                    last_modified: object.last_modified().map(format_time).unwrap_or_default(),
                    size: object.size().unwrap_or(0).max(0) as u64,
                    owner_id,
                    owner_display_name,
                }
            })
            .collect();

        let common_prefixes = response
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(str::to_string))
            .collect();

        Ok(ListPage {
            truncated: response.is_truncated().unwrap_or(false),
            next_continuation: response.next_continuation_token().map(str::to_string),
            contents,
            common_prefixes,
        })
    }

    async fn create_bucket(
        &self,
        endpoint: &ServiceEndpoint,
        request: &CreateBucketRequest,
    ) -> StoreResult<()> {
        let mut call = self
            .inner
            .create_bucket()
            .bucket(&request.bucket);
        call = match request.canned_acl {
            CannedAcl::Private => call.acl(BucketCannedAcl::Private),
        };
        if let Some(location) = &request.location_constraint {
            call = call.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(location.as_str()))
                    .build(),
            );
        }

        call.customize()
            .config_override(service_override(endpoint))
            .send()
            .await
            .map_err(failure_from_sdk)?;
        Ok(())
    }

    async fn delete_bucket(&self, addr: &BucketAddress) -> StoreResult<()> {
        self.inner
            .delete_bucket()
            .bucket(&addr.bucket)
            .customize()
            .config_override(bucket_override(addr))
            .send()
            .await
            .map_err(failure_from_sdk)?;
        Ok(())
    }

    async fn put_object(
        &self,
        addr: &BucketAddress,
        key: &str,
        body: Vec<u8>,
        properties: &PutProperties,
    ) -> StoreResult<()> {
        self.inner
            .put_object()
            .bucket(&addr.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .set_content_type(properties.content_type.clone())
            .customize()
            .config_override(bucket_override(addr))
            .send()
            .await
            .map_err(failure_from_sdk)?;
        Ok(())
    }

    async fn delete_object(&self, addr: &BucketAddress, key: &str) -> StoreResult<()> {
        self.inner
            .delete_object()
            .bucket(&addr.bucket)
            .key(key)
            .customize()
            .config_override(bucket_override(addr))
            .send()
            .await
            .map_err(failure_from_sdk)?;
        Ok(())
    }

    async fn copy_object(
        &self,
        addr: &BucketAddress,
        source_bucket: &str,
        source_key: &str,
        key: &str,
    ) -> StoreResult<()> {
        // Build copy source: bucket/key
        let copy_source = format!("{source_bucket}/{source_key}");
        self.inner
            .copy_object()
            .copy_source(&copy_source)
            .bucket(&addr.bucket)
            .key(key)
            .customize()
            .config_override(bucket_override(addr))
            .send()
            .await
            .map_err(failure_from_sdk)?;
        Ok(())
    }

    async fn get_object(
        &self,
        addr: &BucketAddress,
        key: &str,
        offset: u64,
    ) -> StoreResult<ByteChunks> {
        let mut call = self
            .inner
            .get_object()
            .bucket(&addr.bucket)
            .key(key);
        if offset > 0 {
            call = call.range(format!("bytes={offset}-"));
        }
        let response = call
            .customize()
            .config_override(bucket_override(addr))
            .send()
            .await
            .map_err(failure_from_sdk)?;

        let chunks = futures::stream::unfold(Some(response.body), |state| async move {
            let mut body = state?;
            match body.try_next().await {
                Ok(Some(bytes)) => Some((Ok(bytes.to_vec()), Some(body))),
                Ok(None) => None,
                Err(err) => Some((
                    Err(StoreFailure::new(StoreCode::ConnectionFailed).with_message(err.to_string())),
                    None,
                )),
            }
        });
        Ok(chunks.boxed())
    }

    async fn initiate_multipart(
        &self,
        addr: &BucketAddress,
        key: &str,
        properties: &PutProperties,
    ) -> StoreResult<String> {
        let response = self
            .inner
            .create_multipart_upload()
            .bucket(&addr.bucket)
            .key(key)
            .set_content_type(properties.content_type.clone())
            .customize()
            .config_override(bucket_override(addr))
            .send()
            .await
            .map_err(failure_from_sdk)?;

        response.upload_id().map(str::to_string).ok_or_else(|| {
            StoreFailure::new(StoreCode::Other("MissingUploadId".into()))
                .with_message("Store did not return an upload id")
        })
    }

    async fn upload_part(
        &self,
        addr: &BucketAddress,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Vec<u8>,
    ) -> StoreResult<String> {
        let response = self
            .inner
            .upload_part()
            .bucket(&addr.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .customize()
            .config_override(bucket_override(addr))
            .send()
            .await
            .map_err(failure_from_sdk)?;

        response.e_tag().map(str::to_string).ok_or_else(|| {
            StoreFailure::new(StoreCode::Other("MissingETag".into()))
                .with_message(format!("Store returned no ETag for part {part_number}"))
        })
    }

    async fn complete_multipart(
        &self,
        addr: &BucketAddress,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StoreResult<()> {
        let parts = parts
            .iter()
            .map(|p| {
                s3types::CompletedPart::builder()
                    .part_number(p.part_number)
                    .e_tag(&p.etag)
                    .build()
            })
            .collect();
        let upload = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        self.inner
            .complete_multipart_upload()
            .bucket(&addr.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(upload)
            .customize()
            .config_override(bucket_override(addr))
            .send()
            .await
            .map_err(failure_from_sdk)?;
        Ok(())
    }

    async fn abort_multipart(
        &self,
        addr: &BucketAddress,
        key: &str,
        upload_id: &str,
    ) -> StoreResult<()> {
        self.inner
            .abort_multipart_upload()
            .bucket(&addr.bucket)
            .key(key)
            .upload_id(upload_id)
            .customize()
            .config_override(bucket_override(addr))
            .send()
            .await
            .map_err(failure_from_sdk)?;
        Ok(())
    }

    async fn get_acl(&self, addr: &BucketAddress, key: &str) -> StoreResult<AccessControlList> {
        if key.is_empty() {
            let response = self
                .inner
                .get_bucket_acl()
                .bucket(&addr.bucket)
                .customize()
                .config_override(bucket_override(addr))
                .send()
                .await
                .map_err(failure_from_sdk)?;
            return acl_from_sdk(response.owner(), response.grants());
        }

        let response = self
            .inner
            .get_object_acl()
            .bucket(&addr.bucket)
            .key(key)
            .customize()
            .config_override(bucket_override(addr))
            .send()
            .await
            .map_err(failure_from_sdk)?;
        acl_from_sdk(response.owner(), response.grants())
    }

    async fn set_acl(
        &self,
        addr: &BucketAddress,
        key: &str,
        acl: &AccessControlList,
    ) -> StoreResult<()> {
        let policy = acl_to_sdk(acl)?;
        if key.is_empty() {
            self.inner
                .put_bucket_acl()
                .bucket(&addr.bucket)
                .access_control_policy(policy)
                .customize()
                .config_override(bucket_override(addr))
                .send()
                .await
                .map_err(failure_from_sdk)?;
            return Ok(());
        }

        self.inner
            .put_object_acl()
            .bucket(&addr.bucket)
            .key(key)
            .access_control_policy(policy)
            .customize()
            .config_override(bucket_override(addr))
            .send()
            .await
            .map_err(failure_from_sdk)?;
        Ok(())
    }
}
