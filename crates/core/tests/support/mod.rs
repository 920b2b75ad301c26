//! In-memory object store for session scenario tests
//!
//! Buckets live in a region; a request signed for another region is
//! answered the way S3 does, with an authorization-header-malformed error
//! naming the right one. Failures can be injected per call.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use bfs_core::acl::{AccessControlList, Grant, Grantee, Owner, Permission};
use bfs_core::classify::{StoreCode, StoreFailure, StoreResult};
use bfs_core::store::{
    BucketAddress, BucketRecord, ByteChunks, CompletedPart, CreateBucketRequest, ListPage,
    ListRequest, ObjectRecord, PutProperties, ServiceEndpoint, ServiceListing, StoreClient,
};
use futures::StreamExt;

pub const OWNER_ID: &str = "owner-id";
pub const LOG_DELIVERY_URI: &str = "http://acs.amazonaws.com/groups/s3/LogDelivery";

/// A store call as seen by the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListService,
    ListBucket { bucket: String, prefix: String },
    CreateBucket { bucket: String },
    DeleteBucket { bucket: String },
    PutObject { bucket: String, key: String },
    DeleteObject { bucket: String, key: String },
    CopyObject { bucket: String, key: String },
    GetObject { bucket: String, key: String, offset: u64 },
    Initiate { key: String },
    UploadPart { key: String, part: i32 },
    Complete { key: String, parts: usize },
    Abort { key: String },
    GetAcl { key: String },
    SetAcl { key: String },
}

struct Injected {
    matches: Box<dyn Fn(&Call) -> bool + Send>,
    failure: StoreFailure,
    remaining: u32,
}

#[derive(Default)]
struct Bucket {
    region: String,
    objects: BTreeMap<String, Vec<u8>>,
    acls: HashMap<String, AccessControlList>,
}

struct Upload {
    bucket: String,
    key: String,
    parts: BTreeMap<i32, Vec<u8>>,
}

#[derive(Default)]
struct State {
    buckets: BTreeMap<String, Bucket>,
    uploads: HashMap<String, Upload>,
    next_upload: u64,
    injected: Vec<Injected>,
    calls: Vec<Call>,
}

/// In-memory store client
pub struct FakeStore {
    state: Mutex<State>,
    page_size: u32,
}

impl Default for FakeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_size: 1000,
        }
    }

    /// Cap every listing page at `page_size` items
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn add_bucket(&self, name: &str, region: &str) {
        self.state.lock().unwrap().buckets.insert(
            name.to_string(),
            Bucket {
                region: region.to_string(),
                ..Default::default()
            },
        );
    }

    pub fn put(&self, bucket: &str, key: &str, body: &[u8]) {
        let mut state = self.state.lock().unwrap();
        let bucket = state.buckets.get_mut(bucket).expect("bucket exists");
        bucket.objects.insert(key.to_string(), body.to_vec());
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().unwrap();
        state.buckets.get(bucket)?.objects.get(key).cloned()
    }

    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.state.lock().unwrap().buckets.contains_key(bucket)
    }

    pub fn set_acl_of(&self, bucket: &str, key: &str, acl: AccessControlList) {
        let mut state = self.state.lock().unwrap();
        let bucket = state.buckets.get_mut(bucket).expect("bucket exists");
        bucket.acls.insert(key.to_string(), acl);
    }

    pub fn acl_of(&self, bucket: &str, key: &str) -> AccessControlList {
        let state = self.state.lock().unwrap();
        state.buckets[bucket]
            .acls
            .get(key)
            .cloned()
            .unwrap_or_else(default_acl)
    }

    /// Fail the next `times` calls matching `matches`
    pub fn fail_when(
        &self,
        matches: impl Fn(&Call) -> bool + Send + 'static,
        failure: StoreFailure,
        times: u32,
    ) {
        self.state.lock().unwrap().injected.push(Injected {
            matches: Box::new(matches),
            failure,
            remaining: times,
        });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| matches(c)).count()
    }

    pub fn open_uploads(&self) -> usize {
        self.state.lock().unwrap().uploads.len()
    }

    /// Record the call, then apply injected failures and region checks
    fn enter(&self, call: Call, bucket: Option<(&str, &str)>) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call.clone());

        if let Some(injected) = state
            .injected
            .iter_mut()
            .find(|i| i.remaining > 0 && (i.matches)(&call))
        {
            injected.remaining -= 1;
            return Err(injected.failure.clone());
        }

        if let Some((name, signing_region)) = bucket {
            let bucket = state.buckets.get(name).ok_or_else(|| {
                StoreFailure::new(StoreCode::NoSuchBucket).with_resource(name.to_string())
            })?;
            if bucket.region != signing_region {
                return Err(StoreFailure::new(StoreCode::AuthorizationHeaderMalformed)
                    .with_message(format!(
                        "The authorization header is malformed; the region '{signing_region}' is wrong; expecting '{}'",
                        bucket.region
                    ))
                    .with_extra("Region", bucket.region.clone()));
            }
        }
        Ok(())
    }
}

pub fn default_acl() -> AccessControlList {
    AccessControlList {
        owner: Some(Owner {
            id: OWNER_ID.to_string(),
            display_name: Some("owner".to_string()),
        }),
        grants: vec![Grant {
            grantee: Grantee::CanonicalUser {
                id: OWNER_ID.to_string(),
                display_name: Some("owner".to_string()),
            },
            permission: Permission::FullControl,
        }],
    }
}

enum Item {
    Key(String, u64),
    Prefix(String),
}

impl Item {
    fn name(&self) -> &str {
        match self {
            Item::Key(key, _) | Item::Prefix(key) => key,
        }
    }
}

#[async_trait]
impl StoreClient for FakeStore {
    async fn list_service(
        &self,
        _endpoint: &ServiceEndpoint,
        max_buckets: Option<u32>,
    ) -> StoreResult<ServiceListing> {
        self.enter(Call::ListService, None)?;
        let state = self.state.lock().unwrap();
        let limit = max_buckets.map_or(usize::MAX, |m| m as usize);
        Ok(ServiceListing {
            owner_id: Some(OWNER_ID.to_string()),
            owner_display_name: Some("owner".to_string()),
            buckets: state
                .buckets
                .keys()
                .take(limit)
                .map(|name| BucketRecord {
                    name: name.clone(),
                    creation_date: None,
                })
                .collect(),
        })
    }

    async fn list_bucket(
        &self,
        addr: &BucketAddress,
        request: &ListRequest,
    ) -> StoreResult<ListPage> {
        self.enter(
            Call::ListBucket {
                bucket: addr.bucket.clone(),
                prefix: request.prefix.clone(),
            },
            Some((&addr.bucket, &addr.signing_region)),
        )?;
        let state = self.state.lock().unwrap();
        let bucket = &state.buckets[&addr.bucket];

        let mut prefixes = BTreeSet::new();
        let mut items = Vec::new();
        for (key, body) in bucket.objects.range(request.prefix.clone()..) {
            let Some(rest) = key.strip_prefix(&request.prefix) else {
                break;
            };
            match rest.find(&request.delimiter) {
                Some(pos) if !request.delimiter.is_empty() => {
                    let common = format!(
                        "{}{}",
                        request.prefix,
                        &rest[..pos + request.delimiter.len()]
                    );
                    if prefixes.insert(common.clone()) {
                        items.push(Item::Prefix(common));
                    }
                }
                _ => items.push(Item::Key(key.clone(), body.len() as u64)),
            }
        }
        items.sort_by(|a, b| a.name().cmp(b.name()));

        let start = match &request.continuation {
            Some(token) => items
                .iter()
                .position(|i| i.name() > token.as_str())
                .unwrap_or(items.len()),
            None => 0,
        };
        let take = request
            .max_keys
            .unwrap_or(self.page_size)
            .min(self.page_size) as usize;
        let page: Vec<&Item> = items[start..].iter().take(take).collect();
        let truncated = start + page.len() < items.len();

        let mut result = ListPage {
            truncated,
            next_continuation: truncated.then(|| page.last().map(|i| i.name().to_string())).flatten(),
            ..Default::default()
        };
        for item in page {
            match item {
                Item::Key(key, size) => result.contents.push(ObjectRecord {
                    key: key.clone(),
                    last_modified: "2024-05-01T12:30:00.000Z".to_string(),
                    size: *size,
                    owner_id: Some(OWNER_ID.to_string()),
                    owner_display_name: Some("owner".to_string()),
                }),
                Item::Prefix(prefix) => result.common_prefixes.push(prefix.clone()),
            }
        }
        Ok(result)
    }

    async fn create_bucket(
        &self,
        endpoint: &ServiceEndpoint,
        request: &CreateBucketRequest,
    ) -> StoreResult<()> {
        self.enter(
            Call::CreateBucket {
                bucket: request.bucket.clone(),
            },
            None,
        )?;
        let region = request
            .location_constraint
            .clone()
            .unwrap_or_else(|| endpoint.signing_region.clone());
        self.add_bucket(&request.bucket, &region);
        Ok(())
    }

    async fn delete_bucket(&self, addr: &BucketAddress) -> StoreResult<()> {
        self.enter(
            Call::DeleteBucket {
                bucket: addr.bucket.clone(),
            },
            Some((&addr.bucket, &addr.signing_region)),
        )?;
        let mut state = self.state.lock().unwrap();
        if !state.buckets[&addr.bucket].objects.is_empty() {
            return Err(StoreFailure::new(StoreCode::Other("BucketNotEmpty".into())));
        }
        state.buckets.remove(&addr.bucket);
        Ok(())
    }

    async fn put_object(
        &self,
        addr: &BucketAddress,
        key: &str,
        body: Vec<u8>,
        _properties: &PutProperties,
    ) -> StoreResult<()> {
        self.enter(
            Call::PutObject {
                bucket: addr.bucket.clone(),
                key: key.to_string(),
            },
            Some((&addr.bucket, &addr.signing_region)),
        )?;
        self.put(&addr.bucket, key, &body);
        Ok(())
    }

    async fn delete_object(&self, addr: &BucketAddress, key: &str) -> StoreResult<()> {
        self.enter(
            Call::DeleteObject {
                bucket: addr.bucket.clone(),
                key: key.to_string(),
            },
            Some((&addr.bucket, &addr.signing_region)),
        )?;
        let mut state = self.state.lock().unwrap();
        if let Some(bucket) = state.buckets.get_mut(&addr.bucket) {
            bucket.objects.remove(key);
        }
        Ok(())
    }

    async fn copy_object(
        &self,
        addr: &BucketAddress,
        source_bucket: &str,
        source_key: &str,
        key: &str,
    ) -> StoreResult<()> {
        self.enter(
            Call::CopyObject {
                bucket: addr.bucket.clone(),
                key: key.to_string(),
            },
            Some((&addr.bucket, &addr.signing_region)),
        )?;
        let body = self
            .object(source_bucket, source_key)
            .ok_or_else(|| StoreFailure::new(StoreCode::NoSuchKey).with_resource(source_key))?;
        self.put(&addr.bucket, key, &body);
        Ok(())
    }

    async fn get_object(
        &self,
        addr: &BucketAddress,
        key: &str,
        offset: u64,
    ) -> StoreResult<ByteChunks> {
        self.enter(
            Call::GetObject {
                bucket: addr.bucket.clone(),
                key: key.to_string(),
                offset,
            },
            Some((&addr.bucket, &addr.signing_region)),
        )?;
        let body = self
            .object(&addr.bucket, key)
            .ok_or_else(|| StoreFailure::new(StoreCode::NoSuchKey).with_resource(key))?;
        let chunks: Vec<StoreResult<Vec<u8>>> = body
            .get(offset as usize..)
            .unwrap_or_default()
            .chunks(64 * 1024)
            .map(|c| Ok(c.to_vec()))
            .collect();
        Ok(futures::stream::iter(chunks).boxed())
    }

    async fn initiate_multipart(
        &self,
        addr: &BucketAddress,
        key: &str,
        _properties: &PutProperties,
    ) -> StoreResult<String> {
        self.enter(
            Call::Initiate {
                key: key.to_string(),
            },
            Some((&addr.bucket, &addr.signing_region)),
        )?;
        let mut state = self.state.lock().unwrap();
        state.next_upload += 1;
        let id = format!("upload-{}", state.next_upload);
        state.uploads.insert(
            id.clone(),
            Upload {
                bucket: addr.bucket.clone(),
                key: key.to_string(),
                parts: BTreeMap::new(),
            },
        );
        Ok(id)
    }

    async fn upload_part(
        &self,
        addr: &BucketAddress,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Vec<u8>,
    ) -> StoreResult<String> {
        self.enter(
            Call::UploadPart {
                key: key.to_string(),
                part: part_number,
            },
            Some((&addr.bucket, &addr.signing_region)),
        )?;
        let mut state = self.state.lock().unwrap();
        let upload = state
            .uploads
            .get_mut(upload_id)
            .ok_or_else(|| StoreFailure::new(StoreCode::NoSuchUpload))?;
        upload.parts.insert(part_number, body);
        Ok(format!("\"etag-{part_number}\""))
    }

    async fn complete_multipart(
        &self,
        addr: &BucketAddress,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StoreResult<()> {
        self.enter(
            Call::Complete {
                key: key.to_string(),
                parts: parts.len(),
            },
            Some((&addr.bucket, &addr.signing_region)),
        )?;
        let mut state = self.state.lock().unwrap();
        let upload = state
            .uploads
            .remove(upload_id)
            .ok_or_else(|| StoreFailure::new(StoreCode::NoSuchUpload))?;
        let mut body = Vec::new();
        for part in parts {
            let data = upload
                .parts
                .get(&part.part_number)
                .ok_or_else(|| StoreFailure::new(StoreCode::Other("InvalidPart".into())))?;
            body.extend_from_slice(data);
        }
        let bucket = state
            .buckets
            .get_mut(&upload.bucket)
            .ok_or_else(|| StoreFailure::new(StoreCode::NoSuchBucket))?;
        bucket.objects.insert(upload.key, body);
        Ok(())
    }

    async fn abort_multipart(
        &self,
        addr: &BucketAddress,
        key: &str,
        upload_id: &str,
    ) -> StoreResult<()> {
        self.enter(
            Call::Abort {
                key: key.to_string(),
            },
            Some((&addr.bucket, &addr.signing_region)),
        )?;
        self.state.lock().unwrap().uploads.remove(upload_id);
        Ok(())
    }

    async fn get_acl(&self, addr: &BucketAddress, key: &str) -> StoreResult<AccessControlList> {
        self.enter(
            Call::GetAcl {
                key: key.to_string(),
            },
            Some((&addr.bucket, &addr.signing_region)),
        )?;
        Ok(self.acl_of(&addr.bucket, key))
    }

    async fn set_acl(
        &self,
        addr: &BucketAddress,
        key: &str,
        acl: &AccessControlList,
    ) -> StoreResult<()> {
        self.enter(
            Call::SetAcl {
                key: key.to_string(),
            },
            Some((&addr.bucket, &addr.signing_region)),
        )?;
        self.set_acl_of(&addr.bucket, key, acl.clone());
        Ok(())
    }
}
