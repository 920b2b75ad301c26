//! Bucket context resolution
//!
//! Buckets live in regions, and sometimes behind endpoints, that the session
//! was not configured with. The resolver learns both on first use of a bucket
//! by probing it with a one-key listing and reading the store's complaints.
//! What it learns is kept per session until [`BucketResolver::clear`].

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::time::Duration;

use crate::classify::{StoreCode, StoreFailure};
use crate::store::{
    BucketAddress, ListRequest, Protocol, ServiceEndpoint, StoreClient, UrlStyle, timed,
};

/// Listing delimiter; keys are slash-separated paths
pub const DELIMITER: &str = "/";

/// Static addressing settings of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Service host, without port
    pub host: String,
    pub port: Option<u16>,
    pub protocol: Protocol,
    pub url_style: UrlStyle,
    pub default_region: String,
}

/// Whether `host` ends in an explicit `:port`
fn has_port(host: &str) -> bool {
    match host.rsplit_once(':') {
        Some((head, port)) => {
            !port.is_empty()
                && port.bytes().all(|b| b.is_ascii_digit())
                && (!head.contains(':') || head.ends_with(']'))
        }
        None => false,
    }
}

/// Learns and hands out per-bucket addressing
#[derive(Debug)]
pub struct BucketResolver {
    config: ResolverConfig,
    timeout: Duration,
    auth_region: String,
    regions: HashMap<String, String>,
    hosts: HashMap<String, String>,
}

impl BucketResolver {
    pub fn new(config: ResolverConfig, timeout: Duration) -> Self {
        let auth_region = config.default_region.clone();
        Self {
            config,
            timeout,
            auth_region,
            regions: HashMap::new(),
            hosts: HashMap::new(),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Region used to sign requests for buckets with no learned region
    pub fn auth_region(&self) -> &str {
        &self.auth_region
    }

    /// Go back to signing with the configured default region
    pub fn reset_auth_region(&mut self) {
        self.auth_region = self.config.default_region.clone();
    }

    fn port_suffix(&self) -> String {
        self.config
            .port
            .map(|port| format!(":{port}"))
            .unwrap_or_default()
    }

    /// Addressing for calls that are not bound to a bucket
    pub fn service_endpoint(&self) -> ServiceEndpoint {
        ServiceEndpoint {
            host: format!("{}{}", self.config.host, self.port_suffix()),
            protocol: self.config.protocol,
            signing_region: self.auth_region.clone(),
        }
    }

    /// Adopt the region named by a failed service-level call
    ///
    /// Returns `true` when the authentication region changed and the call is
    /// worth repeating.
    pub fn switch_auth_region(&mut self, failure: &StoreFailure) -> bool {
        if failure.code != StoreCode::AuthorizationHeaderMalformed {
            return false;
        }
        match failure.region_detail() {
            Some(region) if region != self.auth_region => {
                tracing::info!(region, "Will use authentication region from now on");
                self.auth_region = region.to_string();
                true
            }
            _ => false,
        }
    }

    pub fn learned_region(&self, bucket: &str) -> Option<&str> {
        self.regions.get(bucket).map(String::as_str)
    }

    pub fn learned_host(&self, bucket: &str) -> Option<&str> {
        self.hosts.get(bucket).map(String::as_str)
    }

    /// Whether anything has been learned about the bucket
    pub fn is_known(&self, bucket: &str) -> bool {
        self.regions.contains_key(bucket) || self.hosts.contains_key(bucket)
    }

    /// Forget everything learned (reconnect)
    pub fn clear(&mut self) {
        self.regions.clear();
        self.hosts.clear();
    }

    /// Current best address for a bucket, without probing
    pub fn address(&self, bucket: &str) -> BucketAddress {
        let signing_region = self
            .regions
            .get(bucket)
            .cloned()
            .unwrap_or_else(|| self.auth_region.clone());

        let mut url_style = self.config.url_style;
        let learned_host = self.hosts.get(bucket);
        let host = match learned_host {
            Some(learned) => {
                let bucket_prefix = format!("{bucket}.");
                match learned.get(..bucket_prefix.len()) {
                    Some(head) if head.eq_ignore_ascii_case(&bucket_prefix) => {
                        // Redirected to the bucket's own host name: address
                        // the bucket through the host, not the path.
                        url_style = UrlStyle::Virtual;
                        learned[bucket_prefix.len()..].to_string()
                    }
                    _ => learned.clone(),
                }
            }
            None => self.config.host.clone(),
        };

        // A learned endpoint names its own port, if any
        let host = if learned_host.is_some() && has_port(&host) {
            host
        } else {
            format!("{host}{}", self.port_suffix())
        };

        BucketAddress {
            bucket: bucket.to_string(),
            host,
            protocol: self.config.protocol,
            url_style,
            signing_region,
        }
    }

    /// Resolve the address of a bucket, probing it first if it is unknown
    ///
    /// `prefix` is the key or prefix the caller is about to use; the probe
    /// lists under it since access may be granted to that prefix only.
    pub async fn resolve(
        &mut self,
        store: &dyn StoreClient,
        bucket: &str,
        prefix: &str,
    ) -> BucketAddress {
        if self.is_known(bucket) {
            return self.address(bucket);
        }

        tracing::info!(
            bucket,
            "Unknown bucket, will detect its region (and service endpoint)"
        );

        loop {
            let addr = self.address(bucket);
            let request = ListRequest {
                prefix: prefix.to_string(),
                delimiter: DELIMITER.to_string(),
                continuation: None,
                max_keys: Some(1),
            };
            let outcome = timed(self.timeout, store.list_bucket(&addr, &request)).await;

            let learned = match outcome {
                Ok(_) => {
                    if insert_new(&mut self.regions, bucket, &addr.signing_region) {
                        tracing::info!(
                            bucket,
                            region = %addr.signing_region,
                            "Will keep using region for bucket from now on"
                        );
                    }
                    false
                }
                Err(failure) => self.learn(bucket, &addr, &failure),
            };

            if !learned {
                return self.address(bucket);
            }
        }
    }

    /// Record what a failed probe revealed; `true` when something new was learned
    fn learn(&mut self, bucket: &str, addr: &BucketAddress, failure: &StoreFailure) -> bool {
        match failure.code {
            StoreCode::AuthorizationHeaderMalformed => match failure.region_detail() {
                Some(region) if region != addr.signing_region => {
                    let inserted = insert_new(&mut self.regions, bucket, region);
                    if inserted {
                        tracing::info!(bucket, region, "Will use region for bucket from now on");
                    }
                    inserted
                }
                _ => false,
            },
            StoreCode::TemporaryRedirect | StoreCode::PermanentRedirect => {
                match failure.endpoint_detail() {
                    Some(endpoint) if self.current_host(bucket) != endpoint => {
                        let inserted = insert_new(&mut self.hosts, bucket, endpoint);
                        if inserted {
                            tracing::info!(
                                bucket,
                                endpoint,
                                "Will use endpoint for bucket from now on"
                            );
                        }
                        inserted
                    }
                    _ => false,
                }
            }
            _ => {
                tracing::debug!(bucket, error = %failure, "Bucket probe failed");
                false
            }
        }
    }

    fn current_host(&self, bucket: &str) -> &str {
        self.hosts
            .get(bucket)
            .map(String::as_str)
            .unwrap_or(&self.config.host)
    }
}

/// Insert only when absent; learned values are never overwritten
fn insert_new(map: &mut HashMap<String, String>, bucket: &str, value: &str) -> bool {
    match map.entry(bucket.to_string()) {
        Entry::Vacant(slot) => {
            slot.insert(value.to_string());
            true
        }
        Entry::Occupied(_) => false,
    }
}
