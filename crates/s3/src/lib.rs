//! bfs-s3: S3 SDK adapter for bucketfs
//!
//! This crate provides the implementation of the StoreClient trait
//! using the aws-sdk-s3 crate. It is the only crate that directly
//! depends on the AWS SDK.

pub mod client;
pub mod failure;

pub use client::S3Store;
