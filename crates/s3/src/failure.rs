//! Translation of SDK errors into store failures
//!
//! The core decides what a failure means; this module only reports what the
//! store said: the status code, the message and every detail of the XML
//! error body, plus the `x-amz-bucket-region` header.

use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use quick_xml::Reader;
use quick_xml::events::Event;

use bfs_core::classify::{StoreCode, StoreFailure};

/// Header S3 uses to name a bucket's region
pub const BUCKET_REGION_HEADER: &str = "x-amz-bucket-region";

/// Error body elements reported through their own fields
const STANDARD_ELEMENTS: [&str; 4] = ["Code", "Message", "Resource", "Error"];

/// Child elements of an S3 `<Error>` body, in document order
pub fn parse_error_details(body: &[u8]) -> Vec<(String, String)> {
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);

    let mut details = Vec::new();
    let mut current: Option<String> = None;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                current = Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::Text(e)) => {
                let Some(name) = current.as_ref() else {
                    continue;
                };
                let Ok(decoded) = e.decode() else {
                    continue;
                };
                let value = quick_xml::escape::unescape(&decoded)
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| decoded.into_owned());
                details.push((name.clone(), value));
            }
            Ok(Event::End(_)) => current = None,
            Ok(Event::Eof) => break,
            Err(err) => {
                tracing::debug!(error = %err, "Unparsable error body");
                break;
            }
            _ => {}
        }
    }
    details
}

/// Code for a response that carried no error code of its own
fn code_from_status(status: u16) -> StoreCode {
    match status {
        307 => StoreCode::TemporaryRedirect,
        other => StoreCode::from_code(&other.to_string()),
    }
}

/// Code for a request that never got a response
pub fn code_from_transport(description: &str) -> StoreCode {
    let lower = description.to_ascii_lowercase();
    if lower.contains("dns error")
        || lower.contains("failed to lookup address")
        || lower.contains("name or service not known")
        || lower.contains("no such host")
    {
        StoreCode::NameLookupError
    } else if lower.contains("timed out") || lower.contains("timeout") {
        StoreCode::ConnectionFailed
    } else {
        StoreCode::FailedToConnect
    }
}

/// Build a failure from a service response
pub fn failure_from_response(
    code: Option<&str>,
    message: Option<&str>,
    status: u16,
    region_header: Option<&str>,
    body: Option<&[u8]>,
) -> StoreFailure {
    let details = body.map(parse_error_details).unwrap_or_default();
    let detail = |name: &str| {
        details
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    };

    let code = code
        .or_else(|| detail("Code"))
        .map(StoreCode::from_code)
        .unwrap_or_else(|| code_from_status(status));
    let mut failure = StoreFailure::new(code);
    if let Some(message) = message.or_else(|| detail("Message")) {
        failure = failure.with_message(message);
    }
    if let Some(resource) = detail("Resource") {
        failure = failure.with_resource(resource);
    }
    for (name, value) in details
        .iter()
        .filter(|(n, _)| !STANDARD_ELEMENTS.contains(&n.as_str()))
    {
        failure = failure.with_extra(name.clone(), value.clone());
    }
    if let Some(region) = region_header.filter(|r| !r.is_empty())
        && failure.region_detail().is_none()
    {
        failure = failure.with_extra("Region", region);
    }
    failure
}

/// Convert any SDK operation error
pub fn failure_from_sdk<E>(err: SdkError<E, HttpResponse>) -> StoreFailure
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match &err {
        SdkError::ServiceError(context) => {
            let raw = context.raw();
            let service = context.err();
            failure_from_response(
                service.code(),
                service.message(),
                raw.status().as_u16(),
                raw.headers().get(BUCKET_REGION_HEADER),
                raw.body().bytes(),
            )
        }
        SdkError::DispatchFailure(_) => {
            let description = DisplayErrorContext(&err).to_string();
            StoreFailure::new(code_from_transport(&description)).with_message(description)
        }
        SdkError::TimeoutError(_) | SdkError::ResponseError(_) => {
            StoreFailure::new(StoreCode::ConnectionFailed)
                .with_message(DisplayErrorContext(&err).to_string())
        }
        _ => StoreFailure::new(StoreCode::Other("RequestFailed".into()))
            .with_message(DisplayErrorContext(&err).to_string()),
    }
}
