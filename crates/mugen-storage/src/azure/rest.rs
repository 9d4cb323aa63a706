//! Blob service REST calls that `object_store` does not cover: listing
//! containers and listing a container with a precise "does not exist" signal.
//!
//! Requests are authenticated with the connection string's SAS token when
//! present, otherwise with a SharedKey signature over the canonical request.

use std::sync::LazyLock;

use base64::Engine;
use hmac::{Hmac, Mac};
use regex::Regex;
use reqwest::{Client, StatusCode, Url};
use sha2::Sha256;

use super::connection_string::AzureConnectionString;
use crate::traits::{BlobError, BlobResult};

const API_VERSION: &str = "2021-08-06";
const MAX_PAGES: usize = 10_000;

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<Name>([^<]*)</Name>").expect("name pattern is valid"));
static NEXT_MARKER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<NextMarker>([^<]*)</NextMarker>").expect("marker pattern is valid")
});

/// Listing target: the whole account or one container.
enum ListScope<'a> {
    Account,
    Container(&'a str),
}

#[derive(Clone)]
pub(crate) struct ListingClient {
    http: Client,
    connection: AzureConnectionString,
}

impl ListingClient {
    pub(crate) fn new(connection: AzureConnectionString) -> BlobResult<Self> {
        let http = Client::builder()
            .build()
            .map_err(|e| BlobError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http, connection })
    }

    pub(crate) async fn list_containers(&self) -> BlobResult<Vec<String>> {
        self.list(ListScope::Account).await
    }

    pub(crate) async fn list_blobs(&self, container: &str) -> BlobResult<Vec<String>> {
        self.list(ListScope::Container(container)).await
    }

    async fn list(&self, scope: ListScope<'_>) -> BlobResult<Vec<String>> {
        let mut names = Vec::new();
        let mut marker: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let body = self.list_page(&scope, marker.as_deref()).await?;
            names.extend(extract_names(&body));

            match extract_next_marker(&body) {
                Some(next) => marker = Some(next),
                None => {
                    names.sort();
                    return Ok(names);
                }
            }
        }

        Err(BlobError::Backend(
            "Listing did not terminate after the maximum number of pages".to_string(),
        ))
    }

    async fn list_page(&self, scope: &ListScope<'_>, marker: Option<&str>) -> BlobResult<String> {
        let start = std::time::Instant::now();
        let url = self.list_url(scope, marker)?;

        let mut request = self
            .http
            .get(url.clone())
            .header("x-ms-version", API_VERSION);

        if self.connection.sas_token.is_none() {
            if let Some(key) = &self.connection.account_key {
                let date = chrono::Utc::now()
                    .format("%a, %d %b %Y %H:%M:%S GMT")
                    .to_string();
                let authorization =
                    shared_key_authorization(&self.connection.account_name, key, &url, &date)?;
                request = request
                    .header("x-ms-date", date)
                    .header("Authorization", authorization);
            }
        }

        let response = request.send().await.map_err(|e| {
            // The URL carries the SAS signature.
            let e = e.without_url();
            tracing::error!(
                error = %e,
                account = %self.connection.account_name,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Blob listing request failed"
            );
            BlobError::Backend(format!("Listing request failed: {}", e))
        })?;

        let status = response.status();
        if status.is_success() {
            return response.text().await.map_err(|e| {
                BlobError::Backend(format!("Failed to read listing body: {}", e.without_url()))
            });
        }

        let error_code = response
            .headers()
            .get("x-ms-error-code")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        tracing::warn!(
            account = %self.connection.account_name,
            status = %status,
            error_code = %error_code,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Blob listing rejected"
        );

        match scope {
            ListScope::Container(container)
                if status == StatusCode::NOT_FOUND || error_code == "ContainerNotFound" =>
            {
                Err(BlobError::ContainerNotFound(container.to_string()))
            }
            _ => Err(BlobError::Backend(format!(
                "Listing failed with status {} {}",
                status, error_code
            ))),
        }
    }

    fn list_url(&self, scope: &ListScope<'_>, marker: Option<&str>) -> BlobResult<Url> {
        let mut raw = match scope {
            ListScope::Account => format!("{}/?comp=list", self.connection.blob_endpoint),
            ListScope::Container(container) => format!(
                "{}/{}?restype=container&comp=list",
                self.connection.blob_endpoint,
                urlencoding::encode(container)
            ),
        };

        if let Some(marker) = marker {
            raw.push_str("&marker=");
            raw.push_str(&urlencoding::encode(marker));
        }

        if let Some(sas) = &self.connection.sas_token {
            raw.push('&');
            raw.push_str(sas);
        }

        Url::parse(&raw).map_err(|e| BlobError::Config(format!("Invalid blob endpoint: {}", e)))
    }
}

/// `SharedKey {account}:{signature}` for a GET request without a body.
fn shared_key_authorization(
    account: &str,
    account_key: &str,
    url: &Url,
    date: &str,
) -> BlobResult<String> {
    let key = base64::engine::general_purpose::STANDARD
        .decode(account_key)
        .map_err(|e| BlobError::Config(format!("AccountKey is not valid base64: {}", e)))?;

    let string_to_sign = string_to_sign(account, url, date);

    let mut mac = Hmac::<Sha256>::new_from_slice(&key).expect("HMAC accepts any key size");
    mac.update(string_to_sign.as_bytes());
    let signature =
        base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());

    Ok(format!("SharedKey {}:{}", account, signature))
}

fn string_to_sign(account: &str, url: &Url, date: &str) -> String {
    // Verb followed by the eleven standard headers, all empty for a plain GET.
    let mut out = String::from("GET\n");
    out.push_str(&"\n".repeat(11));
    out.push_str(&format!("x-ms-date:{}\nx-ms-version:{}\n", date, API_VERSION));
    out.push_str(&canonicalized_resource(account, url));
    out
}

fn canonicalized_resource(account: &str, url: &Url) -> String {
    let mut resource = format!("/{}{}", account, url.path());

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.to_lowercase(), v.into_owned()))
        .collect();
    params.sort();

    for (key, value) in params {
        resource.push('\n');
        resource.push_str(&key);
        resource.push(':');
        resource.push_str(&value);
    }

    resource
}

fn extract_names(body: &str) -> Vec<String> {
    NAME_PATTERN
        .captures_iter(body)
        .filter_map(|c| c.get(1))
        .map(|m| xml_unescape(m.as_str()))
        .collect()
}

fn extract_next_marker(body: &str) -> Option<String> {
    NEXT_MARKER_PATTERN
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| xml_unescape(m.as_str()))
        .filter(|m| !m.is_empty())
}

fn xml_unescape(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST_BLOBS_PAGE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<EnumerationResults ServiceEndpoint="https://mugen.blob.core.windows.net/" ContainerName="mugenverse">
  <Blobs>
    <Blob><Name>data/generated_videos/b.mp4</Name><Properties><Content-Length>10</Content-Length></Properties></Blob>
    <Blob><Name>data/generated_videos/a&amp;b.mp4</Name><Properties /></Blob>
  </Blobs>
  <NextMarker>2!96!MDAwMDQ2</NextMarker>
</EnumerationResults>"#;

    const LAST_PAGE: &str = r#"<EnumerationResults><Containers><Container><Name>mugenverse</Name></Container></Containers><NextMarker /></EnumerationResults>"#;

    #[test]
    fn test_extract_names_unescapes() {
        let names = extract_names(LIST_BLOBS_PAGE);
        assert_eq!(
            names,
            vec![
                "data/generated_videos/b.mp4".to_string(),
                "data/generated_videos/a&b.mp4".to_string()
            ]
        );
    }

    #[test]
    fn test_next_marker() {
        assert_eq!(
            extract_next_marker(LIST_BLOBS_PAGE).as_deref(),
            Some("2!96!MDAwMDQ2")
        );
        assert_eq!(extract_next_marker(LAST_PAGE), None);
        assert_eq!(extract_next_marker("<NextMarker></NextMarker>"), None);
    }

    #[test]
    fn test_canonicalized_resource_sorts_parameters() {
        let url = Url::parse(
            "https://mugen.blob.core.windows.net/mugenverse?restype=container&comp=list&marker=abc",
        )
        .unwrap();
        assert_eq!(
            canonicalized_resource("mugen", &url),
            "/mugen/mugenverse\ncomp:list\nmarker:abc\nrestype:container"
        );
    }

    #[test]
    fn test_canonicalized_resource_for_emulator_path_style() {
        let url = Url::parse("http://127.0.0.1:10000/devstoreaccount1/?comp=list").unwrap();
        assert_eq!(
            canonicalized_resource("devstoreaccount1", &url),
            "/devstoreaccount1/devstoreaccount1/\ncomp:list"
        );
    }

    #[test]
    fn test_string_to_sign_layout() {
        let url = Url::parse("https://mugen.blob.core.windows.net/?comp=list").unwrap();
        let signed = string_to_sign("mugen", &url, "Mon, 01 Jan 2024 00:00:00 GMT");
        assert!(signed.starts_with("GET\n\n\n\n\n\n\n\n\n\n\n\nx-ms-date:"));
        assert!(signed.ends_with("x-ms-version:2021-08-06\n/mugen/\ncomp:list"));
    }

    #[test]
    fn test_shared_key_authorization_is_deterministic() {
        let url = Url::parse("https://mugen.blob.core.windows.net/?comp=list").unwrap();
        let date = "Mon, 01 Jan 2024 00:00:00 GMT";
        let a = shared_key_authorization("mugen", "c2VjcmV0", &url, date).unwrap();
        let b = shared_key_authorization("mugen", "c2VjcmV0", &url, date).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("SharedKey mugen:"));
        assert!(shared_key_authorization("mugen", "not base64!", &url, date).is_err());
    }

    #[test]
    fn test_list_url_appends_marker_and_sas() {
        let conn = AzureConnectionString::parse(
            "BlobEndpoint=https://mugen.blob.core.windows.net;SharedAccessSignature=sv=1&sig=x",
        )
        .unwrap();
        let client = ListingClient::new(conn).unwrap();
        let url = client
            .list_url(&ListScope::Container("mugenverse"), Some("2!96"))
            .unwrap();
        let rendered = url.as_str();
        assert!(rendered.starts_with("https://mugen.blob.core.windows.net/mugenverse?restype=container&comp=list"));
        assert!(rendered.contains("marker=2%2196"));
        assert!(rendered.ends_with("&sv=1&sig=x"));
    }

    fn sas_client(endpoint: &str) -> ListingClient {
        let conn = AzureConnectionString::parse(&format!(
            "BlobEndpoint={};SharedAccessSignature=sv=1&sig=secret",
            endpoint
        ))
        .unwrap();
        ListingClient::new(conn).unwrap()
    }

    /// Answers the first connection with a canned HTTP response.
    async fn serve_once(response: String) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = vec![0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{}/acct", addr)
    }

    fn http_response(status: &str, headers: &[(&str, &str)], body: &str) -> String {
        let mut raw = format!("HTTP/1.1 {}\r\n", status);
        for (name, value) in headers {
            raw.push_str(&format!("{}: {}\r\n", name, value));
        }
        raw.push_str(&format!(
            "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        ));
        raw
    }

    async fn closed_endpoint() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}/acct", addr)
    }

    #[tokio::test]
    async fn test_empty_container_lists_nothing() {
        let body = r#"<?xml version="1.0" encoding="utf-8"?><EnumerationResults ContainerName="mugenverse"><Blobs></Blobs><NextMarker /></EnumerationResults>"#;
        let endpoint = serve_once(http_response(
            "200 OK",
            &[("Content-Type", "application/xml")],
            body,
        ))
        .await;

        let names = sas_client(&endpoint).list_blobs("mugenverse").await.unwrap();
        assert!(names.is_empty());
    }

    #[tokio::test]
    async fn test_missing_container_is_container_not_found() {
        let endpoint = serve_once(http_response(
            "404 The specified container does not exist.",
            &[("x-ms-error-code", "ContainerNotFound")],
            "",
        ))
        .await;

        let err = sas_client(&endpoint)
            .list_blobs("mugenverse")
            .await
            .unwrap_err();
        assert!(matches!(err, BlobError::ContainerNotFound(ref c) if c == "mugenverse"));
    }

    #[tokio::test]
    async fn test_other_rejection_is_backend_error() {
        let endpoint = serve_once(http_response(
            "403 Server failed to authenticate the request.",
            &[("x-ms-error-code", "AuthenticationFailed")],
            "",
        ))
        .await;

        let err = sas_client(&endpoint)
            .list_blobs("mugenverse")
            .await
            .unwrap_err();
        match err {
            BlobError::Backend(msg) => assert!(msg.contains("AuthenticationFailed")),
            other => panic!("expected backend error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_account_is_backend_error_without_signature() {
        let endpoint = closed_endpoint().await;

        let err = sas_client(&endpoint)
            .list_blobs("mugenverse")
            .await
            .unwrap_err();
        match err {
            BlobError::Backend(msg) => {
                assert!(msg.starts_with("Listing request failed"));
                assert!(!msg.contains("sig="));
                assert!(!msg.contains("secret"));
            }
            other => panic!("expected backend error, got {:?}", other),
        }
    }
}
