use crate::traits::{BlobError, BlobResult};

const DEFAULT_PROTOCOL: &str = "https";
const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// Well-known Azurite development account.
const EMULATOR_ACCOUNT: &str = "devstoreaccount1";
const EMULATOR_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const EMULATOR_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

/// Parsed Azure Storage connection string.
///
/// Accepts the `Key=Value;Key=Value` form produced by the Azure portal.
/// Either `AccountKey` or `SharedAccessSignature` authenticates requests;
/// with neither, requests are sent anonymously.
#[derive(Clone)]
pub struct AzureConnectionString {
    pub account_name: String,
    pub account_key: Option<String>,
    pub sas_token: Option<String>,
    pub blob_endpoint: String,
    pub use_emulator: bool,
    /// True when `blob_endpoint` differs from the public cloud default.
    pub custom_endpoint: bool,
}

impl std::fmt::Debug for AzureConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureConnectionString")
            .field("account_name", &self.account_name)
            .field("account_key", &self.account_key.as_ref().map(|_| "<redacted>"))
            .field("sas_token", &self.sas_token.as_ref().map(|_| "<redacted>"))
            .field("blob_endpoint", &self.blob_endpoint)
            .field("use_emulator", &self.use_emulator)
            .finish()
    }
}

impl AzureConnectionString {
    pub fn parse(raw: &str) -> BlobResult<Self> {
        let mut protocol = None;
        let mut account_name = None;
        let mut account_key = None;
        let mut sas_token = None;
        let mut blob_endpoint = None;
        let mut endpoint_suffix = None;
        let mut use_emulator = false;

        for pair in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            // Values (keys, SAS tokens) may themselves contain '='.
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                BlobError::Config("Malformed connection string segment".to_string())
            })?;
            let value = value.trim().to_string();

            match key.trim() {
                "DefaultEndpointsProtocol" => protocol = Some(value),
                "AccountName" => account_name = Some(value),
                "AccountKey" => account_key = Some(value),
                "SharedAccessSignature" => sas_token = Some(value),
                "BlobEndpoint" => blob_endpoint = Some(value),
                "EndpointSuffix" => endpoint_suffix = Some(value),
                "UseDevelopmentStorage" => use_emulator = value.eq_ignore_ascii_case("true"),
                other => {
                    tracing::debug!(key = %other, "Ignoring connection string key");
                }
            }
        }

        if use_emulator {
            return Ok(AzureConnectionString {
                account_name: EMULATOR_ACCOUNT.to_string(),
                account_key: Some(EMULATOR_KEY.to_string()),
                sas_token: None,
                blob_endpoint: blob_endpoint.unwrap_or_else(|| EMULATOR_BLOB_ENDPOINT.to_string()),
                use_emulator: true,
                custom_endpoint: true,
            });
        }

        let custom_endpoint = blob_endpoint.is_some()
            || endpoint_suffix
                .as_deref()
                .is_some_and(|s| s != DEFAULT_ENDPOINT_SUFFIX);

        let account_name = match (account_name, &blob_endpoint) {
            (Some(name), _) => name,
            (None, Some(endpoint)) => account_from_endpoint(endpoint).ok_or_else(|| {
                BlobError::Config("Connection string is missing AccountName".to_string())
            })?,
            (None, None) => {
                return Err(BlobError::Config(
                    "Connection string is missing AccountName".to_string(),
                ))
            }
        };

        if account_key.is_none() && sas_token.is_none() {
            tracing::warn!(
                account = %account_name,
                "Connection string has no AccountKey or SharedAccessSignature; requests will be anonymous"
            );
        }

        let blob_endpoint = blob_endpoint
            .map(|e| e.trim_end_matches('/').to_string())
            .unwrap_or_else(|| {
                format!(
                    "{}://{}.blob.{}",
                    protocol.as_deref().unwrap_or(DEFAULT_PROTOCOL),
                    account_name,
                    endpoint_suffix.as_deref().unwrap_or(DEFAULT_ENDPOINT_SUFFIX)
                )
            });

        Ok(AzureConnectionString {
            account_name,
            account_key,
            sas_token: sas_token.map(|t| t.trim_start_matches('?').to_string()),
            blob_endpoint,
            use_emulator: false,
            custom_endpoint,
        })
    }

    pub fn allows_http(&self) -> bool {
        self.blob_endpoint.starts_with("http://")
    }
}

/// `https://acct.blob.core.windows.net` -> `acct`
fn account_from_endpoint(endpoint: &str) -> Option<String> {
    let host = endpoint.split("://").nth(1)?.split('/').next()?;
    let account = host.split('.').next()?;
    (!account.is_empty()).then(|| account.to_string())
}
