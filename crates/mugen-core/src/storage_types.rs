use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Blob store backend types
///
/// Defined in core because configuration selects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobBackend {
    Azure,
    Local,
}

impl FromStr for BlobBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "azure" => Ok(BlobBackend::Azure),
            "local" => Ok(BlobBackend::Local),
            _ => Err(anyhow::anyhow!("Invalid storage backend: {}", s)),
        }
    }
}

impl Display for BlobBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            BlobBackend::Azure => write!(f, "azure"),
            BlobBackend::Local => write!(f, "local"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("Azure".parse::<BlobBackend>().unwrap(), BlobBackend::Azure);
        assert_eq!("LOCAL".parse::<BlobBackend>().unwrap(), BlobBackend::Local);
        assert!("s3".parse::<BlobBackend>().is_err());
    }
}
