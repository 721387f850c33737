//! The structured credential record stored under each role entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Short-lived AWS credentials as produced by the upstream exchange flow.
///
/// The cache persists these as opaque JSON strings and only decodes them when
/// handing a record back to the caller. Field names follow the AWS wire
/// convention (`AccessKeyId`, `SecretAccessKey`, ...); absent fields default
/// so partial records still decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: Option<DateTime<Utc>>,
}

impl AwsCredentials {
    /// Whether the credentials are still usable at `now`.
    ///
    /// Records without an expiration never expire from the cache's point of
    /// view; the upstream flow decides their lifetime.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiration {
            Some(expiration) => now < expiration,
            None => true,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use chrono::TimeZone;

    #[test]
    fn partial_record_decodes_with_defaults() -> Result<()> {
        let creds: AwsCredentials = serde_json::from_str(r#"{"AccessKeyId":"AKIAEXAMPLE"}"#)?;

        assert_eq!(creds.access_key_id, "AKIAEXAMPLE");
        assert_eq!(creds.secret_access_key, "");
        assert_eq!(creds.session_token, "");
        assert_eq!(creds.expiration, None);
        Ok(())
    }

    #[test]
    fn full_record_round_trips() -> Result<()> {
        let creds = AwsCredentials {
            access_key_id: "AKIAEXAMPLE".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: "token".to_string(),
            expiration: Some(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()),
        };

        let encoded = serde_json::to_string(&creds)?;
        assert!(encoded.contains("\"AccessKeyId\""));
        assert!(encoded.contains("\"SecretAccessKey\""));

        let decoded: AwsCredentials = serde_json::from_str(&encoded)?;
        assert_eq!(decoded, creds);
        Ok(())
    }

    #[test]
    fn validity_follows_expiration() {
        let expiry = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let creds = AwsCredentials {
            expiration: Some(expiry),
            ..Default::default()
        };

        assert!(creds.is_valid_at(expiry - chrono::Duration::seconds(1)));
        assert!(!creds.is_valid_at(expiry));
        assert!(!creds.is_valid_at(expiry + chrono::Duration::seconds(1)));
    }

    #[test]
    fn missing_expiration_never_expires() {
        let creds = AwsCredentials::default();
        assert!(creds.is_valid());
    }
}
