use std::fmt::{self, Display};

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::campaign::CampaignId;
use crate::creative::CreativeId;
use crate::error::Error;

/// What a tracking token is allowed to redeem. A token issued for one purpose
/// never verifies for the other.
#[derive(Copy, Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenPurpose {
    Impression,
    Click,
}

impl Display for TokenPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenPurpose::Impression => write!(f, "impression"),
            TokenPurpose::Click => write!(f, "click"),
        }
    }
}

/// Signed claims binding a serving event to one creative, campaign, purpose,
/// and a short time window. Self-contained: verification needs only the
/// server's secret.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TokenClaims {
    pub creative_id: CreativeId,
    pub campaign_id: CampaignId,
    pub purpose: TokenPurpose,
    pub iat: i64,
    pub exp: i64,
}

impl TokenClaims {
    pub fn issued_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.iat, 0).single().unwrap_or_else(Utc::now)
    }
}

/// Issues and verifies the HS256-signed tracking tokens handed out with every
/// served ad.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(secret: &str, ttl_seconds: i64) -> TokenCodec {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        TokenCodec {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl: Duration::seconds(ttl_seconds),
        }
    }

    pub fn issue(
        &self,
        creative_id: CreativeId,
        campaign_id: CampaignId,
        now: DateTime<Utc>,
        purpose: TokenPurpose,
    ) -> Result<String, Error> {
        let claims = TokenClaims {
            creative_id,
            campaign_id,
            purpose,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(Error::FailedToSignToken)
    }

    pub fn verify(&self, token: &str, expected: TokenPurpose) -> Result<TokenClaims, Error> {
        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => Error::TrackingTokenExpired,
                _ => Error::InvalidTrackingToken,
            })?;

        let claims = data.claims;
        if claims.purpose != expected {
            return Err(Error::TrackingTokenPurposeMismatch {
                expected,
                provided: claims.purpose,
            });
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new("test-secret", 300)
    }

    #[test]
    fn verifies_what_it_issues() {
        let codec = codec();
        let creative_id = CreativeId::new();
        let campaign_id = CampaignId::new();
        let now = Utc::now();

        let token = codec
            .issue(creative_id, campaign_id, now, TokenPurpose::Impression)
            .unwrap();
        let claims = codec.verify(&token, TokenPurpose::Impression).unwrap();

        assert_eq!(claims.creative_id, creative_id);
        assert_eq!(claims.campaign_id, campaign_id);
        assert_eq!(claims.purpose, TokenPurpose::Impression);
        assert_eq!(claims.iat, now.timestamp());
    }

    #[test]
    fn rejects_purpose_mismatch_both_ways() {
        let codec = codec();
        let now = Utc::now();

        let impression = codec
            .issue(CreativeId::new(), CampaignId::new(), now, TokenPurpose::Impression)
            .unwrap();
        let click = codec
            .issue(CreativeId::new(), CampaignId::new(), now, TokenPurpose::Click)
            .unwrap();

        assert_eq!(
            codec.verify(&impression, TokenPurpose::Click).unwrap_err(),
            Error::TrackingTokenPurposeMismatch {
                expected: TokenPurpose::Click,
                provided: TokenPurpose::Impression,
            }
        );
        assert_eq!(
            codec.verify(&click, TokenPurpose::Impression).unwrap_err(),
            Error::TrackingTokenPurposeMismatch {
                expected: TokenPurpose::Impression,
                provided: TokenPurpose::Click,
            }
        );
    }

    #[test]
    fn rejects_tokens_past_their_expiry() {
        let codec = codec();
        let issued = Utc::now() - Duration::seconds(301);

        let token = codec
            .issue(CreativeId::new(), CampaignId::new(), issued, TokenPurpose::Impression)
            .unwrap();

        assert_eq!(
            codec.verify(&token, TokenPurpose::Impression).unwrap_err(),
            Error::TrackingTokenExpired
        );
    }

    #[test]
    fn rejects_garbled_and_tampered_tokens() {
        let codec = codec();
        let token = codec
            .issue(CreativeId::new(), CampaignId::new(), Utc::now(), TokenPurpose::Click)
            .unwrap();
        let tampered = format!("{}x", token);

        assert_eq!(
            codec.verify("not-a-token", TokenPurpose::Click).unwrap_err(),
            Error::InvalidTrackingToken
        );
        assert_eq!(
            codec.verify(&tampered, TokenPurpose::Click).unwrap_err(),
            Error::InvalidTrackingToken
        );
    }

    #[test]
    fn rejects_tokens_signed_with_another_secret() {
        let other = TokenCodec::new("other-secret", 300);
        let token = other
            .issue(CreativeId::new(), CampaignId::new(), Utc::now(), TokenPurpose::Impression)
            .unwrap();

        assert_eq!(
            codec().verify(&token, TokenPurpose::Impression).unwrap_err(),
            Error::InvalidTrackingToken
        );
    }
}
