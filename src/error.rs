use std::fmt::{Debug, Display};
use std::io::Error as IoError;

use actix_web::error::{JsonPayloadError, PathError, QueryPayloadError, UrlencodedError};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use chrono::{DateTime, Utc};
use derivative::Derivative;
use jsonwebtoken::errors::Error as TokenError;
use mongodb::bson::ser::Error as BsonError;
use mongodb::error::Error as DatabaseError;
use serde::{Serialize, Serializer};

use crate::campaign::CampaignId;
use crate::creative::CreativeId;
use crate::tracking::token::TokenPurpose;

#[derive(Debug, Serialize, Derivative)]
#[derivative(PartialEq, Eq)]
#[serde(untagged)]
pub enum Error {
    // 400
    #[serde(serialize_with = "display")]
    InvalidJson(#[derivative(PartialEq = "ignore")] JsonPayloadError),
    #[serde(serialize_with = "display")]
    InvalidPath(#[derivative(PartialEq = "ignore")] PathError),
    #[serde(serialize_with = "display")]
    InvalidForm(#[derivative(PartialEq = "ignore")] UrlencodedError),
    #[serde(serialize_with = "display")]
    InvalidQuery(#[derivative(PartialEq = "ignore")] QueryPayloadError),
    InvalidTrackingToken,
    TrackingTokenExpired,
    TrackingTokenPurposeMismatch {
        expected: TokenPurpose,
        provided: TokenPurpose,
    },
    TrackingTokenClaimMismatch {
        request_creative_id: CreativeId,
        request_campaign_id: CampaignId,
    },
    StaleTimestamp {
        timestamp: DateTime<Utc>,
    },
    InvalidUserId {
        user_id: String,
    },
    InvalidPlacement,

    // 404
    PathDoesNotExist,
    CampaignDoesNotExist {
        campaign_id: CampaignId,
    },
    CreativeDoesNotExist {
        creative_id: CreativeId,
    },

    // 409
    DuplicateTrackingToken,
    CreativeNotActive {
        creative_id: CreativeId,
    },

    // 429
    RateLimitExceeded {
        retry_after_seconds: u64,
    },

    // 5xx
    #[serde(serialize_with = "display")]
    FailedToSignToken(#[derivative(PartialEq = "ignore")] TokenError),
    #[serde(serialize_with = "display")]
    FailedDatabaseCall(#[derivative(PartialEq = "ignore")] DatabaseError),
    #[serde(serialize_with = "display")]
    FailedToSerializeToBson(#[derivative(PartialEq = "ignore")] BsonError),
    #[serde(serialize_with = "display")]
    IoError(#[derivative(PartialEq = "ignore")] IoError),
}

impl Error {
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidJson(_) => "E4001000",
            Error::InvalidPath(_) => "E4001001",
            Error::InvalidForm(_) => "E4001002",
            Error::InvalidQuery(_) => "E4001003",
            Error::InvalidTrackingToken => "E4001004",
            Error::TrackingTokenExpired => "E4001005",
            Error::TrackingTokenPurposeMismatch { .. } => "E4001006",
            Error::TrackingTokenClaimMismatch { .. } => "E4001007",
            Error::StaleTimestamp { .. } => "E4001008",
            Error::InvalidUserId { .. } => "E4001009",
            Error::InvalidPlacement => "E4001010",
            Error::PathDoesNotExist => "E4041000",
            Error::CampaignDoesNotExist { .. } => "E4041001",
            Error::CreativeDoesNotExist { .. } => "E4041002",
            Error::DuplicateTrackingToken => "E4091000",
            Error::CreativeNotActive { .. } => "E4091001",
            Error::RateLimitExceeded { .. } => "E4291000",
            Error::FailedToSignToken(_) => "E5001000",
            Error::FailedToSerializeToBson(_) => "E5001001",
            Error::IoError(_) => "E5001002",
            Error::FailedDatabaseCall(_) => "E5031000",
        }
    }

    pub fn error_message(&self) -> &'static str {
        match self {
            Error::InvalidJson(_) => "The given json could not be parsed",
            Error::InvalidPath(_) => "The given path could not be parsed",
            Error::InvalidForm(_) => "The given form could not be parsed",
            Error::InvalidQuery(_) => "The given query could not be parsed",
            Error::InvalidTrackingToken => "The given tracking token is not valid",
            Error::TrackingTokenExpired => "The given tracking token has expired",
            Error::TrackingTokenPurposeMismatch { .. } => {
                "The given tracking token was issued for a different purpose"
            }
            Error::TrackingTokenClaimMismatch { .. } => {
                "The given tracking token does not match the ids in the request"
            }
            Error::StaleTimestamp { .. } => "The given timestamp is too far from the current time",
            Error::InvalidUserId { .. } => {
                "The given user id must be alphanumeric with optional dashes or underscores"
            }
            Error::InvalidPlacement => "The given placement must not be empty",
            Error::PathDoesNotExist => "The requested path does not exist",
            Error::CampaignDoesNotExist { .. } => "The requested campaign does not exist",
            Error::CreativeDoesNotExist { .. } => "The requested creative does not exist",
            Error::DuplicateTrackingToken => "The given tracking token was already used",
            Error::CreativeNotActive { .. } => "The requested creative is not active",
            Error::RateLimitExceeded { .. } => "Too many requests, please try again later",
            Error::FailedToSignToken(_) => "An error occurred when signing a tracking token",
            Error::FailedDatabaseCall(_) => {
                "An error occurred when communicating with the database"
            }
            Error::FailedToSerializeToBson(_) => {
                "An error occurred when serializing an object to bson"
            }
            Error::IoError(_) => "An error occurred during an I/O operation",
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidJson(_) => StatusCode::BAD_REQUEST,
            Error::InvalidPath(_) => StatusCode::BAD_REQUEST,
            Error::InvalidForm(_) => StatusCode::BAD_REQUEST,
            Error::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Error::InvalidTrackingToken => StatusCode::BAD_REQUEST,
            Error::TrackingTokenExpired => StatusCode::BAD_REQUEST,
            Error::TrackingTokenPurposeMismatch { .. } => StatusCode::BAD_REQUEST,
            Error::TrackingTokenClaimMismatch { .. } => StatusCode::BAD_REQUEST,
            Error::StaleTimestamp { .. } => StatusCode::BAD_REQUEST,
            Error::InvalidUserId { .. } => StatusCode::BAD_REQUEST,
            Error::InvalidPlacement => StatusCode::BAD_REQUEST,
            Error::PathDoesNotExist => StatusCode::NOT_FOUND,
            Error::CampaignDoesNotExist { .. } => StatusCode::NOT_FOUND,
            Error::CreativeDoesNotExist { .. } => StatusCode::NOT_FOUND,
            Error::DuplicateTrackingToken => StatusCode::CONFLICT,
            Error::CreativeNotActive { .. } => StatusCode::CONFLICT,
            Error::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::FailedToSignToken(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::FailedToSerializeToBson(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::FailedDatabaseCall(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        #[derive(Serialize)]
        struct Dummy<'a> {
            error_code: &'static str,
            error_message: &'static str,
            error_meta: &'a Error,
        }

        HttpResponse::build(self.status_code()).json(&Dummy {
            error_code: self.error_code(),
            error_message: self.error_message(),
            error_meta: self,
        })
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        Debug::fmt(self, f)
    }
}

impl From<DatabaseError> for Error {
    fn from(error: DatabaseError) -> Error {
        Error::FailedDatabaseCall(error)
    }
}

impl From<BsonError> for Error {
    fn from(error: BsonError) -> Error {
        Error::FailedToSerializeToBson(error)
    }
}

impl From<IoError> for Error {
    fn from(error: IoError) -> Error {
        Error::IoError(error)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidJson(err) => Some(err),
            Error::InvalidPath(err) => Some(err),
            Error::InvalidForm(err) => Some(err),
            Error::InvalidQuery(err) => Some(err),
            Error::FailedToSignToken(err) => Some(err),
            Error::FailedDatabaseCall(err) => Some(err),
            Error::FailedToSerializeToBson(err) => Some(err),
            _ => None,
        }
    }
}

fn display<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Display,
    S: Serializer,
{
    serializer.collect_str(value)
}
