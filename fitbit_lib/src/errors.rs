use chrono::NaiveDate;
use deadpool_postgres::{BuildError as DeadpoolBuildError, ConfigError as DeadpoolConfigError};
use reqwest::{header::InvalidHeaderValue, Error as ReqwestError, StatusCode};
use serde_json::Error as SerdeJsonError;
use std::io::Error as IoError;
use thiserror::Error;
use tokio_postgres::error::Error as TokioPostgresError;
use url::ParseError as UrlParseError;

type DeadPoolError = deadpool::managed::PoolError<TokioPostgresError>;

#[derive(Error, Debug)]
pub enum FitbitError {
    #[error("authorization failed, no code received")]
    AuthorizationError,
    #[error("token exchange failed with status {status}: {body}")]
    TokenExchangeError { status: StatusCode, body: String },
    #[error("token refresh failed with status {status}: {body}")]
    TokenRefreshError { status: StatusCode, body: String },
    #[error("no refresh token available")]
    NoRefreshTokenError,
    #[error("token file not found: {0}")]
    TokenFileNotFoundError(String),
    #[error("no access token available, run login first")]
    MissingAccessTokenError,
    #[error("failed to sync {date}: {source}")]
    UnitSyncError {
        date: NaiveDate,
        #[source]
        source: Box<FitbitError>,
    },
    #[error("ReqwestError {0}")]
    ReqwestError(#[from] ReqwestError),
    #[error("InvalidHeaderValue {0}")]
    InvalidHeaderValue(#[from] InvalidHeaderValue),
    #[error("TokioPostgresError {0}")]
    TokioPostgresError(#[from] TokioPostgresError),
    #[error("DeadPoolError {0}")]
    DeadPoolError(#[from] DeadPoolError),
    #[error("DeadpoolBuildError {0}")]
    DeadpoolBuildError(#[from] DeadpoolBuildError),
    #[error("DeadpoolConfigError {0}")]
    DeadpoolConfigError(#[from] DeadpoolConfigError),
    #[error("SerdeJsonError {0}")]
    SerdeJsonError(#[from] SerdeJsonError),
    #[error("UrlParseError {0}")]
    UrlParseError(#[from] UrlParseError),
    #[error("io Error {0}")]
    IoError(#[from] IoError),
    #[error("{0}")]
    StaticCustomError(&'static str),
    #[error("{0}")]
    CustomError(String),
}
