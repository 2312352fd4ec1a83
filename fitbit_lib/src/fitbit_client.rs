use chrono::NaiveDate;
use reqwest::{header::HeaderMap, Client};
use std::fmt;

use crate::{
    errors::FitbitError as Error, fitbit_auth::FitbitAuth, fitbit_config::FitbitConfig,
    fitbit_heartrate::HeartRateResponse, fitbit_sleep::SleepLogResponse,
};

/// A date argument for the provider API, which accepts the literal `today`
/// in place of a calendar date.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FetchDate {
    Today,
    Date(NaiveDate),
}

impl FetchDate {
    pub fn as_date(self) -> Option<NaiveDate> {
        match self {
            Self::Today => None,
            Self::Date(date) => Some(date),
        }
    }
}

impl From<Option<NaiveDate>> for FetchDate {
    fn from(date: Option<NaiveDate>) -> Self {
        match date {
            Some(date) => Self::Date(date),
            None => Self::Today,
        }
    }
}

impl fmt::Display for FetchDate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Today => write!(f, "today"),
            Self::Date(date) => write!(f, "{}", date),
        }
    }
}

/// Client for authenticated requests against the Fitbit API.
#[derive(Default, Debug, Clone)]
pub struct FitbitClient {
    pub auth: FitbitAuth,
    client: Client,
}

impl FitbitClient {
    pub fn new(auth: FitbitAuth) -> Self {
        Self {
            auth,
            ..Self::default()
        }
    }

    /// # Errors
    /// Return error if the token file does not exist or cannot be read
    pub async fn from_file(config: FitbitConfig) -> Result<Self, Error> {
        Ok(Self::new(FitbitAuth::from_file(config).await?))
    }

    fn get_auth_headers(&self) -> Result<HeaderMap, Error> {
        let access_token = self
            .auth
            .access_token
            .as_ref()
            .ok_or(Error::MissingAccessTokenError)?;
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", format!("Bearer {}", access_token).parse()?);
        headers.insert("Accept", "application/json".parse()?);
        headers.insert("Accept-Language", "en_US".parse()?);
        Ok(headers)
    }

    /// Intraday heart rate for one date, `detail_level` is one of `1sec`,
    /// `1min`, `5min`, `15min`.
    ///
    /// # Errors
    /// Return error on transport failure or a non-2xx response
    pub async fn get_heart_rate_intraday(
        &self,
        date: FetchDate,
        detail_level: &str,
    ) -> Result<HeartRateResponse, Error> {
        let headers = self.get_auth_headers()?;
        let url = format!(
            "https://api.fitbit.com/1/user/-/activities/heart/date/{}/1d/{}.json",
            date, detail_level
        );
        self.client
            .get(url.as_str())
            .headers(headers)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .map_err(Into::into)
    }

    /// Sleep log for one date, the v1.2 endpoint returns stage-interval
    /// levels while older logs still carry per-minute data.
    ///
    /// # Errors
    /// Return error on transport failure or a non-2xx response
    pub async fn get_sleep_log(&self, date: FetchDate) -> Result<SleepLogResponse, Error> {
        let headers = self.get_auth_headers()?;
        let url = format!("https://api.fitbit.com/1.2/user/-/sleep/date/{}.json", date);
        self.client
            .get(url.as_str())
            .headers(headers)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .map_err(Into::into)
    }

    /// # Errors
    /// Return error on transport failure or a non-2xx response
    pub async fn get_user_profile(&self) -> Result<serde_json::Value, Error> {
        let headers = self.get_auth_headers()?;
        let url = "https://api.fitbit.com/1/user/-/profile.json";
        self.client
            .get(url)
            .headers(headers)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .map_err(Into::into)
    }

    /// Heart rate time series between `start_date` and either an end date or
    /// a period such as `1d`, `7d`, `30d`, `1w`, `1m`.
    ///
    /// # Errors
    /// Return error unless exactly one of `end_date` and `period` is given,
    /// on transport failure, or on a non-2xx response
    pub async fn get_heart_rate_time_series(
        &self,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
        period: Option<&str>,
    ) -> Result<serde_json::Value, Error> {
        let url = match (end_date, period) {
            (Some(end_date), None) => format!(
                "https://api.fitbit.com/1/user/-/activities/heart/date/{}/{}.json",
                start_date, end_date
            ),
            (None, Some(period)) => format!(
                "https://api.fitbit.com/1/user/-/activities/heart/date/{}/{}.json",
                start_date, period
            ),
            _ => {
                return Err(Error::StaticCustomError(
                    "must provide either end_date or period, but not both",
                ))
            }
        };
        let headers = self.get_auth_headers()?;
        self.client
            .get(url.as_str())
            .headers(headers)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .map_err(Into::into)
    }
}
