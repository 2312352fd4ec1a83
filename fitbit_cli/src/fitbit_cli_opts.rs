use anyhow::Error;
use chrono::NaiveDate;
use clap::Parser;

use fitbit_lib::{
    fitbit_auth::FitbitAuth,
    fitbit_client::FitbitClient,
    fitbit_config::FitbitConfig,
    fitbit_sync::{FitbitSync, SyncMetric},
    pgpool::PgPool,
};

pub const DEFAULT_SCOPES: &[&str] = &["activity", "heartrate", "profile", "sleep"];

#[derive(Parser, Debug)]
#[command(name = "fitbit-rust-cli")]
#[command(about = "Authenticate with the Fitbit API and sync health metrics")]
pub enum FitbitCliOpts {
    /// Authenticate with Fitbit and save access tokens
    Login {
        /// OAuth scopes to request (can specify multiple times)
        #[arg(short, long)]
        scope: Vec<String>,
    },
    /// Refresh the access token using the stored refresh token
    Refresh,
    /// Print the authenticated user's profile
    Profile,
    /// Print a heart rate time series as json
    HeartRate {
        #[arg(short, long)]
        start_date: NaiveDate,
        #[arg(short, long)]
        end_date: NaiveDate,
    },
    /// Sync a single date, defaults to today
    Sync {
        #[arg(short, long)]
        date: Option<NaiveDate>,
        /// heartrate, sleep or all
        #[arg(short, long, default_value = "all")]
        metric: SyncMetric,
    },
    /// Sync every date between start-date and end-date inclusive
    SyncRange {
        #[arg(short, long)]
        start_date: NaiveDate,
        #[arg(short, long)]
        end_date: NaiveDate,
        /// heartrate, sleep or all
        #[arg(short, long, default_value = "all")]
        metric: SyncMetric,
    },
    /// Sync a full calendar month
    SyncMonth {
        #[arg(short, long)]
        year: i32,
        #[arg(short, long)]
        month: u32,
        /// heartrate, sleep or all
        #[arg(long, default_value = "all")]
        metric: SyncMetric,
    },
}

impl FitbitCliOpts {
    /// # Errors
    /// Return error on any failed operation
    pub async fn process_args() -> Result<(), Error> {
        let opts = Self::parse();
        let config = FitbitConfig::get_config(None)?;

        match opts {
            Self::Login { scope } => {
                let scopes: Vec<&str> = if scope.is_empty() {
                    DEFAULT_SCOPES.to_vec()
                } else {
                    scope.iter().map(String::as_str).collect()
                };
                let mut auth = FitbitAuth::new(config);
                auth.authorize(&scopes).await?;
                auth.to_file().await?;
                println!(
                    "Authentication successful! Tokens saved to {}",
                    auth.config.fitbit_tokenfile
                );
                if let Some(expires_in) = auth.expires_in {
                    println!("Access token expires in {} seconds", expires_in);
                }
            }
            Self::Refresh => {
                let mut auth = FitbitAuth::from_file(config).await?;
                auth.refresh_access_token().await?;
                auth.to_file().await?;
                println!(
                    "Token refreshed successfully! Saved to {}",
                    auth.config.fitbit_tokenfile
                );
                if let Some(expires_in) = auth.expires_in {
                    println!("Access token expires in {} seconds", expires_in);
                }
            }
            Self::Profile => {
                let client = FitbitClient::from_file(config).await?;
                let profile = client.get_user_profile().await?;
                println!("{}", serde_json::to_string_pretty(&profile)?);
            }
            Self::HeartRate {
                start_date,
                end_date,
            } => {
                let client = FitbitClient::from_file(config).await?;
                let series = client
                    .get_heart_rate_time_series(start_date, Some(end_date), None)
                    .await?;
                println!("{}", serde_json::to_string_pretty(&series)?);
            }
            Self::Sync { date, metric } => {
                let sync = Self::get_sync(config).await?;
                let totals = sync.sync_date(metric, date.into()).await?;
                println!("Sync complete!\n{}", totals);
            }
            Self::SyncRange {
                start_date,
                end_date,
                metric,
            } => {
                let sync = Self::get_sync(config).await?;
                let totals = sync.sync_range(metric, start_date, end_date).await;
                println!("Range sync complete!\n{}", totals);
            }
            Self::SyncMonth {
                year,
                month,
                metric,
            } => {
                let sync = Self::get_sync(config).await?;
                let totals = sync.sync_month(metric, year, month).await?;
                println!("Month sync complete!\n{}", totals);
            }
        }
        Ok(())
    }

    async fn get_sync(config: FitbitConfig) -> Result<FitbitSync, Error> {
        let pool = PgPool::new(&config.pgurl)?;
        let client = FitbitClient::from_file(config).await?;
        Ok(FitbitSync::new(pool, client))
    }
}
