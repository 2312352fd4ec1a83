use chrono::{Duration, NaiveDate};
use log::{debug, error, info, warn};
use std::{fmt, str::FromStr};
use tokio_postgres::{Client, Transaction};

use crate::{
    errors::FitbitError as Error,
    fitbit_client::{FetchDate, FitbitClient},
    fitbit_heartrate::{FitbitHeartRate, HeartRateDaily},
    fitbit_sleep::{insert_sleep_minutes, InsertOutcome, SleepEntry, SleepSession},
    pgpool::PgPool,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMetric {
    HeartRate,
    Sleep,
    All,
}

impl FromStr for SyncMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "heartrate" | "heart-rate" => Ok(Self::HeartRate),
            "sleep" => Ok(Self::Sleep),
            "all" => Ok(Self::All),
            _ => Err(Error::CustomError(format!("unknown metric {}", s))),
        }
    }
}

impl fmt::Display for SyncMetric {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::HeartRate => write!(f, "heartrate"),
            Self::Sleep => write!(f, "sleep"),
            Self::All => write!(f, "all"),
        }
    }
}

/// Per-session counts for one date of sleep sync.
#[derive(Default, Debug, Clone, Copy)]
pub struct SleepDayCounts {
    pub sessions_inserted: usize,
    pub sessions_skipped: usize,
    pub sessions_failed: usize,
    pub minutes_inserted: u64,
}

/// Running totals across a date range.
#[derive(Default, Debug, Clone, Copy)]
pub struct SyncTotals {
    pub days_attempted: usize,
    pub days_failed: usize,
    pub daily_summaries: usize,
    pub intraday_points: usize,
    pub sleep_sessions: usize,
    pub sleep_minutes: u64,
}

impl SyncTotals {
    fn merge(&mut self, other: &Self) {
        self.days_attempted += other.days_attempted;
        self.days_failed += other.days_failed;
        self.daily_summaries += other.daily_summaries;
        self.intraday_points += other.intraday_points;
        self.sleep_sessions += other.sleep_sessions;
        self.sleep_minutes += other.sleep_minutes;
    }
}

impl fmt::Display for SyncTotals {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "  days attempted: {}", self.days_attempted)?;
        writeln!(f, "  days failed: {}", self.days_failed)?;
        writeln!(f, "  daily summaries: {}", self.daily_summaries)?;
        writeln!(f, "  intraday records: {}", self.intraday_points)?;
        writeln!(f, "  sleep sessions: {}", self.sleep_sessions)?;
        write!(f, "  sleep minutes: {}", self.sleep_minutes)
    }
}

/// Every calendar date in [start, end] inclusive, ascending.
pub fn enumerate_dates(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut date = start;
    while date <= end {
        dates.push(date);
        date = date + Duration::days(1);
    }
    dates
}

/// First and last day of a calendar month.
///
/// # Errors
/// Return error if year/month do not form a valid date
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), Error> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or(Error::StaticCustomError("invalid year or month"))?;
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or(Error::StaticCustomError("invalid year or month"))?;
    Ok((start, next_month - Duration::days(1)))
}

/// Pulls metric payloads through the api client and writes them to the
/// database, one transaction per date.
pub struct FitbitSync {
    pool: PgPool,
    client: FitbitClient,
}

impl FitbitSync {
    pub fn new(pool: PgPool, client: FitbitClient) -> Self {
        Self { pool, client }
    }

    /// Sync one date of the selected metric family. The whole date commits
    /// or rolls back as a unit, any failure propagates to the caller.
    ///
    /// # Errors
    /// Return error on fetch or db failure
    pub async fn sync_date(&self, metric: SyncMetric, date: FetchDate) -> Result<SyncTotals, Error> {
        let mut totals = SyncTotals::default();
        if matches!(metric, SyncMetric::HeartRate | SyncMetric::All) {
            let (daily, intraday) = self.sync_heartrate_date(date).await?;
            totals.daily_summaries += daily;
            totals.intraday_points += intraday;
        }
        if matches!(metric, SyncMetric::Sleep | SyncMetric::All) {
            let counts = self.sync_sleep_date(date).await?;
            totals.sleep_sessions += counts.sessions_inserted;
            totals.sleep_minutes += counts.minutes_inserted;
        }
        Ok(totals)
    }

    /// Sync every date in [start, end]. A failed date is logged and skipped,
    /// the loop always reaches the end of the range.
    pub async fn sync_range(
        &self,
        metric: SyncMetric,
        start: NaiveDate,
        end: NaiveDate,
    ) -> SyncTotals {
        let mut totals = SyncTotals::default();
        for date in enumerate_dates(start, end) {
            totals.days_attempted += 1;
            match self.sync_date(metric, FetchDate::Date(date)).await {
                Ok(day) => totals.merge(&day),
                Err(e) => {
                    let e = Error::UnitSyncError {
                        date,
                        source: Box::new(e),
                    };
                    error!("{}", e);
                    totals.days_failed += 1;
                }
            }
        }
        totals
    }

    /// # Errors
    /// Return error if year/month are invalid
    pub async fn sync_month(
        &self,
        metric: SyncMetric,
        year: i32,
        month: u32,
    ) -> Result<SyncTotals, Error> {
        let (start, end) = month_bounds(year, month)?;
        info!("syncing {} for {}-{:02}", metric, year, month);
        Ok(self.sync_range(metric, start, end).await)
    }

    /// Sync heart rate for one date, returns (daily, intraday) counts.
    ///
    /// # Errors
    /// Return error on fetch or db failure
    pub async fn sync_heartrate_date(&self, date: FetchDate) -> Result<(usize, usize), Error> {
        debug!("fetching heart rate data for {}", date);
        let payload = self.client.get_heart_rate_intraday(date, "1min").await?;

        let mut conn = self.pool.get().await?;
        let client: &mut Client = &mut conn;
        let tx = client.transaction().await?;

        // the provider reports the actual calendar date, which wins over the
        // requested one when the request was for `today`
        let actual_date = payload.daily.first().map(|d| d.date).or(date.as_date());

        let mut daily_count = 0;
        if let Some(entry) = payload.daily.first() {
            HeartRateDaily::from_entry(entry).upsert(&tx).await?;
            daily_count = 1;
        }

        let mut intraday_count = 0;
        if let Some(intraday) = payload.intraday.as_ref() {
            match actual_date {
                Some(date) => {
                    for point in &intraday.dataset {
                        intraday_count += FitbitHeartRate::from_point(date, *point)
                            .insert_ignore(&tx)
                            .await? as usize;
                    }
                }
                None => warn!(
                    "no calendar date for intraday data, skipping {} points",
                    intraday.dataset.len()
                ),
            }
        }

        tx.commit().await?;
        info!(
            "synced {} daily and {} intraday heart rate records for {}",
            daily_count, intraday_count, date
        );
        Ok((daily_count, intraday_count))
    }

    /// Sync sleep sessions for one date. Individual sessions are isolated by
    /// savepoints so one bad session never aborts the batch, a session whose
    /// log id is already stored still gets its minute records backfilled.
    ///
    /// # Errors
    /// Return error on fetch or db failure
    pub async fn sync_sleep_date(&self, date: FetchDate) -> Result<SleepDayCounts, Error> {
        debug!("fetching sleep data for {}", date);
        let payload = self.client.get_sleep_log(date).await?;
        let mut counts = SleepDayCounts::default();
        if payload.sleep.is_empty() {
            info!("no sleep data found for {}", date);
            return Ok(counts);
        }

        let mut conn = self.pool.get().await?;
        let client: &mut Client = &mut conn;
        let mut tx = client.transaction().await?;

        for entry in &payload.sleep {
            match Self::upsert_session(&mut tx, entry).await {
                Ok((InsertOutcome::Inserted, minutes)) => {
                    info!(
                        "synced sleep session {} with {} minute records",
                        entry.log_id, minutes
                    );
                    counts.sessions_inserted += 1;
                    counts.minutes_inserted += minutes;
                }
                Ok((InsertOutcome::SkippedDuplicate, minutes)) => {
                    info!(
                        "sleep session {} already exists, backfilled {} minute records",
                        entry.log_id, minutes
                    );
                    counts.sessions_skipped += 1;
                    counts.minutes_inserted += minutes;
                }
                Err(e) => {
                    error!("error syncing sleep session {}: {}", entry.log_id, e);
                    counts.sessions_failed += 1;
                }
            }
        }

        tx.commit().await?;
        Ok(counts)
    }

    // A failed statement poisons the enclosing postgres transaction, so each
    // session runs inside its own savepoint.
    async fn upsert_session(
        tx: &mut Transaction<'_>,
        entry: &SleepEntry,
    ) -> Result<(InsertOutcome, u64), Error> {
        let session = SleepSession::from_entry(entry);
        let minutes = entry.expand_minutes();
        let sp = tx.transaction().await?;
        let outcome = session.insert(&sp).await?;
        let inserted = insert_sleep_minutes(&sp, &minutes).await?;
        sp.commit().await?;
        Ok((outcome, inserted))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::fitbit_sync::{enumerate_dates, month_bounds, SyncMetric, SyncTotals};

    #[test]
    fn test_enumerate_dates_inclusive_ascending() {
        let start = NaiveDate::from_ymd_opt(2025, 9, 28).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 10, 2).unwrap();
        let dates = enumerate_dates(start, end);
        assert_eq!(dates.len(), 5);
        assert_eq!(dates.first(), Some(&start));
        assert_eq!(dates.last(), Some(&end));
        assert!(dates.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_enumerate_dates_single_day() {
        let date = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
        assert_eq!(enumerate_dates(date, date), vec![date]);
    }

    #[test]
    fn test_enumerate_dates_empty_range() {
        let start = NaiveDate::from_ymd_opt(2025, 10, 2).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
        assert!(enumerate_dates(start, end).is_empty());
    }

    #[test]
    fn test_month_bounds() {
        let (start, end) = month_bounds(2025, 10).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 10, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2025, 10, 31).unwrap());

        let (start, end) = month_bounds(2025, 12).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 12, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());

        let (start, end) = month_bounds(2024, 2).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        assert!(month_bounds(2025, 13).is_err());
    }

    #[test]
    fn test_sync_metric_from_str() {
        assert_eq!("heartrate".parse::<SyncMetric>().unwrap(), SyncMetric::HeartRate);
        assert_eq!("heart-rate".parse::<SyncMetric>().unwrap(), SyncMetric::HeartRate);
        assert_eq!("Sleep".parse::<SyncMetric>().unwrap(), SyncMetric::Sleep);
        assert_eq!("all".parse::<SyncMetric>().unwrap(), SyncMetric::All);
        assert!("steps".parse::<SyncMetric>().is_err());
    }

    #[test]
    fn test_totals_merge() {
        let mut totals = SyncTotals {
            days_attempted: 2,
            days_failed: 1,
            daily_summaries: 1,
            intraday_points: 1440,
            sleep_sessions: 1,
            sleep_minutes: 400,
        };
        totals.merge(&SyncTotals {
            days_attempted: 0,
            days_failed: 0,
            daily_summaries: 1,
            intraday_points: 1440,
            sleep_sessions: 2,
            sleep_minutes: 800,
        });
        assert_eq!(totals.days_attempted, 2);
        assert_eq!(totals.daily_summaries, 2);
        assert_eq!(totals.intraday_points, 2880);
        assert_eq!(totals.sleep_sessions, 3);
        assert_eq!(totals.sleep_minutes, 1200);
    }
}
