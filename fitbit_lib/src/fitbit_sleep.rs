use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use tokio_postgres::Transaction;

use crate::{
    errors::FitbitError as Error,
    sleep_score::{calculate_sleep_score, ScoreDetail, SleepScoreInput},
};

#[derive(Deserialize, Debug, Clone)]
pub struct SleepLogResponse {
    #[serde(default)]
    pub sleep: Vec<SleepEntry>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SleepEntry {
    #[serde(rename = "logId")]
    pub log_id: i64,
    #[serde(rename = "dateOfSleep")]
    pub date_of_sleep: NaiveDate,
    #[serde(rename = "startTime")]
    pub start_time: NaiveDateTime,
    #[serde(rename = "endTime")]
    pub end_time: NaiveDateTime,
    pub duration: i64,
    pub efficiency: Option<i32>,
    #[serde(rename = "isMainSleep", default)]
    pub is_main_sleep: bool,
    #[serde(rename = "minutesAsleep")]
    pub minutes_asleep: Option<i32>,
    #[serde(rename = "minutesAwake")]
    pub minutes_awake: Option<i32>,
    #[serde(rename = "minutesToFallAsleep")]
    pub minutes_to_fall_asleep: Option<i32>,
    #[serde(rename = "minutesAfterWakeup")]
    pub minutes_after_wakeup: Option<i32>,
    #[serde(rename = "timeInBed")]
    pub time_in_bed: Option<i32>,
    #[serde(rename = "awakeCount")]
    pub awake_count: Option<i32>,
    #[serde(rename = "awakeDuration")]
    pub awake_duration: Option<i32>,
    #[serde(rename = "restlessCount")]
    pub restless_count: Option<i32>,
    #[serde(rename = "restlessDuration")]
    pub restless_duration: Option<i32>,
    pub levels: Option<SleepLevels>,
    #[serde(rename = "minuteData", default)]
    pub minute_data: Vec<ClassicMinuteEntry>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SleepLevels {
    #[serde(default)]
    pub data: Vec<SleepLevelPeriod>,
    pub summary: Option<SleepLevelsSummary>,
}

/// One stage interval from the v1.2 payload, run-length encoded in seconds.
#[derive(Deserialize, Debug, Clone)]
pub struct SleepLevelPeriod {
    #[serde(rename = "dateTime")]
    pub start: NaiveDateTime,
    pub level: String,
    pub seconds: i64,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SleepLevelsSummary {
    pub deep: Option<StageSummary>,
    pub light: Option<StageSummary>,
    pub rem: Option<StageSummary>,
    pub wake: Option<StageSummary>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
pub struct StageSummary {
    pub minutes: i32,
}

/// One entry from the classic v1 payload, already minute granular.
#[derive(Deserialize, Debug, Clone)]
pub struct ClassicMinuteEntry {
    #[serde(rename = "dateTime")]
    pub time: NaiveTime,
    pub value: String,
}

/// The two historical shapes of minute-level sleep data, resolved by which
/// fields the payload actually carries.
#[derive(Debug, Clone, Copy)]
pub enum SleepLevelData<'a> {
    Stages(&'a [SleepLevelPeriod]),
    Classic(&'a [ClassicMinuteEntry]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepStage {
    Wake = 0,
    Light = 1,
    Deep = 2,
    Rem = 3,
}

impl SleepStage {
    /// Case-insensitive stage label, unknown labels count as wake.
    pub fn from_level(label: &str) -> Self {
        match label.to_lowercase().as_str() {
            "light" => Self::Light,
            "deep" => Self::Deep,
            "rem" => Self::Rem,
            _ => Self::Wake,
        }
    }

    /// Classic codes: 1 asleep, 2 restless, 3 awake.
    pub fn from_classic_value(value: &str) -> Self {
        match value {
            "1" => Self::Light,
            _ => Self::Wake,
        }
    }

    pub fn code(self) -> i16 {
        self as i16
    }
}

impl SleepEntry {
    pub fn level_data(&self) -> Option<SleepLevelData> {
        if let Some(levels) = self.levels.as_ref() {
            if !levels.data.is_empty() {
                return Some(SleepLevelData::Stages(&levels.data));
            }
        }
        if !self.minute_data.is_empty() {
            return Some(SleepLevelData::Classic(&self.minute_data));
        }
        None
    }

    /// One record per calendar minute of the session, whichever payload
    /// shape it arrived in.
    pub fn expand_minutes(&self) -> Vec<SleepMinute> {
        match self.level_data() {
            Some(SleepLevelData::Stages(periods)) => expand_stage_periods(self.log_id, periods),
            Some(SleepLevelData::Classic(entries)) => {
                expand_classic_minutes(self.log_id, self.start_time, entries)
            }
            None => Vec::new(),
        }
    }

    fn score_input(&self) -> SleepScoreInput {
        let detail = match self.levels.as_ref().and_then(|l| l.summary.as_ref()) {
            Some(summary) => ScoreDetail::Stages {
                deep_minutes: summary.deep.map_or(0, |s| s.minutes),
                rem_minutes: summary.rem.map_or(0, |s| s.minutes),
                wake_minutes: summary.wake.map_or(0, |s| s.minutes),
            },
            None => ScoreDetail::Classic {
                awake_count: self.awake_count.unwrap_or(0),
                restless_count: self.restless_count.unwrap_or(0),
                minutes_to_fall_asleep: self.minutes_to_fall_asleep.unwrap_or(0),
            },
        };
        SleepScoreInput {
            minutes_asleep: self.minutes_asleep.unwrap_or(0),
            efficiency: self.efficiency.unwrap_or(0),
            detail,
        }
    }
}

/// Expand run-length encoded stage intervals, one record per whole minute,
/// remainder seconds are dropped.
pub fn expand_stage_periods(log_id: i64, periods: &[SleepLevelPeriod]) -> Vec<SleepMinute> {
    let mut minutes = Vec::new();
    for period in periods {
        let stage = SleepStage::from_level(&period.level);
        for offset in 0..(period.seconds / 60) {
            minutes.push(SleepMinute {
                log_id,
                minute_time: period.start + Duration::minutes(offset),
                stage,
            });
        }
    }
    minutes
}

/// Classic entries carry only a time of day, dated from the session start
/// with rollover past midnight.
pub fn expand_classic_minutes(
    log_id: i64,
    start_time: NaiveDateTime,
    entries: &[ClassicMinuteEntry],
) -> Vec<SleepMinute> {
    entries
        .iter()
        .map(|entry| {
            let date = if entry.time >= start_time.time() {
                start_time.date()
            } else {
                start_time.date() + Duration::days(1)
            };
            SleepMinute {
                log_id,
                minute_time: date.and_time(entry.time),
                stage: SleepStage::from_classic_value(&entry.value),
            }
        })
        .collect()
}

/// Outcome of a conflict-tolerant insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    SkippedDuplicate,
}

/// One row per session keyed by the vendor log id, inserted at most once.
#[derive(Debug, Clone, PartialEq)]
pub struct SleepSession {
    pub log_id: i64,
    pub date_of_sleep: NaiveDate,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub duration_ms: i64,
    pub efficiency: Option<i32>,
    pub sleep_score: i32,
    pub is_main_sleep: bool,
    pub awake_count: Option<i32>,
    pub awake_duration: Option<i32>,
    pub restless_count: Option<i32>,
    pub restless_duration: Option<i32>,
    pub time_in_bed: Option<i32>,
    pub minutes_asleep: Option<i32>,
    pub minutes_awake: Option<i32>,
    pub minutes_to_fall_asleep: Option<i32>,
    pub minutes_after_wakeup: Option<i32>,
}

impl SleepSession {
    pub fn from_entry(entry: &SleepEntry) -> Self {
        let sleep_score = calculate_sleep_score(&entry.score_input());
        Self {
            log_id: entry.log_id,
            date_of_sleep: entry.date_of_sleep,
            start_time: entry.start_time,
            end_time: entry.end_time,
            duration_ms: entry.duration,
            efficiency: entry.efficiency,
            sleep_score,
            is_main_sleep: entry.is_main_sleep,
            awake_count: entry.awake_count,
            awake_duration: entry.awake_duration,
            restless_count: entry.restless_count,
            restless_duration: entry.restless_duration,
            time_in_bed: entry.time_in_bed,
            minutes_asleep: entry.minutes_asleep,
            minutes_awake: entry.minutes_awake,
            minutes_to_fall_asleep: entry.minutes_to_fall_asleep,
            minutes_after_wakeup: entry.minutes_after_wakeup,
        }
    }

    /// Insert the session row, a no-op if the log id is already stored.
    ///
    /// # Errors
    /// Return error if the db query fails
    pub async fn insert(&self, tx: &Transaction<'_>) -> Result<InsertOutcome, Error> {
        let query = "
            INSERT INTO sleep_sessions (
                log_id, date_of_sleep, start_time, end_time, duration_ms,
                efficiency, sleep_score, is_main_sleep,
                awake_count, awake_duration, restless_count, restless_duration,
                time_in_bed, minutes_asleep, minutes_awake,
                minutes_to_fall_asleep, minutes_after_wakeup
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                $15, $16, $17
            )
            ON CONFLICT (log_id) DO NOTHING";
        let rows = tx
            .execute(
                query,
                &[
                    &self.log_id,
                    &self.date_of_sleep,
                    &self.start_time,
                    &self.end_time,
                    &self.duration_ms,
                    &self.efficiency,
                    &self.sleep_score,
                    &self.is_main_sleep,
                    &self.awake_count,
                    &self.awake_duration,
                    &self.restless_count,
                    &self.restless_duration,
                    &self.time_in_bed,
                    &self.minutes_asleep,
                    &self.minutes_awake,
                    &self.minutes_to_fall_asleep,
                    &self.minutes_after_wakeup,
                ],
            )
            .await?;
        if rows == 0 {
            Ok(InsertOutcome::SkippedDuplicate)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }
}

/// One row per minute per session, duplicates keep the first value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepMinute {
    pub log_id: i64,
    pub minute_time: NaiveDateTime,
    pub stage: SleepStage,
}

/// Insert minute records, each a no-op on conflict. Returns the number of
/// rows actually written.
///
/// # Errors
/// Return error if a db query fails
pub async fn insert_sleep_minutes(
    tx: &Transaction<'_>,
    minutes: &[SleepMinute],
) -> Result<u64, Error> {
    let query = "
        INSERT INTO sleep_minutes (log_id, minute_time, sleep_stage)
        VALUES ($1, $2, $3)
        ON CONFLICT (log_id, minute_time) DO NOTHING";
    let mut inserted = 0;
    for minute in minutes {
        inserted += tx
            .execute(
                query,
                &[&minute.log_id, &minute.minute_time, &minute.stage.code()],
            )
            .await?;
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};

    use crate::fitbit_sleep::{
        expand_classic_minutes, expand_stage_periods, SleepEntry, SleepLevelData,
        SleepLevelPeriod, SleepStage,
    };

    const STAGES_PAYLOAD: &str = r#"{
        "logId": 28394571234,
        "dateOfSleep": "2025-10-02",
        "startTime": "2025-10-01T23:41:30.000",
        "endTime": "2025-10-02T07:22:30.000",
        "duration": 27660000,
        "efficiency": 95,
        "isMainSleep": true,
        "minutesAsleep": 432,
        "minutesAwake": 29,
        "minutesToFallAsleep": 5,
        "minutesAfterWakeup": 2,
        "timeInBed": 461,
        "levels": {
            "data": [
                {"dateTime": "2025-10-01T23:41:30.000", "level": "wake", "seconds": 300},
                {"dateTime": "2025-10-01T23:46:30.000", "level": "light", "seconds": 1800},
                {"dateTime": "2025-10-02T00:16:30.000", "level": "deep", "seconds": 150}
            ],
            "summary": {
                "deep": {"minutes": 78},
                "light": {"minutes": 244},
                "rem": {"minutes": 110},
                "wake": {"minutes": 29}
            }
        }
    }"#;

    const CLASSIC_PAYLOAD: &str = r#"{
        "logId": 1089342156,
        "dateOfSleep": "2016-03-12",
        "startTime": "2016-03-11T23:50:00.000",
        "endTime": "2016-03-12T07:30:00.000",
        "duration": 27600000,
        "efficiency": 89,
        "isMainSleep": true,
        "awakeCount": 2,
        "awakeDuration": 4,
        "restlessCount": 11,
        "restlessDuration": 30,
        "minutesAsleep": 412,
        "minutesAwake": 48,
        "minutesToFallAsleep": 12,
        "minutesAfterWakeup": 0,
        "timeInBed": 460,
        "minuteData": [
            {"dateTime": "23:50:00", "value": "2"},
            {"dateTime": "23:51:00", "value": "1"},
            {"dateTime": "00:05:00", "value": "3"}
        ]
    }"#;

    #[test]
    fn test_stage_labels() {
        assert_eq!(SleepStage::from_level("deep"), SleepStage::Deep);
        assert_eq!(SleepStage::from_level("REM"), SleepStage::Rem);
        assert_eq!(SleepStage::from_level("Light"), SleepStage::Light);
        assert_eq!(SleepStage::from_level("asleep"), SleepStage::Wake);
        assert_eq!(SleepStage::from_level(""), SleepStage::Wake);
        assert_eq!(SleepStage::Deep.code(), 2);
    }

    #[test]
    fn test_classic_codes() {
        assert_eq!(SleepStage::from_classic_value("1"), SleepStage::Light);
        assert_eq!(SleepStage::from_classic_value("2"), SleepStage::Wake);
        assert_eq!(SleepStage::from_classic_value("3"), SleepStage::Wake);
        assert_eq!(SleepStage::from_classic_value("9"), SleepStage::Wake);
    }

    #[test]
    fn test_expand_stage_period_floors_seconds() {
        let start: NaiveDateTime = "2025-10-02T00:00:00".parse().unwrap();
        let periods = vec![SleepLevelPeriod {
            start,
            level: "deep".to_string(),
            seconds: 150,
        }];
        let minutes = expand_stage_periods(1, &periods);
        assert_eq!(minutes.len(), 2);
        assert_eq!(minutes[0].minute_time, start);
        assert_eq!(
            minutes[1].minute_time,
            "2025-10-02T00:01:00".parse::<NaiveDateTime>().unwrap()
        );
        assert!(minutes.iter().all(|m| m.stage == SleepStage::Deep));
    }

    #[test]
    fn test_expand_classic_rolls_over_midnight() {
        let entry: SleepEntry = serde_json::from_str(CLASSIC_PAYLOAD).unwrap();
        let minutes = expand_classic_minutes(entry.log_id, entry.start_time, &entry.minute_data);
        assert_eq!(minutes.len(), 3);
        assert_eq!(
            minutes[0].minute_time,
            "2016-03-11T23:50:00".parse::<NaiveDateTime>().unwrap()
        );
        assert_eq!(minutes[0].stage, SleepStage::Wake);
        assert_eq!(minutes[1].stage, SleepStage::Light);
        assert_eq!(
            minutes[2].minute_time,
            "2016-03-12T00:05:00".parse::<NaiveDateTime>().unwrap()
        );
    }

    #[test]
    fn test_level_data_resolution() {
        let stages: SleepEntry = serde_json::from_str(STAGES_PAYLOAD).unwrap();
        assert!(matches!(
            stages.level_data(),
            Some(SleepLevelData::Stages(_))
        ));

        let classic: SleepEntry = serde_json::from_str(CLASSIC_PAYLOAD).unwrap();
        assert!(matches!(
            classic.level_data(),
            Some(SleepLevelData::Classic(_))
        ));
    }

    #[test]
    fn test_expand_minutes_from_entry() {
        let entry: SleepEntry = serde_json::from_str(STAGES_PAYLOAD).unwrap();
        let minutes = entry.expand_minutes();
        // 300s wake + 1800s light + 150s deep -> 5 + 30 + 2 minutes
        assert_eq!(minutes.len(), 37);
        assert_eq!(
            minutes
                .iter()
                .filter(|m| m.stage == SleepStage::Light)
                .count(),
            30
        );
        assert_eq!(
            minutes
                .iter()
                .filter(|m| m.stage == SleepStage::Deep)
                .count(),
            2
        );
        assert!(minutes.iter().all(|m| m.log_id == 28394571234));
    }

    #[test]
    fn test_session_from_entry() {
        use crate::fitbit_sleep::SleepSession;

        let entry: SleepEntry = serde_json::from_str(STAGES_PAYLOAD).unwrap();
        let session = SleepSession::from_entry(&entry);
        assert_eq!(session.log_id, 28394571234);
        assert_eq!(
            session.date_of_sleep,
            NaiveDate::from_ymd_opt(2025, 10, 2).unwrap()
        );
        assert_eq!(session.duration_ms, 27660000);
        assert_eq!(session.efficiency, Some(95));
        assert!(session.is_main_sleep);
        assert!((0..=100).contains(&session.sleep_score));

        let classic: SleepEntry = serde_json::from_str(CLASSIC_PAYLOAD).unwrap();
        let classic_session = SleepSession::from_entry(&classic);
        assert_eq!(classic_session.awake_count, Some(2));
        assert_eq!(classic_session.restless_count, Some(11));
        assert!((0..=100).contains(&classic_session.sleep_score));
    }
}
