use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tokio_postgres::Transaction;

use crate::errors::FitbitError as Error;

#[derive(Deserialize, Debug, Clone)]
pub struct HeartRateResponse {
    #[serde(rename = "activities-heart", default)]
    pub daily: Vec<DailyHeartRateEntry>,
    #[serde(rename = "activities-heart-intraday")]
    pub intraday: Option<IntradayHeartRate>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DailyHeartRateEntry {
    #[serde(rename = "dateTime")]
    pub date: NaiveDate,
    pub value: DailyHeartRateValue,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DailyHeartRateValue {
    #[serde(rename = "restingHeartRate")]
    pub resting_heart_rate: Option<i32>,
    #[serde(rename = "caloriesOut")]
    pub calories_out: Option<f64>,
    #[serde(rename = "heartRateZones", default)]
    pub heart_rate_zones: Vec<HeartRateZone>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct HeartRateZone {
    pub name: String,
    pub minutes: Option<i32>,
    #[serde(rename = "caloriesOut")]
    pub calories_out: Option<f64>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct IntradayHeartRate {
    #[serde(default)]
    pub dataset: Vec<IntradayHeartRatePoint>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
pub struct IntradayHeartRatePoint {
    pub time: NaiveTime,
    pub value: i32,
}

/// One row per calendar date, re-syncing a date overwrites every field.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct HeartRateDaily {
    pub date: NaiveDate,
    pub resting_heart_rate: Option<i32>,
    pub calories_out: Option<f64>,
    pub fat_burn_minutes: Option<i32>,
    pub fat_burn_calories: Option<f64>,
    pub cardio_minutes: Option<i32>,
    pub cardio_calories: Option<f64>,
    pub peak_minutes: Option<i32>,
    pub peak_calories: Option<f64>,
}

impl HeartRateDaily {
    pub fn from_entry(entry: &DailyHeartRateEntry) -> Self {
        let zone = |name: &str| {
            entry
                .value
                .heart_rate_zones
                .iter()
                .find(|z| z.name == name)
        };
        let fat_burn = zone("Fat Burn");
        let cardio = zone("Cardio");
        let peak = zone("Peak");
        Self {
            date: entry.date,
            resting_heart_rate: entry.value.resting_heart_rate,
            calories_out: entry.value.calories_out,
            fat_burn_minutes: fat_burn.and_then(|z| z.minutes),
            fat_burn_calories: fat_burn.and_then(|z| z.calories_out),
            cardio_minutes: cardio.and_then(|z| z.minutes),
            cardio_calories: cardio.and_then(|z| z.calories_out),
            peak_minutes: peak.and_then(|z| z.minutes),
            peak_calories: peak.and_then(|z| z.calories_out),
        }
    }

    /// # Errors
    /// Return error if the db query fails
    pub async fn upsert(&self, tx: &Transaction<'_>) -> Result<(), Error> {
        let query = "
            INSERT INTO heart_rate_daily (
                date, resting_heart_rate, calories_out,
                fat_burn_minutes, fat_burn_calories,
                cardio_minutes, cardio_calories,
                peak_minutes, peak_calories
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (date) DO UPDATE SET
                resting_heart_rate = EXCLUDED.resting_heart_rate,
                calories_out = EXCLUDED.calories_out,
                fat_burn_minutes = EXCLUDED.fat_burn_minutes,
                fat_burn_calories = EXCLUDED.fat_burn_calories,
                cardio_minutes = EXCLUDED.cardio_minutes,
                cardio_calories = EXCLUDED.cardio_calories,
                peak_minutes = EXCLUDED.peak_minutes,
                peak_calories = EXCLUDED.peak_calories";
        tx.execute(
            query,
            &[
                &self.date,
                &self.resting_heart_rate,
                &self.calories_out,
                &self.fat_burn_minutes,
                &self.fat_burn_calories,
                &self.cardio_minutes,
                &self.cardio_calories,
                &self.peak_minutes,
                &self.peak_calories,
            ],
        )
        .await?;
        Ok(())
    }
}

/// One row per minute timestamp, duplicate timestamps keep the first value.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct FitbitHeartRate {
    pub datetime: NaiveDateTime,
    pub value: i32,
}

impl FitbitHeartRate {
    pub fn from_point(date: NaiveDate, point: IntradayHeartRatePoint) -> Self {
        Self {
            datetime: date.and_time(point.time),
            value: point.value,
        }
    }

    /// Insert, a no-op if the timestamp is already present. Returns the
    /// number of rows actually written (0 or 1).
    ///
    /// # Errors
    /// Return error if the db query fails
    pub async fn insert_ignore(&self, tx: &Transaction<'_>) -> Result<u64, Error> {
        let query = "
            INSERT INTO heart_rate_intraday (datetime, heart_rate)
            VALUES ($1, $2)
            ON CONFLICT (datetime) DO NOTHING";
        tx.execute(query, &[&self.datetime, &self.value])
            .await
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use crate::fitbit_heartrate::{FitbitHeartRate, HeartRateDaily, HeartRateResponse};

    const HEART_RATE_PAYLOAD: &str = r#"{
        "activities-heart": [
            {
                "dateTime": "2025-10-01",
                "value": {
                    "caloriesOut": 2316.42,
                    "restingHeartRate": 58,
                    "heartRateZones": [
                        {"name": "Out of Range", "minutes": 1181, "caloriesOut": 1633.7},
                        {"name": "Fat Burn", "minutes": 110, "caloriesOut": 514.2},
                        {"name": "Cardio", "minutes": 22, "caloriesOut": 144.3},
                        {"name": "Peak", "minutes": 3, "caloriesOut": 24.2}
                    ]
                }
            }
        ],
        "activities-heart-intraday": {
            "dataset": [
                {"time": "00:00:00", "value": 62},
                {"time": "00:01:00", "value": 61},
                {"time": "00:02:00", "value": 63}
            ],
            "datasetInterval": 1,
            "datasetType": "minute"
        }
    }"#;

    #[test]
    fn test_parse_heart_rate_response() {
        let payload: HeartRateResponse = serde_json::from_str(HEART_RATE_PAYLOAD).unwrap();
        assert_eq!(payload.daily.len(), 1);
        let intraday = payload.intraday.unwrap();
        assert_eq!(intraday.dataset.len(), 3);
        assert_eq!(intraday.dataset[1].value, 61);
    }

    #[test]
    fn test_daily_from_entry() {
        let payload: HeartRateResponse = serde_json::from_str(HEART_RATE_PAYLOAD).unwrap();
        let daily = HeartRateDaily::from_entry(&payload.daily[0]);
        assert_eq!(daily.date, NaiveDate::from_ymd_opt(2025, 10, 1).unwrap());
        assert_eq!(daily.resting_heart_rate, Some(58));
        assert_eq!(daily.fat_burn_minutes, Some(110));
        assert_eq!(daily.cardio_calories, Some(144.3));
        assert_eq!(daily.peak_minutes, Some(3));
    }

    #[test]
    fn test_daily_missing_zones() {
        let entry = serde_json::from_str(
            r#"{"dateTime": "2025-10-02", "value": {"restingHeartRate": 60}}"#,
        )
        .unwrap();
        let daily = HeartRateDaily::from_entry(&entry);
        assert_eq!(daily.resting_heart_rate, Some(60));
        assert_eq!(daily.calories_out, None);
        assert_eq!(daily.fat_burn_minutes, None);
        assert_eq!(daily.peak_calories, None);
    }

    #[test]
    fn test_intraday_from_point() {
        let payload: HeartRateResponse = serde_json::from_str(HEART_RATE_PAYLOAD).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
        let point = payload.intraday.unwrap().dataset[2];
        let record = FitbitHeartRate::from_point(date, point);
        assert_eq!(
            record.datetime,
            date.and_time(NaiveTime::from_hms_opt(0, 2, 0).unwrap())
        );
        assert_eq!(record.value, 63);
    }
}
