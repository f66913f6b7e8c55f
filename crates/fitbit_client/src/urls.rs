//! URL builders for each endpoint family.
//!
//! Builders never perform I/O. The user id is always passed in by the caller,
//! which takes it from the token it currently holds.

use crate::FitbitError;
use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

/// Base URL of the Fitbit Web API (version 1).
pub const WEB_API_URL: &str = "https://api.fitbit.com/1";

/// A request URL together with the canonical name its response is saved under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointUrl {
    pub url: String,
    pub save_name: &'static str,
}

/// Time span accepted by the heart rate time series.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Period {
    #[default]
    OneDay,
    SevenDays,
    ThirtyDays,
    OneWeek,
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
}

impl Period {
    pub const ALL: [Period; 8] = [
        Period::OneDay,
        Period::SevenDays,
        Period::ThirtyDays,
        Period::OneWeek,
        Period::OneMonth,
        Period::ThreeMonths,
        Period::SixMonths,
        Period::OneYear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::OneDay => "1d",
            Period::SevenDays => "7d",
            Period::ThirtyDays => "30d",
            Period::OneWeek => "1w",
            Period::OneMonth => "1m",
            Period::ThreeMonths => "3m",
            Period::SixMonths => "6m",
            Period::OneYear => "1y",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = FitbitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Period::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| {
                FitbitError::validation(format!(
                    "Period is not one of the supported values: {s}"
                ))
            })
    }
}

fn api_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn create_url_heart_rate(
    base_url: &str,
    user_id: &str,
    date: NaiveDate,
    period: Period,
) -> EndpointUrl {
    EndpointUrl {
        url: format!(
            "{}/user/{}/activities/heart/date/{}/{}.json",
            base_url.trim_end_matches('/'),
            user_id,
            api_date(date),
            period
        ),
        save_name: "heart_rate",
    }
}

pub fn create_url_body_weight(base_url: &str, user_id: &str, date: NaiveDate) -> EndpointUrl {
    EndpointUrl {
        url: format!(
            "{}/user/{}/body/log/weight/date/{}.json",
            base_url.trim_end_matches('/'),
            user_id,
            api_date(date)
        ),
        save_name: "body_weight",
    }
}

pub fn create_url_activity_summary(
    base_url: &str,
    user_id: &str,
    date: NaiveDate,
) -> EndpointUrl {
    EndpointUrl {
        url: format!(
            "{}/user/{}/activities/date/{}.json",
            base_url.trim_end_matches('/'),
            user_id,
            api_date(date)
        ),
        save_name: "activity_summary",
    }
}
