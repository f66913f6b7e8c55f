//! Endpoint descriptors and the catalog of endpoints the caller knows how to
//! build URLs for.

use crate::FitbitError;
use crate::urls::{self, EndpointUrl, Period};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Catalog of supported endpoints. Each variant dispatches to one URL builder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    HeartRateByDate,
    BodyWeightByDate,
    ActivitySummaryByDate,
}

impl Endpoint {
    pub const ALL: [Endpoint; 3] = [
        Endpoint::HeartRateByDate,
        Endpoint::BodyWeightByDate,
        Endpoint::ActivitySummaryByDate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::HeartRateByDate => "get_heart_rate_by_date",
            Endpoint::BodyWeightByDate => "get_body_weight_by_date",
            Endpoint::ActivitySummaryByDate => "get_activity_summary_by_date",
        }
    }

    /// Look up a catalog entry by its registered name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.name() == name)
    }

    /// URL keyword arguments this endpoint's builder understands.
    pub fn accepted_kwargs(&self) -> &'static [&'static str] {
        match self {
            Endpoint::HeartRateByDate => &["period"],
            Endpoint::BodyWeightByDate | Endpoint::ActivitySummaryByDate => &[],
        }
    }

    /// Build the request URL and save name for `date`.
    pub fn build_url(
        &self,
        base_url: &str,
        user_id: &str,
        date: NaiveDate,
        kwargs: &BTreeMap<String, String>,
    ) -> Result<EndpointUrl, FitbitError> {
        match self {
            Endpoint::HeartRateByDate => {
                let period = match kwargs.get("period") {
                    Some(p) => p.parse::<Period>()?,
                    None => Period::default(),
                };
                Ok(urls::create_url_heart_rate(base_url, user_id, date, period))
            }
            Endpoint::BodyWeightByDate => Ok(urls::create_url_body_weight(base_url, user_id, date)),
            Endpoint::ActivitySummaryByDate => {
                Ok(urls::create_url_activity_summary(base_url, user_id, date))
            }
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Endpoint {
    type Err = FitbitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Endpoint::from_name(s)
            .ok_or_else(|| FitbitError::validation(format!("`{s}` not in available list")))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl From<HttpMethod> for reqwest::Method {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

impl FromStr for HttpMethod {
    type Err = FitbitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            _ => Err(FitbitError::validation(format!("unsupported http method: {s}"))),
        }
    }
}

/// File extension the response body is stored with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResponseFormat {
    #[default]
    Json,
    Xml,
}

impl ResponseFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ResponseFormat::Json => "json",
            ResponseFormat::Xml => "xml",
        }
    }
}

impl FromStr for ResponseFormat {
    type Err = FitbitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ResponseFormat::Json),
            "xml" => Ok(ResponseFormat::Xml),
            _ => Err(FitbitError::validation(format!(
                "unsupported response format: {s}"
            ))),
        }
    }
}

/// Describes one endpoint a caller wants fetched.
///
/// The name is only checked against the catalog when the descriptor is
/// registered with a [`FitbitCaller`](crate::FitbitCaller).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointParameters {
    pub name: String,
    pub http_method: HttpMethod,
    pub response_format: ResponseFormat,
    pub url_kwargs: BTreeMap<String, String>,
}

impl EndpointParameters {
    pub fn new(
        name: impl Into<String>,
        http_method: HttpMethod,
        response_format: ResponseFormat,
    ) -> Self {
        Self {
            name: name.into(),
            http_method,
            response_format,
            url_kwargs: BTreeMap::new(),
        }
    }

    /// GET request with a JSON response, the shape of every catalog endpoint.
    pub fn get_json(name: impl Into<String>) -> Self {
        Self::new(name, HttpMethod::Get, ResponseFormat::Json)
    }

    pub fn with_url_kwarg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.url_kwargs.insert(key.into(), value.into());
        self
    }

    /// Resolve the catalog entry and check the url kwargs it would be built with.
    pub(crate) fn resolve(&self) -> Result<Endpoint, FitbitError> {
        let endpoint: Endpoint = self.name.parse()?;
        let accepted = endpoint.accepted_kwargs();
        if let Some(key) = self
            .url_kwargs
            .keys()
            .find(|k| !accepted.contains(&k.as_str()))
        {
            return Err(FitbitError::validation(format!(
                "`{}` does not accept url argument `{key}`",
                self.name
            )));
        }
        Ok(endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_names_round_trip() {
        for e in Endpoint::ALL {
            assert_eq!(e.name().parse::<Endpoint>().unwrap(), e);
        }
    }

    #[test]
    fn unknown_name_is_not_in_catalog() {
        let err = "fake_endpoint".parse::<Endpoint>().unwrap_err();
        assert!(err.to_string().contains("not in available list"));
    }

    #[test]
    fn resolve_rejects_unexpected_kwargs() {
        let ep = EndpointParameters::get_json("get_body_weight_by_date")
            .with_url_kwarg("parameter1", "value1");
        assert!(ep.resolve().unwrap_err().is_validation());
    }

    #[test]
    fn resolve_accepts_period_for_heart_rate() {
        let ep =
            EndpointParameters::get_json("get_heart_rate_by_date").with_url_kwarg("period", "30d");
        assert_eq!(ep.resolve().unwrap(), Endpoint::HeartRateByDate);
    }

    #[test]
    fn heart_rate_builder_validates_period_value() {
        let mut kwargs = BTreeMap::new();
        kwargs.insert("period".to_string(), "2d".to_string());
        let date = NaiveDate::from_ymd_opt(2023, 1, 17).unwrap();
        let err = Endpoint::HeartRateByDate
            .build_url("http://x", "u", date, &kwargs)
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn methods_and_formats_parse_case_insensitively() {
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!("JSON".parse::<ResponseFormat>().unwrap(), ResponseFormat::Json);
        assert!("PATCH".parse::<HttpMethod>().is_err());
        assert!("csv".parse::<ResponseFormat>().is_err());
    }

    #[test]
    fn descriptors_compare_by_value() {
        let a = EndpointParameters::new(
            "get_heart_rate_by_date",
            HttpMethod::Get,
            ResponseFormat::Json,
        );
        let b = EndpointParameters::get_json("get_heart_rate_by_date");
        assert_eq!(a, b);
    }
}
