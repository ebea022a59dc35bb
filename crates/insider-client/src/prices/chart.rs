use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Days, NaiveDate};
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::config::PriceSourceConfig;
use crate::prices::{PriceHistorySource, PricePoint, PriceSourceError};

const USER_AGENT: &str = concat!("insider-client/", env!("CARGO_PKG_VERSION"));

/// Yahoo-style `v8/finance/chart` endpoint over a blocking client.
#[derive(Debug, Clone)]
pub struct ChartApiSource {
    client: Client,
    base_url: String,
}

impl ChartApiSource {
    pub fn new(config: &PriceSourceConfig) -> Result<Self, PriceSourceError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl PriceHistorySource for ChartApiSource {
    fn fetch_daily(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, PriceSourceError> {
        if start > end {
            return Err(PriceSourceError::InvalidRange { start, end });
        }

        let period1 = day_start_timestamp(start);
        let period2 = end
            .checked_add_days(Days::new(1))
            .map(day_start_timestamp)
            .unwrap_or(i64::MAX);
        let url = format!("{}/{ticker}", self.base_url);
        tracing::debug!(%url, %start, %end, "requesting daily price history");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".to_string()),
                ("events", "split".to_string()),
            ])
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(PriceSourceError::Status {
                status: status.as_u16(),
                ticker: ticker.to_string(),
            });
        }

        let envelope = response.json::<ChartEnvelope>()?;
        let points = decode_points(ticker, envelope)?
            .into_iter()
            .filter(|point| point.date >= start && point.date <= end)
            .collect::<Vec<_>>();
        if points.is_empty() {
            return Err(PriceSourceError::Empty(ticker.to_string()));
        }
        Ok(points)
    }
}

#[derive(Deserialize)]
struct ChartEnvelope {
    chart: Option<ChartNode>,
}

#[derive(Deserialize)]
struct ChartNode {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: Option<MetaNode>,
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
    #[serde(default)]
    events: Option<Events>,
}

#[derive(Deserialize)]
struct MetaNode {
    #[serde(default)]
    gmtoffset: Option<i64>,
}

#[derive(Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteBlock>,
}

#[derive(Deserialize)]
struct QuoteBlock {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Deserialize)]
struct Events {
    #[serde(default)]
    splits: Option<BTreeMap<String, SplitEvent>>,
}

#[derive(Deserialize)]
struct SplitEvent {
    #[serde(default)]
    date: Option<i64>,
    #[serde(default)]
    numerator: Option<f64>,
    #[serde(default)]
    denominator: Option<f64>,
    #[serde(default, rename = "splitRatio")]
    split_ratio: Option<String>,
}

impl SplitEvent {
    fn ratio(&self) -> Option<f64> {
        if let (Some(numerator), Some(denominator)) = (self.numerator, self.denominator)
            && numerator > 0.0
            && denominator > 0.0
        {
            return Some(numerator / denominator);
        }

        let raw = self.split_ratio.as_deref()?;
        let (numerator, denominator) = raw.split_once([':', '/'])?;
        let numerator = numerator.trim().parse::<f64>().ok()?;
        let denominator = denominator.trim().parse::<f64>().ok()?;
        (numerator > 0.0 && denominator > 0.0).then(|| numerator / denominator)
    }
}

fn decode_points(ticker: &str, envelope: ChartEnvelope) -> Result<Vec<PricePoint>, PriceSourceError> {
    let Some(chart) = envelope.chart else {
        return Err(PriceSourceError::Data("missing `chart` node".to_string()));
    };
    if let Some(error) = chart.error {
        return Err(PriceSourceError::Data(format!(
            "{}: {}",
            error.code, error.description
        )));
    }
    let Some(result) = chart.result.and_then(|results| results.into_iter().next()) else {
        return Err(PriceSourceError::Empty(ticker.to_string()));
    };

    let offset = result
        .meta
        .as_ref()
        .and_then(|meta| meta.gmtoffset)
        .unwrap_or(0);
    let timestamps = result.timestamp.unwrap_or_default();
    let Some(quote) = result.indicators.quote.into_iter().next() else {
        return Err(PriceSourceError::Empty(ticker.to_string()));
    };

    let mut splits = HashMap::new();
    if let Some(events) = result.events.and_then(|events| events.splits) {
        for (key, event) in events {
            let Some(timestamp) = event.date.or_else(|| key.parse::<i64>().ok()) else {
                continue;
            };
            let (Some(date), Some(ratio)) = (trading_date(timestamp, offset), event.ratio()) else {
                continue;
            };
            splits.insert(date, ratio);
        }
    }

    let mut points = Vec::with_capacity(timestamps.len());
    for (index, timestamp) in timestamps.iter().enumerate() {
        let value = |series: &Vec<Option<f64>>| series.get(index).copied().flatten();
        let Some(close) = value(&quote.close) else {
            continue;
        };
        let Some(date) = trading_date(*timestamp, offset) else {
            return Err(PriceSourceError::Data(format!(
                "timestamp {timestamp} is out of range"
            )));
        };
        points.push(PricePoint {
            date,
            open: value(&quote.open),
            high: value(&quote.high),
            low: value(&quote.low),
            close,
            volume: quote.volume.get(index).copied().flatten(),
            split_ratio: splits.get(&date).copied(),
        });
    }
    Ok(points)
}

fn trading_date(timestamp: i64, gmt_offset: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(timestamp.checked_add(gmt_offset)?, 0).map(|moment| moment.date_naive())
}

fn day_start_timestamp(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|moment| moment.and_utc().timestamp())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{ChartEnvelope, SplitEvent, decode_points, trading_date};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
    }

    #[test]
    fn gmt_offset_shifts_market_open_to_local_date() {
        // 2020-08-31 13:30 UTC is 09:30 New York time.
        assert_eq!(trading_date(1_598_880_600, -14_400), Some(date(2020, 8, 31)));
        // 2020-09-01 02:00 UTC is still Aug 31 in New York.
        assert_eq!(trading_date(1_598_925_600, -14_400), Some(date(2020, 8, 31)));
    }

    #[test]
    fn split_ratio_prefers_numerator_and_denominator() {
        let event = SplitEvent {
            date: None,
            numerator: Some(4.0),
            denominator: Some(1.0),
            split_ratio: Some("2:1".to_string()),
        };
        assert_eq!(event.ratio(), Some(4.0));

        let textual = SplitEvent {
            date: None,
            numerator: None,
            denominator: None,
            split_ratio: Some("3:2".to_string()),
        };
        assert_eq!(textual.ratio(), Some(1.5));
    }

    #[test]
    fn decodes_points_and_skips_null_closes() {
        let body = serde_json::json!({
            "chart": {
                "result": [{
                    "meta": { "gmtoffset": -14400 },
                    "timestamp": [1598880600, 1598967000, 1599053400],
                    "indicators": { "quote": [{
                        "open": [127.58, 132.76, null],
                        "high": [131.0, 134.8, null],
                        "low": [126.0, 130.53, null],
                        "close": [129.04, 134.18, null],
                        "volume": [225702700, 151948100, null]
                    }]},
                    "events": { "splits": {
                        "1598880600": {
                            "date": 1598880600,
                            "numerator": 4,
                            "denominator": 1,
                            "splitRatio": "4:1"
                        }
                    }}
                }],
                "error": null
            }
        });
        let envelope = serde_json::from_value::<ChartEnvelope>(body);
        assert!(envelope.is_ok());
        if let Ok(envelope) = envelope {
            let points = decode_points("AAPL", envelope);
            assert!(points.is_ok());
            if let Ok(points) = points {
                assert_eq!(points.len(), 2);
                assert_eq!(points[0].date, date(2020, 8, 31));
                assert_eq!(points[0].split_ratio, Some(4.0));
                assert!(points[0].is_split_day());
                assert_eq!(points[1].date, date(2020, 9, 1));
                assert!(!points[1].is_split_day());
                assert_eq!(points[1].close, 134.18);
            }
        }
    }

    #[test]
    fn chart_error_node_is_a_data_error() {
        let body = serde_json::json!({
            "chart": {
                "result": null,
                "error": { "code": "Not Found", "description": "No data found, symbol may be delisted" }
            }
        });
        let envelope = serde_json::from_value::<ChartEnvelope>(body);
        assert!(envelope.is_ok());
        if let Ok(envelope) = envelope {
            let result = decode_points("ZZZZ", envelope);
            assert!(matches!(result, Err(super::PriceSourceError::Data(message)) if message.contains("Not Found")));
        }
    }
}
