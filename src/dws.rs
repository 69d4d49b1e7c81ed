//! Data-web-service queries: aggregation levels, query-string assembly, and
//! parsing of the tab-separated data stream into tabular rows.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{Error, Result};
use crate::events::parse_timestamp;

/// Aggregation level for data downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Second,
    Minute,
    Hour,
    Day,
}

impl Aggregate {
    /// Accepts the loose spellings the service tolerates, matched by prefix
    /// ("sec", "seconds", "min", "hourly", ...).
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim().to_lowercase();
        if value.starts_with("sec") {
            Ok(Aggregate::Second)
        } else if value.starts_with("min") {
            Ok(Aggregate::Minute)
        } else if value.starts_with("hour") {
            Ok(Aggregate::Hour)
        } else if value.starts_with("day") {
            Ok(Aggregate::Day)
        } else {
            Err(Error::InvalidQuery(format!(
                "no valid aggregate {value:?}, use second, minute, hour, or day"
            )))
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Aggregate::Second => "second",
            Aggregate::Minute => "minute",
            Aggregate::Hour => "hour",
            Aggregate::Day => "day",
        }
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate function applied per interval; ignored for [`Aggregate::Second`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Min,
    Max,
    Mean,
    Median,
    Std,
    Count,
}

impl AggregateFunction {
    fn as_str(self) -> &'static str {
        match self {
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
            AggregateFunction::Mean => "mean",
            AggregateFunction::Median => "median",
            AggregateFunction::Std => "std",
            AggregateFunction::Count => "count",
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bulk time-series request against the data web service.
#[derive(Debug, Clone)]
pub struct DataQuery {
    /// Fully qualified parameter urns.
    pub sensors: Vec<String>,
    pub begin: NaiveDateTime,
    pub end: NaiveDateTime,
    pub aggregate: Aggregate,
    /// Defaults to `mean` when left empty (and the aggregate is not
    /// second-level).
    pub functions: Vec<AggregateFunction>,
}

impl DataQuery {
    /// A query with the service defaults: hourly means.
    pub fn new(sensors: Vec<String>, begin: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            sensors,
            begin,
            end,
            aggregate: Aggregate::Hour,
            functions: vec![AggregateFunction::Mean],
        }
    }

    pub fn with_aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregate = aggregate;
        self
    }

    pub fn with_functions(mut self, functions: Vec<AggregateFunction>) -> Self {
        self.functions = functions;
        self
    }

    /// Renders the query string the data endpoint expects. Multiple sensors
    /// become repeated `sensors=` parameters; second-level data has no
    /// aggregate functions.
    pub(crate) fn to_query(&self) -> Result<String> {
        let sensors: Vec<&str> = self
            .sensors
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if sensors.is_empty() {
            return Err(Error::InvalidQuery("item(s) must be defined".to_string()));
        }

        let mut query = format!(
            "sensors={}&beginDate={}&endDate={}&aggregate={}",
            sensors.join("&sensors="),
            self.begin.format("%Y-%m-%dT%H:%M:%S"),
            self.end.format("%Y-%m-%dT%H:%M:%S"),
            self.aggregate,
        );

        if self.aggregate != Aggregate::Second {
            let functions = if self.functions.is_empty() {
                vec![AggregateFunction::Mean]
            } else {
                self.functions.clone()
            };
            let functions: Vec<&str> = functions.iter().map(|f| f.as_str()).collect();
            query.push_str("&aggregateFunctions=");
            query.push_str(&functions.join(","));
        }

        query.push_str("&streamit=true&withQualityFlags=false&withLogicalCode=false");
        Ok(query)
    }
}

/// One data row: the interval timestamp plus one value per data column.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRow {
    pub datetime: DateTime<Utc>,
    /// Aligned with `DataTable::columns[1..]`; unparseable or empty cells
    /// are `None`.
    pub values: Vec<Option<f64>>,
}

/// Tabular result of a data download. The first column of the service
/// payload is the timestamp; the remaining columns keep the service's
/// header names (one per requested sensor and aggregate function).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataTable {
    pub columns: Vec<String>,
    pub rows: Vec<DataRow>,
}

/// Parses the tab-separated payload streamed by the data endpoint.
/// Rows whose timestamp cannot be parsed are skipped.
pub(crate) fn parse_table(payload: &[u8]) -> Result<DataTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(payload);

    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if columns.is_empty() {
        return Ok(DataTable::default());
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut fields = record.iter();
        let Some(stamp) = fields.next() else { continue };
        let Some(datetime) = parse_timestamp(Some(stamp)) else {
            continue;
        };
        let values = fields.map(|field| field.trim().parse::<f64>().ok()).collect();
        rows.push(DataRow { datetime, values });
    }

    Ok(DataTable { columns, rows })
}
