use serde::{Deserialize, Deserializer};
use std::{
    fmt,
    path::PathBuf,
    sync::mpsc::Sender,
    time::Duration,
};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const FETCH_TIMEOUT_SECS: u64 = 10;
const YEAR_HEADER: &str = "Year";

/// One year of the projection. Every figure is optional: a missing column or a
/// cell that is not a number comes through as `None`, never as zero.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProjectionRow {
    #[serde(rename = "Year", default, deserialize_with = "lenient_year")]
    pub year: Option<u32>,
    #[serde(rename = "Market Return (%)", default, deserialize_with = "lenient_number")]
    pub market_return_percent: Option<f64>,
    #[serde(rename = "Portfolio (Selling $20K)", default, deserialize_with = "lenient_number")]
    pub portfolio_selling_strategy: Option<f64>,
    #[serde(
        rename = "Portfolio (Using Margin - No Repay)",
        default,
        deserialize_with = "lenient_number"
    )]
    pub portfolio_margin_no_repay: Option<f64>,
    #[serde(
        rename = "Portfolio (Using Margin - Oscillating Repayment)",
        default,
        deserialize_with = "lenient_number"
    )]
    pub portfolio_margin_oscillating: Option<f64>,
    #[serde(
        rename = "Margin Loan Balance (No Repay)",
        default,
        deserialize_with = "lenient_number"
    )]
    pub margin_balance_no_repay: Option<f64>,
    #[serde(
        rename = "Margin Loan Balance (Oscillating Repayments)",
        default,
        deserialize_with = "lenient_number"
    )]
    pub margin_balance_oscillating: Option<f64>,
    #[serde(rename = "Random Repayment %", default, deserialize_with = "lenient_number")]
    pub random_repayment_percent: Option<f64>,
}

/// The numeric columns a chart series can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKey {
    MarketReturnPercent,
    PortfolioSellingStrategy,
    PortfolioMarginNoRepay,
    PortfolioMarginOscillating,
    MarginBalanceNoRepay,
    MarginBalanceOscillating,
    RandomRepaymentPercent,
}

impl SeriesKey {
    pub const ALL: [SeriesKey; 7] = [
        SeriesKey::MarketReturnPercent,
        SeriesKey::PortfolioSellingStrategy,
        SeriesKey::PortfolioMarginNoRepay,
        SeriesKey::PortfolioMarginOscillating,
        SeriesKey::MarginBalanceNoRepay,
        SeriesKey::MarginBalanceOscillating,
        SeriesKey::RandomRepaymentPercent,
    ];

    pub fn value(self, row: &ProjectionRow) -> Option<f64> {
        match self {
            SeriesKey::MarketReturnPercent => row.market_return_percent,
            SeriesKey::PortfolioSellingStrategy => row.portfolio_selling_strategy,
            SeriesKey::PortfolioMarginNoRepay => row.portfolio_margin_no_repay,
            SeriesKey::PortfolioMarginOscillating => row.portfolio_margin_oscillating,
            SeriesKey::MarginBalanceNoRepay => row.margin_balance_no_repay,
            SeriesKey::MarginBalanceOscillating => row.margin_balance_oscillating,
            SeriesKey::RandomRepaymentPercent => row.random_repayment_percent,
        }
    }

    /// Column title in the projection CSV.
    pub fn header(self) -> &'static str {
        match self {
            SeriesKey::MarketReturnPercent => "Market Return (%)",
            SeriesKey::PortfolioSellingStrategy => "Portfolio (Selling $20K)",
            SeriesKey::PortfolioMarginNoRepay => "Portfolio (Using Margin - No Repay)",
            SeriesKey::PortfolioMarginOscillating => "Portfolio (Using Margin - Oscillating Repayment)",
            SeriesKey::MarginBalanceNoRepay => "Margin Loan Balance (No Repay)",
            SeriesKey::MarginBalanceOscillating => "Margin Loan Balance (Oscillating Repayments)",
            SeriesKey::RandomRepaymentPercent => "Random Repayment %",
        }
    }
}

fn lenient_number<'de, D>(de: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<f64> = csv::invalid_option(de)?;
    Ok(value.filter(|v| v.is_finite()))
}

/// Accepts `7` and `7.0`, rejects fractional or negative years.
fn lenient_year<'de, D>(de: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = lenient_number(de)?;
    Ok(value
        .filter(|y| y.fract() == 0.0 && *y >= 0.0 && *y <= u32::MAX as f64)
        .map(|y| y as u32))
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("malformed CSV: {0}")]
    Parse(#[from] csv::Error),
}

/// Where the projection CSV lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Path(PathBuf),
    Url(String),
}

impl DataSource {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            DataSource::Url(raw.to_string())
        } else {
            DataSource::Path(PathBuf::from(raw))
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Path(path) => write!(f, "{}", path.display()),
            DataSource::Url(url) => f.write_str(url),
        }
    }
}

/// Message sent from the load task to the UI thread
#[derive(Debug)]
pub enum LoadMessage {
    Rows(Vec<ProjectionRow>),
}

/// Parse projection CSV text into rows, in source order.
///
/// Blank lines (including lines of only separators or whitespace) are
/// skipped. Unknown columns are ignored and cells that don't parse become
/// `None`, so only a CSV-level failure is an error.
pub fn parse_rows(text: &str) -> Result<Vec<ProjectionRow>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = dedup_headers(reader.headers()?);
    let missing: Vec<&str> = std::iter::once(YEAR_HEADER)
        .chain(SeriesKey::ALL.iter().map(|key| key.header()))
        .filter(|title| !headers.iter().any(|h| h == *title))
        .collect();
    if !missing.is_empty() {
        warn!(?missing, "projection is missing columns, they will chart as empty");
    }

    let mut rows = Vec::new();

    for result in reader.records() {
        let record = result?;
        if record.iter().all(|cell| cell.is_empty()) {
            continue;
        }

        match record.deserialize::<ProjectionRow>(Some(&headers)) {
            Ok(row) => rows.push(row),
            Err(err) => {
                let line = record.position().map(|p| p.line()).unwrap_or_default();
                warn!(line, error = %err, "unreadable record, keeping it as an empty row");
                rows.push(ProjectionRow::default());
            }
        }
    }

    Ok(rows)
}

/// Blanks out every repeat of a column title so only its first column is
/// read. A repeated field would otherwise fail every record.
fn dedup_headers(headers: &csv::StringRecord) -> csv::StringRecord {
    let mut seen: Vec<&str> = Vec::with_capacity(headers.len());
    let mut out = csv::StringRecord::with_capacity(headers.as_slice().len(), headers.len());
    for (column, title) in headers.iter().enumerate() {
        if !title.is_empty() && seen.contains(&title) {
            warn!(column, title, "repeated column, ignoring this copy");
            out.push_field("");
        } else {
            seen.push(title);
            out.push_field(title);
        }
    }
    out
}

pub async fn fetch_text(source: &DataSource) -> Result<String, LoadError> {
    match source {
        DataSource::Path(path) => tokio::fs::read_to_string(path)
            .await
            .map_err(|source| LoadError::Io {
                path: path.clone(),
                source,
            }),
        DataSource::Url(url) => {
            let response = reqwest::Client::new()
                .get(url)
                .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
                .send()
                .await
                .map_err(|source| LoadError::Http {
                    url: url.clone(),
                    source,
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(LoadError::Status {
                    url: url.clone(),
                    status,
                });
            }

            response.text().await.map_err(|source| LoadError::Http {
                url: url.clone(),
                source,
            })
        }
    }
}

async fn try_load(source: &DataSource) -> Result<Vec<ProjectionRow>, LoadError> {
    let text = fetch_text(source).await?;
    parse_rows(&text)
}

/// Fetch and parse the projection. Failures are logged and produce an empty
/// sequence so the dashboard still comes up, just with empty charts.
pub async fn load_rows(source: &DataSource) -> Vec<ProjectionRow> {
    match try_load(source).await {
        Ok(rows) => {
            info!(%source, rows = rows.len(), "projection loaded");
            rows
        }
        Err(err) => {
            error!(%source, error = %err, "failed to load projection");
            Vec::new()
        }
    }
}

/// Load the projection on the tokio runtime and hand the rows to the UI
/// thread. Must be called from within a runtime.
pub fn spawn_load(source: DataSource, sender: Sender<LoadMessage>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let rows = load_rows(&source).await;
        if sender.send(LoadMessage::Rows(rows)).is_err() {
            debug!(%source, "dashboard closed before the projection arrived");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use std::sync::mpsc;

    const FULL_HEADER: &str = "Year,Market Return (%),Portfolio (Selling $20K),\
Portfolio (Using Margin - No Repay),Portfolio (Using Margin - Oscillating Repayment),\
Margin Loan Balance (No Repay),Margin Loan Balance (Oscillating Repayments),Random Repayment %";

    #[test]
    fn parses_two_row_example() {
        let text = "Year,Market Return (%),Portfolio (Selling $20K)\n1,5.0,100000\n2,-3.2,95000";
        let rows = parse_rows(text).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            ProjectionRow {
                year: Some(1),
                market_return_percent: Some(5.0),
                portfolio_selling_strategy: Some(100000.0),
                ..Default::default()
            }
        );
        assert_eq!(
            rows[1],
            ProjectionRow {
                year: Some(2),
                market_return_percent: Some(-3.2),
                portfolio_selling_strategy: Some(95000.0),
                ..Default::default()
            }
        );
    }

    #[test]
    fn maps_every_column() {
        let text = format!("{FULL_HEADER}\n3,7.5,110000,120000,118000,25000,12000,42.5\n");
        let rows = parse_rows(&text).unwrap();

        assert_eq!(
            rows,
            vec![ProjectionRow {
                year: Some(3),
                market_return_percent: Some(7.5),
                portfolio_selling_strategy: Some(110000.0),
                portfolio_margin_no_repay: Some(120000.0),
                portfolio_margin_oscillating: Some(118000.0),
                margin_balance_no_repay: Some(25000.0),
                margin_balance_oscillating: Some(12000.0),
                random_repayment_percent: Some(42.5),
            }]
        );
    }

    #[test]
    fn header_titles_match_series_keys() {
        let headers: Vec<&str> = FULL_HEADER.split(',').collect();
        let from_keys: Vec<&str> = std::iter::once(YEAR_HEADER)
            .chain(SeriesKey::ALL.iter().map(|k| k.header()))
            .collect();
        assert_eq!(headers, from_keys);

        // Every column lands in its own field.
        let row = &parse_rows(&format!("{FULL_HEADER}\n1,2,3,4,5,6,7,8")).unwrap()[0];
        let values: Vec<Option<f64>> = SeriesKey::ALL.iter().map(|k| k.value(row)).collect();
        let expected: Vec<Option<f64>> = (2..=8u8).map(|v| Some(f64::from(v))).collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn repeated_column_keeps_first_copy() {
        let rows = parse_rows("Year,Market Return (%),Year\n1,5.0,9\n2,-3.2,\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].year, Some(1));
        assert_eq!(rows[0].market_return_percent, Some(5.0));
        assert_eq!(rows[1].year, Some(2));
        assert_eq!(rows[1].market_return_percent, Some(-3.2));
    }

    #[test]
    fn skips_blank_lines() {
        let text = "Year,Market Return (%)\n\n1,2.0\n   \n,\n2,3.0\n\n";
        let rows = parse_rows(text).unwrap();
        let years: Vec<_> = rows.iter().map(|r| r.year).collect();
        assert_eq!(years, vec![Some(1), Some(2)]);
    }

    #[test]
    fn malformed_cells_become_none() {
        let text = "Year,Market Return (%),Random Repayment %\n1,abc,\n2,NaN,12.5\nx,4.0,1e400\n";
        let rows = parse_rows(text).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].market_return_percent, None);
        assert_eq!(rows[0].random_repayment_percent, None);
        assert_eq!(rows[1].market_return_percent, None);
        assert_eq!(rows[1].random_repayment_percent, Some(12.5));
        assert_eq!(rows[2].year, None);
        assert_eq!(rows[2].market_return_percent, Some(4.0));
        assert_eq!(rows[2].random_repayment_percent, None);
    }

    #[test]
    fn year_accepts_whole_floats_only() {
        let text = "Year\n4.0\n4.5\n-1\n";
        let rows = parse_rows(text).unwrap();
        let years: Vec<_> = rows.iter().map(|r| r.year).collect();
        assert_eq!(years, vec![Some(4), None, None]);
    }

    #[test]
    fn columns_may_come_in_any_order_with_extras() {
        let text = " Random Repayment % , Notes ,Year\n 10.0 , first year , 1 \n";
        let rows = parse_rows(text).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].year, Some(1));
        assert_eq!(rows[0].random_repayment_percent, Some(10.0));
        assert_eq!(rows[0].market_return_percent, None);
    }

    #[test]
    fn short_records_keep_their_leading_cells() {
        let text = "Year,Market Return (%),Random Repayment %\n1,2.5\n";
        let rows = parse_rows(text).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].market_return_percent, Some(2.5));
        assert_eq!(rows[0].random_repayment_percent, None);
    }

    #[test]
    fn empty_text_has_no_rows() {
        assert!(parse_rows("").unwrap().is_empty());
        assert!(parse_rows(FULL_HEADER).unwrap().is_empty());
    }

    #[test]
    fn source_detects_urls() {
        assert_eq!(
            DataSource::parse("https://example.com/p.csv"),
            DataSource::Url("https://example.com/p.csv".to_string())
        );
        assert_eq!(
            DataSource::parse("data/p.csv"),
            DataSource::Path(PathBuf::from("data/p.csv"))
        );
    }

    proptest! {
        #[test]
        fn parse_preserves_count_order_and_is_repeatable(
            rows in proptest::collection::vec((1u32..200, proptest::option::of(-1.0e7f64..1.0e7)), 0..40)
        ) {
            let mut text = String::from("Year,Market Return (%)\n");
            for (year, ret) in &rows {
                let cell = ret.map(|v| v.to_string()).unwrap_or_default();
                text.push_str(&format!("{year},{cell}\n"));
            }

            let parsed = parse_rows(&text).unwrap();
            prop_assert_eq!(parsed.len(), rows.len());
            for (row, (year, ret)) in parsed.iter().zip(&rows) {
                prop_assert_eq!(row.year, Some(*year));
                prop_assert_eq!(row.market_return_percent, *ret);
            }
            prop_assert_eq!(parse_rows(&text).unwrap(), parsed);
        }
    }

    #[tokio::test]
    async fn missing_file_loads_as_empty() {
        let source = DataSource::Path(PathBuf::from("/nonexistent/projection.csv"));
        assert!(matches!(fetch_text(&source).await, Err(LoadError::Io { .. })));
        assert!(load_rows(&source).await.is_empty());
    }

    #[tokio::test]
    async fn unreachable_url_loads_as_empty() {
        let source = DataSource::Url("http://127.0.0.1:9/projection.csv".to_string());
        assert!(load_rows(&source).await.is_empty());
    }

    #[tokio::test]
    async fn loads_rows_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{FULL_HEADER}").unwrap();
        writeln!(file, "1,5.0,100000,100000,100000,20000,20000,30.0").unwrap();
        writeln!(file, "2,-3.2,95000,97000,96000,21000,15000,55.0").unwrap();

        let rows = load_rows(&DataSource::Path(file.path().to_path_buf())).await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].margin_balance_oscillating, Some(15000.0));
    }

    #[tokio::test]
    async fn spawned_load_reports_empty_rows_on_failure() {
        let (tx, rx) = mpsc::channel();
        let source = DataSource::Path(PathBuf::from("/nonexistent/projection.csv"));
        spawn_load(source, tx).await.unwrap();

        match rx.try_recv() {
            Ok(LoadMessage::Rows(rows)) => assert!(rows.is_empty()),
            other => panic!("expected rows message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn spawned_load_tolerates_closed_dashboard() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let source = DataSource::Path(PathBuf::from("/nonexistent/projection.csv"));
        assert!(spawn_load(source, tx).await.is_ok());
    }
}
