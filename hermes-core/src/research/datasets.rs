//! Tabular dataset tools: World Bank, FRED, Alpha Vantage

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{
    CATEGORY, DEFAULT_END_YEAR, DEFAULT_START_YEAR, ResearchBase, ResearchToolOptions, field,
    object, parse_number, parse_year, span_years,
};
use crate::config::HttpConfig;
use crate::error::Result;
use crate::secrets::SecretsProvider;
use crate::tools::{
    ExecutionContext, OutputKind, Payload, RawPayload, Scope, ToolContract, ToolSpec,
};

/// Development indicators per country from the World Bank API
#[derive(Debug)]
pub struct DatasetsWorldWorldBank {
    base: ResearchBase,
}

impl DatasetsWorldWorldBank {
    /// Tool name
    pub const NAME: &'static str = "DatasetsWorldWorldBank";
    const BASE_URL: &'static str = "https://api.worldbank.org/v2";

    /// Build with default options
    pub fn new(http: &HttpConfig, secrets: &dyn SecretsProvider) -> Result<Self> {
        Self::with_options(http, secrets, &ResearchToolOptions::default())
    }

    /// Build with per-instance overrides
    pub fn with_options(
        http: &HttpConfig,
        secrets: &dyn SecretsProvider,
        options: &ResearchToolOptions,
    ) -> Result<Self> {
        let builder = ToolSpec::builder(Self::NAME, CATEGORY, Scope::World, OutputKind::Dataset)
            .description("Macro and development indicators from the World Bank API")
            .input("country_code")
            .input("series")
            .optional_input("start_year")
            .optional_input("end_year")
            .ttl("7d");

        Ok(Self {
            base: ResearchBase::new(builder, Self::BASE_URL, http, secrets, options)?,
        })
    }
}

#[async_trait]
impl ToolContract for DatasetsWorldWorldBank {
    fn spec(&self) -> &ToolSpec {
        self.base.spec()
    }

    async fn call_providers(&self, ctx: &ExecutionContext) -> Result<RawPayload> {
        let country = self.base.input(ctx, "country_code")?;
        let series = self.base.input(ctx, "series")?;
        let span = span_years(
            self.base.year(ctx, "start_year", DEFAULT_START_YEAR)?,
            self.base.year(ctx, "end_year", DEFAULT_END_YEAR)?,
        )?;

        let url = self
            .base
            .segment_url(&["country", &country, "indicator", &series])?;
        self.base
            .get_json(&url, &[("date", span), ("format", "json".to_string())], &[])
            .await
    }

    fn normalize(&self, raw: RawPayload, _ctx: &ExecutionContext) -> Result<Payload> {
        let raw = raw.into_json(self.name())?;

        let rows = match &raw {
            Value::Array(parts) if parts.len() > 1 => parts[1].as_array().cloned().unwrap_or_default(),
            _ => Vec::new(),
        };
        let meta = match &raw {
            Value::Array(parts) => parts.first().cloned().unwrap_or_else(|| json!({})),
            _ => json!({}),
        };

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            let date = parse_year(&field(row, "date"))
                .map_err(|e| self.base.normalization_error(e))?;
            items.push(json!({
                "country": row.pointer("/country/id").cloned().unwrap_or(Value::Null),
                "indicator": row.pointer("/indicator/id").cloned().unwrap_or(Value::Null),
                "date": date,
                "value": field(row, "value"),
                "unit": field(row, "unit"),
            }));
        }

        Ok(object(json!({ "items": items, "meta": meta })))
    }
}

/// Sector time series from the FRED API
#[derive(Debug)]
pub struct DatasetsSectorFRED {
    base: ResearchBase,
}

impl DatasetsSectorFRED {
    /// Tool name
    pub const NAME: &'static str = "DatasetsSectorFRED";
    /// API key credential
    pub const API_KEY: &'static str = "FRED_API_KEY";
    const BASE_URL: &'static str = "https://api.stlouisfed.org/fred/series/observations";

    /// Build with default options
    pub fn new(http: &HttpConfig, secrets: &dyn SecretsProvider) -> Result<Self> {
        Self::with_options(http, secrets, &ResearchToolOptions::default())
    }

    /// Build with per-instance overrides
    pub fn with_options(
        http: &HttpConfig,
        secrets: &dyn SecretsProvider,
        options: &ResearchToolOptions,
    ) -> Result<Self> {
        let builder = ToolSpec::builder(Self::NAME, CATEGORY, Scope::Sector, OutputKind::Dataset)
            .description("Economic time series observations from the FRED API")
            .input("series_id")
            .input("start_date")
            .input("end_date")
            .optional_input("frequency")
            .ttl("7d")
            .rate_limit(5.0)
            .requires_credential(Self::API_KEY);

        Ok(Self {
            base: ResearchBase::new(builder, Self::BASE_URL, http, secrets, options)?,
        })
    }
}

#[async_trait]
impl ToolContract for DatasetsSectorFRED {
    fn spec(&self) -> &ToolSpec {
        self.base.spec()
    }

    async fn call_providers(&self, ctx: &ExecutionContext) -> Result<RawPayload> {
        let mut query = vec![
            ("series_id", self.base.input(ctx, "series_id")?),
            ("observation_start", self.base.input(ctx, "start_date")?),
            ("observation_end", self.base.input(ctx, "end_date")?),
            ("api_key", self.base.credential(Self::API_KEY)?.to_string()),
            ("file_type", "json".to_string()),
        ];
        if let Some(frequency) = ctx.get_string("frequency").filter(|f| !f.is_empty()) {
            query.push(("frequency", frequency));
        }

        self.base.get_json(self.base.base_url(), &query, &[]).await
    }

    fn normalize(&self, raw: RawPayload, ctx: &ExecutionContext) -> Result<Payload> {
        let raw = raw.into_json(self.name())?;
        let fallback_series = raw
            .get("series_id")
            .cloned()
            .filter(|v| !v.is_null())
            .or_else(|| ctx.get("series_id").cloned())
            .unwrap_or(Value::Null);

        let mut items = Vec::new();
        for obs in super::array_at(&raw, "/observations") {
            let value = parse_number(&field(obs, "value"))
                .map_err(|e| self.base.normalization_error(e))?;
            let series = obs
                .get("series_id")
                .cloned()
                .filter(|v| !v.is_null())
                .unwrap_or_else(|| fallback_series.clone());
            items.push(json!({
                "series_id": series,
                "date": field(obs, "date"),
                "value": value,
            }));
        }

        Ok(object(json!({ "items": items, "units": field(&raw, "units") })))
    }
}

/// Daily stock prices from the Alpha Vantage API
#[derive(Debug)]
pub struct DatasetsCompanyAlphaVantage {
    base: ResearchBase,
}

impl DatasetsCompanyAlphaVantage {
    /// Tool name
    pub const NAME: &'static str = "DatasetsCompanyAlphaVantage";
    /// API key credential
    pub const API_KEY: &'static str = "ALPHAVANTAGE_KEY";
    const BASE_URL: &'static str = "https://www.alphavantage.co/query";
    const SERIES_KEY: &'static str = "Time Series (Daily)";

    /// Build with default options
    pub fn new(http: &HttpConfig, secrets: &dyn SecretsProvider) -> Result<Self> {
        Self::with_options(http, secrets, &ResearchToolOptions::default())
    }

    /// Build with per-instance overrides
    pub fn with_options(
        http: &HttpConfig,
        secrets: &dyn SecretsProvider,
        options: &ResearchToolOptions,
    ) -> Result<Self> {
        let builder = ToolSpec::builder(Self::NAME, CATEGORY, Scope::Company, OutputKind::Dataset)
            .description("Daily stock prices from the Alpha Vantage API")
            .input("symbol")
            .optional_input("adjusted")
            .optional_input("outputsize")
            .ttl("12h")
            .rate_limit(0.2)
            .requires_credential(Self::API_KEY);

        Ok(Self {
            base: ResearchBase::new(builder, Self::BASE_URL, http, secrets, options)?,
        })
    }
}

#[async_trait]
impl ToolContract for DatasetsCompanyAlphaVantage {
    fn spec(&self) -> &ToolSpec {
        self.base.spec()
    }

    async fn call_providers(&self, ctx: &ExecutionContext) -> Result<RawPayload> {
        let function = if ctx.get_bool("adjusted").unwrap_or(true) {
            "TIME_SERIES_DAILY_ADJUSTED"
        } else {
            "TIME_SERIES_DAILY"
        };
        let query = [
            ("function", function.to_string()),
            ("symbol", self.base.input(ctx, "symbol")?),
            ("apikey", self.base.credential(Self::API_KEY)?.to_string()),
            (
                "outputsize",
                ctx.get_string("outputsize")
                    .unwrap_or_else(|| "compact".to_string()),
            ),
        ];

        self.base.get_json(self.base.base_url(), &query, &[]).await
    }

    fn normalize(&self, raw: RawPayload, _ctx: &ExecutionContext) -> Result<Payload> {
        let raw = raw.into_json(self.name())?;
        if let Some(message) = raw.get("Error Message").and_then(Value::as_str) {
            return Err(self.base.normalization_error(message));
        }

        let symbol = raw
            .pointer("/Meta Data/2. Symbol")
            .cloned()
            .unwrap_or(Value::Null);
        let price = |row: &Value, key: &str| -> Result<Value> {
            match parse_number(&field(row, key)).map_err(|e| self.base.normalization_error(e))? {
                Value::Null => Ok(json!(0.0)),
                value => Ok(value),
            }
        };

        let mut items = Vec::new();
        if let Some(series) = raw.get(Self::SERIES_KEY).and_then(Value::as_object) {
            let mut dates: Vec<&String> = series.keys().collect();
            dates.sort();
            for date in dates {
                let row = &series[date.as_str()];
                let volume = if row.get("6. volume").is_some() {
                    price(row, "6. volume")?
                } else {
                    price(row, "5. volume")?
                };
                items.push(json!({
                    "symbol": symbol,
                    "date": date,
                    "open": price(row, "1. open")?,
                    "high": price(row, "2. high")?,
                    "low": price(row, "3. low")?,
                    "close": price(row, "4. close")?,
                    "volume": volume,
                }));
            }
        }

        Ok(object(json!({ "items": items })))
    }
}
