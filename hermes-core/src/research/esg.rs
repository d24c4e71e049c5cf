//! ESG indicator tools: UN SDG and WikiRate

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{
    CATEGORY, DEFAULT_END_YEAR, DEFAULT_START_YEAR, ResearchBase, ResearchToolOptions, array_at,
    field, first_present, object, parse_number, parse_year, span_years,
};
use crate::config::HttpConfig;
use crate::error::Result;
use crate::secrets::SecretsProvider;
use crate::tools::{
    ExecutionContext, OutputKind, Payload, RawPayload, Scope, ToolContract, ToolSpec,
};

/// Sustainable Development Goal series from the UN SDG API
#[derive(Debug)]
pub struct ESGReportsWorldUNSDG {
    base: ResearchBase,
}

impl ESGReportsWorldUNSDG {
    /// Tool name
    pub const NAME: &'static str = "ESGReportsWorldUNSDG";
    const BASE_URL: &'static str = "https://unstats.un.org/SDGAPI/v1/sdg/Series/Data";

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
        let builder = ToolSpec::builder(
            Self::NAME,
            CATEGORY,
            Scope::World,
            OutputKind::ResearchBundle,
        )
        .description("Sustainable Development Goal indicator series from the UN SDG API")
        .input("series_code")
        .optional_input("country_code")
        .optional_input("start_year")
        .optional_input("end_year")
        .ttl("7d");

        Ok(Self {
            base: ResearchBase::new(builder, Self::BASE_URL, http, secrets, options)?,
        })
    }
}

#[async_trait]
impl ToolContract for ESGReportsWorldUNSDG {
    fn spec(&self) -> &ToolSpec {
        self.base.spec()
    }

    async fn call_providers(&self, ctx: &ExecutionContext) -> Result<RawPayload> {
        let span = span_years(
            self.base.year(ctx, "start_year", DEFAULT_START_YEAR)?,
            self.base.year(ctx, "end_year", DEFAULT_END_YEAR)?,
        )?;
        let mut query = vec![
            ("seriesCode", self.base.input(ctx, "series_code")?),
            ("timePeriod", span),
        ];
        if let Some(area) = ctx.get_string("country_code").filter(|c| !c.is_empty()) {
            query.push(("areaCode", area));
        }

        self.base.get_json(self.base.base_url(), &query, &[]).await
    }

    fn normalize(&self, raw: RawPayload, _ctx: &ExecutionContext) -> Result<Payload> {
        let raw = raw.into_json(self.name())?;
        let series_code = field(&raw, "seriesCode");

        let mut items = Vec::new();
        for row in array_at(&raw, "/data") {
            let series = match first_present(row, &["series"]) {
                Value::Null => series_code.clone(),
                series => series,
            };
            items.push(json!({
                "series": series,
                "country": field(row, "geoAreaCode"),
                "year": parse_year(&field(row, "timePeriod"))
                    .map_err(|e| self.base.normalization_error(e))?,
                "value": parse_number(&field(row, "value"))
                    .map_err(|e| self.base.normalization_error(e))?,
                "attributes": row.get("attributes").cloned().unwrap_or_else(|| json!({})),
            }));
        }

        let raw_meta: Payload = raw
            .as_object()
            .map(|map| {
                map.iter()
                    .filter(|(key, _)| key.as_str() != "data")
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(object(json!({ "items": items, "raw_meta": raw_meta })))
    }
}

const WIKIRATE_BASE_URL: &str = "https://wikirate.org";
const WIKIRATE_TOKEN: &str = "WIKIRATE_TOKEN";

/// `{base}/{metric}.json` with the metric percent-encoded as one segment
fn wikirate_metric_url(base: &ResearchBase, metric: &str) -> Result<String> {
    base.segment_url(&[&format!("{}.json", metric)])
}

/// Answers for one metric, optionally filtered by year
async fn wikirate_answers(
    base: &ResearchBase,
    ctx: &ExecutionContext,
    mut filters: Vec<(&str, String)>,
) -> Result<RawPayload> {
    let url = wikirate_metric_url(base, &base.input(ctx, "metric")?)?;

    filters.push(("api_key", base.credential(WIKIRATE_TOKEN)?.to_string()));
    if let Some(year) = ctx.get_string("year").filter(|y| !y.is_empty()) {
        filters.push(("filter[year]", year));
    }

    match base.get_json(&url, &filters, &[]).await? {
        RawPayload::Json(Value::Array(rows)) => Ok(RawPayload::Json(json!({ "data": rows }))),
        other => Ok(other),
    }
}

fn wikirate_items(base: &ResearchBase, raw: RawPayload, ctx: &ExecutionContext) -> Result<Payload> {
    let raw = raw.into_json(base.name())?;
    let metric = ctx.get("metric").cloned().unwrap_or(Value::Null);

    let items: Vec<Value> = array_at(&raw, "/data")
        .iter()
        .map(|row| {
            json!({
                "metric": metric,
                "company": first_present(row, &["company", "company_name"]),
                "year": field(row, "year"),
                "value": first_present(row, &["value", "answer"]),
                "meta": row,
            })
        })
        .collect();

    Ok(object(json!({ "items": items })))
}

/// ESG metric answers for an industry from WikiRate
#[derive(Debug)]
pub struct ESGReportsSectorWikiRate {
    base: ResearchBase,
}

impl ESGReportsSectorWikiRate {
    /// Tool name
    pub const NAME: &'static str = "ESGReportsSectorWikiRate";
    /// API token credential
    pub const API_KEY: &'static str = WIKIRATE_TOKEN;

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
        let builder = ToolSpec::builder(
            Self::NAME,
            CATEGORY,
            Scope::Sector,
            OutputKind::ResearchBundle,
        )
        .description("ESG metric answers for an industry from WikiRate")
        .input("metric")
        .input("industry")
        .optional_input("year")
        .optional_input("country")
        .ttl("7d")
        .requires_credential(WIKIRATE_TOKEN);

        Ok(Self {
            base: ResearchBase::new(builder, WIKIRATE_BASE_URL, http, secrets, options)?,
        })
    }
}

#[async_trait]
impl ToolContract for ESGReportsSectorWikiRate {
    fn spec(&self) -> &ToolSpec {
        self.base.spec()
    }

    async fn call_providers(&self, ctx: &ExecutionContext) -> Result<RawPayload> {
        let mut filters = vec![("filter[industry]", self.base.input(ctx, "industry")?)];
        if let Some(country) = ctx.get_string("country").filter(|c| !c.is_empty()) {
            filters.push(("filter[country]", country));
        }
        wikirate_answers(&self.base, ctx, filters).await
    }

    fn normalize(&self, raw: RawPayload, ctx: &ExecutionContext) -> Result<Payload> {
        wikirate_items(&self.base, raw, ctx)
    }
}

/// ESG metric answers for one company from WikiRate
#[derive(Debug)]
pub struct ESGReportsCompanyWikiRate {
    base: ResearchBase,
}

impl ESGReportsCompanyWikiRate {
    /// Tool name
    pub const NAME: &'static str = "ESGReportsCompanyWikiRate";
    /// API token credential
    pub const API_KEY: &'static str = WIKIRATE_TOKEN;

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
        let builder = ToolSpec::builder(
            Self::NAME,
            CATEGORY,
            Scope::Company,
            OutputKind::ResearchBundle,
        )
        .description("ESG metric answers for one company from WikiRate")
        .input("metric")
        .input("company_name")
        .optional_input("year")
        .ttl("12h")
        .requires_credential(WIKIRATE_TOKEN);

        Ok(Self {
            base: ResearchBase::new(builder, WIKIRATE_BASE_URL, http, secrets, options)?,
        })
    }
}

#[async_trait]
impl ToolContract for ESGReportsCompanyWikiRate {
    fn spec(&self) -> &ToolSpec {
        self.base.spec()
    }

    async fn call_providers(&self, ctx: &ExecutionContext) -> Result<RawPayload> {
        let filters = vec![("filter[company_name]", self.base.input(ctx, "company_name")?)];
        wikirate_answers(&self.base, ctx, filters).await
    }

    fn normalize(&self, raw: RawPayload, ctx: &ExecutionContext) -> Result<Payload> {
        wikirate_items(&self.base, raw, ctx)
    }
}
