//! Report and filing tools: World Bank documents, SEC EDGAR, CVM open data

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::BTreeMap;

use super::{CATEGORY, ResearchBase, ResearchToolOptions, array_at, field, first_present, object};
use crate::config::HttpConfig;
use crate::error::{HermesError, Result};
use crate::secrets::SecretsProvider;
use crate::tools::{
    ExecutionContext, OutputKind, Payload, RawPayload, Scope, ToolContract, ToolSpec,
    binary_payload,
};

/// Development reports from the World Bank Documents & Reports API
#[derive(Debug)]
pub struct GeneralReportsWorldWDS {
    base: ResearchBase,
}

impl GeneralReportsWorldWDS {
    /// Tool name
    pub const NAME: &'static str = "GeneralReportsWorldWDS";
    const BASE_URL: &'static str = "https://documents.worldbank.org/api/v3/search";
    const DEFAULT_ROWS: i64 = 50;

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
        .description("Development reports from the World Bank Documents & Reports API")
        .input("start_year")
        .input("end_year")
        .optional_input("q")
        .optional_input("rows")
        .ttl("30d");

        Ok(Self {
            base: ResearchBase::new(builder, Self::BASE_URL, http, secrets, options)?,
        })
    }

    /// Documents arrive either keyed by id or as a list
    fn documents(raw: &Value) -> Vec<&Value> {
        match raw.get("documents") {
            Some(Value::Object(docs)) if !docs.is_empty() => {
                docs.values().filter(|d| d.is_object()).collect()
            }
            Some(Value::Array(docs)) if !docs.is_empty() => docs.iter().collect(),
            _ => array_at(raw, "/result/docs").iter().collect(),
        }
    }
}

#[async_trait]
impl ToolContract for GeneralReportsWorldWDS {
    fn spec(&self) -> &ToolSpec {
        self.base.spec()
    }

    async fn call_providers(&self, ctx: &ExecutionContext) -> Result<RawPayload> {
        let rows = ctx.get_i64("rows").unwrap_or(Self::DEFAULT_ROWS);
        let mut query = vec![
            ("format", "json".to_string()),
            ("start_year", self.base.input(ctx, "start_year")?),
            ("end_year", self.base.input(ctx, "end_year")?),
            ("rows", rows.to_string()),
        ];
        if let Some(q) = ctx.get_string("q").filter(|q| !q.is_empty()) {
            query.push(("q", q));
        }

        self.base.get_json(self.base.base_url(), &query, &[]).await
    }

    fn normalize(&self, raw: RawPayload, _ctx: &ExecutionContext) -> Result<Payload> {
        let raw = raw.into_json(self.name())?;

        let items: Vec<Value> = Self::documents(&raw)
            .into_iter()
            .map(|doc| {
                json!({
                    "title": first_present(doc, &["display_title", "title"]),
                    "year": first_present(doc, &["disclosure_year", "publication_year"]),
                    "url": first_present(doc, &["pdfurl", "doc_url", "url"]),
                    "region": field(doc, "region"),
                    "topics": field(doc, "topics"),
                })
            })
            .collect();

        Ok(object(json!({ "items": items })))
    }
}

/// Recent company filings from the SEC EDGAR submissions API
#[derive(Debug)]
pub struct GeneralReportsSectorSECEdgar {
    base: ResearchBase,
}

impl GeneralReportsSectorSECEdgar {
    /// Tool name
    pub const NAME: &'static str = "GeneralReportsSectorSECEdgar";
    /// Request headers as a JSON object, or a bare User-Agent string
    pub const HEADERS_KEY: &'static str = "SEC_EDGAR_API";
    const BASE_URL: &'static str = "https://data.sec.gov/submissions";

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
        .description("Recent filings for a CIK from the SEC EDGAR submissions API")
        .input("cik")
        .ttl("7d")
        .requires_credential(Self::HEADERS_KEY);

        Ok(Self {
            base: ResearchBase::new(builder, Self::BASE_URL, http, secrets, options)?,
        })
    }

    fn headers(&self) -> Result<Vec<(String, String)>> {
        let raw = self.base.credential(Self::HEADERS_KEY)?;
        Ok(match serde_json::from_str::<BTreeMap<String, String>>(raw) {
            Ok(headers) => headers.into_iter().collect(),
            Err(_) => vec![("User-Agent".to_string(), raw.to_string())],
        })
    }

    /// CIK left-padded with zeros to ten digits
    fn padded_cik(&self, cik: &str) -> Result<String> {
        let cik = cik.trim();
        if cik.is_empty() || !cik.chars().all(|c| c.is_ascii_digit()) {
            return Err(HermesError::Other(format!(
                "[{}] cik must be numeric, got {:?}",
                self.name(),
                cik
            )));
        }
        Ok(format!("{:0>10}", cik))
    }
}

#[async_trait]
impl ToolContract for GeneralReportsSectorSECEdgar {
    fn spec(&self) -> &ToolSpec {
        self.base.spec()
    }

    async fn call_providers(&self, ctx: &ExecutionContext) -> Result<RawPayload> {
        let cik = self.padded_cik(&self.base.input(ctx, "cik")?)?;
        let headers = self.headers()?;
        let headers: Vec<(&str, &str)> = headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let url = self.base.url(&format!("/CIK{}.json", cik));
        self.base.get_json(&url, &[], &headers).await
    }

    fn normalize(&self, raw: RawPayload, _ctx: &ExecutionContext) -> Result<Payload> {
        let raw = raw.into_json(self.name())?;

        let accessions = array_at(&raw, "/filings/recent/accessionNumber");
        let forms = array_at(&raw, "/filings/recent/form");
        let dates = array_at(&raw, "/filings/recent/filingDate");

        let items: Vec<Value> = accessions
            .iter()
            .zip(forms)
            .zip(dates)
            .map(|((accession, form), date)| {
                json!({ "accession": accession, "form": form, "filing_date": date })
            })
            .collect();

        Ok(object(json!({ "items": items })))
    }
}

/// Files from the CVM (Brazilian SEC) open data portal
///
/// CSV files come back as row objects; anything else as raw bytes.
#[derive(Debug)]
pub struct GeneralReportsCompanyCVMDadosAbertos {
    base: ResearchBase,
}

impl GeneralReportsCompanyCVMDadosAbertos {
    /// Tool name
    pub const NAME: &'static str = "GeneralReportsCompanyCVMDadosAbertos";
    const BASE_URL: &'static str = "https://dados.cvm.gov.br";
    const FALLBACK_FILENAME: &'static str = "download";
    const MAX_ROWS: usize = 1000;

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
        .description("Files from the CVM Dados Abertos portal, CSV parsed into rows")
        .input("path")
        .ttl("30d");

        Ok(Self {
            base: ResearchBase::new(builder, Self::BASE_URL, http, secrets, options)?,
        })
    }

    fn normalized_path(path: &str) -> String {
        if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        }
    }

    /// Rows of a delimited text file keyed by header, or `None` when the
    /// body does not parse as one.
    fn csv_items(bytes: &[u8]) -> Option<Payload> {
        let text = String::from_utf8_lossy(bytes);
        if text.contains('\0') {
            return None;
        }
        let header = text.lines().next().filter(|line| !line.trim().is_empty())?;
        let delimiter = if header.matches(';').count() > header.matches(',').count() {
            b';'
        } else {
            b','
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(false)
            .from_reader(text.as_bytes());
        let headers = reader.headers().ok()?.clone();

        let mut items = Vec::new();
        let mut truncated = false;
        for record in reader.records() {
            let record = record.ok()?;
            if items.len() == Self::MAX_ROWS {
                truncated = true;
                break;
            }
            let row: serde_json::Map<String, Value> = headers
                .iter()
                .zip(record.iter())
                .map(|(name, value)| (name.to_string(), Value::String(value.to_string())))
                .collect();
            items.push(Value::Object(row));
        }

        Some(object(json!({ "items": items, "truncated": truncated })))
    }

    /// Last non-empty segment of `path`
    fn filename(path: &str) -> String {
        path.split('?')
            .next()
            .unwrap_or_default()
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or(Self::FALLBACK_FILENAME)
            .to_string()
    }
}

#[async_trait]
impl ToolContract for GeneralReportsCompanyCVMDadosAbertos {
    fn spec(&self) -> &ToolSpec {
        self.base.spec()
    }

    async fn call_providers(&self, ctx: &ExecutionContext) -> Result<RawPayload> {
        let path = Self::normalized_path(&self.base.input(ctx, "path")?);
        self.base.get_bytes(&self.base.url(&path)).await
    }

    fn normalize(&self, raw: RawPayload, ctx: &ExecutionContext) -> Result<Payload> {
        let bytes = raw.into_bytes(self.name())?;
        if let Some(rows) = Self::csv_items(&bytes) {
            return Ok(rows);
        }

        tracing::debug!(tool = %self.name(), "body is not CSV; returning raw bytes");
        let filename = ctx
            .get_str("path")
            .map(Self::filename)
            .unwrap_or_else(|| Self::FALLBACK_FILENAME.to_string());
        Ok(binary_payload(&bytes, filename))
    }
}
