//! Concrete research tools
//!
//! Every tool here is store-backed, registered under the `search` category
//! and, unless configured otherwise, callable only by `tester`. Each one owns
//! a [`ResilientHttpClient`] built from the shared [`HttpConfig`], so rate
//! limits apply per tool instance.
//!
//! | Tool | Scope | Output | TTL |
//! |---|---|---|---|
//! | [`DatasetsWorldWorldBank`] | world | dataset | 7d |
//! | [`DatasetsSectorFRED`] | sector | dataset | 7d |
//! | [`DatasetsCompanyAlphaVantage`] | company | dataset | 12h |
//! | [`NewsWorldGDELT`] | world | research_bundle | 1d |
//! | [`NewsCompanyRSS`] | company | research_bundle | 12h |
//! | [`GeneralReportsWorldWDS`] | world | research_bundle | 30d |
//! | [`GeneralReportsSectorSECEdgar`] | sector | research_bundle | 7d |
//! | [`GeneralReportsCompanyCVMDadosAbertos`] | company | research_bundle | 30d |
//! | [`ESGReportsWorldUNSDG`] | world | research_bundle | 7d |
//! | [`ESGReportsSectorWikiRate`] | sector | research_bundle | 7d |
//! | [`ESGReportsCompanyWikiRate`] | company | research_bundle | 12h |

mod datasets;
mod esg;
mod news;
mod reports;

pub use datasets::{DatasetsCompanyAlphaVantage, DatasetsSectorFRED, DatasetsWorldWorldBank};
pub use esg::{ESGReportsCompanyWikiRate, ESGReportsSectorWikiRate, ESGReportsWorldUNSDG};
pub use news::{NewsCompanyRSS, NewsWorldGDELT};
pub use reports::{
    GeneralReportsCompanyCVMDadosAbertos, GeneralReportsSectorSECEdgar, GeneralReportsWorldWDS,
};

use reqwest::Url;
use serde_json::{Number, Value};
use std::sync::Arc;

use crate::config::{HermesConfig, HttpConfig};
use crate::error::{HermesError, Result};
use crate::http::ResilientHttpClient;
use crate::secrets::{Credentials, SecretsProvider};
use crate::tools::{ExecutionContext, Payload, RawPayload, ToolContract, ToolRegistry, ToolSpec, ToolSpecBuilder};

/// Registry category of every research tool
pub const CATEGORY: &str = "search";

/// Caller admitted when no allowed callers are configured
pub const DEFAULT_CALLER: &str = "tester";

/// First year of a range when the context gives none
pub const DEFAULT_START_YEAR: i64 = 2010;

/// Last year of a range when the context gives none
pub const DEFAULT_END_YEAR: i64 = 2025;

/// Render an inclusive year range as `start:end`.
///
/// # Errors
///
/// Fails when `end < start`.
pub fn span_years(start: i64, end: i64) -> Result<String> {
    if end < start {
        return Err(HermesError::Other(format!(
            "end_year < start_year ({} < {})",
            end, start
        )));
    }
    Ok(format!("{}:{}", start, end))
}

/// Per-instance overrides for a research tool
#[derive(Debug, Clone, Default)]
pub struct ResearchToolOptions {
    /// Replaces the provider's public base URL
    pub base_url: Option<String>,
    /// Replaces the default allowed callers
    pub allowed_callers: Option<Vec<String>>,
}

impl ResearchToolOptions {
    /// Point the tool at another base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Replace the allowed callers; an empty list admits everyone
    pub fn with_allowed_callers<I, S>(mut self, callers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_callers = Some(callers.into_iter().map(Into::into).collect());
        self
    }
}

/// State shared by every research tool
#[derive(Debug)]
pub(crate) struct ResearchBase {
    spec: ToolSpec,
    http: ResilientHttpClient,
    credentials: Credentials,
    base_url: String,
}

impl ResearchBase {
    pub(crate) fn new(
        builder: ToolSpecBuilder,
        default_base_url: &str,
        http: &HttpConfig,
        secrets: &dyn SecretsProvider,
        options: &ResearchToolOptions,
    ) -> Result<Self> {
        let callers = options
            .allowed_callers
            .clone()
            .unwrap_or_else(|| vec![DEFAULT_CALLER.to_string()]);
        let spec = builder.allowed_callers(callers).store_backed().build()?;

        let credentials = Credentials::resolve(
            &spec.name,
            secrets,
            &spec.required_credentials,
            &spec.optional_credentials,
        )?;
        let client = ResilientHttpClient::new(spec.name.clone(), http, spec.rate_limit_per_sec)?;
        let base_url = options
            .base_url
            .clone()
            .unwrap_or_else(|| default_base_url.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            spec,
            http: client,
            credentials,
            base_url,
        })
    }

    pub(crate) fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    pub(crate) fn name(&self) -> &str {
        &self.spec.name
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Base URL joined with `path`
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Base URL with each of `segments` appended as one escaped path segment
    pub(crate) fn segment_url(&self, segments: &[&str]) -> Result<String> {
        let invalid = || {
            HermesError::Configuration(format!(
                "[{}] invalid base url {}",
                self.spec.name, self.base_url
            ))
        };

        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(url.to_string())
    }

    pub(crate) fn credential(&self, name: &str) -> Result<&str> {
        self.credentials.require(name)
    }

    /// A context value that validation guaranteed, rendered as text
    pub(crate) fn input(&self, ctx: &ExecutionContext, key: &str) -> Result<String> {
        ctx.get_string(key).ok_or_else(|| HermesError::Validation {
            tool: self.spec.name.clone(),
            missing: vec![key.to_string()],
        })
    }

    /// A year from the context, or `default` when absent
    pub(crate) fn year(&self, ctx: &ExecutionContext, key: &str, default: i64) -> Result<i64> {
        match ctx.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(_) => ctx.get_i64(key).ok_or_else(|| {
                HermesError::Other(format!("[{}] {} must be an integer year", self.spec.name, key))
            }),
        }
    }

    pub(crate) async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, &str)],
    ) -> Result<RawPayload> {
        self.http.get_json(url, query, headers).await.map(RawPayload::Json)
    }

    pub(crate) async fn get_bytes(&self, url: &str) -> Result<RawPayload> {
        self.http.get_bytes(url, &[], &[]).await.map(RawPayload::Bytes)
    }

    pub(crate) fn normalization_error(&self, message: impl Into<String>) -> HermesError {
        HermesError::normalization(self.spec.name.clone(), message)
    }
}

/// Object payload from a `json!` literal
pub(crate) fn object(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        _ => Payload::new(),
    }
}

/// `row[key]`, or null
pub(crate) fn field(row: &Value, key: &str) -> Value {
    row.get(key).cloned().unwrap_or(Value::Null)
}

/// First of `keys` whose value is neither null nor an empty string
pub(crate) fn first_present(row: &Value, keys: &[&str]) -> Value {
    keys.iter()
        .filter_map(|key| row.get(*key))
        .find(|value| match value {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            _ => true,
        })
        .cloned()
        .unwrap_or(Value::Null)
}

/// Array at a JSON pointer, or an empty slice
pub(crate) fn array_at<'a>(value: &'a Value, pointer: &str) -> &'a [Value] {
    value
        .pointer(pointer)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Numeric value from a number or numeric string; null, `""` and `"."`
/// become null
pub(crate) fn parse_number(value: &Value) -> std::result::Result<Value, String> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Number(_) => Ok(value.clone()),
        Value::String(s) if s.trim().is_empty() || s.trim() == "." => Ok(Value::Null),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("invalid number {:?}", s)),
        other => Err(format!("invalid number {}", other)),
    }
}

/// Integer year from a number or string (`2020`, `"2020"`, `2020.0`);
/// null and `""` become null
pub(crate) fn parse_year(value: &Value) -> std::result::Result<Value, String> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::String(s) if s.trim().is_empty() => Ok(Value::Null),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .map(Value::from)
            .ok_or_else(|| format!("invalid year {}", n)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.fract() == 0.0)
                        .map(|f| f as i64)
                })
                .map(Value::from)
                .ok_or_else(|| format!("invalid year {:?}", s))
        }
        other => Err(format!("invalid year {}", other)),
    }
}

/// Build every research tool whose credentials resolve.
///
/// Tools that fail to build (typically a missing credential) are skipped
/// with a warning.
pub fn default_registry(config: &HermesConfig, secrets: &dyn SecretsProvider) -> ToolRegistry {
    let http = &config.http;
    let options = ResearchToolOptions::default();

    let builders: Vec<(&str, Result<Arc<dyn ToolContract>>)> = vec![
        (
            "DatasetsWorldWorldBank",
            DatasetsWorldWorldBank::with_options(http, secrets, &options).map(into_boxed),
        ),
        (
            "DatasetsSectorFRED",
            DatasetsSectorFRED::with_options(http, secrets, &options).map(into_boxed),
        ),
        (
            "DatasetsCompanyAlphaVantage",
            DatasetsCompanyAlphaVantage::with_options(http, secrets, &options).map(into_boxed),
        ),
        (
            "NewsWorldGDELT",
            NewsWorldGDELT::with_options(http, secrets, &options).map(into_boxed),
        ),
        (
            "NewsCompanyRSS",
            NewsCompanyRSS::with_options(http, secrets, &options).map(into_boxed),
        ),
        (
            "GeneralReportsWorldWDS",
            GeneralReportsWorldWDS::with_options(http, secrets, &options).map(into_boxed),
        ),
        (
            "GeneralReportsSectorSECEdgar",
            GeneralReportsSectorSECEdgar::with_options(http, secrets, &options).map(into_boxed),
        ),
        (
            "GeneralReportsCompanyCVMDadosAbertos",
            GeneralReportsCompanyCVMDadosAbertos::with_options(http, secrets, &options)
                .map(into_boxed),
        ),
        (
            "ESGReportsWorldUNSDG",
            ESGReportsWorldUNSDG::with_options(http, secrets, &options).map(into_boxed),
        ),
        (
            "ESGReportsSectorWikiRate",
            ESGReportsSectorWikiRate::with_options(http, secrets, &options).map(into_boxed),
        ),
        (
            "ESGReportsCompanyWikiRate",
            ESGReportsCompanyWikiRate::with_options(http, secrets, &options).map(into_boxed),
        ),
    ];

    let mut registry = ToolRegistry::new();
    for (name, built) in builders {
        match built {
            Ok(tool) => {
                if let Err(e) = registry.register(tool) {
                    tracing::warn!(tool = %name, error = %e, "skipping research tool");
                }
            }
            Err(e) => tracing::warn!(tool = %name, error = %e, "skipping research tool"),
        }
    }

    tracing::debug!(count = registry.len(), "research tools registered");
    registry
}

fn into_boxed<T: ToolContract + 'static>(tool: T) -> Arc<dyn ToolContract> {
    Arc::new(tool)
}
