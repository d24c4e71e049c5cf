//! News tools: GDELT events and company RSS/Atom feeds

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{CATEGORY, ResearchBase, ResearchToolOptions, array_at, field, first_present, object};
use crate::config::HttpConfig;
use crate::error::Result;
use crate::secrets::SecretsProvider;
use crate::tools::{
    ExecutionContext, OutputKind, Payload, RawPayload, Scope, ToolContract, ToolSpec,
};

/// Global news events from the GDELT 2.0 events API
#[derive(Debug)]
pub struct NewsWorldGDELT {
    base: ResearchBase,
}

impl NewsWorldGDELT {
    /// Tool name
    pub const NAME: &'static str = "NewsWorldGDELT";
    const BASE_URL: &'static str = "https://api.gdeltproject.org/api/v2/events/query";

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
        .description("News events matching a query from the GDELT 2.0 events API")
        .input("query")
        .input("start_datetime")
        .input("end_datetime")
        .ttl("1d");

        Ok(Self {
            base: ResearchBase::new(builder, Self::BASE_URL, http, secrets, options)?,
        })
    }
}

#[async_trait]
impl ToolContract for NewsWorldGDELT {
    fn spec(&self) -> &ToolSpec {
        self.base.spec()
    }

    async fn call_providers(&self, ctx: &ExecutionContext) -> Result<RawPayload> {
        let query = [
            ("query", self.base.input(ctx, "query")?),
            ("mode", "EventList".to_string()),
            ("startdatetime", self.base.input(ctx, "start_datetime")?),
            ("enddatetime", self.base.input(ctx, "end_datetime")?),
            ("format", "json".to_string()),
        ];

        self.base.get_json(self.base.base_url(), &query, &[]).await
    }

    fn normalize(&self, raw: RawPayload, _ctx: &ExecutionContext) -> Result<Payload> {
        let raw = raw.into_json(self.name())?;

        let items: Vec<Value> = array_at(&raw, "/events")
            .iter()
            .map(|event| {
                json!({
                    "date": first_present(event, &["Day", "SQLDATE"]),
                    "source": field(event, "SOURCEURL"),
                    "country": field(event, "ActionGeo_CountryCode"),
                    "theme": field(event, "Themes"),
                    "actor1": field(event, "Actor1Name"),
                    "actor2": field(event, "Actor2Name"),
                    "tone": field(event, "AvgTone"),
                })
            })
            .collect();

        let count = items.len();
        Ok(object(json!({ "items": items, "count": count })))
    }
}

/// Company news from an RSS or Atom feed
#[derive(Debug)]
pub struct NewsCompanyRSS {
    base: ResearchBase,
}

impl NewsCompanyRSS {
    /// Tool name
    pub const NAME: &'static str = "NewsCompanyRSS";
    const ATOM_NS: &'static str = "http://www.w3.org/2005/Atom";

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
        .description("Entries of a company RSS or Atom feed, optionally newer than a date")
        .input("feed_url")
        .optional_input("min_date_iso")
        .ttl("12h");

        // The feed URL comes from the context, so there is no provider base.
        Ok(Self {
            base: ResearchBase::new(builder, "", http, secrets, options)?,
        })
    }

    fn child_text<'a>(node: roxmltree::Node<'a, '_>, name: (&str, &str)) -> Option<&'a str> {
        node.children()
            .find(|child| child.has_tag_name(name))
            .and_then(|child| child.text())
    }

    /// Element named `name` outside any namespace
    fn is_plain(node: &roxmltree::Node<'_, '_>, name: &str) -> bool {
        node.is_element() && node.tag_name().namespace().is_none() && node.tag_name().name() == name
    }

    fn plain_child_text<'a>(node: roxmltree::Node<'a, '_>, name: &str) -> Option<&'a str> {
        node.children()
            .find(|child| Self::is_plain(child, name))
            .and_then(|child| child.text())
    }

    fn items(doc: &roxmltree::Document<'_>, min_date: Option<&str>) -> Vec<Value> {
        // Dates compare as strings, like the feeds publish them.
        let too_old = |date: &str| min_date.is_some_and(|min| date < min);
        let mut items = Vec::new();

        for entry in doc
            .descendants()
            .filter(|node| node.has_tag_name((Self::ATOM_NS, "entry")))
        {
            let updated = Self::child_text(entry, (Self::ATOM_NS, "updated")).unwrap_or_default();
            if too_old(updated) {
                continue;
            }
            let url = entry
                .children()
                .find(|child| child.has_tag_name((Self::ATOM_NS, "link")))
                .and_then(|link| link.attribute("href"))
                .unwrap_or_default();
            items.push(json!({
                "title": Self::child_text(entry, (Self::ATOM_NS, "title")).unwrap_or_default().trim(),
                "url": url,
                "updated": updated,
            }));
        }

        for item in doc.descendants().filter(|node| Self::is_plain(node, "item")) {
            let published = Self::plain_child_text(item, "pubDate").unwrap_or_default();
            if too_old(published) {
                continue;
            }
            items.push(json!({
                "title": Self::plain_child_text(item, "title").unwrap_or_default().trim(),
                "url": Self::plain_child_text(item, "link").unwrap_or_default(),
                "pubDate": published,
            }));
        }

        items
    }
}

#[async_trait]
impl ToolContract for NewsCompanyRSS {
    fn spec(&self) -> &ToolSpec {
        self.base.spec()
    }

    async fn call_providers(&self, ctx: &ExecutionContext) -> Result<RawPayload> {
        self.base.get_bytes(&self.base.input(ctx, "feed_url")?).await
    }

    fn normalize(&self, raw: RawPayload, ctx: &ExecutionContext) -> Result<Payload> {
        let bytes = raw.into_bytes(self.name())?;
        let text = String::from_utf8_lossy(&bytes);
        let doc = roxmltree::Document::parse(&text)
            .map_err(|e| self.base.normalization_error(format!("feed is not XML: {}", e)))?;

        let min_date = ctx.get_str("min_date_iso").filter(|d| !d.is_empty());
        let items = Self::items(&doc, min_date);
        Ok(object(json!({ "items": items })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::test_support::{fast_http, pointed_at};
    use crate::secrets::StaticSecrets;
    use crate::tools::ExecutionPipeline;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ctx() -> ExecutionContext {
        ExecutionContext::new()
            .with("query", "deforestation")
            .with("start_datetime", "20240101000000")
            .with("end_datetime", "20240102000000")
    }

    #[tokio::test]
    async fn test_gdelt_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("query", "deforestation"))
            .and(query_param("mode", "EventList"))
            .and(query_param("startdatetime", "20240101000000"))
            .and(query_param("enddatetime", "20240102000000"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "events": [
                    {
                        "SQLDATE": "20240101",
                        "SOURCEURL": "https://news.example/a",
                        "ActionGeo_CountryCode": "BR",
                        "Themes": "ENV_DEFORESTATION",
                        "Actor1Name": "BRAZIL",
                        "Actor2Name": null,
                        "AvgTone": -3.2
                    },
                    {"Day": "20240102", "SQLDATE": "20231231"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tool = NewsWorldGDELT::with_options(
            &fast_http(),
            &StaticSecrets::new(),
            &pointed_at(&server.uri()),
        )
        .unwrap();

        let result = ExecutionPipeline::default()
            .execute(&tool, &ctx(), "run-1", "tester")
            .await
            .unwrap();

        assert!(result.is_success(), "{:?}", result.errors);
        assert_eq!(result.data["count"], json!(2));
        let items = result.items().unwrap();
        assert_eq!(
            items[0],
            json!({
                "date": "20240101",
                "source": "https://news.example/a",
                "country": "BR",
                "theme": "ENV_DEFORESTATION",
                "actor1": "BRAZIL",
                "actor2": null,
                "tone": -3.2
            })
        );
        assert_eq!(items[1]["date"], json!("20240102"));
        assert_eq!(items[1]["source"], Value::Null);
    }

    #[tokio::test]
    async fn test_gdelt_non_json_body_yields_empty_bundle() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Invalid query"))
            .mount(&server)
            .await;

        let tool = NewsWorldGDELT::with_options(
            &fast_http(),
            &StaticSecrets::new(),
            &pointed_at(&server.uri()),
        )
        .unwrap();

        let result = ExecutionPipeline::default()
            .execute(&tool, &ctx(), "run-1", "tester")
            .await
            .unwrap();
        assert!(result.is_success());
        assert_eq!(result.data["count"], json!(0));
    }

    #[tokio::test]
    async fn test_gdelt_server_error_is_soft() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let tool = NewsWorldGDELT::with_options(
            &fast_http(),
            &StaticSecrets::new(),
            &pointed_at(&server.uri()),
        )
        .unwrap();

        let result = ExecutionPipeline::default()
            .execute(&tool, &ctx(), "run-1", "tester")
            .await
            .unwrap();
        assert!(result.data.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("NewsWorldGDELT"));
    }

    const ATOM_FEED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>ACME newsroom</title>
  <entry>
    <title>  ACME opens plant </title>
    <link href="https://acme.test/news/plant"/>
    <updated>2024-03-01T10:00:00Z</updated>
  </entry>
  <entry>
    <title>ACME annual report</title>
    <link href="https://acme.test/news/report"/>
    <updated>2023-12-15T08:00:00Z</updated>
  </entry>
</feed>"#;

    const RSS_FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>ACME</title>
    <item>
      <title>Quarterly results</title>
      <link>https://acme.test/q1</link>
      <pubDate>2024-04-20</pubDate>
    </item>
    <item>
      <title>No link here</title>
      <pubDate>2024-05-02</pubDate>
    </item>
  </channel>
</rss>"#;

    async fn feed_server(route: &str, body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;
        server
    }

    fn rss_tool() -> NewsCompanyRSS {
        NewsCompanyRSS::new(&fast_http(), &StaticSecrets::new()).unwrap()
    }

    #[tokio::test]
    async fn test_rss_reads_atom_entries() {
        let server = feed_server("/atom.xml", ATOM_FEED).await;
        let ctx = ExecutionContext::new().with("feed_url", format!("{}/atom.xml", server.uri()));

        let result = ExecutionPipeline::default()
            .execute(&rss_tool(), &ctx, "run-1", "tester")
            .await
            .unwrap();

        assert!(result.is_success(), "{:?}", result.errors);
        assert_eq!(
            result.data["items"],
            json!([
                {"title": "ACME opens plant", "url": "https://acme.test/news/plant", "updated": "2024-03-01T10:00:00Z"},
                {"title": "ACME annual report", "url": "https://acme.test/news/report", "updated": "2023-12-15T08:00:00Z"},
            ])
        );
    }

    #[tokio::test]
    async fn test_rss_reads_channel_items() {
        let server = feed_server("/feed.rss", RSS_FEED).await;
        let ctx = ExecutionContext::new().with("feed_url", format!("{}/feed.rss", server.uri()));

        let result = ExecutionPipeline::default()
            .execute(&rss_tool(), &ctx, "run-1", "tester")
            .await
            .unwrap();

        assert!(result.is_success(), "{:?}", result.errors);
        assert_eq!(
            result.data["items"],
            json!([
                {"title": "Quarterly results", "url": "https://acme.test/q1", "pubDate": "2024-04-20"},
                {"title": "No link here", "url": "", "pubDate": "2024-05-02"},
            ])
        );
    }

    #[tokio::test]
    async fn test_rss_min_date_drops_older_entries() {
        let server = feed_server("/atom.xml", ATOM_FEED).await;
        let ctx = ExecutionContext::new()
            .with("feed_url", format!("{}/atom.xml", server.uri()))
            .with("min_date_iso", "2024-01-01");

        let result = ExecutionPipeline::default()
            .execute(&rss_tool(), &ctx, "run-1", "tester")
            .await
            .unwrap();

        let items = result.data["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["title"], json!("ACME opens plant"));
    }

    #[tokio::test]
    async fn test_rss_malformed_feed_is_soft_failure() {
        let server = feed_server("/broken.xml", "<rss><channel>").await;
        let ctx = ExecutionContext::new().with("feed_url", format!("{}/broken.xml", server.uri()));

        let result = ExecutionPipeline::default()
            .execute(&rss_tool(), &ctx, "run-1", "tester")
            .await
            .unwrap();

        assert!(result.data.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("not XML"));
    }
}
