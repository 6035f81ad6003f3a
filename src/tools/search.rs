//! Open-web search via a SearxNG instance's JSON API.

use std::time::Duration;

use serde::Deserialize;

use crate::config::SearchConfig;
use crate::models::WebResult;

#[derive(Deserialize)]
struct SearxResponse {
    #[serde(default)]
    results: Vec<WebResult>,
}

/// Search the web and return a formatted result block for synthesis.
/// Backend failures are degraded into a readable error string.
pub async fn web_search(client: &reqwest::Client, config: &SearchConfig, query: &str) -> String {
    match fetch_results(client, config, query).await {
        Ok(results) if results.is_empty() => "No web results found for that query.".to_string(),
        Ok(results) => format_results(query, &results),
        Err(msg) => msg,
    }
}

async fn fetch_results(
    client: &reqwest::Client,
    config: &SearchConfig,
    query: &str,
) -> Result<Vec<WebResult>, String> {
    let url = format!("{}/search", config.searxng_url);

    let resp = client
        .get(&url)
        .timeout(Duration::from_secs(config.timeout_secs))
        .query(&[("q", query), ("format", "json"), ("language", "en")])
        .send()
        .await
        .map_err(|e| format!("Web search is unavailable right now: {e}"))?;

    if !resp.status().is_success() {
        return Err(format!(
            "Web search backend returned an error ({})",
            resp.status()
        ));
    }

    let body: SearxResponse = resp
        .json()
        .await
        .map_err(|e| format!("Web search returned an unreadable response: {e}"))?;

    Ok(body
        .results
        .into_iter()
        .take(config.max_results)
        .collect())
}

fn format_results(query: &str, results: &[WebResult]) -> String {
    let mut out = format!("Web search results for \"{query}\":\n\n");
    for (i, r) in results.iter().enumerate() {
        out.push_str(&format!(
            "{}. {}\n   {}\n   {}\n\n",
            i + 1,
            if r.title.is_empty() { "(no title)" } else { &r.title },
            r.url,
            r.content
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(title: &str, url: &str, content: &str) -> WebResult {
        WebResult {
            title: title.to_string(),
            url: url.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_format_results_numbers_entries() {
        let results = vec![
            result("GitHub Actions update", "https://a.example", "CI news"),
            result("Actions docs", "https://b.example", "workflow syntax"),
        ];
        let out = format_results("github actions", &results);
        assert!(out.contains("1. GitHub Actions update"));
        assert!(out.contains("2. Actions docs"));
        assert!(out.contains("https://a.example"));
    }

    #[test]
    fn test_format_results_handles_missing_title() {
        let out = format_results("q", &[result("", "https://x.example", "body")]);
        assert!(out.contains("(no title)"));
    }

    #[test]
    fn test_searx_response_tolerates_extra_fields() {
        let raw = r#"{"query": "x", "results": [{"title": "t", "url": "u", "content": "c", "engine": "ddg"}], "answers": []}"#;
        let parsed: SearxResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.results.len(), 1);
        assert_eq!(parsed.results[0].title, "t");
    }
}
