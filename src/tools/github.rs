//! Structured GitHub metadata fetchers.
//!
//! One formatting function per [`GithubAction`] variant, each layered over
//! the GitHub REST API. Responses are summarized into markdown strings for
//! the synthesizer; not-found, rate-limit and network failures become
//! distinguishable formatted strings instead of errors.

use serde_json::Value;

use crate::config::GithubConfig;
use crate::models::GithubAction;

/// Dispatch a structured metadata action to its fetcher.
pub async fn fetch(
    client: &reqwest::Client,
    config: &GithubConfig,
    action: GithubAction,
    repo: &str,
) -> String {
    match action {
        GithubAction::PrCount => open_pull_requests(client, config, repo).await,
        GithubAction::Stats => repository_stats(client, config, repo).await,
        GithubAction::Contributors => top_contributors(client, config, repo).await,
        GithubAction::Commits => recent_commits(client, config, repo).await,
        GithubAction::Issues => issue_stats(client, config, repo).await,
        GithubAction::Languages => language_breakdown(client, config, repo).await,
        GithubAction::Releases => latest_release(client, config, repo).await,
        GithubAction::Overview => repo_overview(client, config, repo).await,
    }
}

// ─── Request plumbing ────────────────────────────────────

fn request(client: &reqwest::Client, config: &GithubConfig, url: &str) -> reqwest::RequestBuilder {
    let mut rb = client
        .get(url)
        .header("Accept", "application/vnd.github+json")
        .header("X-GitHub-Api-Version", "2022-11-28");
    if let Some(token) = &config.token {
        rb = rb.bearer_auth(token);
    }
    rb
}

fn network_error(e: &reqwest::Error) -> String {
    format!("Network error while contacting GitHub: {e}")
}

/// Map a non-200 response to a user-readable failure string,
/// distinguishing not-found from rate-limiting from other API errors.
async fn status_error(repo: &str, resp: reqwest::Response) -> String {
    let status = resp.status();
    match status.as_u16() {
        404 | 422 => format!("Repository '{repo}' not found. Please check the repository name."),
        403 | 429 => "GitHub API rate limit exceeded. Please try again later.".to_string(),
        _ => {
            let message = resp
                .json::<Value>()
                .await
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
                .unwrap_or_else(|| "Unknown error".to_string());
            format!("GitHub API error ({status}): {message}")
        }
    }
}

// ─── Formatting helpers ──────────────────────────────────

/// Format large numbers with a K/M suffix for readability.
fn format_number(num: u64) -> String {
    if num >= 1_000_000 {
        format!("{:.1}M", num as f64 / 1_000_000.0)
    } else if num >= 1_000 {
        format!("{:.1}K", num as f64 / 1_000.0)
    } else {
        num.to_string()
    }
}

/// Group digits with commas: 1234567 -> "1,234,567".
fn with_commas(num: u64) -> String {
    let digits = num.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Extract the last page number from a GitHub `Link` pagination header.
/// With `per_page=1` that page number equals the total item count.
fn last_page_count(link_header: &str) -> Option<usize> {
    for part in link_header.split(", ") {
        let (url_part, rel_part) = part.split_once("; ")?;
        if rel_part.contains("rel=\"last\"") {
            let url = url_part.trim_start_matches('<').trim_end_matches('>');
            let page = url
                .split(['?', '&'])
                .find_map(|p| p.strip_prefix("page="))?;
            return page.parse().ok();
        }
    }
    None
}

/// A 20-character percentage bar.
fn percent_bar(percentage: f64) -> String {
    let filled = ((percentage / 5.0) as usize).min(20);
    format!("{}{}", "█".repeat(filled), "░".repeat(20 - filled))
}

fn first_date(s: &str) -> &str {
    if s.len() >= 10 {
        &s[..10]
    } else {
        s
    }
}

// ─── Fetchers ────────────────────────────────────────────

/// Open/closed/merged PR counts via the search API, which returns an
/// accurate `total_count` without pagination.
async fn open_pull_requests(client: &reqwest::Client, config: &GithubConfig, repo: &str) -> String {
    let open = match pr_search_count(client, config, repo, "is:pr is:open").await {
        Ok(n) => n,
        Err(msg) => return msg,
    };
    // Failures on the supplementary counts degrade to zero rather than
    // discarding the open count we already have.
    let closed = pr_search_count(client, config, repo, "is:pr is:closed")
        .await
        .unwrap_or(0);
    let merged = pr_search_count(client, config, repo, "is:pr is:merged")
        .await
        .unwrap_or(0);

    let total = open + closed;
    let merge_rate = if closed > 0 {
        merged as f64 / closed as f64 * 100.0
    } else {
        0.0
    };

    format!(
        "**Pull Request Stats for {repo}**\n\n\
         **Open PRs:** {} ({})\n\
         **Closed PRs:** {} ({})\n\
         **Merged PRs:** {} ({})\n\
         **Total PRs:** {} ({})\n\n\
         **Merge Rate:** {merge_rate:.1}% of closed PRs were merged\n",
        format_number(open),
        with_commas(open),
        format_number(closed),
        with_commas(closed),
        format_number(merged),
        with_commas(merged),
        format_number(total),
        with_commas(total),
    )
}

async fn pr_search_count(
    client: &reqwest::Client,
    config: &GithubConfig,
    repo: &str,
    filter: &str,
) -> Result<u64, String> {
    let url = format!("{}/search/issues", config.api_url);
    let resp = request(client, config, &url)
        .query(&[("q", format!("repo:{repo} {filter}")), ("per_page", "1".to_string())])
        .send()
        .await
        .map_err(|e| network_error(&e))?;

    if !resp.status().is_success() {
        return Err(status_error(repo, resp).await);
    }

    let body: Value = resp
        .json()
        .await
        .map_err(|e| format!("GitHub API returned an unreadable response: {e}"))?;
    Ok(body.get("total_count").and_then(Value::as_u64).unwrap_or(0))
}

async fn repository_stats(client: &reqwest::Client, config: &GithubConfig, repo: &str) -> String {
    let url = format!("{}/repos/{repo}", config.api_url);
    let resp = match request(client, config, &url).send().await {
        Ok(r) => r,
        Err(e) => return network_error(&e),
    };
    if !resp.status().is_success() {
        return status_error(repo, resp).await;
    }
    let data: Value = match resp.json().await {
        Ok(v) => v,
        Err(e) => return format!("GitHub API returned an unreadable response: {e}"),
    };

    let str_field = |key: &str, default: &str| -> String {
        data.get(key)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    };
    let num_field = |key: &str| data.get(key).and_then(Value::as_u64).unwrap_or(0);

    let stars = num_field("stargazers_count");
    let forks = num_field("forks_count");
    let watchers = num_field("subscribers_count");
    let open_issues = num_field("open_issues_count");
    let license = data
        .get("license")
        .and_then(|l| l.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("No license");

    let mut result = format!(
        "**Repository Stats for {}**\n\n\
         **Description:** {}\n\n\
         **Stars:** {} ({})\n\
         **Forks:** {} ({})\n\
         **Watchers:** {} ({})\n\
         **Open Issues:** {} ({})\n\n\
         **Language:** {}\n\
         **License:** {license}\n\
         **Size:** {} KB\n\
         **Default Branch:** {}\n\n\
         **Created:** {}\n\
         **Last Updated:** {}\n",
        str_field("full_name", repo),
        str_field("description", "No description"),
        format_number(stars),
        with_commas(stars),
        format_number(forks),
        with_commas(forks),
        format_number(watchers),
        with_commas(watchers),
        format_number(open_issues),
        with_commas(open_issues),
        str_field("language", "Not specified"),
        with_commas(num_field("size")),
        str_field("default_branch", "main"),
        first_date(&str_field("created_at", "")),
        first_date(&str_field("updated_at", "")),
    );

    let topics: Vec<&str> = data
        .get("topics")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).take(5).collect())
        .unwrap_or_default();
    if !topics.is_empty() {
        result.push_str(&format!("\n**Topics:** {}", topics.join(", ")));
    }
    if data.get("archived").and_then(Value::as_bool).unwrap_or(false) {
        result.push_str("\n\n**Note:** This repository is archived.");
    }
    if data.get("fork").and_then(Value::as_bool).unwrap_or(false) {
        result.push_str("\n\n**Note:** This is a forked repository.");
    }

    result
}

async fn top_contributors(client: &reqwest::Client, config: &GithubConfig, repo: &str) -> String {
    let url = format!("{}/repos/{repo}/contributors", config.api_url);
    let resp = match request(client, config, &url)
        .query(&[("per_page", "10")])
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => return network_error(&e),
    };
    if !resp.status().is_success() {
        return status_error(repo, resp).await;
    }
    let contributors: Vec<Value> = match resp.json().await {
        Ok(v) => v,
        Err(e) => return format!("GitHub API returned an unreadable response: {e}"),
    };

    if contributors.is_empty() {
        return format!("No contributors found for {repo}.");
    }

    let total: u64 = contributors
        .iter()
        .map(|c| c.get("contributions").and_then(Value::as_u64).unwrap_or(0))
        .sum();

    let mut result = format!("**Top {} Contributors for {repo}**\n\n", contributors.len());
    for (i, contributor) in contributors.iter().enumerate() {
        let name = contributor
            .get("login")
            .and_then(Value::as_str)
            .unwrap_or("Unknown");
        let contributions = contributor
            .get("contributions")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let percentage = if total > 0 {
            contributions as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        result.push_str(&format!(
            "{}. **{name}** - {} commits ({percentage:.1}%)\n",
            i + 1,
            with_commas(contributions),
        ));
    }
    result
}

async fn recent_commits(client: &reqwest::Client, config: &GithubConfig, repo: &str) -> String {
    let url = format!("{}/repos/{repo}/commits", config.api_url);
    let resp = match request(client, config, &url)
        .query(&[("per_page", "10")])
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => return network_error(&e),
    };
    if !resp.status().is_success() {
        return status_error(repo, resp).await;
    }
    let commits: Vec<Value> = match resp.json().await {
        Ok(v) => v,
        Err(e) => return format!("GitHub API returned an unreadable response: {e}"),
    };

    if commits.is_empty() {
        return format!("No commits found for {repo}.");
    }

    let mut result = format!("**Recent {} Commits in {repo}**\n\n", commits.len());
    for commit in &commits {
        let sha: String = commit
            .get("sha")
            .and_then(Value::as_str)
            .unwrap_or("")
            .chars()
            .take(7)
            .collect();
        let detail = commit.get("commit").cloned().unwrap_or(Value::Null);
        let message: String = detail
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("No message")
            .lines()
            .next()
            .unwrap_or("")
            .chars()
            .take(60)
            .collect();
        let author = detail
            .get("author")
            .and_then(|a| a.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string();
        let date = detail
            .get("author")
            .and_then(|a| a.get("date"))
            .and_then(Value::as_str)
            .unwrap_or("");
        result.push_str(&format!(
            "- `{sha}` - {message}\n  {author} | {}\n\n",
            first_date(date)
        ));
    }
    result
}

/// Open/closed issue counts read from the `Link` pagination header: with
/// `per_page=1` the last page number equals the total count.
async fn issue_stats(client: &reqwest::Client, config: &GithubConfig, repo: &str) -> String {
    let open = match issue_count(client, config, repo, "open").await {
        Ok(n) => n,
        Err(msg) => return msg,
    };
    let closed = issue_count(client, config, repo, "closed").await.unwrap_or(0);

    let total = open + closed;
    let close_rate = if total > 0 {
        closed as f64 / total as f64 * 100.0
    } else {
        0.0
    };

    format!(
        "**Issue Statistics for {repo}**\n\n\
         **Overview:**\n\
         - **Open Issues:** {}\n\
         - **Closed Issues:** {}\n\
         - **Total Issues:** {}\n\n\
         **Close Rate:** {close_rate:.1}%\n",
        with_commas(open),
        with_commas(closed),
        with_commas(total),
    )
}

async fn issue_count(
    client: &reqwest::Client,
    config: &GithubConfig,
    repo: &str,
    state: &str,
) -> Result<u64, String> {
    let url = format!("{}/repos/{repo}/issues", config.api_url);
    let resp = request(client, config, &url)
        .query(&[("state", state), ("per_page", "1")])
        .send()
        .await
        .map_err(|e| network_error(&e))?;

    if !resp.status().is_success() {
        return Err(status_error(repo, resp).await);
    }

    let link = resp
        .headers()
        .get("Link")
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .unwrap_or_default();

    if let Some(count) = last_page_count(&link) {
        return Ok(count as u64);
    }

    // No pagination header: the single page is the whole result set.
    let body: Vec<Value> = resp
        .json()
        .await
        .map_err(|e| format!("GitHub API returned an unreadable response: {e}"))?;
    Ok(body.len() as u64)
}

async fn language_breakdown(client: &reqwest::Client, config: &GithubConfig, repo: &str) -> String {
    let url = format!("{}/repos/{repo}/languages", config.api_url);
    let resp = match request(client, config, &url).send().await {
        Ok(r) => r,
        Err(e) => return network_error(&e),
    };
    if !resp.status().is_success() {
        return status_error(repo, resp).await;
    }
    let languages: serde_json::Map<String, Value> = match resp.json().await {
        Ok(v) => v,
        Err(e) => return format!("GitHub API returned an unreadable response: {e}"),
    };

    if languages.is_empty() {
        return format!("No language data available for {repo}.");
    }

    let total: u64 = languages.values().filter_map(Value::as_u64).sum();
    let mut sorted: Vec<(&String, u64)> = languages
        .iter()
        .map(|(k, v)| (k, v.as_u64().unwrap_or(0)))
        .collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1));

    let mut result = format!("**Language Breakdown for {repo}**\n\n");
    for (lang, bytes) in sorted {
        let percentage = if total > 0 {
            bytes as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        result.push_str(&format!(
            "**{lang}**\n{} {percentage:.1}%\n\n",
            percent_bar(percentage)
        ));
    }
    result
}

async fn latest_release(client: &reqwest::Client, config: &GithubConfig, repo: &str) -> String {
    let url = format!("{}/repos/{repo}/releases/latest", config.api_url);
    let resp = match request(client, config, &url).send().await {
        Ok(r) => r,
        Err(e) => return network_error(&e),
    };

    let data: Value = if resp.status().as_u16() == 404 {
        // No "latest" release. Fall back to the release list: the repo may
        // only have pre-releases, or none at all.
        let list_url = format!("{}/repos/{repo}/releases", config.api_url);
        let list_resp = match request(client, config, &list_url)
            .query(&[("per_page", "1")])
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return network_error(&e),
        };
        if !list_resp.status().is_success() {
            return status_error(repo, list_resp).await;
        }
        let releases: Vec<Value> = match list_resp.json().await {
            Ok(v) => v,
            Err(e) => return format!("GitHub API returned an unreadable response: {e}"),
        };
        match releases.into_iter().next() {
            Some(r) => r,
            None => {
                return format!(
                    "No releases found for {repo}. The repository may use tags instead."
                )
            }
        }
    } else if !resp.status().is_success() {
        return status_error(repo, resp).await;
    } else {
        match resp.json().await {
            Ok(v) => v,
            Err(e) => return format!("GitHub API returned an unreadable response: {e}"),
        }
    };

    let tag = data.get("tag_name").and_then(Value::as_str).unwrap_or("No tag");
    let name = data
        .get("name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(tag);
    let published = data
        .get("published_at")
        .and_then(Value::as_str)
        .unwrap_or("");
    let author = data
        .get("author")
        .and_then(|a| a.get("login"))
        .and_then(Value::as_str)
        .unwrap_or("Unknown");
    let prerelease = data
        .get("prerelease")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let body = data.get("body").and_then(Value::as_str).unwrap_or("No release notes");
    let notes: String = body.chars().take(300).collect();
    let truncated = body.chars().count() > 300;

    let assets = data
        .get("assets")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let downloads: u64 = assets
        .iter()
        .map(|a| a.get("download_count").and_then(Value::as_u64).unwrap_or(0))
        .sum();

    format!(
        "**Latest Release for {repo}**\n\n\
         **{name}** (`{tag}`)\n\
         {}\n\n\
         **Published:** {}\n\
         **Author:** {author}\n\
         **Total Downloads:** {}\n\
         **Assets:** {} files\n\n\
         **Release Notes:**\n{notes}{}\n",
        if prerelease { "Pre-release" } else { "Stable Release" },
        first_date(published),
        with_commas(downloads),
        assets.len(),
        if truncated { "..." } else { "" },
    )
}

/// Composite overview: core stats plus top contributor and top languages.
async fn repo_overview(client: &reqwest::Client, config: &GithubConfig, repo: &str) -> String {
    let url = format!("{}/repos/{repo}", config.api_url);
    let resp = match request(client, config, &url).send().await {
        Ok(r) => r,
        Err(e) => return network_error(&e),
    };
    if !resp.status().is_success() {
        return status_error(repo, resp).await;
    }
    let data: Value = match resp.json().await {
        Ok(v) => v,
        Err(e) => return format!("GitHub API returned an unreadable response: {e}"),
    };

    let contrib_url = format!("{}/repos/{repo}/contributors", config.api_url);
    let top_contributor = match request(client, config, &contrib_url)
        .query(&[("per_page", "1")])
        .send()
        .await
    {
        Ok(r) if r.status().is_success() => r
            .json::<Vec<Value>>()
            .await
            .ok()
            .and_then(|c| {
                c.first()
                    .and_then(|v| v.get("login"))
                    .and_then(Value::as_str)
                    .map(String::from)
            })
            .unwrap_or_else(|| "N/A".to_string()),
        _ => "N/A".to_string(),
    };

    let lang_url = format!("{}/repos/{repo}/languages", config.api_url);
    let top_languages: Vec<(String, f64)> = match request(client, config, &lang_url).send().await {
        Ok(r) if r.status().is_success() => r
            .json::<serde_json::Map<String, Value>>()
            .await
            .map(|langs| {
                let total: u64 = langs.values().filter_map(Value::as_u64).sum();
                let mut sorted: Vec<(String, u64)> = langs
                    .iter()
                    .map(|(k, v)| (k.clone(), v.as_u64().unwrap_or(0)))
                    .collect();
                sorted.sort_by(|a, b| b.1.cmp(&a.1));
                sorted
                    .into_iter()
                    .take(3)
                    .map(|(k, v)| (k, if total > 0 { v as f64 / total as f64 * 100.0 } else { 0.0 }))
                    .collect()
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    };

    let num_field = |key: &str| data.get(key).and_then(Value::as_u64).unwrap_or(0);

    let mut result = format!(
        "**Repository Overview: {}**\n\n\
         {}\n\n\
         **Key Metrics:**\n\
         - Stars: {}\n\
         - Forks: {}\n\
         - Watchers: {}\n\
         - Open Issues: {}\n\n\
         **Top Contributor:** {top_contributor}\n",
        data.get("full_name").and_then(Value::as_str).unwrap_or(repo),
        data.get("description")
            .and_then(Value::as_str)
            .unwrap_or("No description"),
        format_number(num_field("stargazers_count")),
        format_number(num_field("forks_count")),
        format_number(num_field("subscribers_count")),
        format_number(num_field("open_issues_count")),
    );

    if !top_languages.is_empty() {
        let lang_str = top_languages
            .iter()
            .map(|(lang, pct)| format!("{lang} ({pct:.0}%)"))
            .collect::<Vec<_>>()
            .join(", ");
        result.push_str(&format!("\n**Top Languages:** {lang_str}"));
    }

    if let Some(topics) = data.get("topics").and_then(Value::as_array) {
        let names: Vec<&str> = topics.iter().filter_map(Value::as_str).take(5).collect();
        if !names.is_empty() {
            result.push_str(&format!("\n\n**Topics:** {}", names.join(", ")));
        }
    }

    result.push_str(&format!("\n\n**URL:** https://github.com/{repo}"));
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number_suffixes() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1_500), "1.5K");
        assert_eq!(format_number(2_300_000), "2.3M");
    }

    #[test]
    fn test_with_commas() {
        assert_eq!(with_commas(0), "0");
        assert_eq!(with_commas(999), "999");
        assert_eq!(with_commas(1_000), "1,000");
        assert_eq!(with_commas(1_234_567), "1,234,567");
    }

    #[test]
    fn test_last_page_count_parses_link_header() {
        let link = "<https://api.github.com/repositories/1/issues?state=open&per_page=1&page=2>; rel=\"next\", \
                    <https://api.github.com/repositories/1/issues?state=open&per_page=1&page=847>; rel=\"last\"";
        assert_eq!(last_page_count(link), Some(847));
    }

    #[test]
    fn test_last_page_count_missing_last_rel() {
        let link = "<https://api.github.com/x?page=2>; rel=\"next\"";
        assert_eq!(last_page_count(link), None);
        assert_eq!(last_page_count(""), None);
    }

    #[test]
    fn test_percent_bar_bounds() {
        assert_eq!(percent_bar(0.0), "░".repeat(20));
        assert_eq!(percent_bar(100.0), "█".repeat(20));
        let half = percent_bar(50.0);
        assert_eq!(half.chars().filter(|c| *c == '█').count(), 10);
    }

    #[test]
    fn test_first_date_truncates_timestamps() {
        assert_eq!(first_date("2024-03-01T12:30:00Z"), "2024-03-01");
        assert_eq!(first_date(""), "");
    }
}
