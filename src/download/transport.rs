//! Fetching remote files for the side channel.

use std::io::Read;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_DISPOSITION;

use crate::settings::AppSettings;

/// File name used when neither the server nor the URL suggests one.
const FALLBACK_FILENAME: &str = "download";

/// An opened response body plus what the server told us about it.
pub struct Incoming {
    pub suggested_filename: String,
    pub total: Option<u64>,
    pub body: Box<dyn Read + Send>,
}

/// Opens a download stream for a URL.
pub trait DownloadTransport: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Incoming>;
}

/// Blocking HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(settings: &AppSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(Duration::from_secs(settings.download_timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl DownloadTransport for HttpTransport {
    fn fetch(&self, url: &str) -> Result<Incoming> {
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("request to {url} failed"))?
            .error_for_status()?;
        let disposition = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok());
        let suggested_filename = suggested_filename(response.url().as_str(), disposition);
        Ok(Incoming {
            suggested_filename,
            total: response.content_length(),
            body: Box::new(response),
        })
    }
}

/// Pick the file name a browser would save `url` under.
pub fn suggested_filename(url: &str, content_disposition: Option<&str>) -> String {
    let from_header = content_disposition.and_then(disposition_filename);
    let from_url = || {
        reqwest::Url::parse(url).ok().and_then(|parsed| {
            parsed
                .path_segments()?
                .filter(|segment| !segment.is_empty())
                .last()
                .map(|segment| {
                    urlencoding::decode(segment)
                        .map(|decoded| decoded.into_owned())
                        .unwrap_or_else(|_| segment.to_string())
                })
        })
    };
    from_header
        .or_else(from_url)
        .map(|name| sanitize_filename(&name))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_FILENAME.to_string())
}

fn disposition_filename(header: &str) -> Option<String> {
    header.split(';').map(str::trim).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        Some(value.trim().trim_matches('"').to_string())
    })
}

/// Keep only the final path component so a download cannot escape the wallpapers folder.
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect();
    match cleaned.trim() {
        "." | ".." => String::new(),
        trimmed => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_segment_is_percent_decoded() {
        assert_eq!(
            suggested_filename("https://img.example.com/walls/my%20sunset.jpg", None),
            "my sunset.jpg"
        );
        assert_eq!(
            suggested_filename("https://img.example.com/walls/caf%C3%A9.png", None),
            "café.png"
        );
        // An encoded separator still cannot climb out of the folder.
        assert_eq!(
            suggested_filename("https://img.example.com/walls/..%2F..%2Fetc%2Fpasswd", None),
            "passwd"
        );
    }

    #[test]
    fn name_comes_from_last_url_segment() {
        assert_eq!(
            suggested_filename("https://img.example.com/walls/sunset.jpg?w=1920", None),
            "sunset.jpg"
        );
        assert_eq!(
            suggested_filename("https://img.example.com/walls/sunset.jpg/", None),
            "sunset.jpg"
        );
    }

    #[test]
    fn content_disposition_wins_over_url() {
        assert_eq!(
            suggested_filename(
                "https://example.com/download?id=7",
                Some(r#"attachment; filename="mountain.png""#)
            ),
            "mountain.png"
        );
    }

    #[test]
    fn traversal_is_stripped() {
        assert_eq!(
            suggested_filename(
                "https://example.com/x",
                Some(r#"attachment; filename="..\..\evil.jpg""#)
            ),
            "evil.jpg"
        );
        assert_eq!(
            suggested_filename("https://example.com/x", Some("attachment; filename=../../a.jpg")),
            "a.jpg"
        );
    }

    #[test]
    fn falls_back_when_nothing_usable() {
        assert_eq!(suggested_filename("https://example.com/", None), "download");
        assert_eq!(suggested_filename("not a url", None), "download");
        assert_eq!(
            suggested_filename("https://example.com/", Some("attachment; filename=\"..\"")),
            "download"
        );
    }
}
