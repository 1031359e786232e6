// Google Drive share links point at an HTML viewer; the `uc?export=download` form
// serves the raw file bytes instead.

use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

const DRIVE_HOST: &str = "drive.google.com";
const DRIVE_DOWNLOAD_BASE: &str = "https://drive.google.com/uc";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid URL '{input}': {source}")]
pub struct InvalidUrl {
    pub input: String,
    #[source]
    pub source: url::ParseError,
}

/// Target of a conversion after file-sharing links have been rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedUrl {
    /// Not a recognised share link; `original` is exactly what the caller sent.
    Unchanged { original: String, url: Url },
    /// Drive share link rewritten to its direct-download form.
    DriveDownload { file_id: String, url: Url },
}

impl NormalizedUrl {
    pub fn as_url(&self) -> &Url {
        match self {
            NormalizedUrl::Unchanged { url, .. } => url,
            NormalizedUrl::DriveDownload { url, .. } => url,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            NormalizedUrl::Unchanged { original, .. } => original,
            NormalizedUrl::DriveDownload { url, .. } => url.as_str(),
        }
    }

    pub fn drive_file_id(&self) -> Option<&str> {
        match self {
            NormalizedUrl::Unchanged { .. } => None,
            NormalizedUrl::DriveDownload { file_id, .. } => Some(file_id),
        }
    }

}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses `input` and rewrites Google Drive share links to direct downloads.
///
/// Recognised forms:
/// - `https://drive.google.com/file/d/{id}/view`
/// - `https://drive.google.com/open?id={id}`
///
/// Anything else, including Drive URLs without a file id, is returned unchanged.
pub fn normalize(input: &str) -> Result<NormalizedUrl, InvalidUrl> {
    let url = Url::parse(input).map_err(|source| {
        debug!(target: "drive_url", input = %input, "URL parse failed: {}", source);
        InvalidUrl {
            input: input.to_string(),
            source,
        }
    })?;

    if url.host_str() != Some(DRIVE_HOST) {
        return Ok(unchanged(input, url));
    }

    let file_id = file_id_from_path(&url).or_else(|| file_id_from_query(&url));
    let Some(file_id) = file_id else {
        return Ok(unchanged(input, url));
    };

    match Url::parse_with_params(
        DRIVE_DOWNLOAD_BASE,
        &[("export", "download"), ("id", file_id.as_str())],
    ) {
        Ok(direct) => {
            debug!(target: "drive_url", file_id = %file_id, "Rewrote Drive share link");
            Ok(NormalizedUrl::DriveDownload {
                file_id,
                url: direct,
            })
        }
        Err(e) => {
            warn!(target: "drive_url", file_id = %file_id, "Could not build Drive download URL: {}", e);
            Ok(unchanged(input, url))
        }
    }
}

fn unchanged(input: &str, url: Url) -> NormalizedUrl {
    NormalizedUrl::Unchanged {
        original: input.to_string(),
        url,
    }
}

/// `/file/d/{id}/...`
fn file_id_from_path(url: &Url) -> Option<String> {
    let segments: Vec<&str> = url.path_segments()?.collect();
    segments
        .windows(3)
        .find(|w| w[0] == "file" && w[1] == "d" && !w[2].is_empty())
        .map(|w| w[2].to_string())
}

/// `?id={id}`
fn file_id_from_query(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, value)| key == "id" && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}
