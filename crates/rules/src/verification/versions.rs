//! Supported api-version discovery from error messages.

use std::sync::LazyLock;

use regex::Regex;

static VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}(?:-preview)?").expect("api-version pattern is valid")
});

const SUPPORTED_MARKER: &str = "The supported api-versions are ";

/// Picks a retry api-version out of an error message.
///
/// A seam so the message format can be swapped without touching the client.
pub trait VersionExtractor: Send + Sync {
    fn supported_version(&self, message: &str) -> Option<String>;
}

/// Reads the `The supported api-versions are '...'` list of a
/// `NoRegisteredProviderFound` error.
#[derive(Debug, Clone, Copy, Default)]
pub struct SupportedVersionsMessage;

impl VersionExtractor for SupportedVersionsMessage {
    fn supported_version(&self, message: &str) -> Option<String> {
        let (_, listed) = message.split_once(SUPPORTED_MARKER)?;
        let versions = VERSION.find_iter(listed).map(|m| m.as_str());
        pick_version(versions)
    }
}

/// The latest preview version if any is listed, otherwise the latest stable one.
///
/// Dates are `YYYY-MM-DD`, so lexical order is chronological.
pub fn pick_version<'a>(versions: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let (previews, stable): (Vec<&str>, Vec<&str>) = versions
        .into_iter()
        .partition(|v| v.ends_with("-preview"));

    previews
        .into_iter()
        .max()
        .or_else(|| stable.into_iter().max())
        .map(str::to_string)
}
