//! Share links: `<origin>/view/<project-id>#<fragment>`
//!
//! The sharer seals a payload, builds the link from the current origin and
//! hands it to a clipboard. The viewer takes the fragment back out of the
//! link, asks for the passcode and opens the record. Both ends only see the
//! environment through [`LocationProvider`] and [`ClipboardSink`].

use crate::error::{ErrorCategory, ErrorKind, Result, ShareLinkError};
use crate::format::SealedPayload;
use crate::fragment::{fragment_to_sealed, sealed_to_fragment};
use crate::random::RandomSource;
use crate::sealer::{self, Sealer};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

const VIEW_SEGMENT: &str = "view";

/// Where the current page is served from.
pub trait LocationProvider {
    /// Scheme, host and port, optionally followed by a base path.
    fn origin(&self) -> String;
}

/// A fixed origin, as configured on the command line.
#[derive(Debug, Clone)]
pub struct StaticLocation(pub String);

impl LocationProvider for StaticLocation {
    fn origin(&self) -> String {
        self.0.clone()
    }
}

/// Receives a finished share link.
pub trait ClipboardSink {
    fn write_text(&mut self, text: &str) -> Result<()>;
}

/// Keeps the written text in memory.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    pub contents: Option<String>,
}

impl ClipboardSink for MemoryClipboard {
    fn write_text(&mut self, text: &str) -> Result<()> {
        self.contents = Some(text.to_string());
        Ok(())
    }
}

/// A share link broken into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink {
    origin: String,
    project_id: String,
    pub sealed: SealedPayload,
}

impl ShareLink {
    /// Validates `origin` and `project_id` and pairs them with a record.
    pub fn new(
        origin: &str,
        project_id: impl Into<String>,
        sealed: SealedPayload,
    ) -> Result<Self> {
        let project_id = project_id.into();
        check_project_id(&project_id)?;
        Ok(Self {
            origin: normalize_origin(origin)?,
            project_id,
            sealed,
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Renders the full link.
    pub fn to_url(&self) -> String {
        format!(
            "{}/{}/{}#{}",
            self.origin,
            VIEW_SEGMENT,
            self.project_id,
            sealed_to_fragment(&self.sealed)
        )
    }

    /// Parses a full share link.
    ///
    /// The path must end in `/view/<project-id>`; anything before that is
    /// kept as part of the origin.
    pub fn parse(link: &str) -> Result<Self> {
        let url = Url::parse(link.trim()).map_err(|e| {
            ShareLinkError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::InvalidShareUrl,
                format!("not a valid link: {}", e),
                e,
            )
        })?;
        if let Err(msg) = check_web_url(&url) {
            return Err(ShareLinkError::with_kind(
                ErrorCategory::User,
                ErrorKind::InvalidShareUrl,
                format!("not a share link: {}", msg),
            ));
        }

        let segments: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.collect())
            .unwrap_or_default();
        let (prefix, project_id) = match segments.as_slice() {
            [prefix @ .., view, project_id] if *view == VIEW_SEGMENT => (prefix, *project_id),
            _ => {
                return Err(ShareLinkError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::InvalidShareUrl,
                    "link does not point at a /view/<project> page",
                ));
            }
        };
        check_project_id(project_id)?;

        let mut origin = url.origin().ascii_serialization();
        for segment in prefix.iter().filter(|s| !s.is_empty()) {
            origin.push('/');
            origin.push_str(segment);
        }

        let sealed = fragment_to_sealed(url.fragment().unwrap_or_default()).ok_or_else(|| {
            ShareLinkError::with_kind(
                ErrorCategory::User,
                ErrorKind::MalformedFragment,
                "link is invalid or incomplete",
            )
        })?;

        Ok(Self {
            origin,
            project_id: project_id.to_string(),
            sealed,
        })
    }
}

/// Returns the fragment of the absolute URL `link` (without `#`).
///
/// Empty when `link` has no fragment or is not an absolute URL, which
/// [`fragment_to_sealed`] then reports as "no link".
pub fn fragment_of(link: &str) -> String {
    Url::parse(link.trim())
        .ok()
        .and_then(|url| url.fragment().map(str::to_string))
        .unwrap_or_default()
}

/// Writes the rendered link into `clipboard` and returns it.
pub fn publish(link: &ShareLink, clipboard: &mut dyn ClipboardSink) -> Result<String> {
    let url = link.to_url();
    clipboard.write_text(&url)?;
    Ok(url)
}

/// The sharer's workflow: seal, build the link from the current origin,
/// publish it.
pub fn share_payload<R, T>(
    sealer: &mut Sealer<R>,
    location: &dyn LocationProvider,
    clipboard: &mut dyn ClipboardSink,
    project_id: &str,
    passcode: &str,
    payload: &T,
) -> Result<ShareLink>
where
    R: RandomSource,
    T: Serialize + ?Sized,
{
    check_project_id(project_id)?;
    let origin = location.origin();
    let sealed = sealer.encrypt(passcode, payload)?;
    let link = ShareLink::new(&origin, project_id, sealed)?;
    publish(&link, clipboard)?;

    info!(project_id, "created share link");
    Ok(link)
}

/// The viewer's workflow: parse the link and open it.
pub fn open_link<T: DeserializeOwned>(link: &str, passcode: &str) -> Result<(ShareLink, T)> {
    let link = ShareLink::parse(link)?;
    let payload = sealer::decrypt(passcode, &link.sealed)?;
    debug!(project_id = link.project_id.as_str(), "opened share link");
    Ok((link, payload))
}

/// Replace the payload behind an existing link, keeping its passcode,
/// origin and project.
///
/// The old link is opened first, so a mistyped passcode fails with
/// [`ErrorKind::AuthenticationFailed`] instead of silently changing it.
pub fn reseal<R, T>(
    sealer: &mut Sealer<R>,
    link: &str,
    passcode: &str,
    new_payload: &T,
) -> Result<ShareLink>
where
    R: RandomSource,
    T: Serialize + ?Sized,
{
    let old = ShareLink::parse(link)?;
    sealer::decrypt_bytes(passcode, &old.sealed)
        .map_err(|e| e.with_context("existing link does not open with this passcode"))?;

    let sealed = sealer.encrypt(passcode, new_payload)?;
    info!(project_id = old.project_id.as_str(), "resealed share link");
    Ok(ShareLink {
        origin: old.origin,
        project_id: old.project_id,
        sealed,
    })
}

fn check_project_id(project_id: &str) -> Result<()> {
    let unreserved = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~');
    if project_id.is_empty() || project_id == "." || project_id == ".." {
        return Err(ShareLinkError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidProjectId,
            "project id must not be empty",
        ));
    }
    if !project_id.chars().all(unreserved) {
        return Err(ShareLinkError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidProjectId,
            format!(
                "project id {:?} may only contain letters, digits, '-', '.', '_' and '~'",
                project_id
            ),
        ));
    }
    Ok(())
}

fn check_web_url(url: &Url) -> std::result::Result<(), &'static str> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err("scheme must be http or https");
    }
    if url.host().is_none() {
        return Err("missing host");
    }
    Ok(())
}

fn normalize_origin(origin: &str) -> Result<String> {
    let trimmed = origin.trim().trim_end_matches('/');
    let invalid = |msg: &str| {
        ShareLinkError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidShareUrl,
            format!("invalid origin {:?}: {}", origin, msg),
        )
    };

    let url = Url::parse(trimmed).map_err(|e| invalid(&e.to_string()))?;
    check_web_url(&url).map_err(invalid)?;
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("must not carry a query or fragment"));
    }

    let mut normalized = url.origin().ascii_serialization();
    normalized.push_str(url.path().trim_end_matches('/'));
    Ok(normalized)
}
