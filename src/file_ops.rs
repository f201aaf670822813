//! Share link operations on files
//!
//! This module provides the high-level operations behind the command line:
//! sealing a JSON file into a share link, opening a link into a JSON file,
//! and resealing an existing link with new contents.

use crate::error::{ErrorCategory, ErrorKind, Result, ShareLinkError};
use crate::passcode::PasscodeReader;
use crate::sealer::Sealer;
use crate::share::{self, ClipboardSink, ShareLink, StaticLocation};
use serde_json::Value;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Where command output goes: stdout, or a file written atomically with
/// mode 0o600 on Unix systems.
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
}

impl OutputTarget {
    pub fn from_arg(path: Option<PathBuf>) -> Self {
        match path {
            Some(path) => OutputTarget::File(path),
            None => OutputTarget::Stdout,
        }
    }

    fn write(&self, contents: &[u8]) -> Result<()> {
        match self {
            OutputTarget::Stdout => {
                let mut stdout = io::stdout().lock();
                stdout
                    .write_all(contents)
                    .and_then(|_| stdout.flush())
                    .map_err(|e| {
                        ShareLinkError::with_kind_and_source(
                            ErrorCategory::Internal,
                            ErrorKind::Io,
                            "failed to write to stdout",
                            e,
                        )
                    })
            }
            OutputTarget::File(path) => write_file_atomic(path, contents)
                .map_err(|e| e.with_context(format!("failed to write to {}", path.display()))),
        }
    }
}

/// The command line's stand-in for a clipboard: the link is printed, one
/// line, to the output target.
impl ClipboardSink for OutputTarget {
    fn write_text(&mut self, text: &str) -> Result<()> {
        self.write(format!("{}\n", text).as_bytes())
    }
}

/// Seal the JSON document at `input_path` into a share link for
/// `project_id` under `origin`, writing the link to `output`.
pub fn seal_file(
    input_path: &Path,
    project_id: &str,
    origin: &str,
    output: &mut OutputTarget,
    passcode_reader: &mut dyn PasscodeReader,
) -> Result<ShareLink> {
    let payload = read_payload(input_path)?;
    let passcode = passcode_reader.read_passcode()?;
    let location = StaticLocation(origin.to_string());
    share::share_payload(
        &mut Sealer::new(),
        &location,
        output,
        project_id,
        &passcode,
        &payload,
    )
    .map_err(|e| e.with_context("failed to create share link"))
}

/// Open the share link `link` and write its payload, pretty-printed, to
/// `output`.
pub fn open_to_file(
    link: &str,
    output: &OutputTarget,
    passcode_reader: &mut dyn PasscodeReader,
) -> Result<()> {
    let passcode = passcode_reader.read_passcode()?;
    let (_, payload): (ShareLink, Value) =
        share::open_link(link, &passcode).map_err(|e| e.with_context("failed to open link"))?;

    let mut rendered = serde_json::to_vec_pretty(&payload).map_err(|e| {
        ShareLinkError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::MalformedPayload,
            "failed to render payload",
            e,
        )
    })?;
    rendered.push(b'\n');
    output.write(&rendered)
}

/// Replace the payload of `link` with the JSON document at `input_path`,
/// validating that the passcode opens the existing link first.
pub fn reseal_file(
    link: &str,
    input_path: &Path,
    output: &mut OutputTarget,
    passcode_reader: &mut dyn PasscodeReader,
) -> Result<ShareLink> {
    let payload = read_payload(input_path)?;
    let passcode = passcode_reader.read_passcode()?;
    let updated = share::reseal(&mut Sealer::new(), link, &passcode, &payload)
        .map_err(|e| e.with_context("failed to reseal link"))?;
    share::publish(&updated, output)?;
    Ok(updated)
}

fn read_payload(path: &Path) -> Result<Value> {
    let bytes = fs::read(path).map_err(|e| read_error(path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| {
        ShareLinkError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::UnsupportedPayload,
            format!("{} is not valid JSON: {}", path.display(), e),
            e,
        )
    })
}

/// Write a file atomically (tempfile + fsync + rename) with mode 0o600 on
/// Unix, so that readers see either the old file or the complete new one.
fn write_file_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp_file = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
        ShareLinkError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("failed to create tempfile in {}", dir.display()),
            e,
        )
    })?;

    temp_file.write_all(contents).map_err(|e| {
        ShareLinkError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to write to tempfile",
            e,
        )
    })?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file.flush().map_err(|e| {
        ShareLinkError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to flush tempfile",
            e,
        )
    })?;
    temp_file.as_file().sync_all().map_err(|e| {
        ShareLinkError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to sync file prior to rename",
            e,
        )
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp_file
            .as_file()
            .set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| {
                ShareLinkError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    "failed to set tempfile permissions",
                    e,
                )
            })?;
    }

    temp_file.persist(path).map_err(|e| {
        ShareLinkError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to rename to target file {}", path.display()),
            e,
        )
    })?;
    Ok(())
}

fn read_error(path: &Path, err: io::Error) -> ShareLinkError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    ShareLinkError::with_kind_and_source(
        category,
        ErrorKind::Io,
        format!("failed to read from {}", path.display()),
        err,
    )
}
