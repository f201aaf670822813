//! Passcode reading functionality

use crate::error::{ErrorCategory, ErrorKind, Result, ShareLinkError};
use std::io::{self, IsTerminal, Read, Write};
use zeroize::Zeroizing;

/// Trait for reading passcodes from various sources
pub trait PasscodeReader {
    /// Read a passcode.
    ///
    /// Returns the passcode wrapped in `Zeroizing` to ensure it is securely
    /// wiped from memory when dropped.
    fn read_passcode(&mut self) -> Result<Zeroizing<String>>;
}

/// Returns a fixed passcode (for testing)
pub struct ConstantPasscodeReader {
    passcode: Zeroizing<String>,
}

impl ConstantPasscodeReader {
    pub fn new(passcode: impl Into<String>) -> Self {
        Self {
            passcode: Zeroizing::new(passcode.into()),
        }
    }
}

impl PasscodeReader for ConstantPasscodeReader {
    fn read_passcode(&mut self) -> Result<Zeroizing<String>> {
        Ok(self.passcode.clone())
    }
}

/// Reads a passcode from any io::Read source
///
/// The whole stream is read. One trailing line ending (`\n` or `\r\n`) is
/// dropped so that `echo secret | sharelink ...` works as expected.
pub struct ReaderPasscodeReader {
    reader: Box<dyn Read>,
}

impl ReaderPasscodeReader {
    pub fn new(reader: Box<dyn Read>) -> Self {
        Self { reader }
    }
}

impl PasscodeReader for ReaderPasscodeReader {
    fn read_passcode(&mut self) -> Result<Zeroizing<String>> {
        let mut data = Zeroizing::new(Vec::new());
        self.reader.read_to_end(&mut data).map_err(|e| {
            ShareLinkError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("error reading passcode: {}", e),
                e,
            )
        })?;

        if data.last() == Some(&b'\n') {
            data.pop();
            if data.last() == Some(&b'\r') {
                data.pop();
            }
        }

        let text = std::str::from_utf8(&data).map_err(|e| {
            ShareLinkError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::PasscodeUnavailable,
                "passcode is not valid UTF-8",
                e,
            )
        })?;
        Ok(Zeroizing::new(text.to_owned()))
    }
}

/// Reads passcode from terminal with no echo
pub struct TerminalPasscodeReader;

impl TerminalPasscodeReader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TerminalPasscodeReader {
    fn default() -> Self {
        Self::new()
    }
}

impl PasscodeReader for TerminalPasscodeReader {
    fn read_passcode(&mut self) -> Result<Zeroizing<String>> {
        if !io::stdin().is_terminal() {
            return Err(ShareLinkError::with_kind(
                ErrorCategory::User,
                ErrorKind::PasscodeUnavailable,
                "cannot read passcode from terminal - stdin is not a terminal",
            ));
        }

        io::stderr()
            .write_all(b"Passcode (sharelink): ")
            .map_err(|e| {
                ShareLinkError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    format!("failed to write prompt: {}", e),
                    e,
                )
            })?;
        io::stderr().flush().map_err(|e| {
            ShareLinkError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to flush prompt: {}", e),
                e,
            )
        })?;

        // Read *without echo*
        let passcode = rpassword::read_password().map_err(|e| {
            ShareLinkError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::PasscodeUnavailable,
                format!("failure reading passcode: {}", e),
                e,
            )
        })?;

        Ok(Zeroizing::new(passcode))
    }
}
