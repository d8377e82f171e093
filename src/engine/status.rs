//! Major/minor status codes.
//!
//! Major codes use the GSS-API layout: calling errors in bits 24-31, routine
//! errors in bits 16-23 and supplementary information in bits 0-15. Minor
//! codes are mechanism specific; an engine attaches a static description to
//! the [`StatusCode`] it returns so diagnostics can render both halves
//! without knowing which mechanism produced them.

use std::fmt;

/// Bit offset of routine errors within a major status.
pub const ROUTINE_ERROR_OFFSET: u32 = 16;

/// Mask selecting the routine error field.
pub const ROUTINE_ERROR_MASK: u32 = 0xff << ROUTINE_ERROR_OFFSET;

/// Mask selecting the calling error field.
pub const CALLING_ERROR_MASK: u32 = 0xff << 24;

/// Successful completion.
pub const COMPLETE: u32 = 0;

/// Supplementary bit: another token exchange is required.
pub const CONTINUE_NEEDED: u32 = 1;

/// An unsupported mechanism was requested.
pub const BAD_MECH: u32 = 1 << ROUTINE_ERROR_OFFSET;
/// An invalid name was supplied.
pub const BAD_NAME: u32 = 2 << ROUTINE_ERROR_OFFSET;
/// A supplied name was of an unsupported type.
pub const BAD_NAMETYPE: u32 = 3 << ROUTINE_ERROR_OFFSET;
/// Incorrect channel bindings were supplied.
pub const BAD_BINDINGS: u32 = 4 << ROUTINE_ERROR_OFFSET;
/// An invalid status code was supplied.
pub const BAD_STATUS: u32 = 5 << ROUTINE_ERROR_OFFSET;
/// A token had an invalid integrity check.
pub const BAD_SIG: u32 = 6 << ROUTINE_ERROR_OFFSET;
/// No usable credential.
pub const NO_CRED: u32 = 7 << ROUTINE_ERROR_OFFSET;
/// No context has been established.
pub const NO_CONTEXT: u32 = 8 << ROUTINE_ERROR_OFFSET;
/// Invalid token was supplied.
pub const DEFECTIVE_TOKEN: u32 = 9 << ROUTINE_ERROR_OFFSET;
/// Invalid credential was supplied.
pub const DEFECTIVE_CREDENTIAL: u32 = 10 << ROUTINE_ERROR_OFFSET;
/// The referenced credential has expired.
pub const CREDENTIALS_EXPIRED: u32 = 11 << ROUTINE_ERROR_OFFSET;
/// The referenced context has expired.
pub const CONTEXT_EXPIRED: u32 = 12 << ROUTINE_ERROR_OFFSET;
/// Unspecified failure; the minor code carries the detail.
pub const FAILURE: u32 = 13 << ROUTINE_ERROR_OFFSET;
/// The operation is forbidden by local policy.
pub const UNAUTHORIZED: u32 = 15 << ROUTINE_ERROR_OFFSET;
/// The operation or option is not available.
pub const UNAVAILABLE: u32 = 16 << ROUTINE_ERROR_OFFSET;

/// A failed engine status: major code plus mechanism minor code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCode {
    /// Major status
    pub major: u32,
    /// Mechanism-specific minor status
    pub minor: u32,
    detail: Option<&'static str>,
}

impl StatusCode {
    /// Create a status without a minor description.
    pub const fn new(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor,
            detail: None,
        }
    }

    /// Attach the mechanism's description of the minor code.
    pub const fn with_detail(mut self, detail: &'static str) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Mechanism description of the minor code, if the engine supplied one.
    pub fn detail(&self) -> Option<&'static str> {
        self.detail
    }

    /// Human-readable text for the major code.
    pub fn major_message(&self) -> &'static str {
        display_major(self.major)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:x}/{:x}] - {}", self.major, self.minor, self.major_message())?;
        if let Some(detail) = self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

/// Translate a major status to its display string.
pub fn display_major(major: u32) -> &'static str {
    if major & CALLING_ERROR_MASK != 0 {
        return "A required input parameter could not be read or written";
    }
    match major & ROUTINE_ERROR_MASK {
        COMPLETE if major & CONTINUE_NEEDED != 0 => "Continuation call to routine required",
        COMPLETE => "The routine completed successfully",
        BAD_MECH => "An unsupported mechanism was requested",
        BAD_NAME => "An invalid name was supplied",
        BAD_NAMETYPE => "A supplied name was of an unsupported type",
        BAD_BINDINGS => "Incorrect channel bindings were supplied",
        BAD_STATUS => "An invalid status code was supplied",
        BAD_SIG => "A token had an invalid Message Integrity Check (MIC)",
        NO_CRED => "No credentials were supplied, or the credentials were unavailable or inaccessible",
        NO_CONTEXT => "No context has been established",
        DEFECTIVE_TOKEN => "Invalid token was supplied",
        DEFECTIVE_CREDENTIAL => "Invalid credential was supplied",
        CREDENTIALS_EXPIRED => "The referenced credential has expired",
        CONTEXT_EXPIRED => "The referenced context has expired",
        FAILURE => "Unspecified failure, minor code may provide more information",
        UNAUTHORIZED => "The operation is forbidden by local security policy",
        UNAVAILABLE => "The operation or option is not available or unsupported",
        _ => "Unknown status code",
    }
}
