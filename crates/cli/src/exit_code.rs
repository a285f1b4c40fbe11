// Consistent exit codes for the quire CLI.
//
//   0  = success
//   1  = general error
//   2  = usage/argument error
//   10 = path not found
//   11 = check found broken links or unused images
//   12 = conflict (sync conflict, destination exists, sync already running)
//   13 = git failure

use std::process;

use quire_engine::git::GitOperationError;
use quire_engine::EngineError;

/// Named exit codes for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Error = 1,
    Usage = 2,
    NotFound = 10,
    Findings = 11,
    Conflict = 12,
    Git = 13,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map an anyhow error to an exit code by inspecting the error chain.
    pub fn from_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(engine_err) = cause.downcast_ref::<EngineError>() {
                if let Some(code) = Self::from_engine_error(engine_err) {
                    return code;
                }
                continue;
            }
            if cause.downcast_ref::<GitOperationError>().is_some() {
                return Self::Git;
            }
            if let Some(io_err) = cause.downcast_ref::<std::io::Error>() {
                return match io_err.kind() {
                    std::io::ErrorKind::NotFound => Self::NotFound,
                    _ => Self::Error,
                };
            }
        }
        Self::Error
    }

    /// `None` for wrapped errors whose source decides the code.
    fn from_engine_error(err: &EngineError) -> Option<Self> {
        match err {
            EngineError::Path(_) | EngineError::OutsideWorkspace(_) | EngineError::MissingIdentity => {
                Some(Self::Usage)
            }
            EngineError::NotFound(_) => Some(Self::NotFound),
            EngineError::AlreadyExists(_) | EngineError::Sync(_) => Some(Self::Conflict),
            EngineError::Git(_) => Some(Self::Git),
            EngineError::Session(_) | EngineError::Config(_) => Some(Self::Error),
            EngineError::Io(_) => None,
        }
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code.code() as u8)
    }
}
