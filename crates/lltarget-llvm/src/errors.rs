//! Error types for LLVM target operations

use std::ffi::NulError;

use derive_more::{Display, From};

pub type TargetResult<T> = Result<T, TargetError>;

/// A failed target operation.
///
/// Every fallible call in this crate reports through this type. Messages
/// produced by LLVM are copied in before the native buffer is released.
#[derive(Display, Debug, From)]
#[display("{kind}")]
pub struct TargetError {
    #[from]
    kind: Box<TargetErrorKind>,
}

impl<E> From<E> for TargetError
where
    TargetErrorKind: From<E>,
{
    fn from(error: E) -> Self {
        TargetError {
            kind: Box::new(TargetErrorKind::from(error)),
        }
    }
}

impl TargetError {
    pub fn kind(&self) -> &TargetErrorKind {
        &self.kind
    }

    pub(crate) fn resolution(msg: impl std::fmt::Display) -> Self {
        TargetErrorKind::TargetResolution(msg.to_string()).into()
    }

    pub(crate) fn codegen(msg: impl std::fmt::Display) -> Self {
        TargetErrorKind::Codegen(msg.to_string()).into()
    }

    pub(crate) fn machine_creation(msg: impl std::fmt::Display) -> Self {
        TargetErrorKind::TargetMachineCreation(msg.to_string()).into()
    }

    pub(crate) fn initialization(msg: impl std::fmt::Display) -> Self {
        TargetErrorKind::Initialization(msg.to_string()).into()
    }

    pub(crate) fn ir_parse(msg: impl std::fmt::Display) -> Self {
        TargetErrorKind::IrParse(msg.to_string()).into()
    }

    #[cfg_attr(unix, allow(dead_code))]
    pub(crate) fn invalid_path(path: &std::path::Path) -> Self {
        TargetErrorKind::InvalidPath(path.to_path_buf()).into()
    }

    pub(crate) fn not_a_struct(ty: impl std::fmt::Display) -> Self {
        TargetErrorKind::NotAStruct(ty.to_string()).into()
    }

    pub(crate) fn element_out_of_range(index: u32, count: u32) -> Self {
        TargetErrorKind::ElementOutOfRange { index, count }.into()
    }
}

#[derive(Display, Debug)]
pub enum TargetErrorKind {
    #[display("Target resolution failed: {_0}")]
    TargetResolution(String),

    #[display("Code generation failed: {_0}")]
    Codegen(String),

    #[display("Target machine creation failed: {_0}")]
    TargetMachineCreation(String),

    #[display("Target initialization failed: {_0}")]
    Initialization(String),

    #[display("IR parse error: {_0}")]
    IrParse(String),

    #[display("Expected a struct type, found {_0}")]
    NotAStruct(String),

    #[display("Element index {index} out of range for struct with {count} elements")]
    ElementOutOfRange { index: u32, count: u32 },

    #[display("Path is not valid Unicode: {}", _0.display())]
    InvalidPath(std::path::PathBuf),

    #[display("String contains an interior NUL byte: {_0}")]
    InvalidString(NulError),
}

impl From<NulError> for TargetErrorKind {
    fn from(error: NulError) -> Self {
        TargetErrorKind::InvalidString(error)
    }
}

impl std::error::Error for TargetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &*self.kind {
            TargetErrorKind::InvalidString(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn nul_error_converts_through_question_mark() {
        fn make(s: &str) -> TargetResult<CString> {
            Ok(CString::new(s)?)
        }

        let err = make("a\0b").unwrap_err();
        assert!(matches!(err.kind(), TargetErrorKind::InvalidString(_)));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn display_carries_library_message() {
        let err = TargetError::resolution("No available targets are compatible with triple \"bogus\"");
        assert_eq!(
            err.to_string(),
            "Target resolution failed: No available targets are compatible with triple \"bogus\""
        );
    }

    #[test]
    fn element_out_of_range_message() {
        let err = TargetError::element_out_of_range(5, 3);
        assert_eq!(
            err.to_string(),
            "Element index 5 out of range for struct with 3 elements"
        );
    }
}
