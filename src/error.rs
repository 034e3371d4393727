use thiserror::Error;

pub type SysResult<T> = Result<T, SysError>;

/// Errors returned across the syscall boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SysError {
    #[error("no such file or program")]
    NotFound,
    #[error("no free slot")]
    ResourceExhausted,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("permission denied")]
    PermissionDenied,
    #[error("hardware fault")]
    Fault,
}

impl SysError {
    pub fn as_errno(self) -> isize {
        match self {
            Self::NotFound => -2,           // ENOENT
            Self::ResourceExhausted => -11, // EAGAIN
            Self::InvalidArgument => -22,   // EINVAL
            Self::PermissionDenied => -13,  // EACCES
            Self::Fault => -14,             // EFAULT
        }
    }
}
