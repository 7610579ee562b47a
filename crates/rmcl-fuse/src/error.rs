use thiserror::Error;

/// The only error type crossing the kernel boundary. Every other
/// crate's error converts into this one at the `fuser::Filesystem` seam.
#[derive(Debug, Error)]
pub enum FuseError {
    #[error("no such file or directory")]
    NotFound,

    #[error("operation not permitted")]
    PermissionDenied,

    #[error("invalid argument")]
    InvalidArgument,

    #[error(transparent)]
    Graph(#[from] rmcl_graph::GraphError),

    #[error(transparent)]
    Api(#[from] rmcl_api::ApiError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<FuseError> for libc::c_int {
    fn from(err: FuseError) -> libc::c_int {
        match err {
            FuseError::NotFound => libc::ENOENT,
            FuseError::PermissionDenied => libc::EPERM,
            FuseError::InvalidArgument => libc::EINVAL,
            FuseError::Graph(rmcl_graph::GraphError::VirtualItem) => libc::EPERM,
            FuseError::Graph(rmcl_graph::GraphError::NotFound(_)) => libc::ENOENT,
            FuseError::Graph(_) => libc::EIO,
            FuseError::Api(rmcl_api::ApiError::DocumentNotFound(_)) => libc::ENOENT,
            FuseError::Api(_) => libc::EIO,
            FuseError::Io(_) => libc::EIO,
        }
    }
}
