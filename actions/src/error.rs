use thiserror::Error;

pub type Result<T> = std::result::Result<T, ActionsError>;

#[derive(Error, Debug)]
pub enum ActionsError {
    /// The policy does not allow the attempted operation. Callers show
    /// this to the user; it carries no policy detail on purpose.
    #[error("Permission denied")]
    PermissionDenied,

    /// An update whose payload shares no field with the permitted set.
    #[error("You do not have permission to update any of the provided fields")]
    NoPermittedFields,

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Authz(#[from] authz::AuthzError),

    #[error(transparent)]
    Store(#[from] store::StoreError),
}
