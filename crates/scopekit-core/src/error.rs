use thiserror::Error;

/// Result alias for scope lookups and tree pipeline operations.
pub type Result<T> = std::result::Result<T, ScopeResolutionError>;

/// No enclosing publication of the requested model type exists.
///
/// This is a structural error in the node tree. It is raised at the lookup
/// site and propagates out of [`Tree::mount`](crate::Tree::mount) or
/// [`Tree::flush`](crate::Tree::flush); fix the tree instead of retrying.
/// The requested type name is logged when the error is raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error(
    "could not find the correct scope publisher\n\n\
     To fix, please:\n\
     \x20 * wrap the subtree in a `Publisher` for the requested model type\n\
     \x20 * use the same type parameter for `Consumer::<T>`, `resolve::<T>` and the published `Observable<T>`\n\
     \x20 * link a single version of the crate defining the model type (duplicate versions are distinct types)\n\n\
     See https://docs.rs/scopekit for more information."
)]
pub struct ScopeResolutionError;
