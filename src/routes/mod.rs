/// Router Module Index
///
/// Routes are grouped by who may reach them. Authorization beyond "is there a
/// valid user" is decided inside the handlers by `permissions::authorize`.

/// Health check and the signup/token flow. No credentials involved.
pub mod public;

/// Catalog, reviews and comments. Readable by anyone; writes resolve the
/// optional caller and apply the resource's policy.
pub mod content;

/// `/users/me`, wrapped in the authentication middleware.
pub mod authenticated;

/// User administration, wrapped in the authentication middleware.
pub mod admin;
