//! Well-known role name constants.
//!
//! These must match the values stored in `user_roles` rows.

/// Base role every account holds implicitly.
pub const ROLE_USER: &str = "user";

/// May create locks, problems, tournaments and public contests.
pub const ROLE_MANAGER: &str = "manager";

/// Elevated role; passes any creator-access check.
pub const ROLE_HEAD: &str = "head";
