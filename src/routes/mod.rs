/// Router Module Index
///
/// Routes are grouped by the access rule that protects them. Guarding is done
/// by the extractors each handler takes (`Guarded`, `LocalGuarded`,
/// `ActivePrincipal`), so a handler cannot run without its check.

/// Anonymous pages: storefront index, login surface, health.
pub mod public;

/// Pages requiring an Admin profile.
pub mod admin;

/// Pages and endpoints requiring a Customer profile.
pub mod customer;

/// Cashier till, authorized from the local session store.
pub mod cashier;

/// Activity reporting and logout for any live session.
pub mod session;
