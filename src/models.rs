use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Access Control ---

/// Role
///
/// The closed set of roles a profile can carry. Serialized with exactly these
/// names, which is also how they are stored in the `profiles.role` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub enum Role {
    Admin,
    Cashier,
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Cashier => "Cashier",
            Role::Customer => "Customer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a stored role is outside the closed set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    // Exact match only: a near-miss like "admin" is not Admin.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(Role::Admin),
            "Cashier" => Ok(Role::Cashier),
            "Customer" => Ok(Role::Customer),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Profile
///
/// The backend-owned record mapping a principal to its role. Read-only from
/// the guard's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Profile {
    // Primary key, equal to the principal id issued by the identity provider.
    pub id: Uuid,
    pub display_name: String,
    pub role: Role,
}

/// ProfileRow
///
/// Raw row from `public.profiles`. The role column is free text in the
/// database and only becomes a `Role` after validation.
#[derive(Debug, Clone, FromRow)]
pub struct ProfileRow {
    pub id: Uuid,
    pub display_name: String,
    pub role: String,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = UnknownRole;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        Ok(Profile {
            id: row.id,
            display_name: row.display_name,
            role: row.role.parse()?,
        })
    }
}

/// LocalSession
///
/// Ephemeral per-browser session record used by pages that authorize from
/// the local store instead of a remote profile lookup (the cashier till).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LocalSession {
    pub principal_id: Uuid,
    pub role: Role,
    pub display_name: String,
}

// --- Catalogue & Orders ---

/// CartItem
///
/// A line in the shopping cart or in an order. Prices are integer minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CartItem {
    pub sku: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: u32,
}

impl CartItem {
    pub fn line_total_cents(&self) -> i64 {
        self.unit_price_cents * i64::from(self.quantity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub enum OrderStatus {
    Pending,
    Paid,
    Fulfilled,
    Cancelled,
}

impl OrderStatus {
    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Paid => "Paid",
            OrderStatus::Fulfilled => "Fulfilled",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub customer: String,
    pub items: Vec<CartItem>,
    pub status: OrderStatus,
}

impl Order {
    pub fn total_cents(&self) -> i64 {
        self.items.iter().map(CartItem::line_total_cents).sum()
    }
}

// --- Request Payloads ---

/// CheckoutRequest
///
/// Input for POST /payments/intent. The amount is derived from the cart on
/// the server, never trusted from the client.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CheckoutRequest {
    pub items: Vec<CartItem>,
    pub currency: String,
}

/// PaymentIntentRequest
///
/// The parameters sent to the payment provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntentRequest {
    pub amount: i64,
    pub currency: String,
    pub payment_method_types: Vec<String>,
}

// --- Response Payloads ---

/// PaymentIntent
///
/// The provider's payment intent as far as this service cares about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
}

/// PaymentIntentResponse
///
/// What the customer page needs to confirm the payment client-side.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PaymentIntentResponse {
    pub client_secret: String,
    pub amount: i64,
    pub currency: String,
}

/// ActivityResponse
///
/// Returned after an activity report rearms the idle deadline.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ActivityResponse {
    #[ts(type = "string")]
    pub expires_at: DateTime<Utc>,
}

/// SessionGoneResponse
///
/// Body of a 401 telling the page to navigate away.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SessionGoneResponse {
    pub redirect: String,
}

/// LocalSessionResponse
///
/// Confirms a cashier local session was established.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LocalSessionResponse {
    pub role: Role,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}
