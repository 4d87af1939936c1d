use serde::{Deserialize, Serialize};

/// Marketplace role carried in the token
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Buyer (café or business)
    Cafe,
    Vendor,
    Admin,
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    pub role: Role,

    /// Vendor the user acts for - required for vendor tokens
    #[serde(default)]
    pub vendor_id: Option<String>,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,
}
