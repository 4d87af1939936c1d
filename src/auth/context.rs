use uuid::Uuid;

use super::{Claims, Role};

/// Authenticated user context extracted from JWT
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// User ID (from JWT sub claim)
    pub user_id: Uuid,

    pub role: Role,

    /// Set for vendor users
    pub vendor_id: Option<String>,
}

impl AuthContext {
    pub fn from_claims(claims: &Claims) -> Result<Self, &'static str> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| "Invalid user ID in token")?;

        let vendor_id = claims
            .vendor_id
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        if claims.role == Role::Vendor && vendor_id.is_none() {
            return Err("Vendor token without vendor_id");
        }

        Ok(Self {
            user_id,
            role: claims.role,
            vendor_id,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: Role, vendor_id: Option<&str>) -> Claims {
        Claims {
            sub: Uuid::new_v4().to_string(),
            role,
            vendor_id: vendor_id.map(str::to_string),
            iat: 0,
            exp: 0,
        }
    }

    #[test]
    fn vendor_tokens_need_a_vendor_id() {
        assert!(AuthContext::from_claims(&claims(Role::Vendor, None)).is_err());
        assert!(AuthContext::from_claims(&claims(Role::Vendor, Some("  "))).is_err());
        let ctx = AuthContext::from_claims(&claims(Role::Vendor, Some("v1"))).unwrap();
        assert_eq!(ctx.vendor_id.as_deref(), Some("v1"));
    }

    #[test]
    fn rejects_non_uuid_subjects() {
        let mut c = claims(Role::Cafe, None);
        c.sub = "user-1".to_string();
        assert!(AuthContext::from_claims(&c).is_err());
    }
}
