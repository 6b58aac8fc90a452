use evently_catalog::Company;
use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Customer,
    Operator,
    Admin,
}

/// Identity of the caller, built once per request from verified credentials
/// and handed to every service call that needs to know who is acting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub user_id: String,
    pub email: Option<String>,
    pub role: Role,
}

impl AuthSession {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn can_manage(&self, company: &Company) -> bool {
        self.is_admin() || company.is_owned_by(&self.user_id)
    }

    pub fn require_manage(&self, company: &Company) -> CoreResult<()> {
        if self.can_manage(company) {
            Ok(())
        } else {
            Err(CoreError::Forbidden(format!(
                "company {} is not managed by {}",
                company.id, self.user_id
            )))
        }
    }

    pub fn require_operator(&self) -> CoreResult<()> {
        match self.role {
            Role::Operator | Role::Admin => Ok(()),
            Role::Customer => Err(CoreError::Forbidden("operator role required".to_string())),
        }
    }
}
