/// Agency ownership checks
///
/// Listings belong to an agent (agency). A user may change a listing or an
/// agent record only when their `agency_id` points at that agent. Creating an
/// agency is reserved for industry professionals.
///
/// # Example
///
/// ```no_run
/// use estatehub_shared::auth::authorization::{current_user, require_agency_match};
/// use estatehub_shared::auth::middleware::AuthContext;
/// use estatehub_shared::models::property::Property;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// async fn check(pool: &PgPool, auth: &AuthContext, property_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
///     let user = current_user(pool, auth).await?;
///     if let Some(property) = Property::find_by_id(pool, property_id).await? {
///         require_agency_match(&user, property.agent_id)?;
///     }
///     Ok(())
/// }
/// ```

use sqlx::PgPool;
use uuid::Uuid;

use super::middleware::AuthContext;
use crate::models::user::User;

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// Token is valid but the account is gone or deactivated
    #[error("User not found")]
    UnknownUser,

    /// User has no agency to act on behalf of
    #[error("This user isn't assigned to any agency")]
    NoAgency,

    /// User belongs to a different agency
    #[error("You do not have permission to perform this action")]
    NotAuthorized,

    /// Only industry professionals may register agencies
    #[error("Only industry professionals can create agencies")]
    NotProfessional,

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Loads the active user behind an authenticated request
pub async fn current_user(pool: &PgPool, auth: &AuthContext) -> Result<User, AuthzError> {
    match User::find_by_id(pool, auth.user_id).await? {
        Some(user) if user.is_active => Ok(user),
        _ => Err(AuthzError::UnknownUser),
    }
}

/// Returns the user's agency ID
pub fn require_agency(user: &User) -> Result<Uuid, AuthzError> {
    user.agency_id.ok_or(AuthzError::NoAgency)
}

/// Checks that the user acts for `agent_id`
pub fn require_agency_match(user: &User, agent_id: Uuid) -> Result<(), AuthzError> {
    if require_agency(user)? == agent_id {
        Ok(())
    } else {
        Err(AuthzError::NotAuthorized)
    }
}

pub fn require_professional(user: &User) -> Result<(), AuthzError> {
    if user.is_industry_professional {
        Ok(())
    } else {
        Err(AuthzError::NotProfessional)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::tests::sample_user;

    #[test]
    fn test_no_agency() {
        let user = sample_user();
        assert!(matches!(require_agency(&user), Err(AuthzError::NoAgency)));
        assert!(matches!(
            require_agency_match(&user, Uuid::new_v4()),
            Err(AuthzError::NoAgency)
        ));
    }

    #[test]
    fn test_agency_match() {
        let agency = Uuid::new_v4();
        let user = User {
            agency_id: Some(agency),
            ..sample_user()
        };

        assert_eq!(require_agency(&user).unwrap(), agency);
        assert!(require_agency_match(&user, agency).is_ok());
        assert!(matches!(
            require_agency_match(&user, Uuid::new_v4()),
            Err(AuthzError::NotAuthorized)
        ));
    }

    #[test]
    fn test_require_professional() {
        let user = sample_user();
        assert!(matches!(
            require_professional(&user),
            Err(AuthzError::NotProfessional)
        ));

        let pro = User {
            is_industry_professional: true,
            ..sample_user()
        };
        assert!(require_professional(&pro).is_ok());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            AuthzError::NoAgency.to_string(),
            "This user isn't assigned to any agency"
        );
    }
}
