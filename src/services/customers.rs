use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, DatabaseConnection, EntityTrait,
    ModelTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::google::{IdentityVerifier, VerifiedIdentity},
    auth::{hash_password, verify_password},
    entities::{
        address::{self, Entity as AddressEntity, Model as AddressModel},
        user::{self, Entity as UserEntity, Model as UserModel},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Debug, Serialize, Deserialize, Validate, utoipa::ToSchema)]
pub struct SignupRequest {
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub full_name: Option<String>,
}

/// Explicit profile patch: only these fields are updatable by the user.
/// Email, role and active flag are deliberately not patchable here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UserPatch {
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

impl UserPatch {
    pub fn apply(self, current: UserModel) -> user::ActiveModel {
        let mut active: user::ActiveModel = current.into();
        active.full_name = NotSet;
        active.phone = NotSet;

        if let Some(full_name) = self.full_name {
            active.full_name = Set(Some(full_name));
        }
        if let Some(phone) = self.phone {
            active.phone = Set(Some(phone));
        }

        active
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateAddressInput {
    #[validate(length(min = 1))]
    pub street: String,
    #[validate(length(min = 1))]
    pub city: String,
    #[validate(length(min = 1))]
    pub state: String,
    #[validate(length(min = 1))]
    pub zip: String,
    #[validate(length(min = 1))]
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AddressPatch {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
    pub is_default: Option<bool>,
}

impl AddressPatch {
    pub fn apply(self, current: AddressModel) -> address::ActiveModel {
        let mut active: address::ActiveModel = current.into();
        active.street = NotSet;
        active.city = NotSet;
        active.state = NotSet;
        active.zip = NotSet;
        active.country = NotSet;
        active.is_default = NotSet;

        if let Some(street) = self.street {
            active.street = Set(street);
        }
        if let Some(city) = self.city {
            active.city = Set(city);
        }
        if let Some(state) = self.state {
            active.state = Set(state);
        }
        if let Some(zip) = self.zip {
            active.zip = Set(zip);
        }
        if let Some(country) = self.country {
            active.country = Set(country);
        }
        if let Some(is_default) = self.is_default {
            active.is_default = Set(is_default);
        }

        active
    }
}

/// Accounts and saved addresses. Orders only ever copy address snapshots, so
/// nothing here can retroactively change an order.
#[derive(Clone)]
pub struct CustomerService {
    db: Arc<DatabaseConnection>,
    identity_verifier: Arc<dyn IdentityVerifier>,
    event_sender: Option<Arc<EventSender>>,
}

impl CustomerService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        identity_verifier: Arc<dyn IdentityVerifier>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db,
            identity_verifier,
            event_sender,
        }
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn signup(&self, request: SignupRequest) -> Result<UserModel, ServiceError> {
        request.validate()?;

        let existing = UserEntity::find()
            .filter(user::Column::Email.eq(request.email.as_str()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "A user with this email already exists".to_string(),
            ));
        }

        let password_hash = hash_password(&request.password)?;
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(request.email),
            password_hash: Set(Some(password_hash)),
            full_name: Set(request.full_name),
            phone: Set(None),
            role: Set(user::ROLE_USER.to_string()),
            is_active: Set(true),
            created_at: Set(Utc::now()),
        };

        let created = model.insert(&*self.db).await?;
        info!(user_id = %created.id, "User registered");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::UserRegistered(created.id)).await {
                warn!(error = %e, "Failed to send user registered event");
            }
        }

        Ok(created)
    }

    /// Password login. Social-login accounts (no password credential) cannot
    /// authenticate this way.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserModel, ServiceError> {
        let user = UserEntity::find()
            .filter(user::Column::Email.eq(email))
            .one(&*self.db)
            .await?;

        let user = match user {
            Some(user) => user,
            None => {
                return Err(ServiceError::Unauthorized(
                    "Incorrect email or password".to_string(),
                ))
            }
        };

        let hash = user.password_hash.as_deref().ok_or_else(|| {
            ServiceError::Unauthorized("Incorrect email or password".to_string())
        })?;

        if !verify_password(password, hash)? {
            return Err(ServiceError::Unauthorized(
                "Incorrect email or password".to_string(),
            ));
        }

        if !user.is_active {
            return Err(ServiceError::Unauthorized("Inactive user".to_string()));
        }

        Ok(user)
    }

    /// Login or signup through the external identity provider. The provider
    /// token is verified first; a new account created this way carries no
    /// password credential.
    #[instrument(skip(self, provider_token))]
    pub async fn social_signin(&self, provider_token: &str) -> Result<UserModel, ServiceError> {
        let identity = self.identity_verifier.verify(provider_token).await?;
        self.signin_verified(identity).await
    }

    async fn signin_verified(&self, identity: VerifiedIdentity) -> Result<UserModel, ServiceError> {
        let existing = UserEntity::find()
            .filter(user::Column::Email.eq(identity.email.as_str()))
            .one(&*self.db)
            .await?;

        match existing {
            Some(user) if !user.is_active => {
                Err(ServiceError::Unauthorized("Inactive user".to_string()))
            }
            Some(user) => Ok(user),
            None => {
                let model = user::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    email: Set(identity.email),
                    password_hash: Set(None),
                    full_name: Set(identity.name),
                    phone: Set(None),
                    role: Set(user::ROLE_USER.to_string()),
                    is_active: Set(true),
                    created_at: Set(Utc::now()),
                };
                let created = model.insert(&*self.db).await?;
                info!(user_id = %created.id, "User created via social sign-in");

                if let Some(event_sender) = &self.event_sender {
                    if let Err(e) = event_sender.send(Event::UserRegistered(created.id)).await {
                        warn!(error = %e, "Failed to send user registered event");
                    }
                }

                Ok(created)
            }
        }
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_user(&self, user_id: Uuid) -> Result<UserModel, ServiceError> {
        UserEntity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))
    }

    #[instrument(skip(self, patch), fields(user_id = %user_id))]
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        patch: UserPatch,
    ) -> Result<UserModel, ServiceError> {
        let current = self.get_user(user_id).await?;
        let updated = patch.apply(current).update(&*self.db).await?;
        Ok(updated)
    }

    // ===== Saved addresses =====

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_addresses(&self, user_id: Uuid) -> Result<Vec<AddressModel>, ServiceError> {
        let addresses = AddressEntity::find()
            .filter(address::Column::UserId.eq(user_id))
            .all(&*self.db)
            .await?;
        Ok(addresses)
    }

    #[instrument(skip(self, input), fields(user_id = %user_id))]
    pub async fn create_address(
        &self,
        user_id: Uuid,
        input: CreateAddressInput,
    ) -> Result<AddressModel, ServiceError> {
        input.validate()?;

        let model = address::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            street: Set(input.street),
            city: Set(input.city),
            state: Set(input.state),
            zip: Set(input.zip),
            country: Set(input.country),
            is_default: Set(input.is_default),
            created_at: Set(Utc::now()),
        };

        let created = model.insert(&*self.db).await?;
        Ok(created)
    }

    #[instrument(skip(self, patch), fields(user_id = %user_id, address_id = %address_id))]
    pub async fn update_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
        patch: AddressPatch,
    ) -> Result<AddressModel, ServiceError> {
        let current = self.find_owned_address(user_id, address_id).await?;
        let updated = patch.apply(current).update(&*self.db).await?;
        Ok(updated)
    }

    #[instrument(skip(self), fields(user_id = %user_id, address_id = %address_id))]
    pub async fn delete_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
    ) -> Result<AddressModel, ServiceError> {
        let address = self.find_owned_address(user_id, address_id).await?;
        let removed = address.clone();
        address.delete(&*self.db).await?;
        Ok(removed)
    }

    async fn find_owned_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
    ) -> Result<AddressModel, ServiceError> {
        AddressEntity::find()
            .filter(address::Column::Id.eq(address_id))
            .filter(address::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Address {} not found", address_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::ActiveValue;

    #[test]
    fn user_patch_applies_only_present_fields() {
        let user = UserModel {
            id: Uuid::new_v4(),
            email: "jo@example.com".into(),
            password_hash: Some("hash".into()),
            full_name: Some("Jo".into()),
            phone: None,
            role: user::ROLE_USER.into(),
            is_active: true,
            created_at: Utc::now(),
        };

        let patch = UserPatch {
            phone: Some("+91-5550100".into()),
            ..Default::default()
        };
        let active = patch.apply(user);

        assert_eq!(
            active.phone,
            ActiveValue::Set(Some("+91-5550100".to_string()))
        );
        assert!(matches!(active.full_name, ActiveValue::NotSet));
        // Role and credential columns are untouched by profile patches
        assert!(matches!(active.role, ActiveValue::Unchanged(_)));
        assert!(matches!(active.password_hash, ActiveValue::Unchanged(_)));
    }

    #[test]
    fn address_patch_applies_only_present_fields() {
        let addr = AddressModel {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            street: "12 MG Road".into(),
            city: "Pune".into(),
            state: "MH".into(),
            zip: "411001".into(),
            country: "IN".into(),
            is_default: false,
            created_at: Utc::now(),
        };

        let patch = AddressPatch {
            city: Some("Mumbai".into()),
            is_default: Some(true),
            ..Default::default()
        };
        let active = patch.apply(addr);

        assert_eq!(active.city, ActiveValue::Set("Mumbai".to_string()));
        assert_eq!(active.is_default, ActiveValue::Set(true));
        assert!(matches!(active.street, ActiveValue::NotSet));
        assert!(matches!(active.zip, ActiveValue::NotSet));
    }
}
