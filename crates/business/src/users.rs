//! Bank users - registration, login, status
//!
//! Passwords go through the context's [`CredentialVerifier`]; only the
//! digest is stored.
//!
//! [`CredentialVerifier`]: crate::credentials::CredentialVerifier

use crate::audit::AuditWriter;
use crate::error::{BankError, BankResult};
use crate::services::ServiceContext;
use banco_core::{Actor, AuditDetail, BankUser, OperationType, ProductRef, UserRole, UserStatus};
use chrono::NaiveDate;
use tracing::{info, warn};

pub const MIN_NAME_LEN: usize = 2;
pub const MIN_IDENTIFICATION_LEN: usize = 3;
pub const MIN_ADDRESS_LEN: usize = 5;
pub const MIN_PASSWORD_LEN: usize = 6;
pub const PHONE_LEN: std::ops::RangeInclusive<usize> = 7..=15;

/// Input for a new bank user
#[derive(Debug, Clone)]
pub struct UserRegistration {
    pub full_name: String,
    pub identification: String,
    pub email: String,
    pub phone: String,
    pub birth_date: Option<NaiveDate>,
    pub address: String,
    pub role: UserRole,
    pub password: String,
    pub company_id: Option<i64>,
}

impl UserRegistration {
    pub fn validate(&self) -> BankResult<()> {
        min_len("full_name", &self.full_name, MIN_NAME_LEN)?;
        min_len("identification", &self.identification, MIN_IDENTIFICATION_LEN)?;
        check_email(&self.email)?;
        check_phone(&self.phone)?;
        min_len("address", &self.address, MIN_ADDRESS_LEN)?;
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(BankError::validation(format!(
                "password must have at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        Ok(())
    }
}

/// User Service - register, authenticate, status, queries
pub struct UserService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> UserService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Register a user. Duplicate identification fails with `InvalidState`.
    pub async fn register(
        &self,
        actor: Actor,
        registration: UserRegistration,
    ) -> BankResult<BankUser> {
        registration.validate()?;

        let mut uow = self.ctx.begin(vec![]).await?;
        let identification = registration.identification.trim().to_string();
        if uow.user_by_identification(&identification).await?.is_some() {
            return Err(BankError::invalid_state(format!(
                "A user with identification {} already exists",
                identification
            )));
        }

        let now = self.ctx.clock().now();
        let password_hash = self
            .ctx
            .verifier()
            .hash(&identification, &registration.password);
        let mut user = BankUser {
            id: 0,
            full_name: registration.full_name.trim().to_string(),
            identification,
            email: registration.email.trim().to_string(),
            phone: registration.phone.trim().to_string(),
            birth_date: registration.birth_date,
            address: registration.address.trim().to_string(),
            role: registration.role,
            status: UserStatus::Active,
            password_hash,
            company_id: registration.company_id,
            created_at: now,
        };
        user.id = uow.insert_user(&user).await?;

        AuditWriter::record(
            uow.as_mut(),
            OperationType::UserRegistered,
            actor,
            ProductRef::User(user.id),
            AuditDetail::new()
                .with("identification", user.identification.as_str())
                .with("role", user.role.as_str())
                .with("status", user.status.as_str()),
            now,
        )
        .await?;
        uow.commit().await?;

        info!(user_id = user.id, role = %user.role, "User registered");
        Ok(user)
    }

    /// Check credentials and return the user
    pub async fn authenticate(&self, identification: &str, password: &str) -> BankResult<BankUser> {
        let mut uow = self.ctx.read().await?;
        let user = uow
            .user_by_identification(identification)
            .await?
            .ok_or_else(|| BankError::not_found("User", identification))?;

        if !user.is_active() {
            return Err(BankError::invalid_state(format!(
                "User {} is {}",
                identification, user.status
            )));
        }
        if !self
            .ctx
            .verifier()
            .verify(&user.identification, password, &user.password_hash)
        {
            warn!(user_id = user.id, "Rejected login attempt");
            return Err(BankError::invalid_state("Invalid credentials"));
        }

        info!(user_id = user.id, "User authenticated");
        Ok(user)
    }

    pub async fn set_status(
        &self,
        actor: Actor,
        user_id: i64,
        status: UserStatus,
    ) -> BankResult<BankUser> {
        let mut uow = self.ctx.begin(vec![]).await?;
        let mut user = uow
            .user(user_id)
            .await?
            .ok_or_else(|| BankError::not_found("User", user_id))?;

        let previous = user.status;
        uow.update_user_status(user_id, status).await?;
        user.status = status;

        AuditWriter::record(
            uow.as_mut(),
            OperationType::UserStatusChanged,
            actor,
            ProductRef::User(user_id),
            AuditDetail::new()
                .with("previous_status", previous.as_str())
                .with("new_status", status.as_str()),
            self.ctx.clock().now(),
        )
        .await?;
        uow.commit().await?;

        info!(user_id, from = %previous, to = %status, "User status changed");
        Ok(user)
    }

    pub async fn get(&self, user_id: i64) -> BankResult<BankUser> {
        let mut uow = self.ctx.read().await?;
        uow.user(user_id)
            .await?
            .ok_or_else(|| BankError::not_found("User", user_id))
    }

    pub async fn by_identification(&self, identification: &str) -> BankResult<BankUser> {
        let mut uow = self.ctx.read().await?;
        uow.user_by_identification(identification)
            .await?
            .ok_or_else(|| BankError::not_found("User", identification))
    }

    pub async fn list(&self) -> BankResult<Vec<BankUser>> {
        let mut uow = self.ctx.read().await?;
        Ok(uow.users().await?)
    }
}

// ============================================================================
// Field checks shared with the client registry
// ============================================================================

pub(crate) fn min_len(field: &str, value: &str, min: usize) -> BankResult<()> {
    if value.trim().chars().count() < min {
        return Err(BankError::validation(format!(
            "{} must have at least {} characters",
            field, min
        )));
    }
    Ok(())
}

pub(crate) fn check_email(email: &str) -> BankResult<()> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid {
        return Err(BankError::validation(format!("invalid email: {}", email)));
    }
    Ok(())
}

pub(crate) fn check_phone(phone: &str) -> BankResult<()> {
    let len = phone.trim().chars().count();
    if !PHONE_LEN.contains(&len) {
        return Err(BankError::validation(format!(
            "phone must have between {} and {} characters",
            PHONE_LEN.start(),
            PHONE_LEN.end()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn registration() -> UserRegistration {
        UserRegistration {
            full_name: "Laura Gómez".to_string(),
            identification: "1020304050".to_string(),
            email: "laura@banco.co".to_string(),
            phone: "3001234567".to_string(),
            birth_date: None,
            address: "Calle 10 # 5-20".to_string(),
            role: UserRole::TellerEmployee,
            password: "s3cret!".to_string(),
            company_id: None,
        }
    }

    #[test]
    fn test_registration_validation() {
        assert!(registration().validate().is_ok());

        let mut short = registration();
        short.password = "12345".to_string();
        assert_eq!(short.validate().unwrap_err().kind(), ErrorKind::Validation);

        let mut phone = registration();
        phone.phone = "123456".to_string();
        assert!(phone.validate().is_err());
        phone.phone = "1234567".to_string();
        assert!(phone.validate().is_ok());

        let mut address = registration();
        address.address = "Cl 1".to_string();
        assert!(address.validate().is_err());
    }

    #[test]
    fn test_email_check() {
        assert!(check_email("a@b.co").is_ok());
        assert!(check_email("no-at-sign").is_err());
        assert!(check_email("@b.co").is_err());
        assert!(check_email("a@b").is_err());
        assert!(check_email("a@@b.co").is_err());
    }
}
