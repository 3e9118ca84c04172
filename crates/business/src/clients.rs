//! Client registry - person and company clients

use crate::error::{BankError, BankResult};
use crate::services::{require_user, ServiceContext};
use crate::users::{
    check_email, check_phone, min_len, MIN_ADDRESS_LEN, MIN_IDENTIFICATION_LEN, MIN_NAME_LEN,
};
use banco_core::{Actor, CompanyClient, PersonClient};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone)]
pub struct NewPersonClient {
    pub full_name: String,
    pub identification: String,
    pub email: String,
    pub phone: String,
    pub birth_date: NaiveDate,
    pub address: String,
}

impl NewPersonClient {
    pub fn validate(&self) -> BankResult<()> {
        min_len("full_name", &self.full_name, MIN_NAME_LEN)?;
        min_len("identification", &self.identification, MIN_IDENTIFICATION_LEN)?;
        check_email(&self.email)?;
        check_phone(&self.phone)?;
        min_len("address", &self.address, MIN_ADDRESS_LEN)
    }
}

#[derive(Debug, Clone)]
pub struct NewCompanyClient {
    pub legal_name: String,
    pub nit: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub legal_representative_id: String,
}

impl NewCompanyClient {
    pub fn validate(&self) -> BankResult<()> {
        min_len("legal_name", &self.legal_name, MIN_NAME_LEN)?;
        min_len("nit", &self.nit, MIN_IDENTIFICATION_LEN)?;
        check_email(&self.email)?;
        check_phone(&self.phone)?;
        min_len("address", &self.address, MIN_ADDRESS_LEN)?;
        min_len(
            "legal_representative_id",
            &self.legal_representative_id,
            MIN_IDENTIFICATION_LEN,
        )
    }
}

/// Both registries in one listing
#[derive(Debug, Clone, Serialize)]
pub struct ClientDirectory {
    pub persons: Vec<PersonClient>,
    pub companies: Vec<CompanyClient>,
}

/// Client Service - register and look up clients
pub struct ClientService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> ClientService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn create_person(
        &self,
        actor: Actor,
        input: NewPersonClient,
    ) -> BankResult<PersonClient> {
        let registered_by = require_user(&actor)?;
        input.validate()?;

        let identification = input.identification.trim().to_string();
        let mut uow = self.ctx.begin(vec![]).await?;
        if uow.person_client(&identification).await?.is_some() {
            return Err(BankError::invalid_state(format!(
                "A client with identification {} already exists",
                identification
            )));
        }

        let mut client = PersonClient {
            id: 0,
            registered_by,
            full_name: input.full_name.trim().to_string(),
            identification,
            email: input.email.trim().to_string(),
            phone: input.phone.trim().to_string(),
            birth_date: input.birth_date,
            address: input.address.trim().to_string(),
            created_at: self.ctx.clock().now(),
        };
        client.id = uow.insert_person_client(&client).await?;
        uow.commit().await?;

        info!(client_id = client.id, "Person client registered");
        Ok(client)
    }

    pub async fn create_company(
        &self,
        actor: Actor,
        input: NewCompanyClient,
    ) -> BankResult<CompanyClient> {
        let registered_by = require_user(&actor)?;
        input.validate()?;

        let nit = input.nit.trim().to_string();
        let mut uow = self.ctx.begin(vec![]).await?;
        if uow.company_client(&nit).await?.is_some() {
            return Err(BankError::invalid_state(format!(
                "A company with NIT {} already exists",
                nit
            )));
        }

        let mut client = CompanyClient {
            id: 0,
            registered_by,
            legal_name: input.legal_name.trim().to_string(),
            nit,
            email: input.email.trim().to_string(),
            phone: input.phone.trim().to_string(),
            address: input.address.trim().to_string(),
            legal_representative_id: input.legal_representative_id.trim().to_string(),
            created_at: self.ctx.clock().now(),
        };
        client.id = uow.insert_company_client(&client).await?;
        uow.commit().await?;

        info!(client_id = client.id, "Company client registered");
        Ok(client)
    }

    pub async fn person(&self, identification: &str) -> BankResult<PersonClient> {
        let mut uow = self.ctx.read().await?;
        uow.person_client(identification)
            .await?
            .ok_or_else(|| BankError::not_found("Client", identification))
    }

    pub async fn company(&self, nit: &str) -> BankResult<CompanyClient> {
        let mut uow = self.ctx.read().await?;
        uow.company_client(nit)
            .await?
            .ok_or_else(|| BankError::not_found("Company", nit))
    }

    pub async fn list(&self) -> BankResult<ClientDirectory> {
        let mut uow = self.ctx.read().await?;
        Ok(ClientDirectory {
            persons: uow.person_clients().await?,
            companies: uow.company_clients().await?,
        })
    }
}
