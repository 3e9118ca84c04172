//! Request dispatcher
//!
//! Resolves the caller, checks the caller's role, validates params and
//! routes to the matching service operation.

use crate::protocol::*;
use crate::validate::{self, MIN_REASON_LEN};
use banco_business::{
    AccountService, AuditLog, ClientService, ErrorKind, LoanApplication, LoanService,
    NewCompanyClient, NewPersonClient, ServiceContext, TransferRequest, TransferService,
    UserRegistration, UserService,
};
use banco_core::{Actor, BankProduct, BankUser, UserRole};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

/// Role predicate attached to a method
type Permission = fn(&UserRole) -> bool;

fn teller_only(role: &UserRole) -> bool {
    *role == UserRole::TellerEmployee
}

fn respond<T: Serialize>(value: T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::internal(e.to_string()))
}

/// Routes RPC requests to the business services
#[derive(Clone)]
pub struct Dispatcher {
    ctx: ServiceContext,
}

impl Dispatcher {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &ServiceContext {
        &self.ctx
    }

    /// Handle one raw JSON line
    pub async fn handle_line(&self, line: &str) -> RpcResponse {
        match serde_json::from_str::<RpcRequest>(line) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                warn!(error = %e, "Malformed request");
                RpcResponse::failure(
                    Uuid::new_v4().to_string(),
                    RpcError::validation(format!("malformed request: {}", e)),
                )
            }
        }
    }

    pub async fn handle(&self, request: RpcRequest) -> RpcResponse {
        let id = request
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let span = info_span!("rpc", request_id = %id, method = %request.method);

        async move {
            match self
                .call(request.caller, &request.method, request.params)
                .await
            {
                Ok(result) => {
                    debug!("Request succeeded");
                    RpcResponse::success(id, result)
                }
                Err(err) => {
                    warn!(kind = err.kind.as_str(), error = %err.message, "Request failed");
                    RpcResponse::failure(id, err)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn call(
        &self,
        caller: Option<i64>,
        method: &str,
        params: Value,
    ) -> Result<Value, RpcError> {
        let ctx = &self.ctx;

        match method {
            // ================================================================
            // Auth and users
            // ================================================================
            "auth.login" => {
                let p: LoginParams = validate::params(method, params)?;
                let identification = validate::non_empty("identification", &p.identification)?;
                let password = validate::non_empty("password", &p.password)?;
                respond(UserService::new(ctx).authenticate(identification, password).await?)
            }
            "users.register" => {
                let p: RegisterUserParams = validate::params(method, params)?;
                let actor = self.authorize(caller, method, UserRole::can_manage_users).await?;
                let registration = UserRegistration {
                    full_name: p.full_name,
                    identification: p.identification,
                    email: p.email,
                    phone: p.phone,
                    birth_date: p.birth_date,
                    address: p.address,
                    role: p.role,
                    password: p.password,
                    company_id: p.company_id,
                };
                registration.validate()?;
                respond(UserService::new(ctx).register(actor, registration).await?)
            }
            "users.list" => {
                self.observer(caller).await?;
                respond(UserService::new(ctx).list().await?)
            }
            "users.get" => {
                let p: UserIdParams = validate::params(method, params)?;
                self.observer(caller).await?;
                respond(UserService::new(ctx).get(p.user_id).await?)
            }
            "users.set_status" => {
                let p: UserStatusParams = validate::params(method, params)?;
                let actor = self.authorize(caller, method, UserRole::can_manage_users).await?;
                respond(
                    UserService::new(ctx)
                        .set_status(actor, p.user_id, p.status)
                        .await?,
                )
            }

            // ================================================================
            // Clients
            // ================================================================
            "clients.create_person" => {
                let p: PersonClientParams = validate::params(method, params)?;
                let actor = self.authorize(caller, method, UserRole::can_view_clients).await?;
                let input = NewPersonClient {
                    full_name: p.full_name,
                    identification: p.identification,
                    email: p.email,
                    phone: p.phone,
                    birth_date: p.birth_date,
                    address: p.address,
                };
                input.validate()?;
                respond(ClientService::new(ctx).create_person(actor, input).await?)
            }
            "clients.create_company" => {
                let p: CompanyClientParams = validate::params(method, params)?;
                let actor = self.authorize(caller, method, UserRole::can_view_clients).await?;
                let input = NewCompanyClient {
                    legal_name: p.legal_name,
                    nit: p.nit,
                    email: p.email,
                    phone: p.phone,
                    address: p.address,
                    legal_representative_id: p.legal_representative_id,
                };
                input.validate()?;
                respond(ClientService::new(ctx).create_company(actor, input).await?)
            }
            "clients.list" => {
                self.authorize(caller, method, UserRole::can_view_clients).await?;
                respond(ClientService::new(ctx).list().await?)
            }
            "clients.get_person" => {
                let p: IdentificationParams = validate::params(method, params)?;
                self.authorize(caller, method, UserRole::can_view_clients).await?;
                respond(ClientService::new(ctx).person(p.identification.trim()).await?)
            }
            "clients.get_company" => {
                let p: NitParams = validate::params(method, params)?;
                self.authorize(caller, method, UserRole::can_view_clients).await?;
                respond(ClientService::new(ctx).company(p.nit.trim()).await?)
            }

            // ================================================================
            // Accounts
            // ================================================================
            "accounts.open" => {
                let p: OpenAccountParams = validate::params(method, params)?;
                let owner_id = validate::identification("owner_id", &p.owner_id)?;
                let actor = self.authorize(caller, method, UserRole::can_open_accounts).await?;
                respond(
                    AccountService::new(ctx)
                        .open(actor, owner_id, p.account_type, p.currency)
                        .await?,
                )
            }
            "accounts.get" => {
                let p: AccountNumberParams = validate::params(method, params)?;
                self.observer(caller).await?;
                respond(AccountService::new(ctx).get(&p.account_number).await?)
            }
            "accounts.by_owner" => {
                let p: OwnerParams = validate::params(method, params)?;
                self.observer(caller).await?;
                respond(AccountService::new(ctx).by_owner(p.owner_id.trim()).await?)
            }
            "accounts.list" => {
                self.observer(caller).await?;
                respond(AccountService::new(ctx).list().await?)
            }
            "accounts.set_status" => {
                let p: AccountStatusParams = validate::params(method, params)?;
                let actor = self.authorize(caller, method, UserRole::can_open_accounts).await?;
                respond(
                    AccountService::new(ctx)
                        .set_status(actor, &p.account_number, p.status)
                        .await?,
                )
            }
            "accounts.adjust_balance" => {
                let p: AdjustBalanceParams = validate::params(method, params)?;
                let delta = validate::delta("delta", p.delta)?;
                let actor = self.authorize(caller, method, teller_only).await?;
                let balance = AccountService::new(ctx)
                    .adjust_balance(actor, &p.account_number, delta)
                    .await?;
                respond(json!({
                    "account_number": p.account_number,
                    "balance": balance.to_string(),
                }))
            }
            "accounts.history" => {
                let p: AccountNumberParams = validate::params(method, params)?;
                self.observer(caller).await?;
                respond(AccountService::new(ctx).history(&p.account_number).await?)
            }

            // ================================================================
            // Loans
            // ================================================================
            "loans.apply" => {
                let p: ApplyLoanParams = validate::params(method, params)?;
                let applicant_id = validate::identification("applicant_id", &p.applicant_id)?;
                let requested = validate::amount("requested_amount", p.requested_amount)?;
                let term = validate::term(p.term_months)?;
                let actor = self.authorize(caller, method, UserRole::can_originate_loans).await?;
                let application = LoanApplication {
                    applicant_id: applicant_id.to_string(),
                    loan_type: p.loan_type,
                    requested_amount: requested,
                    term_months: term,
                    disbursement_account: p.disbursement_account,
                };
                respond(LoanService::new(ctx).apply(actor, application).await?)
            }
            "loans.approve" => {
                let p: ApproveLoanParams = validate::params(method, params)?;
                let amount = validate::amount("approved_amount", p.approved_amount)?;
                let rate = validate::positive_rate("interest_rate", p.interest_rate)?;
                let actor = self.authorize(caller, method, UserRole::can_approve_loans).await?;
                respond(
                    LoanService::new(ctx)
                        .approve(actor, p.loan_id, amount, rate)
                        .await?,
                )
            }
            "loans.reject" => {
                let p: RejectLoanParams = validate::params(method, params)?;
                let reason = validate::min_len("reason", &p.reason, MIN_REASON_LEN)?;
                let actor = self.authorize(caller, method, UserRole::can_approve_loans).await?;
                respond(LoanService::new(ctx).reject(actor, p.loan_id, reason).await?)
            }
            "loans.disburse" => {
                let p: DisburseLoanParams = validate::params(method, params)?;
                let destination =
                    validate::non_empty("destination_account", &p.destination_account)?;
                let actor = self.authorize(caller, method, UserRole::can_approve_loans).await?;
                respond(
                    LoanService::new(ctx)
                        .disburse(actor, p.loan_id, destination)
                        .await?,
                )
            }
            "loans.get" => {
                let p: LoanIdParams = validate::params(method, params)?;
                self.observer(caller).await?;
                respond(LoanService::new(ctx).get(p.loan_id).await?)
            }
            "loans.by_applicant" => {
                let p: ApplicantParams = validate::params(method, params)?;
                self.observer(caller).await?;
                respond(LoanService::new(ctx).by_applicant(p.applicant_id.trim()).await?)
            }
            "loans.list" => {
                self.observer(caller).await?;
                respond(LoanService::new(ctx).list().await?)
            }
            "loans.pending" => {
                self.observer(caller).await?;
                respond(LoanService::new(ctx).pending().await?)
            }

            // ================================================================
            // Transfers
            // ================================================================
            "transfers.create" => {
                let p: CreateTransferParams = validate::params(method, params)?;
                let source = validate::non_empty("source_account", &p.source_account)?;
                let destination =
                    validate::non_empty("destination_account", &p.destination_account)?;
                let amount = validate::amount("amount", p.amount)?;
                if source == destination {
                    return Err(RpcError::validation(
                        "source and destination accounts must differ",
                    ));
                }
                let actor = self.authorize(caller, method, UserRole::can_create_transfers).await?;
                let request = TransferRequest {
                    source_account: source.to_string(),
                    destination_account: destination.to_string(),
                    amount,
                    is_corporate: p.is_corporate,
                    memo: p.memo.filter(|m| !m.trim().is_empty()),
                };
                respond(TransferService::new(ctx).create(actor, request).await?)
            }
            "transfers.approve" => {
                let p: TransferIdParams = validate::params(method, params)?;
                let actor = self.authorize(caller, method, UserRole::can_approve_transfers).await?;
                respond(TransferService::new(ctx).approve(actor, p.transfer_id).await?)
            }
            "transfers.reject" => {
                let p: RejectTransferParams = validate::params(method, params)?;
                let actor = self.authorize(caller, method, UserRole::can_approve_transfers).await?;
                respond(
                    TransferService::new(ctx)
                        .reject(actor, p.transfer_id, p.reason)
                        .await?,
                )
            }
            "transfers.sweep_expired" => {
                let expired = TransferService::new(ctx).sweep_expired().await?;
                respond(json!({ "expired": expired }))
            }
            "transfers.get" => {
                let p: TransferIdParams = validate::params(method, params)?;
                self.observer(caller).await?;
                respond(TransferService::new(ctx).get(p.transfer_id).await?)
            }
            "transfers.by_account" => {
                let p: AccountNumberParams = validate::params(method, params)?;
                self.observer(caller).await?;
                respond(TransferService::new(ctx).by_account(&p.account_number).await?)
            }
            "transfers.by_creator" => {
                let p: CreatorParams = validate::params(method, params)?;
                self.observer(caller).await?;
                respond(TransferService::new(ctx).by_creator(p.creator_id).await?)
            }
            "transfers.pending" => {
                self.observer(caller).await?;
                respond(TransferService::new(ctx).pending().await?)
            }

            // ================================================================
            // Audit
            // ================================================================
            "audit.list" => {
                let p: AuditParams = validate::params(method, params)?;
                self.observer(caller).await?;
                let log = AuditLog::new(ctx);
                match p.product_id {
                    Some(product_id) => {
                        let product = validate::product("product_id", &product_id)?;
                        respond(log.for_product(&product).await?)
                    }
                    None => respond(log.entries().await?),
                }
            }

            // ================================================================
            // Product catalog
            // ================================================================
            "products.list" => {
                let p: ProductListParams = validate::params(method, params)?;
                self.observer(caller).await?;
                let products: Vec<&BankProduct> = match p.category {
                    Some(category) => BankProduct::by_category(category).collect(),
                    None => BankProduct::catalog().iter().collect(),
                };
                respond(products)
            }

            _ => Err(RpcError::validation(format!("unknown method: {}", method))),
        }
    }

    // ========================================================================
    // Caller resolution
    // ========================================================================

    /// Caller must be given, exist, be active and pass `allowed`
    async fn authorize(
        &self,
        caller: Option<i64>,
        method: &str,
        allowed: Permission,
    ) -> Result<Actor, RpcError> {
        let Some(caller) = caller else {
            return Err(RpcError::validation(format!("{} requires a caller", method)));
        };
        let user = self.resolve(caller).await?;
        if !allowed(&user.role) {
            return Err(RpcError::forbidden(user.role, method));
        }
        Ok(Actor::User {
            id: user.id,
            role: user.role,
        })
    }

    /// Queries accept an anonymous caller; a named one must still be valid
    async fn observer(&self, caller: Option<i64>) -> Result<(), RpcError> {
        if let Some(caller) = caller {
            self.resolve(caller).await?;
        }
        Ok(())
    }

    async fn resolve(&self, caller: i64) -> Result<BankUser, RpcError> {
        let user = UserService::new(&self.ctx).get(caller).await?;
        if !user.is_active() {
            return Err(RpcError::new(
                ErrorKind::InvalidState,
                format!("Caller {} is {}", caller, user.status),
            ));
        }
        Ok(user)
    }
}
