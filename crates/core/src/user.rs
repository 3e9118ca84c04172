//! # User Module
//!
//! Người dùng của hệ thống ngân hàng và vai trò (role):
//! - Client: khách hàng cá nhân / doanh nghiệp
//! - Employee: nhân viên quầy, nhân viên thương mại, nhân viên doanh nghiệp
//! - Supervisor: duyệt chuyển khoản doanh nghiệp
//! - Analyst: duyệt và giải ngân khoản vay

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Vai trò trong hệ thống.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Khách hàng cá nhân
    ClientPerson,
    /// Khách hàng doanh nghiệp
    ClientCompany,
    /// Nhân viên quầy giao dịch
    TellerEmployee,
    /// Nhân viên thương mại - tạo hồ sơ vay
    CommercialEmployee,
    /// Nhân viên của doanh nghiệp khách hàng
    CompanyEmployee,
    /// Supervisor doanh nghiệp - duyệt chuyển khoản lớn
    CompanySupervisor,
    /// Analyst nội bộ - duyệt khoản vay
    InternalAnalyst,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::ClientPerson => "client_person",
            UserRole::ClientCompany => "client_company",
            UserRole::TellerEmployee => "teller_employee",
            UserRole::CommercialEmployee => "commercial_employee",
            UserRole::CompanyEmployee => "company_employee",
            UserRole::CompanySupervisor => "company_supervisor",
            UserRole::InternalAnalyst => "internal_analyst",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "client_person" => Some(UserRole::ClientPerson),
            "client_company" => Some(UserRole::ClientCompany),
            "teller_employee" => Some(UserRole::TellerEmployee),
            "commercial_employee" => Some(UserRole::CommercialEmployee),
            "company_employee" => Some(UserRole::CompanyEmployee),
            "company_supervisor" => Some(UserRole::CompanySupervisor),
            "internal_analyst" => Some(UserRole::InternalAnalyst),
            _ => None,
        }
    }

    /// Là nhân viên của ngân hàng
    pub fn is_bank_staff(&self) -> bool {
        matches!(
            self,
            UserRole::TellerEmployee | UserRole::CommercialEmployee | UserRole::InternalAnalyst
        )
    }

    /// Quyền duyệt/từ chối/giải ngân khoản vay
    pub fn can_approve_loans(&self) -> bool {
        matches!(self, UserRole::InternalAnalyst)
    }

    /// Quyền duyệt/từ chối chuyển khoản đang chờ
    pub fn can_approve_transfers(&self) -> bool {
        matches!(self, UserRole::CompanySupervisor)
    }

    pub fn can_open_accounts(&self) -> bool {
        self.is_bank_staff()
    }

    pub fn can_view_clients(&self) -> bool {
        self.is_bank_staff()
    }

    /// Quyền quản lý user (đăng ký, đổi trạng thái)
    pub fn can_manage_users(&self) -> bool {
        self.is_bank_staff()
    }

    /// Quyền tạo hồ sơ vay
    pub fn can_originate_loans(&self) -> bool {
        matches!(
            self,
            UserRole::ClientPerson
                | UserRole::ClientCompany
                | UserRole::CommercialEmployee
                | UserRole::InternalAnalyst
        )
    }

    /// Quyền tạo chuyển khoản
    pub fn can_create_transfers(&self) -> bool {
        !matches!(self, UserRole::InternalAnalyst)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trạng thái user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
    Blocked,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
            UserStatus::Blocked => "blocked",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(UserStatus::Active),
            "inactive" => Some(UserStatus::Inactive),
            "blocked" => Some(UserStatus::Blocked),
            _ => None,
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User của hệ thống ngân hàng
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankUser {
    /// ID (0 cho tới khi được lưu)
    pub id: i64,
    pub full_name: String,
    /// Số định danh (CMND/CCCD, NIT...) - unique
    pub identification: String,
    pub email: String,
    pub phone: String,
    pub birth_date: Option<NaiveDate>,
    pub address: String,
    pub role: UserRole,
    pub status: UserStatus,
    /// Không bao giờ được trả ra ngoài
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Doanh nghiệp mà user thuộc về (company employee / supervisor)
    pub company_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl BankUser {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

impl fmt::Display for BankUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} ({}, {})",
            self.id, self.full_name, self.role, self.status
        )
    }
}
