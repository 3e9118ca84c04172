//! # Client Module
//!
//! Danh bạ khách hàng: cá nhân (theo số định danh) và doanh nghiệp (theo NIT).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Khách hàng cá nhân
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonClient {
    pub id: i64,
    /// User đã đăng ký khách hàng này
    pub registered_by: i64,
    pub full_name: String,
    /// Unique
    pub identification: String,
    pub email: String,
    pub phone: String,
    pub birth_date: NaiveDate,
    pub address: String,
    pub created_at: DateTime<Utc>,
}

/// Khách hàng doanh nghiệp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyClient {
    pub id: i64,
    pub registered_by: i64,
    pub legal_name: String,
    /// Mã số thuế doanh nghiệp - unique
    pub nit: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    /// Số định danh của người đại diện pháp luật
    pub legal_representative_id: String,
    pub created_at: DateTime<Utc>,
}
