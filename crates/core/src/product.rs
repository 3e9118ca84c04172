//! # Product Module
//!
//! Danh mục sản phẩm ngân hàng (chỉ đọc). Danh mục cố định trong binary,
//! không lưu trong ledger store.

use crate::account::AccountType;
use crate::loan::LoanType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Nhóm sản phẩm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductCategory {
    Accounts,
    Loans,
    Services,
}

impl ProductCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductCategory::Accounts => "accounts",
            ProductCategory::Loans => "loans",
            ProductCategory::Services => "services",
        }
    }
}

impl fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Một dòng trong danh mục sản phẩm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BankProduct {
    /// Mã sản phẩm, duy nhất (vd. `CTA-AHO`)
    pub code: &'static str,
    pub name: &'static str,
    pub category: ProductCategory,
    /// Sản phẩm cần duyệt trước khi có hiệu lực
    pub requires_approval: bool,
    pub description: &'static str,
    pub active: bool,
}

const CATALOG: [BankProduct; 5] = [
    BankProduct {
        code: "CTA-AHO",
        name: "Savings Account",
        category: ProductCategory::Accounts,
        requires_approval: false,
        description: "Standard savings account",
        active: true,
    },
    BankProduct {
        code: "CTA-CTE",
        name: "Checking Account",
        category: ProductCategory::Accounts,
        requires_approval: false,
        description: "Checking account",
        active: true,
    },
    BankProduct {
        code: "PRE-PER",
        name: "Personal Loan",
        category: ProductCategory::Loans,
        requires_approval: true,
        description: "Personal loan",
        active: true,
    },
    BankProduct {
        code: "PRE-HIP",
        name: "Mortgage Loan",
        category: ProductCategory::Loans,
        requires_approval: true,
        description: "Mortgage loan",
        active: true,
    },
    BankProduct {
        code: "PRE-EMP",
        name: "Corporate Loan",
        category: ProductCategory::Loans,
        requires_approval: true,
        description: "Corporate loan",
        active: true,
    },
];

impl BankProduct {
    /// Toàn bộ danh mục, theo thứ tự cố định
    pub fn catalog() -> &'static [BankProduct] {
        &CATALOG
    }

    pub fn find(code: &str) -> Option<&'static BankProduct> {
        CATALOG.iter().find(|p| p.code == code)
    }

    pub fn by_category(category: ProductCategory) -> impl Iterator<Item = &'static BankProduct> {
        CATALOG.iter().filter(move |p| p.category == category)
    }

    /// Sản phẩm tương ứng với loại tài khoản, nếu có trong danh mục
    pub fn for_account_type(account_type: AccountType) -> Option<&'static BankProduct> {
        match account_type {
            AccountType::Savings => Self::find("CTA-AHO"),
            AccountType::Checking => Self::find("CTA-CTE"),
            AccountType::Personal | AccountType::Corporate => None,
        }
    }

    /// Sản phẩm tương ứng với loại khoản vay, nếu có trong danh mục
    pub fn for_loan_type(loan_type: LoanType) -> Option<&'static BankProduct> {
        match loan_type {
            LoanType::Personal => Self::find("PRE-PER"),
            LoanType::Mortgage => Self::find("PRE-HIP"),
            LoanType::Corporate => Self::find("PRE-EMP"),
            LoanType::Vehicle | LoanType::Consumer => None,
        }
    }
}
