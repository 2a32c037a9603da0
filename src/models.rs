// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::HrError;
use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Enums persisted as upper-case TEXT columns.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "UPPERCASE")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = HrError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_uppercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(HrError::validation(format!(
                        "Invalid {} '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let s = value.as_str()?;
                s.parse().map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

text_enum!(Role {
    Admin => "ADMIN",
    Hr => "HR",
    Manager => "MANAGER",
    Employee => "EMPLOYEE",
    Md => "MD",
    Cao => "CAO",
});

text_enum!(LeaveStatus {
    Pending => "PENDING",
    Approved => "APPROVED",
    Rejected => "REJECTED",
    Cancelled => "CANCELLED",
});

text_enum!(RunStatus {
    Draft => "DRAFT",
    Approved => "APPROVED",
    Paid => "PAID",
});

text_enum!(ChargeStatus {
    Pending => "PENDING",
    Approved => "APPROVED",
    Rejected => "REJECTED",
});

text_enum!(AuditStatus {
    Success => "SUCCESS",
    Failed => "FAILED",
    Warning => "WARNING",
});

/// Roles allowed to administer HR data.
pub const HR_ADMINS: &[Role] = &[Role::Admin, Role::Hr];
/// Roles allowed to run leave decisions, payroll and insurance.
pub const HR_EXECUTIVES: &[Role] = &[Role::Admin, Role::Hr, Role::Md, Role::Cao];

/// One ledger month, `YYYY-MM`. Held as the first day of that month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period(NaiveDate);

impl Period {
    pub fn new(year: i32, month: u32) -> crate::error::Result<Self> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(Period)
            .ok_or_else(|| HrError::validation(format!("Invalid month {}-{}", year, month)))
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Period(date.with_day0(0).unwrap_or(date))
    }

    pub fn current() -> Self {
        Self::from_date(Utc::now().date_naive())
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn is_december(&self) -> bool {
        self.0.month() == 12
    }

    pub fn next(&self) -> Self {
        Period(self.0 + Months::new(1))
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next().0 - Days::new(1)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        Self::from_date(date) == *self
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl FromStr for Period {
    type Err = HrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let date = NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d")
            .map_err(|_| HrError::validation(format!("Invalid month '{}', expected YYYY-MM", s)))?;
        Ok(Self::from_date(date))
    }
}

impl ToSql for Period {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for Period {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: HrError| FromSqlError::Other(Box::new(e)))
    }
}

impl Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: i64,
    pub person_no: String,
    pub first_name: String,
    pub last_name: String,
    pub work_email: String,
    pub department: Option<String>,
    pub designation: Option<String>,
    pub location: Option<String>,
    pub status: String,
    pub hire_date: NaiveDate,
    pub birthdate: Option<NaiveDate>,
    pub termination_date: Option<NaiveDate>,
    pub manager_id: Option<i64>,
    pub user_id: Option<i64>,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_on_probation(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case("probation")
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Compensation {
    pub employee_id: i64,
    pub base_salary: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeavePolicy {
    pub id: i64,
    pub name: String,
    pub region: String,
    pub accrual_per_month: Decimal,
    pub annual_quota: i64,
    pub carry_forward: bool,
    pub max_carry_forward: i64,
    pub requires_doc_after: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveBalance {
    pub id: i64,
    pub employee_id: i64,
    pub policy_id: i64,
    pub period: Period,
    pub opening: Decimal,
    pub accrued: Decimal,
    pub used: Decimal,
    pub adjusted: Decimal,
    pub allotted: Decimal,
    pub closing: Decimal,
}

impl LeaveBalance {
    /// closing = opening + accrued + adjusted - used
    pub fn expected_closing(&self) -> Decimal {
        self.opening + self.accrued + self.adjusted - self.used
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequest {
    pub id: i64,
    pub employee_id: i64,
    pub policy_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: Decimal,
    pub half_day: bool,
    pub reason: Option<String>,
    pub status: LeaveStatus,
    pub approver_id: Option<i64>,
    pub approved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollRun {
    pub id: i64,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub pay_date: NaiveDate,
    pub status: RunStatus,
}

impl PayrollRun {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.period_start <= date && date <= self.period_end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayslipLine {
    pub label: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payslip {
    pub id: i64,
    pub employee_id: i64,
    pub payroll_run_id: i64,
    pub gross: Decimal,
    pub deductions: Decimal,
    pub net: Decimal,
    pub currency: String,
    pub lines: Vec<PayslipLine>,
    pub basic: Decimal,
    pub hra: Decimal,
    pub conveyance: Decimal,
    pub medical: Decimal,
    pub bonus: Decimal,
    pub other_earnings: Decimal,
    pub leave_deduction: Decimal,
    pub professional_tax: Decimal,
    pub other_deductions: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Insurance {
    pub id: i64,
    pub employee_id: i64,
    pub policy_number: String,
    pub provider: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub coverage_amount: Decimal,
    pub bonus_percent: Option<Decimal>,
    pub ctc_file_url: Option<String>,
    pub e_cash_amount: Decimal,
    pub convenience_fee: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvenienceCharge {
    pub id: i64,
    pub employee_id: i64,
    pub title: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub status: ChargeStatus,
    pub approved_by: Option<i64>,
    pub approval_date: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub payslip_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: i64,
    pub module: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub employee_id: Option<i64>,
    pub actor_id: Option<i64>,
    pub actor_role: Option<String>,
    pub old_data: Option<serde_json::Value>,
    pub new_data: Option<serde_json::Value>,
    pub changes: Option<String>,
    pub status: AuditStatus,
    pub error_message: Option<String>,
    pub created_at: String,
}
