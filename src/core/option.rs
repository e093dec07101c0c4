//! Option contract snapshot records
//!
//! The flat input of the matrix builder. Fields mirror what the upstream
//! snapshot carries and stay optional: a record is only checked for usable
//! values when a matrix is built from it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Option side (Call or Put)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractType {
    Call,
    Put,
}

impl ContractType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractType::Call => "call",
            ContractType::Put => "put",
        }
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "call" | "calls" | "c" => Ok(ContractType::Call),
            "put" | "puts" | "p" => Ok(ContractType::Put),
            other => Err(format!("unknown contract type '{}'", other)),
        }
    }
}

/// One option contract snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    /// Call or put
    pub contract_type: ContractType,
    /// Strike price
    pub strike_price: Option<f64>,
    /// Expiration date as ISO text (`YYYY-MM-DD`, padding optional)
    pub expiration_date: Option<String>,
    /// Implied volatility, absent when the feed has no quote
    pub implied_volatility: Option<f64>,
    /// Underlying price at snapshot time
    pub underlying_price: Option<f64>,
    /// Contract symbol (e.g. "O:SPY240621C00500000")
    #[serde(default)]
    pub ticker: Option<String>,
}

impl OptionContract {
    /// Fully populated record
    pub fn new(
        contract_type: ContractType,
        strike_price: f64,
        expiration_date: impl Into<String>,
        implied_volatility: f64,
        underlying_price: f64,
    ) -> Self {
        Self {
            contract_type,
            strike_price: Some(strike_price),
            expiration_date: Some(expiration_date.into()),
            implied_volatility: Some(implied_volatility),
            underlying_price: Some(underlying_price),
            ticker: None,
        }
    }

    /// Strike if finite and positive
    pub fn valid_strike(&self) -> Option<f64> {
        self.strike_price.filter(|k| k.is_finite() && *k > 0.0)
    }

    /// Expiration parsed into a calendar date
    pub fn valid_expiration(&self) -> Option<NaiveDate> {
        self.expiration_date
            .as_deref()
            .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
    }

    /// Implied vol, or 0.0 for "no quote"
    pub fn iv_or_missing(&self) -> f64 {
        match self.implied_volatility {
            Some(iv) if iv.is_finite() && iv > 0.0 => iv,
            _ => 0.0,
        }
    }

    /// Underlying price if finite and positive
    pub fn usable_underlying(&self) -> Option<f64> {
        self.underlying_price.filter(|p| p.is_finite() && *p > 0.0)
    }
}
