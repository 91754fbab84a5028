// Issuance - Fixed-supply property creation, gated by FEATURE_FIXED_ISSUANCE
// Principle: A gated handler asks the activation engine, nothing more

use super::activation::ActivationEngine;
use crate::types::{
    Address, BlockNumber, FixedIssuance, PropertyId, FEATURE_FIXED_ISSUANCE,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Main ecosystem
pub const ECOSYSTEM_MAIN: u8 = 1;
/// Test ecosystem
pub const ECOSYSTEM_TEST: u8 = 2;

/// First free id in the main ecosystem (1 and 2 are the native tokens)
pub const FIRST_MAIN_PROPERTY_ID: PropertyId = 3;
/// First free id in the test ecosystem
pub const FIRST_TEST_PROPERTY_ID: PropertyId = 0x8000_0003;

/// Indivisible tokens
pub const PROPERTY_TYPE_INDIVISIBLE: u16 = 1;
/// Divisible tokens, 8 decimal places
pub const PROPERTY_TYPE_DIVISIBLE: u16 = 2;

/// Units per divisible token
pub const COIN: i64 = 100_000_000;

/// A created property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub property_id: PropertyId,
    pub issuer: Address,
    pub ecosystem: u8,
    pub divisible: bool,
    pub category: String,
    pub subcategory: String,
    pub name: String,
    pub url: String,
    pub data: String,
    /// Total units (divisible: amount * COIN)
    pub total_units: i64,
    pub creation_block: BlockNumber,
}

impl Property {
    /// Total tokens as displayed by the node, e.g. "3000.00000000"
    pub fn total_tokens_display(&self) -> String {
        format_amount(self.total_units, self.divisible)
    }
}

/// Format units as a token amount string
pub fn format_amount(units: i64, divisible: bool) -> String {
    if !divisible {
        return units.to_string();
    }
    let sign = if units < 0 { "-" } else { "" };
    let abs = units.unsigned_abs();
    let coin = COIN as u64;
    format!("{}{}.{:08}", sign, abs / coin, abs % coin)
}

/// Parse a token amount string into units
pub fn parse_amount(amount: &str, divisible: bool) -> Result<i64, IssuanceError> {
    let invalid = || IssuanceError::InvalidAmount(amount.to_string());
    let amount_str = amount.trim();

    let (whole, fraction) = match amount_str.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount_str, ""),
    };

    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let whole: i64 = whole.parse().map_err(|_| invalid())?;

    let units = if divisible {
        if fraction.len() > 8 {
            return Err(invalid());
        }
        let padded = format!("{:0<8}", fraction);
        let fraction: i64 = padded.parse().map_err(|_| invalid())?;
        whole
            .checked_mul(COIN)
            .and_then(|w| w.checked_add(fraction))
            .ok_or_else(invalid)?
    } else {
        if !fraction.is_empty() && fraction.bytes().any(|b| b != b'0') {
            return Err(invalid());
        }
        whole
    };

    if units <= 0 {
        return Err(invalid());
    }
    Ok(units)
}

/// Property registry: the state of the issuance handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRegistry {
    properties: BTreeMap<PropertyId, Property>,
    next_main_id: PropertyId,
    next_test_id: PropertyId,
}

impl Default for PropertyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertyRegistry {
    pub fn new() -> Self {
        Self {
            properties: BTreeMap::new(),
            next_main_id: FIRST_MAIN_PROPERTY_ID,
            next_test_id: FIRST_TEST_PROPERTY_ID,
        }
    }

    /// Create a fixed-supply property, if the feature is live for this client
    pub fn issue_fixed(
        &mut self,
        issuer: &Address,
        request: &FixedIssuance,
        height: BlockNumber,
        features: &ActivationEngine,
    ) -> Result<PropertyId, IssuanceError> {
        if !features.is_feature_live(FEATURE_FIXED_ISSUANCE, height) {
            return Err(IssuanceError::FeatureNotActive {
                feature: FEATURE_FIXED_ISSUANCE.value(),
                height,
            });
        }

        let divisible = match request.property_type {
            PROPERTY_TYPE_INDIVISIBLE => false,
            PROPERTY_TYPE_DIVISIBLE => true,
            other => return Err(IssuanceError::InvalidPropertyType(other)),
        };
        if request.previous_property_id != 0 {
            return Err(IssuanceError::PreviousPropertyNotSupported(request.previous_property_id));
        }
        if request.name.is_empty() {
            return Err(IssuanceError::EmptyName);
        }
        let total_units = parse_amount(&request.amount, divisible)?;

        let property_id = match request.ecosystem {
            ECOSYSTEM_MAIN => &mut self.next_main_id,
            ECOSYSTEM_TEST => &mut self.next_test_id,
            other => return Err(IssuanceError::InvalidEcosystem(other)),
        };
        let id = *property_id;
        *property_id = property_id.checked_add(1).ok_or(IssuanceError::PropertyIdsExhausted)?;

        let property = Property {
            property_id: id,
            issuer: issuer.clone(),
            ecosystem: request.ecosystem,
            divisible,
            category: request.category.clone(),
            subcategory: request.subcategory.clone(),
            name: request.name.clone(),
            url: request.url.clone(),
            data: request.data.clone(),
            total_units,
            creation_block: height,
        };

        info!(
            "Created property {} ({}) for {} at block {}: {} tokens",
            id,
            property.name,
            issuer,
            height,
            property.total_tokens_display()
        );
        self.properties.insert(id, property);
        Ok(id)
    }

    pub fn get_property(&self, property_id: PropertyId) -> Result<&Property, IssuanceError> {
        self.properties
            .get(&property_id)
            .ok_or(IssuanceError::PropertyNotFound(property_id))
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// Issuance errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IssuanceError {
    #[error("Feature {feature} is not active at block {height}")]
    FeatureNotActive { feature: u16, height: BlockNumber },

    #[error("Invalid property type: {0}")]
    InvalidPropertyType(u16),

    #[error("Invalid ecosystem: {0}")]
    InvalidEcosystem(u8),

    #[error("Previous property id must be 0, got {0}")]
    PreviousPropertyNotSupported(PropertyId),

    #[error("Property name must not be empty")]
    EmptyName,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Property identifiers exhausted")]
    PropertyIdsExhausted,

    #[error("Property identifier does not exist")]
    PropertyNotFound(PropertyId),
}
