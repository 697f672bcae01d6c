//! Variable type catalog.
//!
//! The semantic field kinds an object can be bound to, each with a display
//! label, an icon name and a reusability default. A reusable field prints the
//! same value for every recipient; a personalized field varies per recipient.

use serde::{Deserialize, Serialize};

/// Which object kinds a variable type is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Applies {
    Text,
    Image,
    Any,
}

/// Semantic kind of a mail-merge field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VariableType {
    /// Not a variable.
    #[default]
    None,
    FirstName,
    LastName,
    FullName,
    Company,
    AddressLine,
    City,
    State,
    Zip,
    FullAddress,
    Phone,
    Email,
    /// Per-recipient QR code (tracking URL).
    QrCode,
    Logo,
    StoreName,
    StoreAddress,
    Offer,
    /// Free-form `{fieldName}` tokens found in text.
    Custom,
}

/// Display metadata for one catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableTypeInfo {
    pub variable_type: VariableType,
    pub label: &'static str,
    pub icon: &'static str,
    pub default_reusable: bool,
    pub applies: Applies,
}

const fn info(
    variable_type: VariableType,
    label: &'static str,
    icon: &'static str,
    default_reusable: bool,
    applies: Applies,
) -> VariableTypeInfo {
    VariableTypeInfo {
        variable_type,
        label,
        icon,
        default_reusable,
        applies,
    }
}

/// Every bindable variable type (excludes [`VariableType::None`]).
pub const CATALOG: &[VariableTypeInfo] = &[
    info(VariableType::FirstName, "First Name", "user", false, Applies::Text),
    info(VariableType::LastName, "Last Name", "user", false, Applies::Text),
    info(VariableType::FullName, "Full Name", "user", false, Applies::Text),
    info(VariableType::Company, "Company", "building", false, Applies::Text),
    info(VariableType::AddressLine, "Street Address", "map-pin", false, Applies::Text),
    info(VariableType::City, "City", "map-pin", false, Applies::Text),
    info(VariableType::State, "State", "map-pin", false, Applies::Text),
    info(VariableType::Zip, "ZIP Code", "map-pin", false, Applies::Text),
    info(VariableType::FullAddress, "Full Address", "map", false, Applies::Text),
    info(VariableType::Phone, "Phone", "phone", false, Applies::Text),
    info(VariableType::Email, "Email", "mail", false, Applies::Text),
    info(VariableType::QrCode, "QR Code", "qr-code", false, Applies::Any),
    info(VariableType::Logo, "Logo", "image", true, Applies::Image),
    info(VariableType::StoreName, "Store Name", "store", true, Applies::Text),
    info(VariableType::StoreAddress, "Store Address", "store", true, Applies::Text),
    info(VariableType::Offer, "Offer", "tag", true, Applies::Text),
    info(VariableType::Custom, "Custom Field", "braces", false, Applies::Text),
];

impl VariableType {
    /// Catalog metadata. `None` for [`VariableType::None`].
    pub fn info(self) -> Option<&'static VariableTypeInfo> {
        CATALOG.iter().find(|i| i.variable_type == self)
    }

    pub fn label(self) -> &'static str {
        self.info().map_or("None", |i| i.label)
    }

    /// Reusability default for a fresh binding of this type.
    pub fn default_reusable(self) -> bool {
        self.info().is_none_or(|i| i.default_reusable)
    }

    pub fn is_none(self) -> bool {
        self == VariableType::None
    }
}
