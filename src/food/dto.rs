use serde::{Deserialize, Serialize};
use time::{
    format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime,
    PrimitiveDateTime, UtcOffset,
};

use crate::error::ValidationError;

const NAME_MAX: usize = 100;
const DESCRIPTION_MAX: usize = 500;
const QUANTITY_MAX: usize = 50;
pub const CALORIE_MAX: i32 = 10_000;

/// Parses a backend timestamp. The backend sends zone-less local date-times,
/// which are read as UTC; RFC 3339 values keep their offset.
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(dt);
    }
    PrimitiveDateTime::parse(
        raw,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
    )
    .or_else(|_| {
        PrimitiveDateTime::parse(
            raw,
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        )
    })
    .or_else(|_| {
        PrimitiveDateTime::parse(raw, format_description!("[year]-[month]-[day]T[hour]:[minute]"))
    })
    .ok()
    .map(PrimitiveDateTime::assume_utc)
}

/// Wire form: `yyyy-MM-ddTHH:mm:ss` in UTC.
pub fn format_timestamp(dt: OffsetDateTime) -> Result<String, time::error::Format> {
    dt.to_offset(UtcOffset::UTC)
        .format(format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"))
}

pub(crate) mod wire_time {
    use serde::{de::Error as _, ser::Error as _, Deserialize, Deserializer, Serializer};
    use time::OffsetDateTime;

    pub fn serialize<S: Serializer>(dt: &OffsetDateTime, s: S) -> Result<S::Ok, S::Error> {
        let text = super::format_timestamp(*dt).map_err(S::Error::custom)?;
        s.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<OffsetDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_timestamp(&raw)
            .ok_or_else(|| D::Error::custom(format!("invalid timestamp `{raw}`")))
    }

    pub mod option {
        use serde::{de::Error as _, Deserialize, Deserializer, Serializer};
        use time::OffsetDateTime;

        pub fn serialize<S: Serializer>(
            dt: &Option<OffsetDateTime>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match dt {
                Some(dt) => super::serialize(dt, s),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<OffsetDateTime>, D::Error> {
            match Option::<String>::deserialize(d)? {
                Some(raw) if !raw.trim().is_empty() => super::super::parse_timestamp(&raw)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("invalid timestamp `{raw}`"))),
                _ => Ok(None),
            }
        }
    }
}

/// A food item as stored by the Food Service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodItem {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub calorie: Option<i32>,
    #[serde(default)]
    pub quantity: Option<String>,
    #[serde(default, with = "wire_time::option")]
    pub consumed_date: Option<OffsetDateTime>,
    #[serde(with = "wire_time")]
    pub created_at: OffsetDateTime,
}

/// Validated create/update body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodItemPayload {
    pub name: String,
    pub description: Option<String>,
    pub calorie: Option<i32>,
    pub quantity: Option<String>,
    #[serde(with = "wire_time::option")]
    pub consumed_date: Option<OffsetDateTime>,
}

/// Raw form input for adding or editing an item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FoodItemDraft {
    pub name: String,
    pub description: String,
    pub calorie: String,
    pub quantity: String,
    pub consumed_date: String,
}

fn optional(value: &str) -> Option<String> {
    Some(value.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn check_len(value: &Option<String>, max: usize, field: &str) -> Result<(), ValidationError> {
    match value {
        Some(v) if v.chars().count() > max => Err(ValidationError::new(format!(
            "{field} must not exceed {max} characters"
        ))),
        _ => Ok(()),
    }
}

impl FoodItemDraft {
    /// Pre-fills the edit form from an existing item.
    pub fn from_item(item: &FoodItem) -> Self {
        let consumed_date = item
            .consumed_date
            .and_then(|dt| {
                dt.to_offset(UtcOffset::UTC)
                    .format(format_description!("[year]-[month]-[day]T[hour]:[minute]"))
                    .ok()
            })
            .unwrap_or_default();
        Self {
            name: item.name.clone(),
            description: item.description.clone().unwrap_or_default(),
            calorie: item.calorie.map(|c| c.to_string()).unwrap_or_default(),
            quantity: item.quantity.clone().unwrap_or_default(),
            consumed_date,
        }
    }

    /// Trims the strings, reads the calorie as an integer, and checks every field.
    pub fn into_payload(self) -> Result<FoodItemPayload, ValidationError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::new("Food name is required"));
        }
        if name.chars().count() > NAME_MAX {
            return Err(ValidationError::new(format!(
                "Food name must not exceed {NAME_MAX} characters"
            )));
        }

        let description = optional(&self.description);
        check_len(&description, DESCRIPTION_MAX, "Description")?;
        let quantity = optional(&self.quantity);
        check_len(&quantity, QUANTITY_MAX, "Quantity")?;

        let calorie = match optional(&self.calorie) {
            None => None,
            Some(raw) => {
                let value: i32 = raw
                    .parse()
                    .map_err(|_| ValidationError::new("Calories must be a whole number"))?;
                if !(0..=CALORIE_MAX).contains(&value) {
                    return Err(ValidationError::new(format!(
                        "Calories must be between 0 and {CALORIE_MAX}"
                    )));
                }
                Some(value)
            }
        };

        let consumed_date = match optional(&self.consumed_date) {
            None => None,
            Some(raw) => Some(parse_timestamp(&raw).ok_or_else(|| {
                ValidationError::new("Consumed date must look like YYYY-MM-DDTHH:MM")
            })?),
        };

        Ok(FoodItemPayload {
            name,
            description,
            calorie,
            quantity,
            consumed_date,
        })
    }
}
