use chrono::NaiveDate;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

/// Reserved segment separator inside a group's spreadsheet cell. Brand names,
/// tokens, and group names must never contain it.
pub const GROUP_SEPARATOR: &str = "|||";

/// Drop-zone id the client sends to clear a record's group.
pub const UNGROUPED_ZONE: &str = "ungrouped";

/// One advertisement entry, mirroring a sheet row. Field names match the
/// sheet's header row exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdRecord {
    pub brand: String,
    pub library_id: String,
    pub start_date: String,
    pub ads_count: String,
    pub s3_key: String,
    pub ad_link: String,
    pub updated_date: String,
    pub active_status: bool,
    #[serde(default)]
    pub group: Option<GroupId>,
}

impl AdRecord {
    /// The record's start date, when the cell holds a parseable ISO date.
    pub fn start_date_parsed(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.start_date.trim(), "%Y-%m-%d").ok()
    }
}

/// Structured group identity: owning brand, generation-time unique token, and
/// the user-visible name. The spreadsheet cell form is `brand|||token|||name`;
/// the structured form exists so a name can never collide with the separator
/// once created through this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupId {
    pub brand: String,
    pub token: Uuid,
    pub name: String,
}

impl GroupId {
    pub fn new(brand: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            brand: brand.into(),
            token: Uuid::new_v4(),
            name: name.into(),
        }
    }

    /// Same brand and token, different display name.
    pub fn renamed(&self, new_name: impl Into<String>) -> Self {
        Self {
            brand: self.brand.clone(),
            token: self.token,
            name: new_name.into(),
        }
    }

    /// Spreadsheet cell form.
    pub fn display_string(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.brand,
            self.token,
            self.name,
            sep = GROUP_SEPARATOR
        )
    }

    /// Strict parse of a well-formed cell: brand, uuid token, then the name.
    /// Legacy names may themselves contain the separator; the remainder is
    /// kept verbatim.
    pub fn parse(cell: &str) -> Option<Self> {
        let mut parts = cell.splitn(3, GROUP_SEPARATOR);
        let brand = parts.next()?;
        let token = Uuid::parse_str(parts.next()?).ok()?;
        let name = parts.next()?;
        if brand.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self {
            brand: brand.to_string(),
            token,
            name: name.to_string(),
        })
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_string())
    }
}

impl Serialize for GroupId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.display_string())
    }
}

impl<'de> Deserialize<'de> for GroupId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let cell = String::deserialize(deserializer)?;
        Self::parse(&cell).ok_or_else(|| D::Error::custom(format!("malformed group id: {cell}")))
    }
}

/// One record's group cell, in record-store order, for the save-back call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GroupAssignment {
    pub library_id: String,
    /// Display string, or empty for ungrouped.
    pub group: String,
}

// ─── API payloads ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupPayload {
    pub brand: String,
    pub name: String,
    /// Records to move into the new group immediately (the selection, when
    /// the client has one active).
    #[serde(default)]
    pub library_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameGroupPayload {
    pub group: String,
    pub new_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteGroupPayload {
    pub group: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveAdPayload {
    pub library_id: String,
    /// A group display string, or the reserved `ungrouped` zone id.
    pub dest: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AdsQuery {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ViewQuery {
    pub brand: Option<String>,
    pub q: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

// ─── API responses ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BooleanResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    pub id: String,
    pub brand: String,
    pub name: String,
}

impl From<&GroupId> for GroupInfo {
    fn from(group: &GroupId) -> Self {
        Self {
            id: group.display_string(),
            brand: group.brand.clone(),
            name: group.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupBucket {
    pub group: GroupInfo,
    pub total_ads: u64,
    pub ads: Vec<AdRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UngroupedBucket {
    pub total_ads: u64,
    pub ads: Vec<AdRecord>,
}

/// Everything the dashboard renders for one filter selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewResponse {
    pub brands: Vec<String>,
    pub dirty: bool,
    pub filtered_count: usize,
    pub total_ads_in_range: u64,
    pub ungrouped: UngroupedBucket,
    pub groups: Vec<GroupBucket>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_id_round_trips_through_display_string() {
        let id = GroupId::new("BrandA", "Summer Sale");
        let parsed = GroupId::parse(&id.display_string()).expect("parse own display string");
        assert_eq!(parsed, id);
    }

    #[test]
    fn parse_keeps_separator_inside_legacy_names() {
        let token = Uuid::new_v4();
        let cell = format!("BrandA|||{token}|||Sale|||2024");
        let parsed = GroupId::parse(&cell).expect("legacy cell");
        assert_eq!(parsed.brand, "BrandA");
        assert_eq!(parsed.token, token);
        assert_eq!(parsed.name, "Sale|||2024");
    }

    #[test]
    fn parse_rejects_malformed_cells() {
        assert_eq!(GroupId::parse(""), None);
        assert_eq!(GroupId::parse("just-a-name"), None);
        assert_eq!(GroupId::parse("Brand|||not-a-uuid|||Name"), None);
        let token = Uuid::new_v4();
        assert_eq!(GroupId::parse(&format!("|||{token}|||Name")), None);
        assert_eq!(GroupId::parse(&format!("Brand|||{token}|||")), None);
    }

    #[test]
    fn group_id_serializes_as_cell_string() {
        let id = GroupId::new("B", "N");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, format!("\"{}\"", id.display_string()));
        let back: GroupId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
    }

    #[test]
    fn start_date_parses_only_iso_cells() {
        let mut ad = AdRecord {
            brand: "A".into(),
            library_id: "L1".into(),
            start_date: "2025-06-01".into(),
            ads_count: "3".into(),
            s3_key: String::new(),
            ad_link: String::new(),
            updated_date: String::new(),
            active_status: true,
            group: None,
        };
        assert!(ad.start_date_parsed().is_some());
        ad.start_date = "not a date".into();
        assert!(ad.start_date_parsed().is_none());
        ad.start_date = " 2025-06-01 ".into();
        assert!(ad.start_date_parsed().is_some());
    }
}
