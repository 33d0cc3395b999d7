use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of the organization roster.
///
/// Membership standing is presentation data; it says nothing about what
/// the logged-in user may do. Capabilities come from the identity
/// record, never from the roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Member {
    pub id: i64,
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(rename = "joinedOn")]
    pub joined_on: Option<NaiveDate>,
    pub standing: Option<String>,
}

impl Member {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn display_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }

    pub fn is_active(&self) -> bool {
        matches!(self.standing.as_deref(), Some("active") | None)
    }
}

/// Tenant named in roster responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct OrganizationInfo {
    pub id: String,
    pub name: Option<String>,
}

// API response wrapper for the members endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct MembersResponse {
    pub organization: Option<OrganizationInfo>,
    pub members: Vec<Member>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_members_response() {
        let json = r#"{
            "organization": {"id": "org-100", "name": "Riverbend Assembly"},
            "members": [
                {"id": 7, "firstName": "Dana", "lastName": "Whitfield", "email": "dana@example.org", "standing": "active"},
                {"id": 9, "firstName": "Luis", "lastName": "Ortega", "joinedOn": "2024-11-30", "standing": "lapsed"}
            ]
        }"#;

        let parsed: MembersResponse = serde_json::from_str(json).expect("parse members");
        assert_eq!(parsed.members.len(), 2);
        assert_eq!(parsed.organization.unwrap().id, "org-100");

        let dana = &parsed.members[0];
        assert_eq!(dana.full_name(), "Dana Whitfield");
        assert_eq!(dana.display_name(), "Whitfield, Dana");
        assert!(dana.is_active());

        let luis = &parsed.members[1];
        assert!(!luis.is_active());
        assert_eq!(
            luis.joined_on,
            Some(NaiveDate::from_ymd_opt(2024, 11, 30).unwrap())
        );
    }
}
