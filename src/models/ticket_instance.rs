use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Active,
    CheckedIn,
    Cancelled,
}

impl TicketStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::Active => "ACTIVE",
            TicketStatus::CheckedIn => "CHECKED_IN",
            TicketStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(TicketStatus::Active),
            "CHECKED_IN" => Some(TicketStatus::CheckedIn),
            "CANCELLED" => Some(TicketStatus::Cancelled),
            _ => None,
        }
    }
}

/// One individually redeemable seat, minted when its order is confirmed.
///
/// The scannable code is assigned once at mint and never regenerated.
/// Cancellation is a status change, never a row removal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketInstance {
    pub id: Uuid,
    pub order_id: Uuid,
    pub order_item_id: Uuid,
    pub ticket_type_id: Uuid,
    pub code: String,
    pub attendee_name: Option<String>,
    pub attendee_email: Option<String>,
    pub attendee_cpf: Option<String>,
    pub status: TicketStatus,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub checked_in_by: Option<Uuid>,
    pub check_in_location: Option<String>,
    pub check_in_notes: Option<String>,
    pub transferred_from: Option<String>,
    pub transferred_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TicketInstance {
    /// Scannable codes are uppercase and prefixed so venue scanners can
    /// reject foreign QR payloads cheaply.
    pub fn generate_code() -> String {
        format!("ETK-{}", Uuid::new_v4().simple().to_string().to_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_unique_and_prefixed() {
        let a = TicketInstance::generate_code();
        let b = TicketInstance::generate_code();
        assert!(a.starts_with("ETK-"));
        assert_eq!(a.len(), 4 + 32);
        assert_ne!(a, b);
    }
}
