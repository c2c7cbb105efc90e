use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// GoodX record identifier.
///
/// The API hands these out as integers, but browsers and query strings turn
/// them into strings along the way, so both forms deserialize to the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uid(pub i64);

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Uid {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Uid)
    }
}

impl From<i64> for Uid {
    fn from(value: i64) -> Self {
        Uid(value)
    }
}

impl Serialize for Uid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.0)
    }
}

impl<'de> Deserialize<'de> for Uid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(value) => Ok(Uid(value)),
            Raw::Text(text) => text
                .parse()
                .map_err(|_| serde::de::Error::custom(format!("invalid uid: {text:?}"))),
        }
    }
}

/// `{data, status}` wrapper used by GoodX and passed through by the proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Diary {
    pub uid: Uid,
    #[serde(default)]
    pub name: String,
    pub entity_uid: Uid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingStatus {
    pub uid: Uid,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingType {
    pub uid: Uid,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub uid: Uid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub surname: String,
}

impl Patient {
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.surname, self.name)
    }
}

/// One line of a day sheet as served by `GET /bookings`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BookingRow {
    pub uid: Option<Uid>,
    #[serde(default)]
    pub diary_uid: Option<Uid>,
    #[serde(default)]
    pub entity_uid: Option<Uid>,
    #[serde(default)]
    pub booking_type_uid: Option<Uid>,
    #[serde(default)]
    pub booking_status_uid: Option<Uid>,
    #[serde(default)]
    pub patient_uid: Option<Uid>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub time_pretty: String,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub patient_name: Option<String>,
    #[serde(default)]
    pub patient_surname: Option<String>,
    #[serde(default)]
    pub cancelled: bool,
}

/// Create payload. Carries the entity, never a uid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewBooking {
    pub diary_uid: Uid,
    pub entity_uid: Uid,
    pub booking_type_uid: Uid,
    pub booking_status_uid: Uid,
    pub patient_uid: Uid,
    pub start_time: String,
    pub duration: u32,
    pub reason: String,
    pub cancelled: bool,
}

/// Update payload. Existing rows keep their entity, so there is no field for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingUpdate {
    pub diary_uid: Uid,
    pub booking_type_uid: Uid,
    pub booking_status_uid: Uid,
    pub patient_uid: Uid,
    pub start_time: String,
    pub duration: u32,
    pub reason: String,
    pub cancelled: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelRequest<T> {
    pub model: T,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(rename = "session_UID", default, skip_serializing_if = "Option::is_none")]
    pub session_uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of a create/update/delete reply. `data` stays untyped since GoodX
/// echoes different shapes per operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MutationResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl MutationResponse {
    /// GoodX reports errors either as plain text or as an object.
    pub fn error_text(&self) -> Option<String> {
        match self.error.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DiaryScopeQuery {
    pub diary_uid: Option<String>,
    pub entity_uid: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PatientsQuery {
    pub entity_uid: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BookingsQuery {
    pub diary_uid: Option<String>,
    pub date: Option<String>,
}
