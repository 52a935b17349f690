use serde::de::{self, Error};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::{self, Formatter};

/// Identifier PRTG assigns to an object (device, group, probe).
///
/// PRTG reports these as numbers, but they are treated as opaque here. Both
/// the numeric and the string form are accepted when deserializing.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ObjectId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for ObjectId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct StringOrNumber;

        impl<'de> de::Visitor<'de> for StringOrNumber {
            type Value = ObjectId;

            fn expecting(&self, formatter: &mut Formatter) -> fmt::Result {
                write!(formatter, "Expected an object id, either as number or string")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: Error,
            {
                let v = v.trim();
                if v.is_empty() {
                    return Err(E::custom("object id must not be empty"));
                }
                Ok(ObjectId::from(v))
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: Error,
            {
                Ok(ObjectId::from(v))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: Error,
            {
                u64::try_from(v)
                    .map(ObjectId::from)
                    .map_err(|_| E::custom(format!("object id must not be negative: {v}")))
            }
        }

        deserializer.deserialize_any(StringOrNumber)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    #[default]
    Present,
    Absent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PauseStatus {
    Active,
    Paused,
    Unknown,
}

impl PauseStatus {
    /// Map PRTG's `active_raw` column.
    pub fn from_active_raw(raw: Option<i64>) -> Self {
        match raw {
            Some(-1) => Self::Active,
            Some(0) => Self::Paused,
            _ => Self::Unknown,
        }
    }

    /// Whether a device in this state already satisfies the desired `enabled` flag.
    ///
    /// An unknown status never does.
    pub fn satisfies(self, enabled: bool) -> bool {
        matches!(
            (self, enabled),
            (Self::Active, true) | (Self::Paused, false)
        )
    }
}

/// A device as currently known by PRTG.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeviceRecord {
    pub id: ObjectId,
    pub name: String,
    pub host: String,
    pub group: String,
    pub parent_id: Option<ObjectId>,
    pub pause_status: PauseStatus,
}

/// The declared state of a single device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DesiredState {
    pub device_name: String,
    /// Look the device up by identifier instead of by name.
    pub device_id: Option<ObjectId>,
    /// Template device, required when the device has to be created.
    pub clone_from: Option<ObjectId>,
    /// Target group for a new device. Defaults to the group of the template.
    pub dest_group: Option<ObjectId>,
    pub state: Presence,
    pub enabled: bool,
    /// Report what would change, but don't touch anything.
    pub check_mode: bool,
}

impl DesiredState {
    pub fn new<N: Into<String>>(device_name: N) -> Self {
        Self {
            device_name: device_name.into(),
            device_id: None,
            clone_from: None,
            dest_group: None,
            state: Presence::Present,
            enabled: true,
            check_mode: false,
        }
    }

    pub fn clone_from<I: Into<ObjectId>>(mut self, id: I) -> Self {
        self.clone_from = Some(id.into());
        self
    }

    pub fn dest_group<I: Into<ObjectId>>(mut self, id: I) -> Self {
        self.dest_group = Some(id.into());
        self
    }

    pub fn device_id<I: Into<ObjectId>>(mut self, id: I) -> Self {
        self.device_id = Some(id.into());
        self
    }

    pub fn state(mut self, state: Presence) -> Self {
        self.state = state;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_object_id_forms() {
        let ids: Vec<ObjectId> = serde_json::from_str(r#"[1234, "5678", " 42 "]"#).unwrap();
        assert_eq!(
            ids,
            vec![
                ObjectId::from(1234),
                ObjectId::from("5678"),
                ObjectId::from("42")
            ]
        );

        assert!(serde_json::from_str::<ObjectId>("-1").is_err());
        assert!(serde_json::from_str::<ObjectId>(r#""""#).is_err());
    }

    #[test]
    fn test_pause_status() {
        assert_eq!(PauseStatus::from_active_raw(Some(-1)), PauseStatus::Active);
        assert_eq!(PauseStatus::from_active_raw(Some(0)), PauseStatus::Paused);
        assert_eq!(PauseStatus::from_active_raw(Some(7)), PauseStatus::Unknown);
        assert_eq!(PauseStatus::from_active_raw(None), PauseStatus::Unknown);

        assert!(PauseStatus::Active.satisfies(true));
        assert!(!PauseStatus::Active.satisfies(false));
        assert!(PauseStatus::Paused.satisfies(false));
        assert!(!PauseStatus::Paused.satisfies(true));
        assert!(!PauseStatus::Unknown.satisfies(true));
        assert!(!PauseStatus::Unknown.satisfies(false));
    }
}
