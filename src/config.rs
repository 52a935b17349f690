use crate::client::ClientConfig;
use crate::credentials::Passhash;
use crate::model::{DesiredState, ObjectId, Presence};
use anyhow::{bail, Context};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::fs::File;
use std::path::Path;
use url::Url;

/// Desired state of a single device, as written by the caller.
#[derive(Debug, serde::Deserialize)]
pub struct DesiredStateFile {
    /// Base URL of the PRTG installation (e.g. https://prtg.example.com/)
    pub prtg_url: String,
    pub api_user: String,
    #[serde(deserialize_with = "secret")]
    pub api_passhash: SecretString,

    /// Name (and host) of the device. Required unless `device_id` is set.
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub device_id: Option<ObjectId>,
    #[serde(default)]
    pub clone_from: Option<ObjectId>,
    #[serde(default)]
    pub dest_group: Option<ObjectId>,

    #[serde(default)]
    pub state: Presence,
    /// Enabling a device resumes it, disabling pauses it.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub check_mode: bool,

    #[serde(flatten)]
    pub client: ClientConfig,
}

fn default_enabled() -> bool {
    true
}

fn secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

/// Connection details split off the desired state.
#[derive(Debug)]
pub struct Connection {
    pub url: Url,
    pub credentials: Passhash,
    pub client: ClientConfig,
}

impl DesiredStateFile {
    pub fn into_parts(self) -> anyhow::Result<(Connection, DesiredState)> {
        let url = Url::parse(&self.prtg_url)
            .with_context(|| format!("invalid prtg_url: {}", self.prtg_url))?;

        let device_name = self.device_name.unwrap_or_default();
        if device_name.is_empty() && self.device_id.is_none() {
            bail!("one of device_name or device_id is required");
        }

        let connection = Connection {
            url,
            credentials: Passhash {
                username: self.api_user,
                passhash: self.api_passhash,
            },
            client: self.client,
        };

        let desired = DesiredState {
            device_name,
            device_id: self.device_id,
            clone_from: self.clone_from,
            dest_group: self.dest_group,
            state: self.state,
            enabled: self.enabled,
            check_mode: self.check_mode,
        };

        Ok((connection, desired))
    }
}

pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<DesiredStateFile> {
    Ok(serde_yaml::from_reader(File::open(path)?)?)
}

#[cfg(test)]
mod test {
    use super::*;
    use secrecy::ExposeSecret;
    use std::time::Duration;

    #[test]
    fn test_parse_full() {
        let file: DesiredStateFile = serde_yaml::from_str(
            r#"
prtg_url: https://prtg.example.com/
api_user: ansible_api
api_passhash: "1234567890"
device_name: myhost.example.com
clone_from: 1234
dest_group: "5678"
state: present
enabled: false
validate_certs: false
timeout: 5s
"#,
        )
        .unwrap();

        let (connection, desired) = file.into_parts().unwrap();

        assert_eq!(connection.url.as_str(), "https://prtg.example.com/");
        assert_eq!(connection.credentials.username, "ansible_api");
        assert_eq!(connection.credentials.passhash.expose_secret(), "1234567890");
        assert_eq!(
            connection.client,
            ClientConfig {
                validate_certs: false,
                timeout: Duration::from_secs(5),
            }
        );
        assert_eq!(
            desired,
            DesiredState::new("myhost.example.com")
                .clone_from(1234)
                .dest_group(5678)
                .enabled(false)
        );
    }

    #[test]
    fn test_defaults() {
        let file: DesiredStateFile = serde_yaml::from_str(
            r#"
prtg_url: https://prtg.example.com
api_user: api
api_passhash: secret
device_name: myhost
"#,
        )
        .unwrap();

        let (connection, desired) = file.into_parts().unwrap();

        assert_eq!(connection.client, ClientConfig::default());
        assert_eq!(desired.state, Presence::Present);
        assert!(desired.enabled);
        assert!(!desired.check_mode);
    }

    #[test]
    fn test_requires_name_or_id() {
        let file: DesiredStateFile = serde_yaml::from_str(
            r#"
prtg_url: https://prtg.example.com
api_user: api
api_passhash: secret
state: absent
"#,
        )
        .unwrap();

        assert!(file.into_parts().is_err());
    }

    #[test]
    fn test_invalid_state() {
        let file = serde_yaml::from_str::<DesiredStateFile>(
            r#"
prtg_url: https://prtg.example.com
api_user: api
api_passhash: secret
device_name: myhost
state: gone
"#,
        );

        assert!(file.is_err());
    }

    #[test]
    fn test_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut file,
            b"prtg_url: https://prtg.example.com\napi_user: api\napi_passhash: secret\ndevice_id: 2044\nstate: absent\n",
        )
        .unwrap();

        let (_, desired) = load(file.path()).unwrap().into_parts().unwrap();
        assert_eq!(
            desired,
            DesiredState::new("")
                .device_id(2044)
                .state(Presence::Absent)
        );
    }

    #[test]
    fn test_debug_hides_passhash() {
        let file: DesiredStateFile = serde_yaml::from_str(
            r#"
prtg_url: https://prtg.example.com
api_user: api
api_passhash: topsecret
device_name: myhost
"#,
        )
        .unwrap();

        assert!(!format!("{file:?}").contains("topsecret"));
    }
}
