use crate::api::DeviceApi;
use crate::credentials::{CredentialInjector, CredentialProvider};
use crate::error::ClientError;
use crate::model::{DeviceRecord, ObjectId, PauseStatus};
use async_trait::async_trait;
use reqwest::header::LOCATION;
use reqwest::{redirect, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use url::Url;

const DEVICE_COLUMNS: &str = "objid,device,host,group,parentid,active";
const PAUSE_MESSAGE: &str = "paused by prtg-reconciler";
/// Upper bound PRTG applies to table queries unless told otherwise.
const TABLE_COUNT: &str = "10000";

/// Transport settings for talking to PRTG.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_validate_certs")]
    pub validate_certs: bool,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_validate_certs() -> bool {
    true
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            validate_certs: default_validate_certs(),
            timeout: default_timeout(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PrtgClientBuilder {
    api: Url,
    credentials: Arc<dyn CredentialProvider>,
    config: ClientConfig,
}

impl PrtgClientBuilder {
    pub fn new<C>(api: &str, credentials: C) -> Result<Self, ClientError>
    where
        C: CredentialProvider + 'static,
    {
        Ok(Self::from_url(Url::parse(api)?, credentials))
    }

    pub fn from_url<C>(api: Url, credentials: C) -> Self
    where
        C: CredentialProvider + 'static,
    {
        Self {
            api,
            credentials: Arc::new(credentials),
            config: ClientConfig::default(),
        }
    }

    pub fn client(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<PrtgClient, ClientError> {
        // the id of a cloned device is only visible in the redirect target
        let client = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(self.config.timeout)
            .danger_accept_invalid_certs(!self.config.validate_certs)
            .build()?;
        Ok(PrtgClient::new(client, self.api, self.credentials))
    }
}

#[derive(Clone, Debug)]
pub struct PrtgClient {
    client: reqwest::Client,
    api: Url,
    credentials: Arc<dyn CredentialProvider>,
}

impl PrtgClient {
    pub fn new(
        client: reqwest::Client,
        api: Url,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            client,
            api,
            credentials,
        }
    }

    async fn request<R, F, FR, ResFut>(
        &self,
        url: Url,
        request_handler: F,
        response_handler: FR,
    ) -> Result<R, ClientError>
    where
        F: FnOnce(RequestBuilder) -> RequestBuilder,
        FR: FnOnce(Response) -> ResFut,
        ResFut: Future<Output = Result<R, ClientError>>,
    {
        let request = self
            .client
            .get(url)
            .inject_credentials(self.credentials.as_ref());

        let request = request_handler(request);
        let response = request.send().await.map_err(ClientError::connection)?;

        response_handler(response).await
    }

    fn url(&self, path: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.api.clone();
        url.path_segments_mut()
            .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .extend(path);
        Ok(url)
    }

    async fn devices(&self, filter: (&str, &str)) -> Result<Vec<DeviceRecord>, ClientError> {
        self.request(
            self.url(&["api", "table.json"])?,
            |r| {
                r.query(&[
                    ("content", "devices"),
                    ("output", "json"),
                    ("columns", DEVICE_COLUMNS),
                    ("count", TABLE_COUNT),
                    filter,
                ])
            },
            table_response,
        )
        .await
    }

    #[instrument(skip_all, err, fields(name = name))]
    pub async fn find_device_by_name(&self, name: &str) -> Result<Option<DeviceRecord>, ClientError> {
        let devices = self.devices(("filter_device", name)).await?;
        log::debug!("Found {} candidate(s) for {name}", devices.len());
        Ok(devices.into_iter().find(|device| device.name == name))
    }

    #[instrument(skip_all, err, fields(id = %id))]
    pub async fn find_device_by_id(
        &self,
        id: &ObjectId,
    ) -> Result<Option<DeviceRecord>, ClientError> {
        let devices = self.devices(("filter_objid", id.as_str())).await?;
        Ok(devices.into_iter().find(|device| &device.id == id))
    }

    #[instrument(skip_all, ret, err, fields(device = %device))]
    pub async fn parent_group(&self, device: &ObjectId) -> Result<ObjectId, ClientError> {
        match self.find_device_by_id(device).await? {
            Some(DeviceRecord {
                parent_id: Some(parent),
                ..
            }) => Ok(parent),
            Some(_) => Err(ClientError::service(
                None,
                format!("No parent group reported for device {device}"),
            )),
            None => Err(ClientError::NotFound {
                what: format!("device {device}"),
            }),
        }
    }

    #[instrument(
        skip_all, ret, err,
        fields(clone_from = %clone_from, dest_group = %dest_group, name = name)
    )]
    pub async fn clone_device(
        &self,
        clone_from: &ObjectId,
        dest_group: &ObjectId,
        name: &str,
    ) -> Result<DeviceRecord, ClientError> {
        let id = self
            .request(
                self.url(&["api", "duplicateobject.htm"])?,
                |r| {
                    r.query(&[
                        ("id", clone_from.as_str()),
                        ("name", name),
                        ("host", name),
                        ("targetid", dest_group.as_str()),
                    ])
                },
                duplicate_response,
            )
            .await?;

        Ok(DeviceRecord {
            id,
            name: name.to_string(),
            host: name.to_string(),
            group: String::new(),
            parent_id: Some(dest_group.clone()),
            pause_status: PauseStatus::Unknown,
        })
    }

    #[instrument(skip_all, err, fields(device = %device, enabled = enabled))]
    pub async fn set_pause_state(&self, device: &ObjectId, enabled: bool) -> Result<(), ClientError> {
        // PRTG: action=0 pauses, action=1 resumes
        let action = if enabled { "1" } else { "0" };
        self.request(
            self.url(&["api", "pause.htm"])?,
            |r| {
                r.query(&[
                    ("id", device.as_str()),
                    ("pausemsg", PAUSE_MESSAGE),
                    ("action", action),
                ])
            },
            command_response,
        )
        .await
    }

    #[instrument(skip_all, err, fields(device = %device))]
    pub async fn delete_device(&self, device: &ObjectId) -> Result<(), ClientError> {
        self.request(
            self.url(&["api", "deleteobject.htm"])?,
            |r| r.query(&[("id", device.as_str()), ("approve", "1")]),
            command_response,
        )
        .await
    }
}

#[async_trait]
impl DeviceApi for PrtgClient {
    async fn find_device_by_name(&self, name: &str) -> Result<Option<DeviceRecord>, ClientError> {
        PrtgClient::find_device_by_name(self, name).await
    }

    async fn find_device_by_id(&self, id: &ObjectId) -> Result<Option<DeviceRecord>, ClientError> {
        PrtgClient::find_device_by_id(self, id).await
    }

    async fn parent_group(&self, device: &ObjectId) -> Result<ObjectId, ClientError> {
        PrtgClient::parent_group(self, device).await
    }

    async fn clone_device(
        &self,
        clone_from: &ObjectId,
        dest_group: &ObjectId,
        name: &str,
    ) -> Result<DeviceRecord, ClientError> {
        PrtgClient::clone_device(self, clone_from, dest_group, name).await
    }

    async fn set_pause_state(&self, device: &ObjectId, enabled: bool) -> Result<(), ClientError> {
        PrtgClient::set_pause_state(self, device, enabled).await
    }

    async fn delete_device(&self, device: &ObjectId) -> Result<(), ClientError> {
        PrtgClient::delete_device(self, device).await
    }
}

#[derive(serde::Deserialize)]
struct DeviceTable {
    #[serde(default)]
    devices: Vec<DeviceRow>,
}

/// A row of `table.json?content=devices`, as PRTG sends it.
#[derive(serde::Deserialize)]
struct DeviceRow {
    objid: ObjectId,
    device: String,
    #[serde(default)]
    host: String,
    #[serde(default)]
    group: String,
    #[serde(default)]
    parentid: Option<ObjectId>,
    #[serde(default)]
    active_raw: Option<i64>,
}

impl From<DeviceRow> for DeviceRecord {
    fn from(row: DeviceRow) -> Self {
        Self {
            id: row.objid,
            name: row.device,
            host: row.host,
            group: row.group,
            parent_id: row.parentid,
            pause_status: PauseStatus::from_active_raw(row.active_raw),
        }
    }
}

#[derive(serde::Deserialize)]
struct ErrorInformation {
    error: String,
}

async fn table_response(response: Response) -> Result<Vec<DeviceRecord>, ClientError> {
    log::debug!(
        "Eval table response: {} {}",
        response.status(),
        response.url().path()
    );
    match response.status() {
        status if status.is_success() => {
            let table: DeviceTable = read_json(response).await?;
            Ok(table.devices.into_iter().map(DeviceRecord::from).collect())
        }
        _ => default_response(response).await,
    }
}

async fn duplicate_response(response: Response) -> Result<ObjectId, ClientError> {
    log::debug!(
        "Eval duplicate response: {} {}",
        response.status(),
        response.url().path()
    );
    let status = response.status();
    if !(status.is_success() || status.is_redirection()) {
        return default_response(response).await;
    }

    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|location| location.to_str().ok())
        .map(|location| response.url().join(location))
        .transpose()?;

    location
        .as_ref()
        .and_then(created_object_id)
        .ok_or_else(|| {
            ClientError::service(
                Some(status),
                "Unable to parse new device ID from return request",
            )
        })
}

async fn command_response(response: Response) -> Result<(), ClientError> {
    log::debug!(
        "Eval command response: {} {}",
        response.status(),
        response.url().path()
    );
    match response.status() {
        status if status.is_success() || status == StatusCode::FOUND => Ok(()),
        _ => default_response(response).await,
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    let body = response.text().await?;
    serde_json::from_str(&body)
        .map_err(|err| ClientError::service(Some(status), format!("Invalid response: {err}")))
}

async fn default_response<T>(response: Response) -> Result<T, ClientError> {
    let code = response.status();
    match code {
        StatusCode::UNAUTHORIZED => Err(ClientError::Auth),
        StatusCode::NOT_FOUND => Err(ClientError::NotFound {
            what: response.url().path().to_string(),
        }),
        _ => {
            let body = response.text().await.unwrap_or_default();
            let detail = match serde_json::from_str::<ErrorInformation>(&body) {
                Ok(info) => info.error,
                Err(_) => body.trim().chars().take(512).collect(),
            };
            Err(ClientError::service(Some(code), detail))
        }
    }
}

/// Extract the id of a freshly duplicated object from the redirect target.
///
/// PRTG redirects to the new object's page (`/device.htm?id=1234`), possibly
/// wrapped in a login redirect (`/public/login.htm?loginurl=%2Fdevice.htm%3Fid%3D1234`).
fn created_object_id(target: &Url) -> Option<ObjectId> {
    for (key, value) in target.query_pairs() {
        if key == "id" && !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
            return Some(ObjectId::from(value.as_ref()));
        }
        if value.contains("id=") {
            if let Some(id) = target.join(&value).ok().as_ref().and_then(created_object_id) {
                return Some(id);
            }
        }
    }
    None
}
