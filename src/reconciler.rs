use crate::{
    api::DeviceApi,
    error::{ClientError, ReconcileError},
    model::{DesiredState, DeviceRecord, ObjectId, Presence},
};
use serde::Serialize;
use std::fmt::{self, Formatter};

/// The device a pause action applies to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Target {
    Existing(ObjectId),
    /// The device created by a preceding clone action.
    Created,
}

/// A single mutating call against the service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "action")]
pub enum Action {
    #[serde(rename_all = "camelCase")]
    Clone {
        clone_from: ObjectId,
        /// `None` uses the group of the template device.
        dest_group: Option<ObjectId>,
        name: String,
    },
    Delete { device: ObjectId },
    SetPause { device: Target, enabled: bool },
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clone {
                clone_from,
                dest_group: Some(group),
                name,
            } => write!(f, "clone {clone_from} into group {group} as '{name}'"),
            Self::Clone {
                clone_from,
                dest_group: None,
                name,
            } => write!(f, "clone {clone_from} into its own group as '{name}'"),
            Self::Delete { device } => write!(f, "delete device {device}"),
            Self::SetPause { device, enabled } => {
                let verb = if *enabled { "resume" } else { "pause" };
                match device {
                    Target::Existing(id) => write!(f, "{verb} device {id}"),
                    Target::Created => write!(f, "{verb} new device"),
                }
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub changed: bool,
    /// Id of the managed device, empty if there is none.
    pub device_id: String,
    pub message: String,
    pub failed: bool,
    /// Executed actions, or the planned ones in check mode.
    pub actions: Vec<Action>,
}

/// Compute the actions required to move `current` to `desired`.
pub fn plan(
    desired: &DesiredState,
    current: Option<&DeviceRecord>,
) -> Result<Vec<Action>, ReconcileError> {
    if let (Some(current), Some(template)) = (current, &desired.clone_from) {
        if &current.id == template {
            return Err(ReconcileError::TemplateTarget(template.clone()));
        }
    }

    Ok(match (desired.state, current) {
        (Presence::Absent, Some(current)) => vec![Action::Delete {
            device: current.id.clone(),
        }],
        (Presence::Absent, None) => vec![],
        (Presence::Present, Some(current)) if current.pause_status.satisfies(desired.enabled) => {
            vec![]
        }
        (Presence::Present, Some(current)) => vec![Action::SetPause {
            device: Target::Existing(current.id.clone()),
            enabled: desired.enabled,
        }],
        (Presence::Present, None) => {
            let clone_from = desired
                .clone_from
                .clone()
                .ok_or(ReconcileError::MissingParameter("clone_from"))?;
            if desired.device_name.is_empty() {
                return Err(ReconcileError::MissingParameter("device_name"));
            }
            vec![
                Action::Clone {
                    clone_from,
                    dest_group: desired.dest_group.clone(),
                    name: desired.device_name.clone(),
                },
                // the pause state of a fresh clone is not known
                Action::SetPause {
                    device: Target::Created,
                    enabled: desired.enabled,
                },
            ]
        }
    })
}

/// What has been done so far, kept to report partial progress on failure.
#[derive(Default)]
struct Progress {
    device: Option<ObjectId>,
    created: Option<ObjectId>,
    executed: Vec<Action>,
}

impl Progress {
    fn device_id(&self) -> String {
        self.created
            .as_ref()
            .or(self.device.as_ref())
            .map(ToString::to_string)
            .unwrap_or_default()
    }
}

pub struct DeviceReconciler<C>
where
    C: DeviceApi,
{
    client: C,
}

impl<C> DeviceReconciler<C>
where
    C: DeviceApi,
{
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Converge the device to `desired`.
    ///
    /// Never fails: errors are reported through [`OperationResult::failed`].
    /// Nothing is rolled back. Re-running after a failure picks up where the
    /// previous run stopped.
    pub async fn apply(&self, desired: &DesiredState) -> OperationResult {
        let mut progress = Progress::default();

        let outcome = self.reconcile(desired, &mut progress).await;
        match outcome {
            Ok(result) => result,
            Err(err) => {
                log::warn!("Failed to reconcile device '{}': {err}", desired.device_name);
                OperationResult {
                    changed: !progress.executed.is_empty(),
                    device_id: progress.device_id(),
                    message: err.to_string(),
                    failed: true,
                    actions: progress.executed,
                }
            }
        }
    }

    async fn lookup(&self, desired: &DesiredState) -> Result<Option<DeviceRecord>, ClientError> {
        match &desired.device_id {
            Some(id) => self.client.find_device_by_id(id).await,
            None => self.client.find_device_by_name(&desired.device_name).await,
        }
    }

    async fn reconcile(
        &self,
        desired: &DesiredState,
        progress: &mut Progress,
    ) -> Result<OperationResult, ReconcileError> {
        let current = self.lookup(desired).await?;
        log::debug!("Current device: {current:?}");

        let actions = plan(desired, current.as_ref())?;
        progress.device = current.map(|device| device.id);

        if actions.is_empty() {
            return Ok(OperationResult {
                changed: false,
                device_id: progress.device_id(),
                message: "Device already in desired state".to_string(),
                failed: false,
                actions,
            });
        }

        if desired.check_mode {
            log::info!("Check mode, not applying {} action(s)", actions.len());
            return Ok(OperationResult {
                changed: true,
                device_id: progress.device_id(),
                message: format!("Would {}", summary(&actions)),
                failed: false,
                actions,
            });
        }

        for action in actions {
            self.execute(&action, progress).await?;
            progress.executed.push(action);
        }

        Ok(OperationResult {
            changed: true,
            device_id: progress.device_id(),
            message: summary(&progress.executed),
            failed: false,
            actions: std::mem::take(&mut progress.executed),
        })
    }

    async fn execute(&self, action: &Action, progress: &mut Progress) -> Result<(), ClientError> {
        log::info!("Applying: {action}");

        match action {
            Action::Clone {
                clone_from,
                dest_group,
                name,
            } => {
                let dest_group = match dest_group {
                    Some(group) => group.clone(),
                    None => self.client.parent_group(clone_from).await?,
                };
                let device = self
                    .client
                    .clone_device(clone_from, &dest_group, name)
                    .await?;
                log::info!("Created device {} in group {dest_group}", device.id);
                progress.created = Some(device.id);
            }
            Action::Delete { device } => {
                self.client.delete_device(device).await?;
            }
            Action::SetPause { device, enabled } => {
                let device = match device {
                    Target::Existing(id) => id,
                    Target::Created => progress.created.as_ref().ok_or_else(|| {
                        ClientError::service(None, "No device was created to resume or pause")
                    })?,
                };
                self.client.set_pause_state(device, *enabled).await?;
            }
        }

        Ok(())
    }
}

fn summary(actions: &[Action]) -> String {
    actions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
