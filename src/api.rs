use crate::error::ClientError;
use crate::model::{DeviceRecord, ObjectId};
use async_trait::async_trait;

/// The operations the reconciler needs from the monitoring service.
///
/// None of these retry. A failure is returned as soon as it happens.
#[async_trait]
pub trait DeviceApi: Send + Sync {
    /// First device whose name is exactly `name`, in service order.
    async fn find_device_by_name(&self, name: &str) -> Result<Option<DeviceRecord>, ClientError>;

    async fn find_device_by_id(&self, id: &ObjectId) -> Result<Option<DeviceRecord>, ClientError>;

    /// The group containing `device`.
    async fn parent_group(&self, device: &ObjectId) -> Result<ObjectId, ClientError>;

    /// Clone `clone_from` into `dest_group` under `name`. The returned record
    /// carries the new id. Its pause status is unknown.
    async fn clone_device(
        &self,
        clone_from: &ObjectId,
        dest_group: &ObjectId,
        name: &str,
    ) -> Result<DeviceRecord, ClientError>;

    /// Resume (`enabled`) or pause monitoring. Idempotent on the service side.
    async fn set_pause_state(&self, device: &ObjectId, enabled: bool) -> Result<(), ClientError>;

    async fn delete_device(&self, device: &ObjectId) -> Result<(), ClientError>;
}
