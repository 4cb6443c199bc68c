use async_trait::async_trait;
use opnctl_domain::{DeploymentName, ResourceId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Best-effort notification fan-out. Distinct from the durable execution
/// log the state store owns: a dropped event here is not a correctness
/// issue, since any subscriber that cares about completeness reads the
/// store's event log instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineEvent {
    WaveStarted { deployment: DeploymentName, wave_index: usize, resource_count: usize },
    WaveCompleted { deployment: DeploymentName, wave_index: usize },
    ResourceApplied { deployment: DeploymentName, resource: ResourceId },
    ResourceFailed { deployment: DeploymentName, resource: ResourceId, message: String },
    RollbackStarted { deployment: DeploymentName, reason: String },
    RollbackCompleted { deployment: DeploymentName },
}

#[async_trait]
pub trait EventBus: Send + Sync + 'static {
    async fn publish(&self, event: EngineEvent);
}

/// A [`tokio::sync::broadcast`]-backed event bus. Late subscribers miss
/// earlier events; that is acceptable since the store's event log is the
/// durable source of truth.
pub struct BroadcastEventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl BroadcastEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl EventBus for BroadcastEventBus {
    async fn publish(&self, event: EngineEvent) {
        // No active subscribers is not an error; the event is simply dropped.
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = BroadcastEventBus::new(16);
        let mut rx = bus.subscribe();
        bus.publish(EngineEvent::WaveCompleted {
            deployment: DeploymentName::new("lan"),
            wave_index: 0,
        })
        .await;
        let received = rx.recv().await.unwrap();
        assert!(matches!(received, EngineEvent::WaveCompleted { .. }));
    }
}
