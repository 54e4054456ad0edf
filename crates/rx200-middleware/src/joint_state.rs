//! Latest joint positions reported by the robot.
//!
//! [`JointStateSnapshot`] is written only by the joint-state subscription in
//! [`RosbridgeLink`][crate::ros2_bridge::RosbridgeLink]; everything else gets a
//! read-only copy through [`JointStateSnapshot::current`].

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use rx200_types::JointStateMessage;
use serde::Serialize;
use tracing::warn;

/// A point-in-time copy of the robot's joint positions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JointPositions {
    pub positions: BTreeMap<String, f64>,
    /// `None` until the first joint-state message arrives.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Thread-safe holder of the most recent [`JointPositions`].
#[derive(Debug, Default)]
pub struct JointStateSnapshot {
    inner: RwLock<JointPositions>,
}

impl JointStateSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the latest positions.
    pub fn current(&self) -> JointPositions {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Latest position of a single joint, if it has been reported.
    pub fn position(&self, joint: &str) -> Option<f64> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .positions
            .get(joint)
            .copied()
    }

    /// Merge a `sensor_msgs/JointState` into the snapshot.
    ///
    /// Names without a matching position are skipped.  Returns the number of
    /// joints updated.
    pub(crate) fn apply(&self, message: &JointStateMessage) -> usize {
        if message.name.len() != message.position.len() {
            warn!(
                names = message.name.len(),
                positions = message.position.len(),
                "joint state names and positions differ in length"
            );
        }
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut updated = 0;
        for (name, position) in message.name.iter().zip(&message.position) {
            guard.positions.insert(name.clone(), *position);
            updated += 1;
        }
        if updated > 0 {
            guard.updated_at = Some(Utc::now());
        }
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joint_state(names: &[&str], positions: &[f64]) -> JointStateMessage {
        JointStateMessage {
            name: names.iter().map(|n| n.to_string()).collect(),
            position: positions.to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn empty_snapshot_has_no_timestamp() {
        let snapshot = JointStateSnapshot::new();
        let current = snapshot.current();
        assert!(current.positions.is_empty());
        assert!(current.updated_at.is_none());
    }

    #[test]
    fn apply_merges_positions() {
        let snapshot = JointStateSnapshot::new();
        snapshot.apply(&joint_state(&["waist", "shoulder"], &[0.1, 0.2]));
        snapshot.apply(&joint_state(&["waist"], &[0.5]));

        assert_eq!(snapshot.position("waist"), Some(0.5));
        assert_eq!(snapshot.position("shoulder"), Some(0.2));
        assert!(snapshot.current().updated_at.is_some());
    }

    #[test]
    fn apply_skips_unpaired_names() {
        let snapshot = JointStateSnapshot::new();
        let updated = snapshot.apply(&joint_state(&["waist", "elbow"], &[0.3]));
        assert_eq!(updated, 1);
        assert_eq!(snapshot.position("elbow"), None);
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let snapshot = JointStateSnapshot::new();
        snapshot.apply(&joint_state(&["left_finger"], &[0.015]));
        let json = serde_json::to_value(snapshot.current()).unwrap();
        assert_eq!(json["positions"]["left_finger"], 0.015);
        assert!(json.get("updatedAt").is_some());
    }
}
