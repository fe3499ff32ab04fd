//! LogSink - pose event summaries via tracing

use contracts::{xyz_rpy, ContractError, PoseEvent, PoseSink};
use tracing::{debug, info, instrument, warn};

/// Sink that logs a one-line summary of every event
pub struct LogSink {
    name: String,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_event(&self, event: &PoseEvent) {
        match event {
            PoseEvent::Update(update) => {
                let [x, y, z, _, _, yaw] = xyz_rpy(&update.pose);
                info!(
                    sink = %self.name,
                    stamp = update.stamp,
                    x, y, z, yaw,
                    inliers = update.diagnostics.inliers,
                    "Pose update"
                );
            }
            PoseEvent::Lost(lost) => {
                warn!(sink = %self.name, stamp = lost.stamp, frame = %lost.child_frame_id, "Odometry lost");
            }
            PoseEvent::Correction { stamp, parent, child, .. } => {
                debug!(sink = %self.name, stamp, %parent, %child, "Correction");
            }
        }
    }
}

impl PoseSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, event),
        fields(sink = %self.name, kind = event.kind())
    )]
    async fn write(&mut self, event: &PoseEvent) -> Result<(), ContractError> {
        self.log_event(event);
        Ok(())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{PoseLost, Transform};

    #[tokio::test]
    async fn test_log_sink_accepts_every_kind() {
        let mut sink = LogSink::new("test_log");
        let lost = PoseEvent::Lost(PoseLost::new(1.0, "odom".into(), "base_link".into()));
        let correction = PoseEvent::Correction {
            stamp: 1.0,
            parent: "odom".into(),
            child: "odom_combined".into(),
            transform: Transform::identity(),
        };

        assert!(sink.write(&lost).await.is_ok());
        assert!(sink.write(&correction).await.is_ok());
        assert!(sink.close().await.is_ok());
    }

    #[test]
    fn test_log_sink_name() {
        let sink = LogSink::new("my_logger");
        assert_eq!(sink.name(), "my_logger");
    }
}
