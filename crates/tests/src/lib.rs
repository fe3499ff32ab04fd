//! # Integration Tests
//!
//! 跨 crate 的集成测试与端到端场景。
//!
//! 负责：
//! - 配置 → 节点的装配测试
//! - 会话场景 (单调性、计数恢复、运动门控、异步 IMU)
//! - Mock 传感器组 → 队列 → 节点 → 分发的 e2e 测试

#[cfg(test)]
mod fixtures {
    use contracts::{
        CameraInfo, ImageData, ImuSample, LaserScan, LineId, OdomSample, SensorPayload,
        TimestampedItem, Transform,
    };
    use nalgebra::{Quaternion, Vector3};

    pub fn scan(stamp: f64) -> TimestampedItem<SensorPayload> {
        TimestampedItem::new(
            LineId::Scan2d,
            stamp,
            SensorPayload::Scan2d(LaserScan {
                angle_min: -1.0,
                angle_max: 1.0,
                angle_increment: 0.5,
                range_min: 0.1,
                range_max: 10.0,
                ranges: vec![2.0; 5],
                frame_id: "laser".into(),
            }),
        )
    }

    pub fn odom(stamp: f64, pose: Transform) -> TimestampedItem<SensorPayload> {
        TimestampedItem::new(
            LineId::Odom,
            stamp,
            SensorPayload::Odom(OdomSample {
                pose,
                frame_id: "odom".into(),
                child_frame_id: "base_link".into(),
            }),
        )
    }

    pub fn image(line: LineId, stamp: f64, encoding: &str) -> TimestampedItem<SensorPayload> {
        TimestampedItem::new(
            line,
            stamp,
            SensorPayload::Image(ImageData {
                width: 64,
                height: 48,
                encoding: encoding.to_string(),
                data: Default::default(),
            }),
        )
    }

    pub fn camera_info(stamp: f64) -> TimestampedItem<SensorPayload> {
        TimestampedItem::new(
            LineId::CameraInfo,
            stamp,
            SensorPayload::CameraInfo(CameraInfo {
                width: 64,
                height: 48,
                fx: 50.0,
                fy: 50.0,
                cx: 32.0,
                cy: 24.0,
                tx: 0.0,
                frame_id: "camera".into(),
            }),
        )
    }

    pub fn imu(stamp: f64) -> TimestampedItem<SensorPayload> {
        TimestampedItem::new(
            LineId::Imu,
            stamp,
            SensorPayload::Imu(ImuSample {
                orientation: Quaternion::new(0.0, 0.0, 0.0, 0.0),
                angular_velocity: Vector3::zeros(),
                linear_acceleration: Vector3::new(0.0, 0.0, 9.81),
                frame_id: "base_link".into(),
            }),
        )
    }
}

#[cfg(test)]
mod config_tests {
    use config_loader::{ConfigFormat, ConfigLoader, Overrides};
    use contracts::{NoLookup, SinkType};
    use pose_session::{DeadReckoningBackend, OdometryNode};

    const ODOM_TOML: &str = r#"
        version = "V1"

        [sync]
        subscribe_depth = false
        subscribe_scan = true
        subscribe_odom = true
        approx_sync = true
        queue_size = 5

        [session]
        reset_countdown = 2
        expected_update_rate = 0.0

        [backend]
        kind = "mock"
        min_inliers = 3

        [[sinks]]
        name = "log"
        sink_type = "log"
    "#;

    #[test]
    fn test_layered_config_builds_a_node() {
        let overrides = Overrides::from_vars([(
            "ODOM_SYNC__SYNC__QUEUE_SIZE".to_string(),
            "7".to_string(),
        )])
        .with_commands(["session.reset_countdown=4"].as_slice())
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odom.toml");
        std::fs::write(&path, ODOM_TOML).unwrap();

        let config = ConfigLoader::load_layered(Some(&path), &overrides).unwrap();
        assert_eq!(config.sync.queue_size, 7);
        assert_eq!(config.session.reset_countdown, 4);
        // Clamped while loading
        assert_eq!(config.backend.min_inliers, contracts::MIN_INLIERS_FLOOR);
        assert_eq!(config.sinks[0].sink_type, SinkType::Log);

        let backend = DeadReckoningBackend::from_config(&config.backend);
        let mut node = OdometryNode::new(&config, backend, NoLookup).unwrap();
        assert_eq!(node.engine().shape().name(), "odom+scan2d");
        assert_eq!(node.engine().queue_size(), 7);
        assert_eq!(node.session().countdown_remaining(), 4);
        node.shutdown();
    }

    #[test]
    fn test_serialized_config_loads_back() {
        let config = ConfigLoader::load_from_str(ODOM_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&config).unwrap();
        let reloaded = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();

        assert_eq!(reloaded.sync.queue_size, config.sync.queue_size);
        assert_eq!(reloaded.session.reset_countdown, 2);
        assert_eq!(reloaded.sinks.len(), 1);
    }
}

#[cfg(test)]
mod scenario_tests {
    use contracts::{
        transform_from_xyz_rpy, LineId, NoLookup, OdometryConfig, PoseEvent, SessionConfig,
        SyncConfig, Transform,
    };
    use pose_session::{DeadReckoningBackend, Disposition, OdometryNode, ScriptedBackend, StaticLookup};
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    use crate::fixtures::{camera_info, image, imu, odom, scan};

    fn scan_config(session: SessionConfig) -> OdometryConfig {
        OdometryConfig {
            sync: SyncConfig {
                subscribe_depth: false,
                subscribe_scan: true,
                ..Default::default()
            },
            session,
            ..Default::default()
        }
    }

    fn x(value: f64) -> Transform {
        transform_from_xyz_rpy(value, 0.0, 0.0, 0.0, 0.0, 0.0)
    }

    #[test]
    fn test_out_of_order_bundle_rejected_once() {
        let config = scan_config(SessionConfig::default());
        let mut node = OdometryNode::new(&config, ScriptedBackend::new([]), NoLookup).unwrap();

        let dispositions: Vec<_> = [1.0, 2.0, 1.5, 3.0]
            .into_iter()
            .filter_map(|stamp| node.on_item(scan(stamp)))
            .collect();

        assert_eq!(
            dispositions,
            vec![
                Disposition::Estimated,
                Disposition::Estimated,
                Disposition::Stale,
                Disposition::Estimated,
            ]
        );
        assert_eq!(node.session().stats().stale, 1);
        let stamps: Vec<f64> = node.take_events().iter().map(PoseEvent::stamp).collect();
        assert_eq!(stamps, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_odometry_only_session_rejects_stale_stamps() {
        let config = OdometryConfig {
            sync: SyncConfig {
                subscribe_depth: false,
                subscribe_odom: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut node = OdometryNode::new(&config, ScriptedBackend::new([]), NoLookup).unwrap();
        assert_eq!(node.engine().shape().name(), "odom");

        let dispositions: Vec<_> = [1.0, 2.0, 1.5, 2.0]
            .into_iter()
            .filter_map(|stamp| node.on_item(odom(stamp, x(stamp))))
            .collect();

        assert_eq!(
            dispositions,
            vec![
                Disposition::Estimated,
                Disposition::Estimated,
                Disposition::Stale,
                Disposition::Stale,
            ]
        );
        let stamps: Vec<f64> = node.take_events().iter().map(PoseEvent::stamp).collect();
        assert_eq!(stamps, vec![1.0, 2.0]);
    }

    #[test]
    fn test_odometry_only_failures_trigger_auto_reset() {
        let config = OdometryConfig {
            sync: SyncConfig {
                subscribe_depth: false,
                subscribe_odom: true,
                ..Default::default()
            },
            session: SessionConfig {
                reset_countdown: 2,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut node =
            OdometryNode::new(&config, ScriptedBackend::new([None, None]), NoLookup).unwrap();

        assert_eq!(node.on_item(odom(1.0, x(1.0))), Some(Disposition::Lost));
        assert_eq!(node.on_item(odom(2.0, x(2.0))), Some(Disposition::Lost));
        assert_eq!(node.session().stats().auto_resets, 1);
        assert_eq!(node.session().backend().resets.len(), 1);
    }

    #[test]
    fn test_emitted_stamps_strictly_increase() {
        let config = scan_config(SessionConfig {
            reset_countdown: 2,
            ..Default::default()
        });
        let mut node =
            OdometryNode::new(&config, DeadReckoningBackend::new(3, false, 20), NoLookup).unwrap();
        let mut rng = StdRng::seed_from_u64(11);

        let mut stamps: Vec<f64> = (1..=60).map(|i| f64::from(i) * 0.1).collect();
        // Locally shuffled arrival order plus duplicates
        for chunk in stamps.chunks_mut(4) {
            chunk.shuffle(&mut rng);
        }
        for _ in 0..10 {
            let i = rng.random_range(0..stamps.len());
            stamps.insert(i, stamps[i]);
        }

        let mut emitted = Vec::new();
        for stamp in stamps {
            node.on_item(scan(stamp));
            emitted.extend(node.take_events().iter().map(PoseEvent::stamp));
        }

        assert!(!emitted.is_empty());
        assert!(emitted.windows(2).all(|w| w[0] < w[1]), "{emitted:?}");
    }

    #[test]
    fn test_exact_four_way_alignment() {
        let config = OdometryConfig {
            sync: SyncConfig {
                subscribe_depth: true,
                subscribe_scan: true,
                subscribe_odom: true,
                approx_sync: false,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut node =
            OdometryNode::new(&config, DeadReckoningBackend::new(0, false, 20), NoLookup).unwrap();
        assert_eq!(node.engine().shape().name(), "odom+depth+scan2d");
        assert_eq!(
            node.engine().lines(),
            &[LineId::Odom, LineId::Rgb, LineId::Depth, LineId::CameraInfo, LineId::Scan2d]
        );

        assert_eq!(node.on_item(odom(1.0, Transform::identity())), None);
        assert_eq!(node.on_item(image(LineId::Rgb, 1.0, "rgb8")), None);
        assert_eq!(node.on_item(image(LineId::Depth, 1.0, "16UC1")), None);
        assert_eq!(node.on_item(camera_info(1.0)), None);
        assert_eq!(node.on_item(scan(1.02)), None);
        assert_eq!(node.on_item(scan(1.0)), Some(Disposition::Estimated));
        assert_eq!(node.engine().stats().bundles_emitted, 1);
    }

    #[test]
    fn test_countdown_resets_to_last_good_pose() {
        let good = x(2.0);
        let config = scan_config(SessionConfig {
            reset_countdown: 3,
            ..Default::default()
        });
        let backend = ScriptedBackend::new([Some(good), None, None, None]);
        let mut node = OdometryNode::new(&config, backend, NoLookup).unwrap();

        for stamp in [1.0, 2.0, 3.0] {
            node.on_item(scan(stamp));
        }
        assert!(node.session().backend().resets.is_empty());

        assert_eq!(node.on_item(scan(4.0)), Some(Disposition::Lost));
        assert_eq!(node.session().backend().resets, vec![good]);
        assert_eq!(node.session().stats().auto_resets, 1);
        assert_eq!(node.session().countdown_remaining(), 3);

        let kinds: Vec<&str> = node.take_events().iter().map(PoseEvent::kind).collect();
        assert_eq!(kinds, vec!["update", "lost", "lost", "lost"]);
    }

    #[test]
    fn test_countdown_prefers_external_pose() {
        let external = x(9.0);
        let config = scan_config(SessionConfig {
            reset_countdown: 1,
            ..Default::default()
        });
        let lookup = StaticLookup::new().with("odom", "base_link", external);
        let mut node = OdometryNode::new(&config, ScriptedBackend::new([None]), lookup).unwrap();

        node.on_item(scan(1.0));
        assert_eq!(node.session().backend().resets, vec![external]);
    }

    #[test]
    fn test_motion_gate_skips_backend_but_tracks_samples() {
        let config = OdometryConfig {
            sync: SyncConfig {
                subscribe_depth: false,
                subscribe_scan: true,
                subscribe_odom: true,
                ..Default::default()
            },
            session: SessionConfig {
                guess_min_translation: 0.5,
                guess_min_rotation: 0.5,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut node = OdometryNode::new(&config, ScriptedBackend::new([]), NoLookup).unwrap();

        let mut feed = |stamp: f64, pose: Transform| {
            node.on_item(odom(stamp, pose));
            node.on_item(scan(stamp))
        };
        assert_eq!(feed(1.0, x(0.0)), Some(Disposition::Estimated));
        assert_eq!(feed(2.0, x(0.1)), Some(Disposition::Gated));
        assert_eq!(feed(3.0, x(0.2)), Some(Disposition::Gated));
        // Accumulated 0.6 m since the last estimate
        assert_eq!(feed(4.0, x(0.6)), Some(Disposition::Estimated));

        assert_eq!(node.session().backend().processed, vec![1.0, 4.0]);
        let guess = node.session().backend().guesses[1].unwrap();
        assert!((guess.translation.vector.x - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_async_imu_keeps_at_most_one_bundle() {
        let config = scan_config(SessionConfig::default());
        let backend = ScriptedBackend::new([]).with_async_imu();
        let mut node = OdometryNode::new(&config, backend, NoLookup).unwrap();

        assert_eq!(node.on_item(imu(1.0)), Some(Disposition::ImuOnly));
        for stamp in [1.1, 1.2, 1.3] {
            assert_eq!(node.on_item(scan(stamp)), Some(Disposition::Buffered));
            assert!(node.session().has_buffered_bundle());
        }
        assert_eq!(node.session().stats().imu_overwrites, 2);

        assert_eq!(node.on_item(imu(1.4)), Some(Disposition::Estimated));
        assert!(!node.session().has_buffered_bundle());
        // Only the newest bundle survived
        assert_eq!(node.session().backend().processed, vec![1.0, 1.4, 1.3]);
    }

    #[test]
    fn test_reset_twice_equals_reset_once() {
        let config = scan_config(SessionConfig {
            reset_countdown: 3,
            ..Default::default()
        });
        let mut node = OdometryNode::new(&config, ScriptedBackend::new([None]), NoLookup).unwrap();
        node.on_item(scan(1.0));

        node.reset(Some(x(1.0)));
        let once = node.session().snapshot().clone();
        node.reset(Some(x(1.0)));

        assert_eq!(*node.session().snapshot(), once);
        assert_eq!(node.session().countdown_remaining(), 3);
        assert_eq!(node.on_item(scan(0.5)), Some(Disposition::Estimated));
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use contracts::{
        BackendConfig, LineId, NoLookup, OdometryConfig, PoseEvent, SessionConfig, SinkConfig,
        SinkType, SyncConfig,
    };
    use dispatcher::create_dispatcher;
    use ingestion::{IngestionQueue, MockRig, MockRigConfig, QueueConfig};
    use pose_session::{DeadReckoningBackend, OdometryNode};
    use tokio::sync::mpsc;

    /// MockRig → IngestionQueue → OdometryNode → Dispatcher → JSON lines
    async fn run_to_file(config: OdometryConfig, rig: MockRigConfig) -> Vec<PoseEvent> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("poses.jsonl");
        let mut config = config;
        config.sinks = vec![
            SinkConfig {
                name: "file".into(),
                sink_type: SinkType::File,
                queue_capacity: 1000,
                params: HashMap::from([("path".to_string(), path.display().to_string())]),
            },
            SinkConfig {
                name: "log".into(),
                sink_type: SinkType::Log,
                queue_capacity: 1000,
                params: HashMap::new(),
            },
        ];

        let backend = DeadReckoningBackend::from_config(&config.backend);
        let mut node = OdometryNode::new(&config, backend, NoLookup).unwrap();
        let lines: Vec<LineId> = node.engine().lines().to_vec();

        let (events_tx, events_rx) = mpsc::channel::<PoseEvent>(100);
        let dispatcher = create_dispatcher(config.sinks.clone(), events_rx)
            .await
            .unwrap();
        let dispatcher_handle = dispatcher.spawn();

        let mut queue = IngestionQueue::new(QueueConfig { capacity: 64 });
        let rx = queue.take_receiver().unwrap();
        let mut rig = MockRig::new(rig, lines);
        rig.start(&queue).unwrap();

        let consumer = async {
            loop {
                match tokio::time::timeout(Duration::from_millis(500), rx.recv()).await {
                    Ok(Ok(item)) => {
                        node.on_item(item);
                        for event in node.take_events() {
                            events_tx.send(event).await.unwrap();
                        }
                    }
                    // Rig finished and the queue stayed empty
                    _ => break,
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(10), consumer)
            .await
            .unwrap();

        queue.close();
        rig.stop();
        node.shutdown();
        drop(events_tx);
        let metrics = dispatcher_handle.await.unwrap();
        assert!(metrics.iter().all(|(_, m)| m.dropped == 0 && m.failures == 0));

        std::fs::read_to_string(&path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    fn lossless_rig(frames: u64) -> MockRigConfig {
        MockRigConfig {
            max_frames: Some(frames),
            realtime: false,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_e2e_depth_pipeline() {
        let events = run_to_file(OdometryConfig::default(), lossless_rig(25)).await;

        assert_eq!(events.len(), 25);
        assert!(events.iter().all(|e| e.kind() == "update"));
        assert!(events.windows(2).all(|w| w[0].stamp() < w[1].stamp()));
    }

    #[tokio::test]
    async fn test_e2e_tracking_failures_with_recovery() {
        let config = OdometryConfig {
            sync: SyncConfig {
                subscribe_depth: false,
                subscribe_scan: true,
                subscribe_odom: true,
                ..Default::default()
            },
            session: SessionConfig {
                reset_countdown: 1,
                ..Default::default()
            },
            backend: BackendConfig {
                fail_every: 5,
                ..Default::default()
            },
            ..Default::default()
        };

        let events = run_to_file(config, lossless_rig(20)).await;
        let lost = events.iter().filter(|e| e.kind() == "lost").count();
        let updates = events.iter().filter(|e| e.kind() == "update").count();

        assert_eq!(lost, 4);
        assert_eq!(updates, 16);
        assert!(events.windows(2).all(|w| w[0].stamp() < w[1].stamp()));
    }

    #[tokio::test]
    async fn test_e2e_async_imu_stream() {
        let config = OdometryConfig {
            sync: SyncConfig {
                subscribe_depth: false,
                subscribe_scan: true,
                ..Default::default()
            },
            backend: BackendConfig {
                async_imu: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let rig = MockRigConfig {
            imu_per_frame: 4,
            ..lossless_rig(15)
        };

        let events = run_to_file(config, rig).await;
        assert!(events.iter().any(|e| e.kind() == "update"));
        assert!(events
            .iter()
            .filter(|e| e.kind() == "update")
            .collect::<Vec<_>>()
            .windows(2)
            .all(|w| w[0].stamp() < w[1].stamp()));
    }
}
