use approx::assert_relative_eq;
use nalgebra::{Translation3, UnitQuaternion};
use tagtrack::core::{CameraParameters, DepthMap, GrayImage, Iso3, Pt2, Vec3};
use tagtrack::pose::tag_reference_points;
use tagtrack::tracker::{ReplayRecognizer, TagDetection, TagEngine};
use tagtrack::{
    Frame, MemorySink, NodeConfig, NodeError, PoseChannel, PoseSink, PoseStamped, SinkError,
    TagConfig, TargetKey, TrackerNode, TrackingState,
};

const W: usize = 640;
const H: usize = 480;

fn camera() -> CameraParameters {
    CameraParameters::pinhole(600.0, 600.0, 320.0, 240.0)
}

fn pose() -> Iso3 {
    Iso3::from_parts(
        Translation3::new(-0.02, 0.01, 0.7),
        UnitQuaternion::from_euler_angles(-0.2, 0.3, 0.1),
    )
}

fn detection(id: i32, cam: &CameraParameters, pose: &Iso3, size: f64) -> TagDetection {
    TagDetection {
        message: format!("36h11 {id}"),
        polygon: tag_reference_points(size).map(|p| cam.project(&(pose * p)).expect("visible")),
    }
}

fn depth(cam: &CameraParameters, pose: &Iso3) -> DepthMap {
    let normal: Vec3 = pose.rotation * Vec3::z();
    let offset = normal.dot(&pose.translation.vector);
    let mut d = DepthMap::filled(W, H, 0.0);
    for y in 0..H {
        for x in 0..W {
            let n = cam.pixel_to_normalized(Pt2::new(x as f64, y as f64));
            let t = offset / normal.dot(&Vec3::new(n.x, n.y, 1.0));
            if t > 0.0 {
                d.data[y * W + x] = t as f32;
            }
        }
    }
    d
}

fn frame(t: f64, depth: Option<DepthMap>) -> Frame {
    Frame {
        timestamp: t,
        gray: GrayImage::new(W, H),
        depth,
    }
}

#[test]
fn poses_are_published_on_both_channels() {
    let cam = camera();
    let gt = pose();
    let seen = vec![detection(3, &cam, &gt, 0.1)];
    let engine = TagEngine::new(Box::new(ReplayRecognizer::new(vec![
        seen.clone(),
        seen,
        Vec::new(),
    ])));

    let config = NodeConfig {
        camera_frame: "rgbd_optical".into(),
        broadcast_tf_postfix: "_measured".into(),
        tags: vec![TagConfig {
            id: 3,
            size: 0.1,
            child_frame: None,
        }],
        ..NodeConfig::default()
    };
    let node = TrackerNode::new(config, engine, None).expect("node");
    node.camera_info_callback(cam).expect("camera");

    let mut sink = MemorySink::default();
    for (k, d) in [Some(depth(&cam, &gt)), None, None].into_iter().enumerate() {
        assert!(node.frame_callback(frame(k as f64 * 0.1, d)));
        node.spin_once(&mut sink).expect("spin").expect("frame");
    }

    let tf: Vec<_> = sink.on(PoseChannel::Tf).collect();
    let topic: Vec<_> = sink.on(PoseChannel::Topic).collect();
    assert_eq!(tf.len(), 2);
    assert_eq!(topic.len(), 2);
    assert_eq!(tf[0].child_frame, "tag_3_measured");
    assert_eq!(topic[0].child_frame, "tag_3");
    assert_eq!(topic[0].parent_frame, "rgbd_optical");
    assert_eq!(topic[1].stamp, 0.1);

    // The second frame is refined without depth.
    let refined = topic[1].transform.to_pose();
    assert_relative_eq!(
        refined.translation.vector,
        gt.translation.vector,
        epsilon = 1e-6
    );
    node.with_session(|s| {
        let tag = s.detector(TargetKey::Tag(3)).expect("tag");
        assert_eq!(tag.state(), TrackingState::NoObject);
    });
}

#[test]
fn tf_only_node_skips_topic() {
    let cam = camera();
    let gt = pose();
    let engine = TagEngine::new(Box::new(ReplayRecognizer::new(vec![vec![detection(
        5, &cam, &gt, 0.08,
    )]])));
    let config = NodeConfig {
        broadcast_topic: false,
        ..NodeConfig::default()
    };
    let node = TrackerNode::new(config, engine, None).expect("node");
    node.add_april_tag(5, 0.08, Some("box")).expect("tag");
    node.camera_info_callback(cam).expect("camera");

    let mut sink = MemorySink::default();
    node.frame_callback(frame(2.0, Some(depth(&cam, &gt))));
    let outcome = node.spin_once(&mut sink).expect("spin").expect("frame");
    assert_eq!(outcome.report.poses.len(), 1);
    assert_eq!(sink.messages.len(), 1);
    assert_eq!(sink.messages[0].0, PoseChannel::Tf);
    assert_eq!(sink.messages[0].1.child_frame, "box");
}

/// Rejects every TF message, records the rest.
#[derive(Default)]
struct TfDownSink {
    accepted: Vec<PoseStamped>,
    rejected: usize,
}

impl PoseSink for TfDownSink {
    fn publish(&mut self, channel: PoseChannel, msg: &PoseStamped) -> Result<(), SinkError> {
        if channel == PoseChannel::Tf {
            self.rejected += 1;
            return Err(SinkError::Io(std::io::Error::other("tf broadcaster down")));
        }
        self.accepted.push(msg.clone());
        Ok(())
    }
}

#[test]
fn sink_failure_still_offers_the_whole_frame() {
    let cam = camera();
    let gt = pose();
    let other = gt * Iso3::translation(0.15, 0.0, 0.0);
    let engine = TagEngine::new(Box::new(ReplayRecognizer::new(vec![vec![
        detection(3, &cam, &gt, 0.1),
        detection(4, &cam, &other, 0.1),
    ]])));
    let config = NodeConfig {
        tags: vec![
            TagConfig {
                id: 3,
                size: 0.1,
                child_frame: None,
            },
            TagConfig {
                id: 4,
                size: 0.1,
                child_frame: None,
            },
        ],
        ..NodeConfig::default()
    };
    let node = TrackerNode::new(config, engine, None).expect("node");
    node.camera_info_callback(cam).expect("camera");
    // Both tags lie on one plane, so a single depth map serves them.
    node.frame_callback(frame(0.0, Some(depth(&cam, &gt))));

    let mut sink = TfDownSink::default();
    let result = node.spin_once(&mut sink);
    assert!(matches!(result, Err(NodeError::Sink(_))));
    assert_eq!(sink.rejected, 2);
    let children: Vec<_> = sink.accepted.iter().map(|m| m.child_frame.as_str()).collect();
    assert_eq!(children, vec!["tag_3", "tag_4"]);
    node.with_session(|s| {
        let tag = s.detector(TargetKey::Tag(4)).expect("tag");
        assert_eq!(tag.state(), TrackingState::NewlyAcquired);
    });
}

#[cfg(feature = "image")]
#[test]
fn debug_display_renders_tracked_tags() {
    let cam = camera();
    let gt = pose();
    let det = detection(3, &cam, &gt, 0.1);
    let corner = det.polygon[0];
    let engine = TagEngine::new(Box::new(ReplayRecognizer::new(vec![vec![det]])));
    let config = NodeConfig {
        debug_display: true,
        tags: vec![TagConfig {
            id: 3,
            size: 0.1,
            child_frame: None,
        }],
        ..NodeConfig::default()
    };
    let node = TrackerNode::new(config, engine, None).expect("node");
    node.camera_info_callback(cam).expect("camera");
    node.frame_callback(frame(0.0, Some(depth(&cam, &gt))));

    let mut sink = MemorySink::default();
    let outcome = node.spin_once(&mut sink).expect("spin").expect("frame");
    let overlay = outcome.overlay.expect("overlay");
    assert_eq!(overlay.dimensions(), (W as u32, H as u32));
    let px = overlay.get_pixel(corner.x.round() as u32, corner.y.round() as u32);
    assert_ne!(px.0, [0, 0, 0, 255], "corner should be painted");
}
