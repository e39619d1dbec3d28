use approx::assert_relative_eq;
use nalgebra::{Translation3, UnitQuaternion};
use tagtrack_core::{CameraParameters, DepthMap, GrayImage, Iso3, Pt2, Vec3};
use tagtrack_pose::{tag_reference_points, PoseError, PoseParams};
use tagtrack_tracker::{
    Frame, ReplayRecognizer, TagDetection, TagEngine, TargetFrames, TargetKey, TrackingOptions,
    TrackingSession, TrackingState,
};

const W: usize = 640;
const H: usize = 480;

fn camera() -> CameraParameters {
    CameraParameters::pinhole(615.0, 615.0, 320.0, 240.0)
}

fn tag_pose() -> Iso3 {
    Iso3::from_parts(
        Translation3::new(0.03, -0.02, 0.6),
        UnitQuaternion::from_euler_angles(0.25, -0.15, 0.4),
    )
}

fn tag_detection(message: &str, cam: &CameraParameters, pose: &Iso3, size: f64) -> TagDetection {
    let corners = tag_reference_points(size);
    let polygon = corners.map(|p| cam.project(&(pose * p)).expect("in front"));
    TagDetection {
        message: message.into(),
        polygon,
    }
}

fn plane_depth(cam: &CameraParameters, pose: &Iso3) -> DepthMap {
    let normal: Vec3 = pose.rotation * Vec3::z();
    let offset = normal.dot(&pose.translation.vector);
    let mut depth = DepthMap::filled(W, H, 0.0);
    for y in 0..H {
        for x in 0..W {
            let n = cam.pixel_to_normalized(Pt2::new(x as f64, y as f64));
            let t = offset / normal.dot(&Vec3::new(n.x, n.y, 1.0));
            if t > 0.0 {
                depth.data[y * W + x] = t as f32;
            }
        }
    }
    depth
}

fn frame(timestamp: f64, depth: Option<DepthMap>) -> Frame {
    Frame {
        timestamp,
        gray: GrayImage::new(W, H),
        depth,
    }
}

#[test]
fn tag_is_acquired_refined_and_lost() {
    let cam = camera();
    let gt = tag_pose();
    let seen = vec![tag_detection("tag36h11 3", &cam, &gt, 0.1)];
    let recognizer = ReplayRecognizer::new(vec![seen.clone(), seen, Vec::new()]);

    let mut session = TrackingSession::new(
        TagEngine::new(Box::new(recognizer)),
        PoseParams::default(),
        TrackingOptions::default(),
    );
    session
        .add_april_tag(3, 0.1, TargetFrames::new("camera", "tag_3"))
        .expect("register");
    let key = TargetKey::Tag(3);

    // Frame 1: first sighting, direct RGB-D pose.
    let report = session
        .process_frame(frame(0.0, Some(plane_depth(&cam, &gt))), &cam)
        .expect("frame 1");
    assert_eq!(report.poses.len(), 1);
    let first = &report.poses[0];
    assert_eq!(first.key, key);
    assert_eq!(first.state, TrackingState::NewlyAcquired);
    assert_eq!(first.frames.child, "tag_3");
    assert!(first.residual_error.is_none());
    assert_relative_eq!(
        first.pose.translation.vector,
        gt.translation.vector,
        epsilon = 1e-3
    );

    // Frame 2: tracked, refined from the previous pose.
    let report = session
        .process_frame(frame(0.033, Some(plane_depth(&cam, &gt))), &cam)
        .expect("frame 2");
    let second = &report.poses[0];
    assert_eq!(second.state, TrackingState::AlreadyAcquired);
    let residual = second.residual_error.expect("refinement residual");
    assert!(residual.is_finite());
    assert!(residual < 1e-12, "residual {residual}");
    assert_relative_eq!(
        second.pose.translation.vector,
        gt.translation.vector,
        epsilon = 1e-6
    );
    assert!(second.pose.rotation.angle_to(&gt.rotation) < 1e-6);

    // Frame 3: not visible.
    let report = session
        .process_frame(frame(0.066, None), &cam)
        .expect("frame 3");
    assert!(report.poses.is_empty());
    assert_eq!(report.misses, vec![key]);
    let detector = session.detector(key).expect("registered");
    assert_eq!(detector.state(), TrackingState::NoObject);
    assert!(detector.image_points().is_empty());
    assert!(detector.pose().is_none());
}

#[test]
fn reacquisition_after_a_miss_starts_fresh() {
    let cam = camera();
    let gt = tag_pose();
    let seen = vec![tag_detection("36h11 3", &cam, &gt, 0.1)];
    let recognizer = ReplayRecognizer::new(vec![seen.clone(), Vec::new(), seen]);
    let mut session = TrackingSession::new(
        TagEngine::new(Box::new(recognizer)),
        PoseParams::default(),
        TrackingOptions::default(),
    );
    session
        .add_april_tag(3, 0.1, TargetFrames::new("camera", "tag_3"))
        .expect("register");

    let states: Vec<_> = (0..3)
        .map(|k| {
            let report = session
                .process_frame(frame(k as f64, Some(plane_depth(&cam, &gt))), &cam)
                .expect("frame");
            report.poses.first().map(|p| p.state)
        })
        .collect();
    assert_eq!(
        states,
        vec![
            Some(TrackingState::NewlyAcquired),
            None,
            Some(TrackingState::NewlyAcquired)
        ]
    );
}

#[test]
fn one_target_failing_does_not_affect_another() {
    let cam = camera();
    let gt = tag_pose();
    let good = tag_detection("36h11 3", &cam, &gt, 0.1);
    // Collapsed polygon: no depth samples inside.
    let bad = TagDetection {
        message: "36h11 8".into(),
        polygon: [Pt2::new(10.0, 10.0); 4],
    };
    let recognizer = ReplayRecognizer::new(vec![vec![bad, good]]);
    let mut session = TrackingSession::new(
        TagEngine::new(Box::new(recognizer)),
        PoseParams::default(),
        TrackingOptions {
            separate_pose_failure: true,
            ..TrackingOptions::default()
        },
    );
    for (id, child) in [(3, "tag_3"), (8, "tag_8"), (70, "tag_70")] {
        session
            .add_april_tag(id, 0.1, TargetFrames::new("camera", child))
            .expect("register");
    }

    let report = session
        .process_frame(frame(1.0, Some(plane_depth(&cam, &gt))), &cam)
        .expect("frame");
    assert_eq!(report.poses.len(), 1);
    assert_eq!(report.poses[0].key, TargetKey::Tag(3));
    assert_eq!(report.misses, vec![TargetKey::Tag(70)]);
    assert_eq!(report.unresolved.len(), 1);
    assert_eq!(report.unresolved[0].0, TargetKey::Tag(8));
    assert!(matches!(
        report.unresolved[0].1,
        PoseError::InsufficientDepth { .. }
    ));
}

#[test]
fn detections_deserialize_from_json() {
    let det: TagDetection = serde_json::from_str(
        r#"{ "message": "36h11 7", "polygon": [[1.0, 2.0], [3.0, 2.0], [3.0, 4.0], [1.0, 4.0]] }"#,
    )
    .expect("json");
    assert_eq!(det.polygon[2], Pt2::new(3.0, 4.0));
    assert!(tagtrack_tracker::message_matches_id(&det.message, 7));
}

#[test]
fn short_depth_buffer_is_treated_as_missing_depth() {
    let cam = camera();
    let gt = tag_pose();
    let seen = vec![tag_detection("36h11 3", &cam, &gt, 0.1)];
    let mut session = TrackingSession::new(
        TagEngine::new(Box::new(ReplayRecognizer::new(vec![seen]))),
        PoseParams::default(),
        TrackingOptions {
            separate_pose_failure: true,
            ..TrackingOptions::default()
        },
    );
    session
        .add_april_tag(3, 0.1, TargetFrames::new("camera", "tag_3"))
        .expect("register");

    let truncated = DepthMap {
        width: W,
        height: H,
        data: vec![0.6; 100],
    };
    let report = session
        .process_frame(frame(0.0, Some(truncated)), &cam)
        .expect("frame");
    assert!(report.poses.is_empty());
    assert_eq!(report.unresolved.len(), 1);
    assert!(matches!(
        report.unresolved[0].1,
        PoseError::InsufficientDepth { .. }
    ));
    let detector = session.detector(TargetKey::Tag(3)).expect("registered");
    assert_eq!(detector.state(), TrackingState::NoObject);
}

/// Good sighting, then one corner off by 25 px, then good again.
fn refinement_failure_session(options: TrackingOptions) -> (TrackingSession, CameraParameters) {
    let cam = camera();
    let gt = tag_pose();
    let good = tag_detection("36h11 3", &cam, &gt, 0.1);
    let mut corrupted = good.clone();
    corrupted.polygon[0].x += 25.0;
    let recognizer = ReplayRecognizer::new(vec![vec![good.clone()], vec![corrupted], vec![good]]);
    let params = PoseParams {
        max_residual: Some(1e-8),
        ..PoseParams::default()
    };
    let mut session = TrackingSession::new(TagEngine::new(Box::new(recognizer)), params, options);
    session
        .add_april_tag(3, 0.1, TargetFrames::new("camera", "tag_3"))
        .expect("register");
    (session, cam)
}

#[test]
fn refinement_failure_resets_to_no_object() {
    let (mut session, cam) = refinement_failure_session(TrackingOptions {
        separate_pose_failure: true,
        ..TrackingOptions::default()
    });
    let gt = tag_pose();
    let key = TargetKey::Tag(3);

    let report = session
        .process_frame(frame(0.0, Some(plane_depth(&cam, &gt))), &cam)
        .expect("frame 1");
    assert_eq!(report.poses[0].state, TrackingState::NewlyAcquired);

    let report = session
        .process_frame(frame(0.1, Some(plane_depth(&cam, &gt))), &cam)
        .expect("frame 2");
    assert!(report.poses.is_empty());
    assert!(report.misses.is_empty());
    assert_eq!(report.unresolved.len(), 1);
    assert_eq!(report.unresolved[0].0, key);
    assert!(matches!(
        report.unresolved[0].1,
        PoseError::ResidualTooLarge { .. }
    ));
    let detector = session.detector(key).expect("registered");
    assert_eq!(detector.state(), TrackingState::NoObject);
    assert!(detector.image_points().is_empty());
    assert!(detector.pose().is_none());

    let report = session
        .process_frame(frame(0.2, Some(plane_depth(&cam, &gt))), &cam)
        .expect("frame 3");
    assert_eq!(report.poses[0].state, TrackingState::NewlyAcquired);
}

#[test]
fn refinement_failure_counts_as_miss_by_default() {
    let (mut session, cam) = refinement_failure_session(TrackingOptions::default());
    let gt = tag_pose();
    let key = TargetKey::Tag(3);

    session
        .process_frame(frame(0.0, Some(plane_depth(&cam, &gt))), &cam)
        .expect("frame 1");
    let report = session
        .process_frame(frame(0.1, Some(plane_depth(&cam, &gt))), &cam)
        .expect("frame 2");
    assert!(report.poses.is_empty());
    assert!(report.unresolved.is_empty());
    assert_eq!(report.misses, vec![key]);
    let detector = session.detector(key).expect("registered");
    assert_eq!(detector.state(), TrackingState::NoObject);
    assert!(detector.image_points().is_empty());
}
