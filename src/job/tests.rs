use std::fs;
use std::path::{Path, PathBuf};

use assert_matches::assert_matches;
use tempfile::TempDir;

use crate::catalog::CatalogSynchronizer;
use crate::catalog::mock::MockCatalog;
use crate::job::mock::MockNotifier;
use crate::job::{
    ClientId, DecodeError, ErrorKind, JobError, JobPatch, JobRecord, JobRequest, JobStateMachine, JobStatus, Outcome,
    Queue, StaleJob,
};
use crate::raster::{self, Affine, Band, CellType, Crs, Profile, Raster};
use crate::transform::Gcp;

fn machine(catalog: MockCatalog, notifier: MockNotifier) -> JobStateMachine<MockCatalog, MockNotifier> {
    JobStateMachine::new(CatalogSynchronizer::new(catalog), notifier, Crs::WEB_MERCATOR)
}

fn record(pathname: &Path, status: JobStatus) -> JobRecord {
    JobRecord {
        pathname: pathname.to_path_buf(),
        status,
        user: "alice".to_string(),
        layer_name: None,
    }
}

fn write_rgba(dir: &TempDir, name: &str, colors: &[[u8; 3]]) -> PathBuf {
    let width = colors.len();
    let profile = Profile::new(width, 1, CellType::UInt8)
        .with_crs(Crs::WEB_MERCATOR)
        .with_transform(Affine::from_origin(0.0, 1.0, 1.0, 1.0));
    let mut bands: Vec<Band> = (0..3)
        .map(|b| Band::new(width, 1, colors.iter().map(|c| f64::from(c[b])).collect()).unwrap())
        .collect();
    bands.push(Band::filled(width, 1, 255.0));
    let path = dir.path().join(name);
    raster::create(&path, &Raster::new(profile, bands).unwrap()).unwrap();
    path
}

fn georeference_request() -> JobRequest {
    JobRequest::Georeference {
        uri: "http://jobs/1".to_string(),
        gcps: vec![Gcp::new((0.0, 0.0), (100.0, 200.0))],
    }
}

#[test]
fn test_register_converts_and_publishes() {
    let dir = TempDir::new().unwrap();
    let image = dir.path().join("map.png");
    image::RgbImage::from_pixel(4, 3, image::Rgb([9, 8, 7])).save(&image).unwrap();
    let machine = machine(MockCatalog::default(), MockNotifier::default());
    let request = JobRequest::Register {
        uri: "http://jobs/1".to_string(),
        workspace: "alice".to_string(),
    };

    let outcome = machine.handle(&request, &record(&image, JobStatus::Uploaded)).unwrap();

    assert_eq!(
        outcome,
        Outcome::Advanced {
            status: JobStatus::Registered,
            layer_name: Some("alice:map".to_string()),
        }
    );
    let tif = dir.path().join("map.tif");
    assert_eq!(raster::open(&tif).unwrap().band_count(), 4);
    assert_eq!(
        machine.catalog().client().calls(),
        vec![
            "workspaces".to_string(),
            "create_workspace alice".to_string(),
            format!("create_store alice:map {}", tif.display()),
        ]
    );
}

#[test]
fn test_register_geotiff_skips_conversion() {
    let dir = TempDir::new().unwrap();
    let path = write_rgba(&dir, "scan.tif", &[[1, 2, 3]]);
    let machine = machine(MockCatalog::with_workspaces(&["alice"]), MockNotifier::default());
    let request = JobRequest::Register {
        uri: "http://jobs/1".to_string(),
        workspace: "alice".to_string(),
    };

    let outcome = machine.handle(&request, &record(&path, JobStatus::Uploaded)).unwrap();

    assert_matches!(outcome, Outcome::Advanced { status: JobStatus::Registered, .. });
    assert!(!machine
        .catalog()
        .client()
        .calls()
        .iter()
        .any(|c| c.starts_with("create_workspace")));
}

#[test]
fn test_register_missing_raster_fails_before_publishing() {
    let dir = TempDir::new().unwrap();
    let machine = machine(MockCatalog::default(), MockNotifier::default());
    let request = JobRequest::Register {
        uri: "http://jobs/1".to_string(),
        workspace: "alice".to_string(),
    };

    let error = machine
        .handle(&request, &record(&dir.path().join("gone.tif"), JobStatus::Uploaded))
        .unwrap_err();

    assert_matches!(&error, JobError::Raster(e) if e.is_missing_file());
    assert_eq!(error.kind(), ErrorKind::Terminal);
    assert!(machine.catalog().client().calls().is_empty());
}

#[test]
fn test_georeference_stale_job_touches_nothing() {
    let dir = TempDir::new().unwrap();
    let path = write_rgba(&dir, "scan.tif", &[[1, 2, 3], [4, 5, 6]]);
    let before = fs::read(&path).unwrap();
    let machine = machine(MockCatalog::default(), MockNotifier::default());

    let outcome = machine
        .handle(&georeference_request(), &record(&path, JobStatus::Uploaded))
        .unwrap();

    assert_eq!(
        outcome,
        Outcome::Skipped(StaleJob {
            operation: "georeference_raster",
            expected: JobStatus::Registered,
            actual: JobStatus::Uploaded,
        })
    );
    assert!(outcome.patch().is_none());
    assert_eq!(fs::read(&path).unwrap(), before);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    assert!(machine.catalog().client().calls().is_empty());
}

#[test]
fn test_georeference_rewrites_and_republishes() {
    let dir = TempDir::new().unwrap();
    let path = write_rgba(&dir, "scan.tif", &[[1, 2, 3], [4, 5, 6]]);
    let machine = machine(MockCatalog::default(), MockNotifier::default());

    let outcome = machine
        .handle(&georeference_request(), &record(&path, JobStatus::Registered))
        .unwrap();

    assert_eq!(
        outcome.patch(),
        Some(JobPatch {
            status: Some(JobStatus::Georeferenced),
            layer_name: Some("alice:scan".to_string()),
        })
    );
    let bounds = raster::open(&path).unwrap().bounds();
    assert!((bounds.left - 100.0).abs() < 1e-6 && (bounds.top - 200.0).abs() < 1e-6);
    assert_eq!(
        machine.catalog().client().calls(),
        vec![
            "delete_store alice:scan".to_string(),
            "reload".to_string(),
            format!("create_store alice:scan {}", path.display()),
        ]
    );
}

#[test]
fn test_catalog_outage_is_retryable() {
    let dir = TempDir::new().unwrap();
    let path = write_rgba(&dir, "scan.tif", &[[1, 2, 3]]);
    let machine = machine(MockCatalog::failing(503), MockNotifier::default());

    let error = machine
        .handle(&georeference_request(), &record(&path, JobStatus::Registered))
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Retryable);
}

#[test]
fn test_retrieve_colors_notifies_client() {
    let dir = TempDir::new().unwrap();
    let path = write_rgba(&dir, "scan.tif", &[[4, 5, 6], [1, 2, 3], [4, 5, 6]]);
    let notifier = MockNotifier::default();
    let machine = machine(MockCatalog::default(), notifier.clone());
    let request = JobRequest::RetrieveColors {
        uri: "http://jobs/1".to_string(),
        client_id: ClientId::from("7"),
    };

    let outcome = machine
        .handle(&request, &record(&path, JobStatus::Georeferenced))
        .unwrap();

    assert_eq!(outcome, Outcome::Unchanged);
    assert_eq!(notifier.sent(), vec![(ClientId::from("7"), vec![[1, 2, 3], [4, 5, 6]])]);
}

#[test]
fn test_retrieve_colors_missing_raster_is_terminal() {
    let dir = TempDir::new().unwrap();
    let machine = machine(MockCatalog::default(), MockNotifier::default());
    let request = JobRequest::RetrieveColors {
        uri: "http://jobs/1".to_string(),
        client_id: ClientId::from("7"),
    };

    let error = machine
        .handle(&request, &record(&dir.path().join("gone.tif"), JobStatus::Georeferenced))
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Terminal);
}

#[test]
fn test_reclassify_is_accepted_without_effect() {
    let dir = TempDir::new().unwrap();
    let machine = machine(MockCatalog::default(), MockNotifier::default());
    let request = JobRequest::Reclassify {
        uri: "http://jobs/1".to_string(),
    };

    let outcome = machine
        .handle(&request, &record(&dir.path().join("scan.tif"), JobStatus::Georeferenced))
        .unwrap();

    assert_eq!(outcome, Outcome::Unchanged);
    assert!(machine.catalog().client().calls().is_empty());
}

#[test]
fn test_decode_requests() {
    let register = JobRequest::decode(
        Queue::RegisterRaster,
        br#"{"uri": "http://jobs/1", "workspace": "alice"}"#,
    )
    .unwrap();
    assert_eq!(
        register,
        JobRequest::Register {
            uri: "http://jobs/1".to_string(),
            workspace: "alice".to_string(),
        }
    );

    let georeference = JobRequest::decode(
        Queue::GeoreferenceRaster,
        br#"{"uri": "u", "gcps": [[[0, 0], [10, 20]], [[5, 5], [15, 25]]]}"#,
    )
    .unwrap();
    assert_matches!(georeference, JobRequest::Georeference { gcps, .. } if gcps.len() == 2);

    let colors = JobRequest::decode(
        Queue::RetrieveColorsOfRaster,
        br#"{"uri": "u", "client_id": 12}"#,
    )
    .unwrap();
    assert_matches!(colors, JobRequest::RetrieveColors { client_id, .. } if client_id == ClientId::from(12u64));

    let reclassify = JobRequest::decode(Queue::ReclassifyRaster, br#"{"uri": "u"}"#).unwrap();
    assert_eq!(reclassify.queue(), Queue::ReclassifyRaster);
    assert_eq!(reclassify.uri(), "u");
}

#[test]
fn test_decode_rejects_missing_fields() {
    let result = JobRequest::decode(Queue::RegisterRaster, br#"{"uri": "u"}"#);
    assert_matches!(
        result,
        Err(DecodeError::Payload { queue: "register_raster", .. })
    );
    assert!(JobRequest::decode(Queue::GeoreferenceRaster, b"not json").is_err());
}

#[test]
fn test_queue_names() {
    for queue in Queue::ALL {
        assert_eq!(queue.name().parse::<Queue>().unwrap(), queue);
    }
    assert_matches!("unknown".parse::<Queue>(), Err(DecodeError::UnknownQueue(_)));
}
