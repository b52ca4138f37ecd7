//! End-to-end workflow runs over a synthetic five-stripe landscape.

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::NaiveDate;
use geo::{LineString, MultiPolygon, Polygon};
use landcover_io::{LabeledPoint, TrainingSet, read_label_raster};
use landcover_pipeline::{
    AreaFilterSpec, ExportError, ExportRequest, ExportService, LandCoverClass, N_CLASSES, PipelineError,
    Workflow, WorkflowConfig,
};
use landcover_raster::{
    Band, Grid, InMemoryCollection, MultiBandImage, RasterError, SceneMetadata, SceneSource,
};
use landcover_vector::{AdminAttributes, AdminFeature};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tempfile::TempDir;

const BANDS: [&str; 9] = ["B2", "B3", "B4", "B5", "B6", "B7", "B8", "B11", "B12"];

/// Mean reflectance per class and band.
const SIGNATURES: [[f64; 9]; 5] = [
    [600.0, 500.0, 350.0, 300.0, 250.0, 230.0, 200.0, 120.0, 90.0],
    [1300.0, 1350.0, 1450.0, 1500.0, 1550.0, 1580.0, 1650.0, 1900.0, 1750.0],
    [1500.0, 1700.0, 2000.0, 2150.0, 2250.0, 2300.0, 2400.0, 2900.0, 2500.0],
    [700.0, 900.0, 850.0, 1200.0, 2000.0, 2400.0, 2600.0, 2000.0, 1300.0],
    [400.0, 600.0, 400.0, 800.0, 2300.0, 2900.0, 3200.0, 1500.0, 700.0],
];

/// Class stripes are 200 m wide and run north-south across x 0..1000.
fn class_at(x: f64) -> usize {
    ((x / 200.0) as usize).min(4)
}

fn square(x0: f64, y0: f64, size: f64) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![Polygon::new(
        LineString::from(vec![
            (x0, y0),
            (x0 + size, y0),
            (x0 + size, y0 + size),
            (x0, y0 + size),
            (x0, y0),
        ]),
        vec![],
    )])
}

fn village(name: &str, sector: &str, geometry: MultiPolygon<f64>) -> AdminFeature {
    AdminFeature::new(
        AdminAttributes {
            province: "East".into(),
            district: "Bugesera".into(),
            sector: sector.into(),
            cell: "Tunda".into(),
            village: name.into(),
        },
        geometry,
    )
}

/// Four 500 m villages tiling 0..1000 × 0..1000, and one outside the filter.
fn boundaries() -> Vec<AdminFeature> {
    vec![
        village("Senga", "Kamabuye", square(0.0, 0.0, 500.0)),
        village("Tunda", "Kamabuye", square(500.0, 0.0, 500.0)),
        village("Rebero", "Kamabuye", square(0.0, 500.0, 500.0)),
        village("Murambi", "Kamabuye", square(500.0, 500.0, 500.0)),
        village("Kagenge", "Ntarama", square(1000.0, 0.0, 500.0)),
    ]
}

fn area_filter(villages: &[&str]) -> AreaFilterSpec {
    AreaFilterSpec {
        sector: Some("Kamabuye".into()),
        villages: Some(villages.iter().map(|v| (*v).to_string()).collect()),
        ..AreaFilterSpec::default()
    }
}

fn scene_image(rng: &mut ChaCha8Rng) -> MultiBandImage {
    let grid = Grid::new(0.0, 1000.0, 10.0, 150, 100).unwrap();
    let bands = BANDS
        .iter()
        .enumerate()
        .map(|(b, name)| {
            let values = (0..grid.n_pixels())
                .map(|i| {
                    let (x, _) = grid.pixel_centre(i % grid.width, i / grid.width);
                    SIGNATURES[class_at(x)][b] + rng.gen_range(-60.0..60.0)
                })
                .collect();
            Band::new(*name, values)
        })
        .collect();
    MultiBandImage::new(grid, bands).unwrap()
}

fn collection() -> InMemoryCollection {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let meta = |id: &str, month: u32, cloud: f64| SceneMetadata {
        id: id.into(),
        date: NaiveDate::from_ymd_opt(2021, month, 10).unwrap(),
        cloudy_pixel_percentage: cloud,
        grid: Grid::new(0.0, 1000.0, 10.0, 150, 100).unwrap(),
    };
    InMemoryCollection::new()
        .with_scene(meta("s2-feb", 2, 0.3), scene_image(&mut rng))
        .with_scene(meta("s2-jul", 7, 0.6), scene_image(&mut rng))
        .with_scene(meta("s2-oct", 10, 48.0), scene_image(&mut rng))
}

fn training(classes: &[LandCoverClass]) -> Vec<TrainingSet> {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    classes
        .iter()
        .map(|class| {
            let x0 = f64::from(class.label()) * 200.0;
            TrainingSet {
                name: class.layer().into(),
                points: (0..40)
                    .map(|_| LabeledPoint {
                        x: rng.gen_range(x0 + 20.0..x0 + 180.0),
                        y: rng.gen_range(20.0..980.0),
                        class: class.label(),
                    })
                    .collect(),
            }
        })
        .collect()
}

/// Scene source that counts pixel loads.
struct CountingSource {
    inner: InMemoryCollection,
    loads: AtomicUsize,
}

impl CountingSource {
    fn new() -> Self {
        Self {
            inner: collection(),
            loads: AtomicUsize::new(0),
        }
    }
}

impl SceneSource for CountingSource {
    fn scenes(&self) -> &[SceneMetadata] {
        self.inner.scenes()
    }

    fn load(&self, scene: &SceneMetadata, bands: &[String]) -> Result<MultiBandImage, RasterError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load(scene, bands)
    }
}

fn config(villages: &[&str]) -> WorkflowConfig {
    WorkflowConfig::new()
        .with_area_filter(area_filter(villages))
        .with_n_trees(25)
        .with_seed(7)
}

const ALL_VILLAGES: [&str; 4] = ["Senga", "Tunda", "Rebero", "Murambi"];

fn workflow(config: WorkflowConfig, classes: &[LandCoverClass]) -> Workflow<CountingSource> {
    Workflow::new(config, boundaries(), training(classes), CountingSource::new()).unwrap()
}

#[test]
fn full_run_classifies_the_stripes() {
    let wf = workflow(config(&ALL_VILLAGES), &LandCoverClass::ALL);

    let target = wf.target().unwrap();
    assert!((target.area() - 1_000_000.0).abs() < 1.0);

    let composite = wf.composite().unwrap();
    assert_eq!(composite.scene_ids(), ["s2-feb", "s2-jul"]);
    // Only the 100 × 100 pixels inside the four villages survive the clip.
    assert_eq!(composite.image().n_valid(), 100 * 100);

    let report = wf.evaluation().unwrap();
    let accuracy = report.overall_accuracy.unwrap();
    assert!(accuracy > 0.9, "overall accuracy {accuracy}");
    assert_eq!(report.band_importances.len(), BANDS.len());

    let labels = wf.classified().unwrap();
    assert_eq!(labels.n_classified(), 100 * 100);
    assert_eq!(labels.at(100.0, 500.0), Some(0));
    assert_eq!(labels.at(900.0, 500.0), Some(4));
    assert_eq!(labels.at(1200.0, 500.0), None);
}

#[test]
fn confusion_matrix_sums_to_testing_partition() {
    let wf = workflow(config(&ALL_VILLAGES), &LandCoverClass::ALL);
    let report = wf.evaluation().unwrap();
    let n_testing = wf.partition().unwrap().testing().len();
    let sum: usize = report.confusion_matrix.iter().flatten().sum();
    assert_eq!(sum, n_testing);
    assert_eq!(report.n_test, n_testing);
    let accuracy = report.overall_accuracy.unwrap();
    assert!((0.0..=1.0).contains(&accuracy));
}

#[test]
fn same_seed_gives_identical_results() {
    let a = workflow(config(&ALL_VILLAGES), &LandCoverClass::ALL);
    let b = workflow(config(&ALL_VILLAGES), &LandCoverClass::ALL);
    assert_eq!(a.evaluation().unwrap(), b.evaluation().unwrap());
    assert_eq!(a.classified().unwrap(), b.classified().unwrap());

    let c = workflow(config(&ALL_VILLAGES).with_seed(8), &LandCoverClass::ALL);
    assert_ne!(
        a.partition().unwrap().random_column(),
        c.partition().unwrap().random_column()
    );
}

#[test]
fn empty_testing_partition_leaves_accuracy_undefined() {
    // One point per class, in the middle of each stripe.
    let single: Vec<TrainingSet> = LandCoverClass::ALL
        .iter()
        .map(|class| TrainingSet {
            name: class.layer().into(),
            points: vec![LabeledPoint {
                x: f64::from(class.label()) * 200.0 + 100.0,
                y: 500.0,
                class: class.label(),
            }],
        })
        .collect();
    let wf = (0..200)
        .map(|seed| {
            Workflow::new(
                config(&ALL_VILLAGES).with_seed(seed),
                boundaries(),
                single.clone(),
                CountingSource::new(),
            )
            .unwrap()
        })
        .find(|wf| wf.partition().unwrap().testing().is_empty())
        .expect("some seed sends all five samples to training");
    assert_eq!(wf.partition().unwrap().training().len(), 5);

    let report = wf.evaluation().unwrap();
    assert_eq!(report.n_test, 0);
    assert_eq!(report.confusion_matrix, vec![vec![0; N_CLASSES]; N_CLASSES]);
    assert_eq!(report.overall_accuracy, None);
    assert_eq!(report.kappa, None);
    assert!(report.producers_accuracy.iter().all(Option::is_none));
    assert!(report.consumers_accuracy.iter().all(Option::is_none));
    assert!(report.to_string().contains("Overall Accuracy: undefined"));

    assert_eq!(wf.classified().unwrap().n_classified(), 100 * 100);
    let areas = wf.areas().unwrap();
    assert!((areas.total() - 100.0).abs() < 1.0);
}

#[test]
fn partition_covers_every_sample_once() {
    let wf = workflow(config(&ALL_VILLAGES), &LandCoverClass::ALL);
    let table = wf.samples().unwrap();
    let partition = wf.partition().unwrap();
    assert_eq!(table.len(), 200);
    let mut ids: Vec<usize> = partition
        .training()
        .iter()
        .chain(partition.testing())
        .map(|s| s.id)
        .collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), table.len());
}

#[test]
fn no_matching_boundary_stops_before_compositing() {
    let wf = workflow(config(&["Nowhere"]), &LandCoverClass::ALL);
    let err = wf.areas().unwrap_err();
    assert!(matches!(err, PipelineError::NoMatchingBoundary { n_features: 5, .. }));
    assert!(err.to_string().contains("no matching boundary"));
    assert_eq!(wf.source().loads.load(Ordering::SeqCst), 0);
    assert!(wf.evaluated_stages().is_empty());
    // Without a classified map there is nothing to export.
    assert!(wf.classified().is_err());
}

#[test]
fn stages_are_evaluated_once() {
    let wf = workflow(config(&ALL_VILLAGES), &LandCoverClass::ALL);
    wf.composite().unwrap();
    wf.composite().unwrap();
    wf.areas().unwrap();
    // Two clear scenes, each loaded a single time.
    assert_eq!(wf.source().loads.load(Ordering::SeqCst), 2);
    assert!(wf.evaluated_stages().contains(&"areas"));
}

#[test]
fn absent_class_has_undefined_accuracy() {
    let classes = [
        LandCoverClass::Water,
        LandCoverClass::BuildUp,
        LandCoverClass::Bareland,
        LandCoverClass::Vegetation,
    ];
    let wf = workflow(config(&ALL_VILLAGES), &classes);
    let report = wf.evaluation().unwrap();
    let cropland = usize::from(LandCoverClass::Cropland.label());
    assert_eq!(report.producers_accuracy[cropland], None);
    assert_eq!(report.consumers_accuracy[cropland], None);
    assert!(report.producers_accuracy[0].is_some());
}

#[test]
fn class_areas_sum_to_target_area() {
    let wf = workflow(config(&ALL_VILLAGES), &LandCoverClass::ALL);
    let areas = wf.areas().unwrap();
    let target_ha = wf.target().unwrap().area() / 10_000.0;
    assert!(
        (areas.total() - target_ha).abs() / target_ha < 0.01,
        "areas {} vs target {target_ha}",
        areas.total()
    );
    assert_eq!(areas.hectares.len(), 5);
    // Each stripe is 200 m × 1000 m = 20 ha.
    for ha in &areas.hectares {
        assert!((ha - 20.0).abs() < 3.0, "stripe area {ha}");
    }
}

#[test]
fn cloudy_collection_is_a_reported_error() {
    let wf = workflow(config(&ALL_VILLAGES).with_max_cloud(0.1), &LandCoverClass::ALL);
    assert!(matches!(
        wf.composite(),
        Err(PipelineError::Raster(RasterError::EmptyCollection { n_scenes: 3, .. }))
    ));
}

#[test]
fn classified_map_exports_over_the_target() {
    let wf = workflow(config(&ALL_VILLAGES), &LandCoverClass::ALL);
    let dir = TempDir::new().unwrap();
    let request = ExportRequest::from_settings(wf.config().export(), wf.target().unwrap().geometry().clone()).unwrap();
    let handle = ExportService::new(dir.path())
        .submit(wf.classified().unwrap(), request)
        .unwrap();
    let path = handle.wait().unwrap();
    assert!(path.ends_with("LandCoverClassificationKamabuye@21.tif"));
    let exported = read_label_raster(&path).unwrap();
    assert_eq!(exported.grid().width, 100);
    assert_eq!(exported.grid().height, 100);
    assert_eq!(exported.n_classified(), 100 * 100);
}

#[test]
fn empty_region_export_is_rejected() {
    let wf = workflow(config(&ALL_VILLAGES), &LandCoverClass::ALL);
    let dir = TempDir::new().unwrap();
    let request = ExportRequest::from_settings(wf.config().export(), MultiPolygon::new(vec![])).unwrap();
    let err = ExportService::new(dir.path())
        .submit(wf.classified().unwrap(), request)
        .unwrap_err();
    assert!(matches!(err, ExportError::InvalidRegion { .. }));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
