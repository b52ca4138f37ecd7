//! Disk round trip: GeoJSON + scene archive in, composite and result files out.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use geo::{Coord, Rect};
use image::{ImageBuffer, Luma};
use landcover_io::{
    BoundaryReader, ExperimentName, ResultWriter, SceneArchive, TrainingReader, read_label_raster,
    unique_artifact_path, write_label_raster,
};
use landcover_raster::{CollectionFilter, DateRange, SceneSource, area_by_class, median_composite};
use landcover_vector::{Attribute, BoundaryFilter, SimplifyConfig};
use tempfile::TempDir;

/// Two adjacent 1 km villages in Tunda cell and one in another sector.
fn write_boundaries(dir: &Path) {
    let village = |name: &str, sector: &str, x0: f64| {
        format!(
            r#"{{"type": "Feature",
                "properties": {{"Prov_Enlgi": "East", "District": "Bugesera", "Sector_1": "{sector}",
                                "Cellule_1": "Tunda", "Village": "{name}"}},
                "geometry": {{"type": "Polygon", "coordinates": [[[{x0},0],[{x1},0],[{x1},1000],[{x0},1000],[{x0},0]]]}}}}"#,
            x1 = x0 + 1000.0
        )
    };
    let text = format!(
        r#"{{"type": "FeatureCollection", "features": [{}, {}, {}]}}"#,
        village("Senga", "Kamabuye", 0.0),
        village("Tunda", "Kamabuye", 1000.0),
        village("Kagenge", "Ntarama", 2000.0)
    );
    fs::write(dir.join("villages.geojson"), text).unwrap();
}

fn write_training(dir: &Path) {
    let layer = |class: u8, xs: &[f64]| {
        let features: Vec<String> = xs
            .iter()
            .map(|x| {
                format!(
                    r#"{{"type": "Feature", "properties": {{"Class": {class}}},
                        "geometry": {{"type": "Point", "coordinates": [{x}, 500]}}}}"#
                )
            })
            .collect();
        format!(r#"{{"type": "FeatureCollection", "features": [{}]}}"#, features.join(","))
    };
    fs::write(dir.join("water.geojson"), layer(0, &[105.0, 315.0])).unwrap();
    fs::write(dir.join("vegetation.geojson"), layer(4, &[1505.0, 1805.0])).unwrap();
}

/// Three 200×100 scenes of 10 m pixels over the villages; one is cloudy.
fn write_archive(dir: &Path) {
    let (width, height) = (300u32, 100u32);
    let mut scenes = Vec::new();
    for (i, (date, cloud, level)) in [("2021-02-01", 0.2, 1000u16), ("2021-06-01", 0.5, 1200), ("2021-09-01", 35.0, 9000)]
        .into_iter()
        .enumerate()
    {
        for band in ["B2", "B8"] {
            let pixels: Vec<u16> = (0..width * height)
                .map(|p| {
                    let col = p % width;
                    // Water on the west half of Senga, vegetation elsewhere.
                    let base = if col < 50 { level / 4 } else { level };
                    if band == "B8" { base * 2 } else { base }
                })
                .collect();
            let buf: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::from_raw(width, height, pixels).unwrap();
            buf.save(dir.join(format!("scene{i}_{band}.tif"))).unwrap();
        }
        scenes.push(format!(
            r#"{{"id": "scene{i}", "date": "{date}", "cloudy_pixel_percentage": {cloud},
                "grid": {{"origin_x": 0.0, "origin_y": 1000.0, "pixel_size": 10.0, "width": {width}, "height": {height}}},
                "bands": {{"B2": "scene{i}_B2.tif", "B8": "scene{i}_B8.tif"}}}}"#
        ));
    }
    fs::write(dir.join("collection.json"), format!(r#"{{"scenes": [{}]}}"#, scenes.join(","))).unwrap();
}

#[test]
fn inputs_to_outputs_round_trip() {
    let inputs = TempDir::new().unwrap();
    write_boundaries(inputs.path());
    write_training(inputs.path());
    write_archive(inputs.path());

    // Boundaries.
    let features = BoundaryReader::new(&inputs.path().join("villages.geojson")).read().unwrap();
    assert_eq!(features.len(), 3);
    let selected = BoundaryFilter::new()
        .eq(Attribute::Sector, "Kamabuye")
        .in_list(Attribute::Cell, ["Tunda"])
        .select(&features);
    assert_eq!(selected.len(), 2);
    let target = SimplifyConfig::default().build(&selected).unwrap();
    assert_eq!(target.n_parts(), 1);
    assert!((target.area() - 2_000_000.0).abs() < 1.0);

    // Composite over the target.
    let archive = SceneArchive::open(inputs.path()).unwrap();
    let bbox = target.bounding_rect().unwrap();
    let year = DateRange::new(
        NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2021, 12, 31).unwrap(),
    )
    .unwrap();
    let filter = CollectionFilter::new(bbox, year, 1.0);
    let bands = vec!["B2".to_string(), "B8".to_string()];
    let composite = median_composite(&archive, &filter, &bands).unwrap();
    assert_eq!(composite.scene_ids(), ["scene0", "scene1"]);
    let image = composite.image().clip(target.geometry());
    // 200 of 300 columns are inside the two villages.
    assert_eq!(image.n_valid(), 200 * 100);
    assert_eq!(image.pixel(0, 0), Some(vec![275.0, 550.0]));

    // Training points sample the composite.
    let sets = TrainingReader::new(inputs.path()).read_all(&["water", "vegetation"]).unwrap();
    let points: Vec<(f64, f64)> = sets.iter().flat_map(|s| s.points.iter().map(|p| (p.x, p.y))).collect();
    let sampled = image.sample_points(&points);
    assert_eq!(sampled[0], Some(vec![275.0, 550.0]));
    assert_eq!(sampled[2], Some(vec![1100.0, 2200.0]));

    // Classify with a threshold and write everything.
    let labels = image
        .classify(|v: &[f64]| Ok::<u8, std::convert::Infallible>(if v[1] < 1000.0 { 0 } else { 4 }))
        .unwrap();
    let areas = area_by_class(&labels, target.geometry(), 25.0, 5).unwrap();
    assert!((areas.hectares[0] - 50.0).abs() < 1e-6);
    assert!((areas.hectares[4] - 150.0).abs() < 1e-6);

    let out = TempDir::new().unwrap();
    let writer = ResultWriter::new(&out.path().join("results"), ExperimentName::new("tunda".into()).unwrap()).unwrap();
    let names = ["Water", "Build up", "Bareland", "Crop Land", "Vegetation"];
    let csv_path = writer.write_areas(&names, &areas).unwrap();
    let csv_text = fs::read_to_string(csv_path).unwrap();
    assert!(csv_text.starts_with("class,name,hectares\n0,Water,50.0000\n"));
    assert!(csv_text.contains(",unclassified,0.0000"));

    let target_path = writer.write_target(&target).unwrap();
    let target_json: serde_json::Value = serde_json::from_str(&fs::read_to_string(target_path).unwrap()).unwrap();
    assert_eq!(target_json["features"][0]["geometry"]["type"], "MultiPolygon");

    let eval_path = writer
        .write_evaluation(&serde_json::json!({"overall_accuracy": null}))
        .unwrap();
    assert!(eval_path.ends_with("tunda_evaluation.json"));

    let map_path = unique_artifact_path(writer.output_dir(), "tunda_map", "tif");
    write_label_raster(&map_path, &labels).unwrap();
    assert_eq!(read_label_raster(&map_path).unwrap(), labels);
    assert_ne!(unique_artifact_path(writer.output_dir(), "tunda_map", "tif"), map_path);
}

#[test]
fn cloudy_year_yields_no_composite() {
    let inputs = TempDir::new().unwrap();
    write_archive(inputs.path());
    let archive = SceneArchive::open(inputs.path()).unwrap();
    let year = DateRange::new(
        NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2021, 12, 31).unwrap(),
    )
    .unwrap();
    let bbox = Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 100.0, y: 100.0 });
    let err = median_composite(&archive, &CollectionFilter::new(bbox, year, 0.1), &["B2".to_string()]).unwrap_err();
    assert!(err.to_string().contains("no scene of 3"));
    assert_eq!(archive.scenes().len(), 3);
}
