//! Presentation layer: map images, charts, legend and a map manifest.
//!
//! Each visual is drawn independently. A failure is logged, recorded in the
//! [`RenderSummary`] and does not stop the others.

use std::fs;
use std::path::{Path, PathBuf};

use image::{ImageFormat, Rgba, RgbaImage};
use landcover_raster::{ClassAreas, LabelImage, MultiBandImage};
use landcover_vector::TargetGeometry;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use serde::Serialize;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::classes::{LandCoverClass, N_CLASSES};
use crate::config::PresentationConfig;
use crate::error::RenderError;
use crate::evaluate::AccuracyReport;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);
const OUTLINE: Rgba<u8> = Rgba([255, 0, 0, 255]);
const FONT: &str = "sans-serif";

/// One output of the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Visual {
    RgbComposite,
    Classification,
    ConfusionTable,
    AreaChart,
    Legend,
    MapManifest,
}

impl Visual {
    pub const ALL: [Visual; 6] = [
        Visual::RgbComposite,
        Visual::Classification,
        Visual::ConfusionTable,
        Visual::AreaChart,
        Visual::Legend,
        Visual::MapManifest,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Visual::RgbComposite => "true-colour composite",
            Visual::Classification => "classified map",
            Visual::ConfusionTable => "confusion matrix table",
            Visual::AreaChart => "area chart",
            Visual::Legend => "legend",
            Visual::MapManifest => "map manifest",
        }
    }

    fn file_suffix(self) -> &'static str {
        match self {
            Visual::RgbComposite => "rgb.png",
            Visual::Classification => "classification.png",
            Visual::ConfusionTable => "confusion.svg",
            Visual::AreaChart => "area_chart.svg",
            Visual::Legend => "legend.svg",
            Visual::MapManifest => "map.json",
        }
    }
}

/// Stage outputs the presentation layer draws from.
#[derive(Debug, Clone, Copy)]
pub struct RenderInputs<'a> {
    pub target: &'a TargetGeometry,
    pub composite: &'a MultiBandImage,
    pub classified: &'a LabelImage,
    pub evaluation: &'a AccuracyReport,
    pub areas: &'a ClassAreas,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedVisual {
    pub visual: Visual,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedVisual {
    pub visual: Visual,
    pub reason: String,
}

/// What was drawn and what was skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderSummary {
    pub rendered: Vec<RenderedVisual>,
    pub skipped: Vec<SkippedVisual>,
}

impl RenderSummary {
    #[must_use]
    pub fn path_of(&self, visual: Visual) -> Option<&Path> {
        self.rendered
            .iter()
            .find(|r| r.visual == visual)
            .map(|r| r.path.as_path())
    }
}

/// Draws every visual into one directory under a common file prefix.
#[derive(Debug, Clone)]
pub struct Renderer {
    output_dir: PathBuf,
    prefix: String,
    config: PresentationConfig,
}

impl Renderer {
    #[must_use]
    pub fn new(output_dir: &Path, prefix: &str, config: PresentationConfig) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            prefix: prefix.to_string(),
            config,
        }
    }

    #[must_use]
    pub fn path_for(&self, visual: Visual) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}", self.prefix, visual.file_suffix()))
    }

    /// Draw every visual, skipping the ones that fail.
    #[instrument(skip_all, fields(dir = %self.output_dir.display()))]
    pub fn render_all(&self, inputs: &RenderInputs<'_>) -> RenderSummary {
        let mut summary = RenderSummary::default();
        for visual in Visual::ALL {
            let path = self.path_for(visual);
            let outcome = match visual {
                Visual::RgbComposite => self.draw_rgb(inputs, &path),
                Visual::Classification => draw_classification(inputs, &path),
                Visual::ConfusionTable => draw_confusion_table(inputs.evaluation, &path),
                Visual::AreaChart => self.draw_area_chart(inputs.areas, &path),
                Visual::Legend => self.draw_legend(&path),
                Visual::MapManifest => self.write_manifest(inputs, &summary, &path),
            };
            match outcome {
                Ok(()) => summary.rendered.push(RenderedVisual { visual, path }),
                Err(err) => {
                    warn!(visual = visual.name(), error = %err, "visual skipped");
                    summary.skipped.push(SkippedVisual {
                        visual,
                        reason: err.to_string(),
                    });
                }
            }
        }
        info!(
            n_rendered = summary.rendered.len(),
            n_skipped = summary.skipped.len(),
            "presentation layer done"
        );
        summary
    }

    /// Stretched true colour with the target outline on top.
    fn draw_rgb(&self, inputs: &RenderInputs<'_>, path: &Path) -> Result<(), RenderError> {
        let rgb = &self.config.rgb;
        let image = inputs.composite.select(&rgb.bands)?;
        let grid = *image.grid();
        let inside: Vec<bool> = (0..grid.n_pixels())
            .map(|i| {
                let (x, y) = grid.pixel_centre(i % grid.width, i / grid.width);
                inputs.target.contains(x, y)
            })
            .collect();
        let is_inside = |col: i64, row: i64| {
            col >= 0
                && row >= 0
                && (col as usize) < grid.width
                && (row as usize) < grid.height
                && inside[grid.index(col as usize, row as usize)]
        };

        let canvas = RgbaImage::from_fn(grid.width as u32, grid.height as u32, |c, r| {
            let (col, row) = (i64::from(c), i64::from(r));
            if is_inside(col, row)
                && [(-1, 0), (1, 0), (0, -1), (0, 1)]
                    .iter()
                    .any(|(dc, dr)| !is_inside(col + dc, row + dr))
            {
                return OUTLINE;
            }
            match image.pixel(c as usize, r as usize) {
                Some(v) => Rgba([rgb.apply(v[0]), rgb.apply(v[1]), rgb.apply(v[2]), 255]),
                None => TRANSPARENT,
            }
        });
        save_png(&canvas, Visual::RgbComposite, path)
    }

    fn draw_area_chart(&self, areas: &ClassAreas, path: &Path) -> Result<(), RenderError> {
        const VISUAL: &str = "area chart";
        if areas.hectares.len() != N_CLASSES {
            return Err(RenderError::Empty {
                visual: VISUAL,
                reason: "area table does not cover the five classes",
            });
        }
        let y_max = areas.hectares.iter().copied().fold(0.0, f64::max).max(1.0) * 1.15;
        let root = SVGBackend::new(path, (760, 480)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err(VISUAL))?;
        let mut chart = ChartBuilder::on(&root)
            .caption(&self.config.chart_title, (FONT, 20).into_font())
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(70)
            .build_cartesian_2d(-0.5f64..(N_CLASSES as f64 - 0.5), 0f64..y_max)
            .map_err(draw_err(VISUAL))?;
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(N_CLASSES)
            .x_label_formatter(&|x: &f64| class_tick(*x))
            .x_desc("Class")
            .y_desc("Area (Ha)")
            .draw()
            .map_err(draw_err(VISUAL))?;
        chart
            .draw_series(LandCoverClass::ALL.iter().zip(&areas.hectares).map(|(class, &ha)| {
                let [r, g, b] = class.rgb();
                let x = f64::from(class.label());
                Rectangle::new([(x - 0.35, 0.0), (x + 0.35, ha)], RGBColor(r, g, b).filled())
            }))
            .map_err(draw_err(VISUAL))?;
        chart
            .draw_series(LandCoverClass::ALL.iter().zip(&areas.hectares).map(|(class, &ha)| {
                let style = TextStyle::from((FONT, 13).into_font()).pos(Pos::new(HPos::Center, VPos::Bottom));
                Text::new(format!("{ha:.1}"), (f64::from(class.label()), ha), style)
            }))
            .map_err(draw_err(VISUAL))?;
        root.present().map_err(draw_err(VISUAL))
    }

    fn draw_legend(&self, path: &Path) -> Result<(), RenderError> {
        const VISUAL: &str = "legend";
        let row_height = 28;
        let height = 50 + row_height * N_CLASSES as i32 + 10;
        let root = SVGBackend::new(path, (220, height as u32)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err(VISUAL))?;
        let title = TextStyle::from((FONT, 18).into_font().style(FontStyle::Bold));
        root.draw(&Text::new(self.config.legend_title.clone(), (15, 12), title))
            .map_err(draw_err(VISUAL))?;
        for (i, class) in LandCoverClass::ALL.iter().enumerate() {
            let y = 50 + row_height * i as i32;
            let [r, g, b] = class.rgb();
            root.draw(&Rectangle::new([(15, y), (35, y + 18)], RGBColor(r, g, b).filled()))
                .map_err(draw_err(VISUAL))?;
            root.draw(&Text::new(class.name(), (45, y + 2), (FONT, 15).into_font()))
                .map_err(draw_err(VISUAL))?;
        }
        root.present().map_err(draw_err(VISUAL))
    }

    /// Describe the map: title, framing, layers with their styles, legend.
    fn write_manifest(&self, inputs: &RenderInputs<'_>, drawn: &RenderSummary, path: &Path) -> Result<(), RenderError> {
        let centroid = inputs.target.centroid().ok_or(RenderError::Empty {
            visual: "map manifest",
            reason: "target has no centroid",
        })?;
        let bounds = inputs.composite.grid().bounds();
        let extent = [bounds.min().x, bounds.min().y, bounds.max().x, bounds.max().y];
        let file_name = |visual: Visual| {
            drawn
                .path_of(visual)
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned())
        };
        let rgb = &self.config.rgb;
        let manifest = json!({
            "title": self.config.map_title,
            "center": [centroid.x(), centroid.y()],
            "zoom": self.config.zoom,
            "layers": [
                {
                    "name": "Sentinel-2 RGB Image",
                    "kind": "raster",
                    "file": file_name(Visual::RgbComposite),
                    "extent": extent,
                    "style": {"bands": rgb.bands, "min": rgb.min, "max": rgb.max, "gamma": rgb.gamma, "opacity": 1},
                },
                {
                    "name": "Land Cover Classification",
                    "kind": "raster",
                    "file": file_name(Visual::Classification),
                    "extent": extent,
                    "style": {
                        "min": 0,
                        "max": N_CLASSES - 1,
                        "palette": LandCoverClass::ALL.map(LandCoverClass::colour_name),
                    },
                },
                {
                    "name": "Selected Features Polygon",
                    "kind": "vector",
                    "geometry": geojson::Geometry::new(geojson::Value::from(inputs.target.geometry())),
                    "style": {"color": "red"},
                },
            ],
            "legend": {
                "title": self.config.legend_title,
                "position": "bottom-left",
                "file": file_name(Visual::Legend),
                "entries": LandCoverClass::ALL.map(|c| json!({"name": c.name(), "color": c.colour_name()})),
            },
            "charts": {
                "confusion_matrix": file_name(Visual::ConfusionTable),
                "area": file_name(Visual::AreaChart),
            },
        });
        let text = serde_json::to_string_pretty(&manifest).map_err(RenderError::Serialize)?;
        fs::write(path, text).map_err(|source| RenderError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Palette-coloured labels, masked pixels transparent.
fn draw_classification(inputs: &RenderInputs<'_>, path: &Path) -> Result<(), RenderError> {
    let labels = inputs.classified;
    let grid = labels.grid();
    if labels.n_classified() == 0 {
        return Err(RenderError::Empty {
            visual: Visual::Classification.name(),
            reason: "no pixel was classified",
        });
    }
    let canvas = RgbaImage::from_fn(grid.width as u32, grid.height as u32, |c, r| {
        match labels.get(c as usize, r as usize).and_then(LandCoverClass::from_label) {
            Some(class) => {
                let [r, g, b] = class.rgb();
                Rgba([r, g, b, 255])
            }
            None => TRANSPARENT,
        }
    });
    save_png(&canvas, Visual::Classification, path)
}

/// Counts on a white-to-red scale, true class down, predicted class across.
fn draw_confusion_table(report: &AccuracyReport, path: &Path) -> Result<(), RenderError> {
    const VISUAL: &str = "confusion matrix table";
    let n = report.confusion_matrix.len();
    if n == 0 {
        return Err(RenderError::Empty {
            visual: VISUAL,
            reason: "empty confusion matrix",
        });
    }
    let (cell, left, top) = (90i32, 150i32, 100i32);
    let size = (left + cell * n as i32 + 20, top + cell * n as i32 + 20);
    let root = SVGBackend::new(path, (size.0 as u32, size.1 as u32)).into_drawing_area();
    root.fill(&WHITE).map_err(draw_err(VISUAL))?;

    let centred = |px: i32| TextStyle::from((FONT, px).into_font()).pos(Pos::new(HPos::Center, VPos::Center));
    root.draw(&Text::new("Confusion Matrix", (size.0 / 2, 18), centred(20)))
        .map_err(draw_err(VISUAL))?;
    root.draw(&Text::new("Predicted Class", (left + cell * n as i32 / 2, 48), centred(15)))
        .map_err(draw_err(VISUAL))?;
    root.draw(&Text::new("True Class", (45, top - 20), centred(15)))
        .map_err(draw_err(VISUAL))?;

    let max = report.confusion_matrix.iter().flatten().copied().max().unwrap_or(0).max(1);
    for (i, name) in report.class_names.iter().enumerate() {
        let offset = cell * i as i32 + cell / 2;
        root.draw(&Text::new(name.clone(), (left + offset, top - 15), centred(13)))
            .map_err(draw_err(VISUAL))?;
        root.draw(&Text::new(name.clone(), (left / 2, top + offset), centred(13)))
            .map_err(draw_err(VISUAL))?;
    }
    for (i, row) in report.confusion_matrix.iter().enumerate() {
        for (j, &count) in row.iter().enumerate() {
            let (x, y) = (left + cell * j as i32, top + cell * i as i32);
            let fade = (255.0 * (1.0 - count as f64 / max as f64)).round() as u8;
            root.draw(&Rectangle::new([(x, y), (x + cell, y + cell)], RGBColor(255, fade, fade).filled()))
                .map_err(draw_err(VISUAL))?;
            root.draw(&Rectangle::new([(x, y), (x + cell, y + cell)], BLACK.stroke_width(1)))
                .map_err(draw_err(VISUAL))?;
            root.draw(&Text::new(count.to_string(), (x + cell / 2, y + cell / 2), centred(16)))
                .map_err(draw_err(VISUAL))?;
        }
    }
    root.present().map_err(draw_err(VISUAL))
}

fn class_tick(x: f64) -> String {
    let nearest = x.round();
    if (x - nearest).abs() > 1e-6 || nearest < 0.0 {
        return String::new();
    }
    LandCoverClass::from_label(nearest as u8)
        .map(|c| c.name().to_string())
        .unwrap_or_default()
}

fn save_png(canvas: &RgbaImage, visual: Visual, path: &Path) -> Result<(), RenderError> {
    canvas
        .save_with_format(path, ImageFormat::Png)
        .map_err(|source| RenderError::Image {
            visual: visual.name(),
            source,
        })
}

fn draw_err<E: std::fmt::Display>(visual: &'static str) -> impl Fn(E) -> RenderError {
    move |err| RenderError::Draw {
        visual,
        reason: err.to_string(),
    }
}
