//! SVG rendering of datasets and detection results
//!
//! Detection results get three stacked panels sharing the time axis:
//! use-case readings, self-diagnostic indicators, and the dDCA signals
//! with the detected context against the fault label. Plain datasets get
//! the first two panels, with the fault label on the indicator panel.

use std::fs;
use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::layout::file_stem;
use crate::record::{
    read_detection_records, read_sensor_records, sniff_columns, DetectionRecord, SensorRecord,
    DETECTION_COLUMNS, INDICATOR_NAMES,
};
use crate::{HarnessError, Result};

const SIZE: (u32, u32) = (1500, 800);

const DARK_GREEN: RGBColor = RGBColor(0, 100, 0);
const LIME_GREEN: RGBColor = RGBColor(50, 205, 50);
const DARK_BLUE: RGBColor = RGBColor(0, 0, 139);
const DODGER_BLUE: RGBColor = RGBColor(30, 144, 255);
const DANGER_RED: RGBColor = RGBColor(255, 0, 0);
const SAFE_GREEN: RGBColor = RGBColor(0, 128, 0);
const CONTEXT_ORCHID: RGBColor = RGBColor(153, 50, 204);
const LABEL_BLUE: RGBColor = RGBColor(100, 149, 237);

const INDICATOR_COLORS: [RGBColor; 8] = [
    RGBColor(25, 25, 112),
    RGBColor(0, 100, 0),
    RGBColor(188, 143, 143),
    RGBColor(255, 69, 0),
    RGBColor(255, 0, 255),
    RGBColor(0, 255, 0),
    RGBColor(0, 255, 255),
    RGBColor(255, 215, 0),
];

type Area<'a> = DrawingArea<SVGBackend<'a>, Shift>;

impl<E> From<DrawingAreaErrorKind<E>> for HarnessError
where
    E: std::error::Error + Send + Sync,
{
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        HarnessError::Plot(err.to_string())
    }
}

/// Which kind of file was plotted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotKind {
    Dataset,
    Detection,
}

fn legend(color: RGBColor) -> impl Fn((i32, i32)) -> PathElement<(i32, i32)> {
    move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
}

/// Hours since the first sample; falls back to the row index when the
/// timestamps do not advance.
fn time_axis(rows: &[&SensorRecord]) -> (Vec<f64>, f64) {
    let t0 = rows.first().map(|r| r.timestamp).unwrap_or(0);
    let mut time: Vec<f64> = rows
        .iter()
        .map(|r| (r.timestamp - t0) as f64 / 3600.0)
        .collect();
    let mut x_max = time.iter().copied().fold(0.0_f64, f64::max);
    if x_max <= 0.0 {
        time = (0..rows.len()).map(|i| i as f64).collect();
        x_max = (rows.len().max(2) - 1) as f64;
    }
    (time, x_max)
}

/// Axis range covering `values`, never narrower than `lo..hi`.
fn bounds(values: impl Iterator<Item = f64>, lo: f64, hi: f64) -> (f64, f64) {
    values.fold((lo, hi), |(a, b), v| (a.min(v), b.max(v)))
}

fn prepare(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn draw_readings(
    area: &Area<'_>,
    caption: &str,
    time: &[f64],
    x_max: f64,
    rows: &[&SensorRecord],
) -> Result<()> {
    let (t_lo, t_hi) = bounds(
        rows.iter()
            .flat_map(|r| [r.readings.t_air, r.readings.t_soil]),
        0.0,
        50.0,
    );
    let (h_lo, h_hi) = bounds(
        rows.iter()
            .flat_map(|r| [r.readings.h_air, r.readings.h_soil]),
        0.0,
        100.0,
    );

    let mut chart = ChartBuilder::on(area)
        .caption(caption, ("sans-serif", 22).into_font())
        .margin(10)
        .x_label_area_size(25)
        .y_label_area_size(60)
        .right_y_label_area_size(60)
        .build_cartesian_2d(0.0..x_max, t_lo..t_hi)?
        .set_secondary_coord(0.0..x_max, h_lo..h_hi);

    chart
        .configure_mesh()
        .y_desc("temperature [°C]")
        .draw()?;
    chart
        .configure_secondary_axes()
        .y_desc("relative humidity [%]")
        .draw()?;

    let temps: [(&str, RGBColor, fn(&SensorRecord) -> f64); 2] = [
        ("T_air", DARK_GREEN, |r| r.readings.t_air),
        ("T_soil", LIME_GREEN, |r| r.readings.t_soil),
    ];
    for (name, color, value) in temps {
        chart
            .draw_series(LineSeries::new(
                time.iter().zip(rows).map(|(t, r)| (*t, value(r))),
                &color,
            ))?
            .label(name)
            .legend(legend(color));
    }

    let humidity: [(&str, RGBColor, fn(&SensorRecord) -> f64); 2] = [
        ("H_air", DARK_BLUE, |r| r.readings.h_air),
        ("H_soil", DODGER_BLUE, |r| r.readings.h_soil),
    ];
    for (name, color, value) in humidity {
        chart
            .draw_secondary_series(LineSeries::new(
                time.iter().zip(rows).map(|(t, r)| (*t, value(r))),
                &color,
            ))?
            .label(name)
            .legend(legend(color));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerMiddle)
        .background_style(WHITE)
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

fn draw_indicators(
    area: &Area<'_>,
    time: &[f64],
    x_max: f64,
    rows: &[&SensorRecord],
    with_label: bool,
) -> Result<()> {
    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .x_label_area_size(25)
        .y_label_area_size(60)
        .right_y_label_area_size(60)
        .build_cartesian_2d(0.0..x_max, 0.0..1.1)?;

    chart
        .configure_mesh()
        .y_desc("fault indicators")
        .draw()?;

    for (i, (name, color)) in INDICATOR_NAMES.iter().zip(INDICATOR_COLORS).enumerate() {
        chart
            .draw_series(LineSeries::new(
                time.iter().zip(rows).map(|(t, r)| (*t, r.indicators[i])),
                &color,
            ))?
            .label(*name)
            .legend(legend(color));
    }

    if with_label {
        chart
            .draw_series(LineSeries::new(
                time.iter().zip(rows).map(|(t, r)| (*t, f64::from(r.label))),
                &LABEL_BLUE,
            ))?
            .label("fault label")
            .legend(legend(LABEL_BLUE));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperMiddle)
        .background_style(WHITE)
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

fn draw_ddca(area: &Area<'_>, time: &[f64], x_max: f64, rows: &[DetectionRecord]) -> Result<()> {
    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(60)
        .right_y_label_area_size(60)
        .build_cartesian_2d(0.0..x_max, 0.0..1.1)?;

    chart
        .configure_mesh()
        .x_desc("time since start [h]")
        .y_desc("danger/safe, fault context")
        .draw()?;

    let signals: [(&str, RGBColor, fn(&DetectionRecord) -> f64); 4] = [
        ("danger", DANGER_RED, |r| r.danger),
        ("safe", SAFE_GREEN, |r| r.safe),
        ("fault context", CONTEXT_ORCHID, |r| f64::from(r.context)),
        ("fault label", LABEL_BLUE, |r| f64::from(r.sensor.label)),
    ];
    for (name, color, value) in signals {
        chart
            .draw_series(LineSeries::new(
                time.iter().zip(rows).map(|(t, r)| (*t, value(r))),
                &color,
            ))?
            .label(name)
            .legend(legend(color));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::MiddleRight)
        .background_style(WHITE)
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

/// Render a detection result as a three-panel SVG.
pub fn render_detection_plot(
    records: &[DetectionRecord],
    path: &Path,
    caption: &str,
    transparent: bool,
) -> Result<()> {
    if records.is_empty() {
        return Err(HarnessError::EmptyDataset(path.to_path_buf()));
    }
    prepare(path)?;

    let sensors: Vec<&SensorRecord> = records.iter().map(|r| &r.sensor).collect();
    let (time, x_max) = time_axis(&sensors);

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    if !transparent {
        root.fill(&WHITE)?;
    }
    let panels = root.split_evenly((3, 1));
    draw_readings(&panels[0], caption, &time, x_max, &sensors)?;
    draw_indicators(&panels[1], &time, x_max, &sensors, false)?;
    draw_ddca(&panels[2], &time, x_max, records)?;

    root.present()?;
    Ok(())
}

/// Render a plain dataset as a two-panel SVG.
pub fn render_dataset_plot(
    records: &[SensorRecord],
    path: &Path,
    caption: &str,
    transparent: bool,
) -> Result<()> {
    if records.is_empty() {
        return Err(HarnessError::EmptyDataset(path.to_path_buf()));
    }
    prepare(path)?;

    let sensors: Vec<&SensorRecord> = records.iter().collect();
    let (time, x_max) = time_axis(&sensors);

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    if !transparent {
        root.fill(&WHITE)?;
    }
    let panels = root.split_evenly((2, 1));
    draw_readings(&panels[0], caption, &time, x_max, &sensors)?;
    draw_indicators(&panels[1], &time, x_max, &sensors, true)?;

    root.present()?;
    Ok(())
}

/// Plot `input` into `output`, choosing the layout from the column count.
pub fn plot_file(input: &Path, output: &Path, transparent: bool) -> Result<PlotKind> {
    let caption = file_stem(input);
    if sniff_columns(input)? >= DETECTION_COLUMNS {
        let records = read_detection_records(input)?;
        if records.is_empty() {
            return Err(HarnessError::EmptyDataset(input.to_path_buf()));
        }
        render_detection_plot(&records, output, &caption, transparent)?;
        Ok(PlotKind::Detection)
    } else {
        let records = read_sensor_records(input)?;
        if records.is_empty() {
            return Err(HarnessError::EmptyDataset(input.to_path_buf()));
        }
        render_dataset_plot(&records, output, &caption, transparent)?;
        Ok(PlotKind::Dataset)
    }
}
