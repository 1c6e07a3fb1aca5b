//! Drawing figures to PNG or SVG with plotters.

use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::Path;
use thiserror::Error;

use crate::figure::{Figure, Rgb};
use crate::sky_position::{format_dms, format_hms};

/// Output dimensions of a rendered figure in pixels
pub const FIGURE_SIZE: (u32, u32) = (900, 840);

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Drawing failed: {0}")]
    Drawing(String),
    #[error("Unsupported figure format '{0}' (expected .png or .svg)")]
    UnsupportedFormat(String),
}

fn drawing_error<E: std::error::Error + Send + Sync>(e: DrawingAreaErrorKind<E>) -> RenderError {
    RenderError::Drawing(e.to_string())
}

impl From<Rgb> for RGBColor {
    fn from(Rgb(r, g, b): Rgb) -> Self {
        RGBColor(r, g, b)
    }
}

/// Save as PNG or SVG depending on the file extension.
pub fn save(figure: &Figure, path: &Path) -> Result<(), RenderError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "png" => save_png(figure, path),
        "svg" => save_svg(figure, path),
        _ => Err(RenderError::UnsupportedFormat(extension)),
    }
}

pub fn save_png(figure: &Figure, path: &Path) -> Result<(), RenderError> {
    let root = BitMapBackend::new(path, FIGURE_SIZE).into_drawing_area();
    draw(figure, &root)?;
    root.present().map_err(drawing_error)?;
    log::info!("Saved figure to {}", path.display());
    Ok(())
}

pub fn save_svg(figure: &Figure, path: &Path) -> Result<(), RenderError> {
    let root = SVGBackend::new(path, FIGURE_SIZE).into_drawing_area();
    draw(figure, &root)?;
    root.present().map_err(drawing_error)?;
    log::info!("Saved figure to {}", path.display());
    Ok(())
}

/// Draw the composite pixels, the contour overlays and sky-coordinate axes.
///
/// Pixel `(col, row)` covers `[col - 0.5, col + 0.5]`, so contour points in
/// pixel coordinates land on pixel centres. Row 0 is drawn at the bottom.
fn draw<DB>(figure: &Figure, root: &DrawingArea<DB, Shift>) -> Result<(), RenderError>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&BLACK).map_err(drawing_error)?;

    let rgb = &figure.composite;
    let size = rgb.size();
    let (width, height) = (size.width as f64, size.height as f64);

    let mut chart = ChartBuilder::on(root)
        .caption(&figure.title, ("sans-serif", 22).into_font().color(&WHITE))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(90)
        .build_cartesian_2d(-0.5..width - 0.5, -0.5..height - 0.5)
        .map_err(drawing_error)?;

    chart
        .draw_series((0..size.height).flat_map(|row| {
            (0..size.width).map(move |col| {
                let [r, g, b] = rgb.rgb8(row, col);
                let (x, y) = (col as f64, row as f64);
                Rectangle::new(
                    [(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)],
                    RGBColor(r, g, b).filled(),
                )
            })
        }))
        .map_err(drawing_error)?;

    for overlay in &figure.overlays {
        let color = RGBColor::from(overlay.color);
        for line in &overlay.layer.lines {
            chart
                .draw_series(LineSeries::new(line.points.iter().copied(), color))
                .map_err(drawing_error)?;
        }
    }

    let (mid_x, mid_y) = ((width - 1.0) / 2.0, (height - 1.0) / 2.0);
    let wcs = rgb.wcs.as_ref();
    let ra_label = |x: &f64| match wcs.map(|w| w.pixel_to_world(*x, mid_y)) {
        Some(Ok((ra, _))) => format_hms(ra),
        _ => format!("{x:.0}"),
    };
    let dec_label = |y: &f64| match wcs.map(|w| w.pixel_to_world(mid_x, *y)) {
        Some(Ok((_, dec))) => format_dms(dec),
        _ => format!("{y:.0}"),
    };
    let (x_desc, y_desc) = if wcs.is_some() {
        ("RA (J2000)", "Dec (J2000)")
    } else {
        ("x (pixels)", "y (pixels)")
    };

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(5)
        .y_labels(5)
        .x_label_formatter(&ra_label)
        .y_label_formatter(&dec_label)
        .x_desc(x_desc)
        .y_desc(y_desc)
        .axis_style(WHITE)
        .label_style(("sans-serif", 14).into_font().color(&WHITE))
        .draw()
        .map_err(drawing_error)?;

    Ok(())
}
