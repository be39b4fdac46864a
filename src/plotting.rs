use crate::agilent4156::MeasuredData;
use crate::error::ScpiError;
use textplots::{Chart, Plot, Shape};

const DEFAULT_WIDTH: usize = 140;
const DEFAULT_HEIGHT: usize = 60;

/// Determine the best scale and unit prefix for a given maximum magnitude
fn determine_scale(max_value: f64) -> (f64, &'static str) {
    if max_value >= 1.0 || max_value == 0.0 {
        (1.0, "")
    } else if max_value >= 1e-3 {
        (1e3, "m")
    } else if max_value >= 1e-6 {
        (1e6, "μ")
    } else if max_value >= 1e-9 {
        (1e9, "n")
    } else {
        (1e12, "p")
    }
}

fn bounds<'a>(values: impl Iterator<Item = &'a f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
        (lo.min(v), hi.max(v))
    })
}

/// Avoid a zero-width x axis, which textplots cannot draw
fn x_range(min: f64, max: f64) -> (f32, f32) {
    if max > min {
        (min as f32, max as f32)
    } else {
        (min as f32 - 1.0, max as f32 + 1.0)
    }
}

/// Plot a series of values against their sample index, with automatic scaling
///
/// # Arguments
/// * `values` - The data values to plot
/// * `title` - Optional title for the plot
/// * `width` - Optional plot width (default: 140)
/// * `height` - Optional plot height (default: 60)
///
/// # Examples
/// ```
/// use rusty_scpi::plotting::plot_values;
///
/// let data = vec![1e-12, 2e-12, 1.5e-12, 3e-12];
/// plot_values(&data, Some("IC"), None, None).unwrap();
/// ```
pub fn plot_values(
    values: &[f64],
    title: Option<&str>,
    width: Option<usize>,
    height: Option<usize>,
) -> Result<(), ScpiError> {
    if values.is_empty() {
        return Err(ScpiError::Validation("cannot plot empty data".to_string()));
    }

    let width = width.unwrap_or(DEFAULT_WIDTH);
    let height = height.unwrap_or(DEFAULT_HEIGHT);

    let (min_value, max_value) = bounds(values.iter());
    let (scale, unit) = determine_scale(max_value.abs().max(min_value.abs()));

    let frame: Vec<(f32, f32)> = values
        .iter()
        .enumerate()
        .map(|(i, &value)| (i as f32, (value * scale) as f32))
        .collect();

    println!("{}", title.unwrap_or("Data Plot"));
    println!(
        "{} samples | {:.3} to {:.3} {}units",
        values.len(),
        min_value * scale,
        max_value * scale,
        unit
    );
    println!("{}", "─".repeat(width));

    let (x_min, x_max) = x_range(0.0, (values.len() - 1) as f64);
    Chart::new(width as u32, height as u32, x_min, x_max)
        .lineplot(&Shape::Lines(&frame))
        .nice();

    println!("Sample Index →");
    Ok(())
}

/// Plot every column of a measurement against its first column.
///
/// The first saved variable is usually the swept one (for example `VC` in a
/// collector sweep), so each remaining column becomes one I-V style chart. A table
/// with a single column is plotted against the sample index instead.
pub fn plot_columns(
    data: &MeasuredData,
    width: Option<usize>,
    height: Option<usize>,
) -> Result<(), ScpiError> {
    let columns = data.columns();
    let Some(x_name) = columns.first() else {
        return Err(ScpiError::Validation("no columns to plot".to_string()));
    };
    if data.n_rows() == 0 {
        return Err(ScpiError::Validation("cannot plot empty data".to_string()));
    }

    let x = data.values().column(0);
    if columns.len() == 1 {
        return plot_values(&x.to_vec(), Some(x_name.as_str()), width, height);
    }

    let width = width.unwrap_or(DEFAULT_WIDTH);
    let height = height.unwrap_or(DEFAULT_HEIGHT);
    let (x_lo, x_hi) = bounds(x.iter());
    let (x_scale, x_unit) = determine_scale(x_hi.abs().max(x_lo.abs()));
    let (x_min, x_max) = x_range(x_lo * x_scale, x_hi * x_scale);

    for (j, y_name) in columns.iter().enumerate().skip(1) {
        let y = data.values().column(j);
        let (y_lo, y_hi) = bounds(y.iter());
        let (y_scale, y_unit) = determine_scale(y_hi.abs().max(y_lo.abs()));

        let frame: Vec<(f32, f32)> = x
            .iter()
            .zip(y.iter())
            .map(|(&xv, &yv)| ((xv * x_scale) as f32, (yv * y_scale) as f32))
            .collect();

        println!("{y_name} vs {x_name}");
        println!(
            "X: {x_name} [{x_unit}units] | Y: {y_name} {:.3} to {:.3} {y_unit}units",
            y_lo * y_scale,
            y_hi * y_scale
        );
        println!("{}", "─".repeat(width));

        Chart::new(width as u32, height as u32, x_min, x_max)
            .lineplot(&Shape::Lines(&frame))
            .nice();
        println!();
    }
    Ok(())
}
