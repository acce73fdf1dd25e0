use std::fs;
use std::path::Path;

use csv::Writer;
use image::DynamicImage;

use crate::errors::Result;
use crate::image_io::save_png;
use crate::pipeline::Outcome;

/// One processed file in a batch run
pub struct BatchEntry {
    pub filename: String,
    pub outcome: Outcome,
}

/// Write one summary row per processed image to `<output_dir>/summary.csv`
pub fn write_summary_csv<P: AsRef<Path>>(entries: &[BatchEntry], output_dir: P) -> Result<()> {
    let output_path = output_dir.as_ref().join("summary.csv");

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut writer = Writer::from_path(&output_path)?;

    writer.write_record([
        "Filename",
        "Image_ID",
        "Status",
        "Reason",
        "Predicted_Class",
        "Infected_Percentage",
        "Infected_Pixels",
        "Green_Pixels",
        "Result",
    ])?;

    for entry in entries {
        let record = match &entry.outcome {
            Outcome::Diagnosed(result) => [
                entry.filename.clone(),
                result.image_id.clone(),
                "ok".to_string(),
                String::new(),
                result.predicted_class.to_string(),
                result.infected_percentage.to_string(),
                result.infected_pixels.to_string(),
                result.green_pixels.to_string(),
                result.result.clone(),
            ],
            Outcome::Rejected { image_id, rejection } => [
                entry.filename.clone(),
                image_id.clone(),
                "rejected".to_string(),
                rejection.reason().to_string(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
            ],
        };
        writer.write_record(&record)?;
    }

    writer.flush()?;

    Ok(())
}

/// Save the rendered mask and highlight of a diagnosis under `<output_dir>/debug`
pub fn save_debug_images<P: AsRef<Path>>(outcome: &Outcome, output_dir: P, stem: &str) -> Result<()> {
    let Some(result) = outcome.diagnosis() else {
        return Ok(());
    };

    let debug_dir = output_dir.as_ref().join("debug");
    fs::create_dir_all(&debug_dir)?;

    save_png(
        &DynamicImage::ImageLuma8(result.mask_visualization.clone()),
        debug_dir.join(format!("{}_mask.png", stem)),
    )?;
    save_png(
        &DynamicImage::ImageRgb8(result.highlight.clone()),
        debug_dir.join(format!("{}_highlight.png", stem)),
    )?;

    Ok(())
}

/// Write the JSON response body of one outcome to `<output_dir>/json/<stem>.json`
pub fn save_json<P: AsRef<Path>>(outcome: &Outcome, output_dir: P, stem: &str) -> Result<()> {
    let json_dir = output_dir.as_ref().join("json");
    fs::create_dir_all(&json_dir)?;

    let text = serde_json::to_string_pretty(&outcome.to_json()?)?;
    fs::write(json_dir.join(format!("{}.json", stem)), text)?;

    Ok(())
}
