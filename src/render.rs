/// Rendering boundary.
///
/// Map rendering is done outside this crate. The engine hands each hour's
/// converted field and label to a `Renderer`, and the run total at the
/// end; whatever artifacts come back are attached to notifications
/// without being inspected.
///
/// A renderer that needs map tiles should take its HTTP fetch strategy
/// (client, User-Agent) as a constructor parameter.

use serde::Serialize;

use crate::model::{AlerterError, ForecastHour, GriddedField};

/// An opaque rendered file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artifact {
    pub filename: String,
    pub content_type: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

pub trait Renderer {
    /// Called once per non-terminal hour with the field in display units.
    fn render_hour(
        &mut self,
        hour: ForecastHour,
        label: &str,
        field: &GriddedField,
    ) -> Result<Option<Artifact>, AlerterError>;

    /// Called once with the run total. `max_value` is the total's maximum.
    fn render_total(
        &mut self,
        start_label: &str,
        end_label: &str,
        field: &GriddedField,
        max_value: f64,
    ) -> Result<Option<Artifact>, AlerterError>;
}

/// Renders nothing. Notifications then carry text and point series only.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn render_hour(&mut self, _: ForecastHour, _: &str, _: &GriddedField) -> Result<Option<Artifact>, AlerterError> {
        Ok(None)
    }

    fn render_total(&mut self, _: &str, _: &str, _: &GriddedField, _: f64) -> Result<Option<Artifact>, AlerterError> {
        Ok(None)
    }
}

/// Filename for the run-total image, with characters that are unsafe in
/// file names replaced.
pub fn total_filename(start_label: &str, end_label: &str) -> String {
    let raw = format!("{}_thru_{}_total_accum.png", start_label, end_label);
    raw.chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '-',
            ' ' => '_',
            other => other,
        })
        .collect()
}
