//! Aggregator: group staged artifacts into units of work for the model.

use crate::config::AggregationMode;
use crate::error::FichaError;
use crate::pipeline::staging::TextStore;
use std::path::PathBuf;

/// Unit id used in combined mode.
pub const COMBINED_UNIT_ID: &str = "combined";

/// Separator placed between artifacts in combined mode.
pub const COMBINED_SEPARATOR: &str = "\n\n";

/// One submission to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    /// Source stem in per-file mode, [`COMBINED_UNIT_ID`] in combined mode.
    pub id: String,
    pub text: String,
    /// Image references; only ever non-empty in combined mode.
    pub images: Vec<PathBuf>,
}

impl Unit {
    /// File name of the ficha written for this unit.
    pub fn ficha_file_name(&self) -> String {
        if self.id == COMBINED_UNIT_ID {
            "combined_ficha.txt".to_string()
        } else {
            format!("{}_ficha.txt", self.id)
        }
    }
}

/// Build the units for a run from the staged artifacts.
///
/// * `Combined`: always exactly one unit, even with zero artifacts.
/// * `PerFile`: one unit per artifact, in listing order; `images` is ignored.
pub fn aggregate(
    store: &TextStore,
    mode: AggregationMode,
    images: Vec<PathBuf>,
) -> Result<Vec<Unit>, FichaError> {
    let artifacts = store.artifacts()?;
    match mode {
        AggregationMode::Combined => {
            let texts = artifacts
                .iter()
                .map(|(_, path)| store.read(path))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(vec![Unit {
                id: COMBINED_UNIT_ID.to_string(),
                text: texts.join(COMBINED_SEPARATOR),
                images,
            }])
        }
        AggregationMode::PerFile => artifacts
            .into_iter()
            .map(|(stem, path)| {
                Ok(Unit {
                    text: store.read(&path)?,
                    id: stem,
                    images: Vec::new(),
                })
            })
            .collect(),
    }
}
