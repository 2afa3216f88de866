//! On-disk layout of the work directory.
//!
//! Each stage owns its directory until the next stage reads it; re-running a
//! stage overwrites its outputs file by file.

use std::path::{Path, PathBuf};

use crate::config::DatabaseKind;
use crate::constants::{aggregation, dissection};

#[derive(Debug, Clone)]
pub struct WorkLayout {
    root: PathBuf,
}

impl WorkLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // 01a
    pub fn quantities_dir(&self) -> PathBuf {
        self.root.join("01a_quantities")
    }

    pub fn quantities_boq(&self) -> PathBuf {
        self.quantities_dir().join("BoQ_quantities.csv")
    }

    // 01b
    pub fn aggregate_dir(&self) -> PathBuf {
        self.root.join("01b_aggregate")
    }

    pub fn unique_dir(&self) -> PathBuf {
        self.aggregate_dir().join(aggregation::UNIQUE_DIR)
    }

    pub fn aggregated_dir(&self) -> PathBuf {
        self.aggregate_dir().join(aggregation::AGGREGATED_DIR)
    }

    pub fn aggregation_overview(&self) -> PathBuf {
        self.aggregate_dir().join(aggregation::OVERVIEW_FILE)
    }

    pub fn aggregate_boq(&self) -> PathBuf {
        self.aggregate_dir().join("BoQ_aggregated.csv")
    }

    // 01c
    pub fn dissect_dir(&self) -> PathBuf {
        self.root.join("01c_dissect")
    }

    pub fn dissected_elements_dir(&self) -> PathBuf {
        self.dissect_dir().join(dissection::ELEMENTS_DIR)
    }

    pub fn layers_dir(&self) -> PathBuf {
        self.dissect_dir().join(dissection::LAYERS_DIR)
    }

    pub fn dissect_boq(&self) -> PathBuf {
        self.dissect_dir().join("BoQ_dissected.csv")
    }

    // 02a
    pub fn inference_dir(&self, database: DatabaseKind) -> PathBuf {
        self.root
            .join("02a_inference")
            .join(database.directory_name())
    }

    // 02b
    pub fn bookkeeping_dir(&self) -> PathBuf {
        self.root.join("02b_bookkeeping")
    }

    pub fn inference_metadata(&self) -> PathBuf {
        self.bookkeeping_dir().join("inference_metadata.json")
    }

    // 03a / 03b
    pub fn indicators_dir(&self) -> PathBuf {
        self.root.join("03a_indicators")
    }

    pub fn emissions_dir(&self) -> PathBuf {
        self.root.join("03b_emissions")
    }

    // 04
    pub fn report_dir(&self) -> PathBuf {
        self.root.join("04_report")
    }

    pub fn final_boq(&self) -> PathBuf {
        self.report_dir().join("Bill_of_Quantities.csv")
    }

    pub fn run_report(&self) -> PathBuf {
        self.report_dir().join("run_report.json")
    }

    pub fn emissions_overview(&self) -> PathBuf {
        self.report_dir().join("emissions_overview.json")
    }

    pub fn inference_positives(&self) -> PathBuf {
        self.report_dir().join("inference_positives.json")
    }

    pub fn inference_negatives(&self) -> PathBuf {
        self.report_dir().join("inference_negatives.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_nest_under_root() {
        let layout = WorkLayout::new("/tmp/work");
        assert_eq!(
            layout.unique_dir(),
            PathBuf::from("/tmp/work/01b_aggregate/Elements_Unique")
        );
        assert_eq!(
            layout.inference_dir(DatabaseKind::Oekobaudat),
            PathBuf::from("/tmp/work/02a_inference/OEKOBAUDAT")
        );
        assert!(layout.final_boq().starts_with(layout.report_dir()));
    }
}
