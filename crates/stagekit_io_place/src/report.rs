//! Placement report models and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;

/// Aggregate counters and diagnostics for one placement run.
#[derive(Debug, Default, Clone)]
pub struct ReportPlace {
    /// Number of resolved source entries.
    pub cnt_matched: u64,
    /// Total entries visited, including directory walk descendants.
    pub cnt_scanned: u64,
    /// Number of leaf entries copied.
    pub cnt_copied: u64,
    /// Number of destination directories created by directory walks.
    pub cnt_dirs_created: u64,
    /// Number of entries skipped (unsupported type or dry-run).
    pub cnt_skipped: u64,
    /// Non-fatal warnings collected during traversal.
    pub warnings: Vec<String>,
}

impl ReportPlace {
    /// Number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_matched".to_string(), self.cnt_matched);
        dict_counts.insert("cnt_scanned".to_string(), self.cnt_scanned);
        dict_counts.insert("cnt_copied".to_string(), self.cnt_copied);
        dict_counts.insert("cnt_dirs_created".to_string(), self.cnt_dirs_created);
        dict_counts.insert("cnt_skipped".to_string(), self.cnt_skipped);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} matched={} scanned={} copied={} dirs={} skipped={} warnings={}",
            self.cnt_matched,
            self.cnt_scanned,
            self.cnt_copied,
            self.cnt_dirs_created,
            self.cnt_skipped,
            self.warning_count()
        )
    }
}

impl fmt::Display for ReportPlace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[PLACE]"))
    }
}

/// Mutable accumulator for placement statistics.
#[derive(Debug, Default, Clone)]
pub struct ReportPlaceBuilder {
    report: ReportPlace,
}

impl ReportPlaceBuilder {
    pub fn add_matched(&mut self, value: u64) {
        self.report.cnt_matched += value;
    }

    pub fn add_scanned(&mut self) {
        self.report.cnt_scanned += 1;
    }

    pub fn add_copied(&mut self) {
        self.report.cnt_copied += 1;
    }

    pub fn add_dir_created(&mut self) {
        self.report.cnt_dirs_created += 1;
    }

    pub fn add_skipped(&mut self) {
        self.report.cnt_skipped += 1;
    }

    /// Record a warning and forward it to the logger.
    pub fn add_warning(&mut self, warning: String) {
        log::warn!("{warning}");
        self.report.warnings.push(warning);
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportPlace {
        self.report
    }
}

#[cfg(test)]
mod tests {
    use super::{ReportPlace, ReportPlaceBuilder};

    #[test]
    fn report_to_dict_and_format() {
        let report = ReportPlace {
            cnt_matched: 2,
            cnt_scanned: 7,
            cnt_copied: 4,
            cnt_dirs_created: 2,
            cnt_skipped: 1,
            warnings: vec!["w".to_string()],
        };

        let dict_counts = report.to_dict();
        assert_eq!(dict_counts["cnt_matched"], 2);
        assert_eq!(dict_counts["cnt_dirs_created"], 2);
        assert_eq!(dict_counts["cnt_warnings"], 1);

        let txt = report.format("[PLACE]");
        assert_eq!(
            txt,
            "[PLACE] matched=2 scanned=7 copied=4 dirs=2 skipped=1 warnings=1"
        );
        assert_eq!(report.to_string(), txt);
    }

    #[test]
    fn builder_accumulates() {
        let mut builder = ReportPlaceBuilder::default();
        builder.add_matched(3);
        builder.add_scanned();
        builder.add_copied();
        builder.add_skipped();
        builder.add_warning("skip".to_string());

        let report = builder.build();
        assert_eq!(report.cnt_matched, 3);
        assert_eq!(report.cnt_copied, 1);
        assert_eq!(report.warnings, vec!["skip".to_string()]);
    }
}
