//! Concatenation of same-platform-unit FASTQ files into one physical ReadData

use crate::fastq::{open_fastq, parse_error, FastqSink};
use seq_io::fastq::Record;
use seqport_core::{FilePair, SeqportError, SeqportResult};
use std::path::{Path, PathBuf};

/// Files produced by merging one platform-unit group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedOutput {
    pub file1: PathBuf,
    pub file2: Option<PathBuf>,
    pub reads1: u64,
    pub reads2: Option<u64>,
}

impl MergedOutput {
    pub fn is_paired(&self) -> bool {
        self.file2.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Merger {
    compression_level: u32,
}

impl Default for Merger {
    fn default() -> Self {
        Self::new(6)
    }
}

impl Merger {
    pub fn new(compression_level: u32) -> Self {
        Self {
            compression_level: compression_level.min(9),
        }
    }

    /// Reject groups that mix paired and single-end members
    pub fn check_pairing(group: &[FilePair]) -> SeqportResult<bool> {
        let paired = group.iter().filter(|fp| fp.is_paired()).count();
        if paired != 0 && paired != group.len() {
            let files: Vec<String> = group
                .iter()
                .map(|fp| fp.file1.display().to_string())
                .collect();
            return Err(SeqportError::Configuration(format!(
                "Inconsistent pairing within platform unit {}: {} of {} members have a mate 2 ({})",
                group
                    .first()
                    .and_then(|fp| fp.platform_unit.as_deref())
                    .unwrap_or("<none>"),
                paired,
                group.len(),
                files.join(", ")
            )));
        }
        Ok(paired > 0)
    }

    /// Merge every member of `group`, in order, into `<basename>_R1.fastq.gz` (and `_R2`) under
    /// `out_dir`. The outputs are synced before this returns.
    pub fn merge(
        &self,
        group: &[FilePair],
        out_dir: &Path,
        basename: &str,
    ) -> SeqportResult<MergedOutput> {
        let paired = Self::check_pairing(group)?;
        if group.is_empty() {
            return Err(SeqportError::InvalidInput(format!(
                "Nothing to merge for {}",
                basename
            )));
        }

        let file1 = out_dir.join(format!("{}_R1.fastq.gz", basename));
        let reads1 = self.concatenate(group.iter().map(|fp| fp.file1.as_path()), &file1)?;

        let (file2, reads2) = if paired {
            let file2 = out_dir.join(format!("{}_R2.fastq.gz", basename));
            let reads2 =
                self.concatenate(group.iter().filter_map(|fp| fp.file2.as_deref()), &file2)?;
            if reads1 != reads2 {
                return Err(SeqportError::InvalidInput(format!(
                    "Merged mate counts differ for {}: {} forward vs {} reverse reads",
                    basename, reads1, reads2
                )));
            }
            (Some(file2), Some(reads2))
        } else {
            (None, None)
        };

        tracing::info!(
            "Merged {} file(s) into {} ({} reads{})",
            group.len(),
            file1.display(),
            reads1,
            if paired { ", paired" } else { "" }
        );

        Ok(MergedOutput {
            file1,
            file2,
            reads1,
            reads2,
        })
    }

    fn concatenate<'a>(
        &self,
        inputs: impl Iterator<Item = &'a Path>,
        output: &Path,
    ) -> SeqportResult<u64> {
        let mut sink = FastqSink::create(output, self.compression_level)?;
        for input in inputs {
            let before = sink.records();
            let mut reader = open_fastq(input)?;
            while let Some(record) = reader.next() {
                let record = record.map_err(|e| parse_error(input, e))?;
                sink.write_record(&record)?;
            }
            tracing::debug!(
                "Appended {} reads from {}",
                sink.records() - before,
                input.display()
            );
        }
        sink.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fastq::count_reads;
    use seqport_test::{write_fastq, write_random_fastq, TestRead};

    #[test]
    fn test_merge_paired_counts() {
        let dir = tempfile::tempdir().unwrap();
        let a1 = dir.path().join("a_R1.fastq");
        let a2 = dir.path().join("a_R2.fastq");
        let b1 = dir.path().join("b_R1.fastq.gz");
        let b2 = dir.path().join("b_R2.fastq.gz");
        write_random_fastq(&a1, 10, 30, 1).unwrap();
        write_random_fastq(&a2, 10, 30, 2).unwrap();
        write_random_fastq(&b1, 7, 30, 3).unwrap();
        write_random_fastq(&b2, 7, 30, 4).unwrap();

        let group = vec![
            FilePair::paired(&a1, &a2).with_platform_unit("pu"),
            FilePair::paired(&b1, &b2).with_platform_unit("pu"),
        ];
        let out = Merger::default()
            .merge(&group, &dir.path().join("out"), "merged")
            .unwrap();

        assert_eq!(out.reads1, 17);
        assert_eq!(out.reads2, Some(17));
        assert_eq!(count_reads(&out.file1).unwrap(), 17);
        assert!(out.file1.ends_with("merged_R1.fastq.gz"));
    }

    #[test]
    fn test_merge_preserves_member_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.fastq");
        let second = dir.path().join("second.fastq");
        write_fastq(&first, &[TestRead::new("one", "AAAA")]).unwrap();
        write_fastq(&second, &[TestRead::new("two", "CCCC")]).unwrap();

        let group = vec![FilePair::single(&first), FilePair::single(&second)];
        let out = Merger::new(1).merge(&group, dir.path(), "m").unwrap();

        let mut reader = open_fastq(&out.file1).unwrap();
        let mut names = Vec::new();
        while let Some(record) = reader.next() {
            names.push(record.unwrap().id().unwrap().to_string());
        }
        assert_eq!(names, vec!["one", "two"]);
        assert!(!out.is_paired());
    }

    #[test]
    fn test_mixed_pairing_is_configuration_error() {
        let group = vec![
            FilePair::paired("a_R1.fastq", "a_R2.fastq"),
            FilePair::single("b.fastq"),
        ];
        let err = Merger::check_pairing(&group).unwrap_err();
        assert!(err.is_fatal_configuration());
    }

    #[test]
    fn test_mate_count_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let r1 = dir.path().join("x_R1.fastq");
        let r2 = dir.path().join("x_R2.fastq");
        write_random_fastq(&r1, 5, 20, 1).unwrap();
        write_random_fastq(&r2, 4, 20, 2).unwrap();

        let result = Merger::default().merge(&[FilePair::paired(&r1, &r2)], dir.path(), "x");
        assert!(result.is_err());
    }
}
