//! Pre-flight checks run before any output is written or any input touched

use crate::request::ImportRequest;
use seqport_bio::{
    check_bucket_names, fastq_basename, group_by_platform_unit, safe_file_name, BarcodeTable,
    Merger,
};
use seqport_core::config::DemuxConfig;
use seqport_core::{SeqportError, SeqportResult};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::debug;

/// Every problem found in a request; empty means it may run
pub fn find_problems(
    request: &ImportRequest,
    barcodes: Option<&BarcodeTable>,
    demux: &DemuxConfig,
) -> Vec<String> {
    let mut problems = Vec::new();

    if request.readsets.is_empty() {
        problems.push("The request names no readsets".to_string());
    }
    let mut names = HashSet::new();
    for readset in &request.readsets {
        if readset.name.trim().is_empty() {
            problems.push("Readset names must not be empty".to_string());
        } else if !names.insert(readset.name.as_str()) {
            problems.push(format!("Readset name {} is used more than once", readset.name));
        }
    }

    let mut basenames: HashMap<String, &Path> = HashMap::new();
    for file in request.input_files() {
        if !file.is_file() {
            problems.push(format!("Input file {} does not exist", file.display()));
        }
        let basename = fastq_basename(file);
        if let Some(previous) = basenames.insert(basename.clone(), file) {
            problems.push(format!(
                "Input files {} and {} share the basename {}",
                previous.display(),
                file.display(),
                basename
            ));
        }
    }

    match &request.demultiplex {
        Some(_) => check_demultiplex(request, barcodes, demux, &mut problems),
        None => check_groups(request, &mut problems),
    }
    problems
}

/// Output basename of a merged platform-unit partition
pub(crate) fn merged_basename(readset_name: &str, platform_unit: Option<&str>) -> String {
    format!(
        "{}_{}",
        safe_file_name(readset_name),
        safe_file_name(platform_unit.unwrap_or("merged"))
    )
}

fn check_groups(request: &ImportRequest, problems: &mut Vec<String>) {
    let mut merged: HashMap<String, &str> = HashMap::new();
    for readset in &request.readsets {
        if readset.file_pairs.is_empty() {
            problems.push(format!("Readset {} has no input files", readset.name));
            continue;
        }
        for partition in group_by_platform_unit(&readset.file_group()) {
            if let Err(e) = Merger::check_pairing(&partition) {
                problems.push(format!("Readset {}: {}", readset.name, e));
            }
            if partition.len() < 2 {
                continue;
            }
            let basename = merged_basename(&readset.name, partition[0].platform_unit.as_deref());
            match merged.insert(basename.clone(), readset.name.as_str()) {
                Some(previous) if previous != readset.name => problems.push(format!(
                    "Readsets {} and {} would both merge into {}",
                    previous, readset.name, basename
                )),
                _ => {}
            }
        }
    }
}

fn check_demultiplex(
    request: &ImportRequest,
    barcodes: Option<&BarcodeTable>,
    demux: &DemuxConfig,
    problems: &mut Vec<String>,
) {
    let targets: Vec<_> = request.readsets.iter().map(|r| r.demux_target()).collect();
    if let Err(e) = check_bucket_names(&targets, &demux.unknowns_name) {
        problems.push(e.to_string());
    }
    for readset in &request.readsets {
        if !readset.file_pairs.is_empty() {
            problems.push(format!(
                "Readset {} lists its own files but the request is demultiplexed",
                readset.name
            ));
        }
        if readset.barcode5.is_none() && readset.barcode3.is_none() {
            problems.push(format!("Readset {} has no barcodes", readset.name));
        }
        for barcode in readset.barcode5.iter().chain(readset.barcode3.iter()) {
            if !barcodes.map(|t| t.contains(barcode)).unwrap_or(false) {
                problems.push(format!(
                    "Readset {} uses barcode {} which is not in the barcode table",
                    readset.name, barcode
                ));
            }
        }
    }
}

/// Fail with a configuration error listing every problem
pub fn validate_request(
    request: &ImportRequest,
    barcodes: Option<&BarcodeTable>,
    demux: &DemuxConfig,
) -> SeqportResult<()> {
    let problems = find_problems(request, barcodes, demux);
    if problems.is_empty() {
        debug!("Request with {} readset(s) is valid", request.readsets.len());
        Ok(())
    } else {
        Err(SeqportError::Configuration(problems.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{DemuxRequest, ReadsetRequest};
    use seqport_bio::BarcodeEntry;
    use seqport_core::FilePair;
    use std::fs;

    fn inputs(names: &[&str]) -> (tempfile::TempDir, Vec<std::path::PathBuf>) {
        let dir = tempfile::tempdir().unwrap();
        let paths = names
            .iter()
            .map(|n| {
                let path = dir.path().join(n);
                fs::write(&path, "@r\nA\n+\nI\n").unwrap();
                path
            })
            .collect();
        (dir, paths)
    }

    #[test]
    fn test_valid_request() {
        let (_dir, files) = inputs(&["a_R1.fastq", "a_R2.fastq"]);
        let request = ImportRequest::new(vec![ReadsetRequest::new("S1")
            .with_file_pairs(vec![FilePair::paired(&files[0], &files[1])])]);
        assert!(validate_request(&request, None, &DemuxConfig::default()).is_ok());
    }

    #[test]
    fn test_duplicate_basename_and_missing_file() {
        let (dir, files) = inputs(&["x.fastq"]);
        let gz = dir.path().join("sub").join("x.fastq.gz");
        fs::create_dir_all(gz.parent().unwrap()).unwrap();
        fs::write(&gz, b"").unwrap();

        let request = ImportRequest::new(vec![
            ReadsetRequest::new("S1").with_file_pairs(vec![FilePair::single(&files[0])]),
            ReadsetRequest::new("S2").with_file_pairs(vec![
                FilePair::single(&gz),
                FilePair::single(dir.path().join("gone.fastq")),
            ]),
        ]);
        let problems = find_problems(&request, None, &DemuxConfig::default());
        assert_eq!(problems.len(), 2, "{:?}", problems);
        assert!(problems[0].contains("does not exist") || problems[1].contains("does not exist"));
        assert!(problems.iter().any(|p| p.contains("share the basename x")));

        let err = validate_request(&request, None, &DemuxConfig::default()).unwrap_err();
        assert!(err.is_fatal_configuration());
    }

    #[test]
    fn test_mixed_pairing_in_platform_unit() {
        let (_dir, files) = inputs(&["l1_R1.fq", "l1_R2.fq", "l2.fq"]);
        let request = ImportRequest::new(vec![ReadsetRequest::new("S1").with_file_pairs(vec![
            FilePair::paired(&files[0], &files[1]).with_platform_unit("pu1"),
            FilePair::single(&files[2]).with_platform_unit("pu1"),
        ])]);
        let problems = find_problems(&request, None, &DemuxConfig::default());
        assert_eq!(problems.len(), 1);
        assert!(problems[0].starts_with("Readset S1"));
    }

    #[test]
    fn test_duplicate_and_empty_names() {
        let (_dir, files) = inputs(&["a.fq", "b.fq", "c.fq"]);
        let request = ImportRequest::new(vec![
            ReadsetRequest::new("S1").with_file_pairs(vec![FilePair::single(&files[0])]),
            ReadsetRequest::new("S1").with_file_pairs(vec![FilePair::single(&files[1])]),
            ReadsetRequest::new(" ").with_file_pairs(vec![FilePair::single(&files[2])]),
        ]);
        assert_eq!(find_problems(&request, None, &DemuxConfig::default()).len(), 2);
    }

    #[test]
    fn test_names_that_share_a_merged_output() {
        let (_dir, files) = inputs(&["a1.fq", "a2.fq", "b1.fq", "b2.fq"]);
        let lanes = |first: usize| {
            vec![
                FilePair::single(&files[first]).with_platform_unit("pu1"),
                FilePair::single(&files[first + 1]).with_platform_unit("pu1"),
            ]
        };
        let request = ImportRequest::new(vec![
            ReadsetRequest::new("S 1").with_file_pairs(lanes(0)),
            ReadsetRequest::new("S_1").with_file_pairs(lanes(2)),
        ]);
        let problems = find_problems(&request, None, &DemuxConfig::default());
        assert_eq!(problems.len(), 1, "{:?}", problems);
        assert!(problems[0].contains("S 1") && problems[0].contains("S_1_pu1"));
        assert!(validate_request(&request, None, &DemuxConfig::default())
            .unwrap_err()
            .is_fatal_configuration());
    }

    #[test]
    fn test_single_files_never_clash_on_names() {
        let (_dir, files) = inputs(&["a.fq", "b.fq"]);
        let request = ImportRequest::new(vec![
            ReadsetRequest::new("S 1").with_file_pairs(vec![FilePair::single(&files[0])]),
            ReadsetRequest::new("S_1").with_file_pairs(vec![FilePair::single(&files[1])]),
        ]);
        assert!(find_problems(&request, None, &DemuxConfig::default()).is_empty());
    }

    #[test]
    fn test_demultiplexed_readset_named_like_the_unknowns_bucket() {
        let (_dir, files) = inputs(&["pool.fastq"]);
        let table = BarcodeTable::from_pairs([
            ("MID001", "ACGAGTGCGT"),
            ("MID002", "ACGCTCGACA"),
        ])
        .unwrap();
        let request = ImportRequest::new(vec![
            ReadsetRequest::new("unknowns").with_barcodes(Some("MID001"), None),
            ReadsetRequest::new("S2").with_barcodes(Some("MID002"), None),
        ])
        .with_demultiplex(DemuxRequest::new(
            FilePair::single(&files[0]),
            vec![
                BarcodeEntry::new("MID001", "ACGAGTGCGT"),
                BarcodeEntry::new("MID002", "ACGCTCGACA"),
            ],
        ));

        let problems = find_problems(&request, Some(&table), &DemuxConfig::default());
        assert_eq!(problems.len(), 1, "{:?}", problems);
        assert!(problems[0].contains("unknowns"));

        let renamed = DemuxConfig {
            unknowns_name: "unassigned".to_string(),
            ..DemuxConfig::default()
        };
        assert!(find_problems(&request, Some(&table), &renamed).is_empty());
    }

    #[test]
    fn test_demultiplex_barcodes_must_be_known() {
        let (_dir, files) = inputs(&["pool.fastq"]);
        let table = BarcodeTable::from_pairs([("MID001", "ACGAGTGCGT")]).unwrap();
        let request = ImportRequest::new(vec![
            ReadsetRequest::new("S1").with_barcodes(Some("MID001"), None),
            ReadsetRequest::new("S2").with_barcodes(Some("MID999"), None),
            ReadsetRequest::new("S3"),
        ])
        .with_demultiplex(DemuxRequest::new(
            FilePair::single(&files[0]),
            vec![BarcodeEntry::new("MID001", "ACGAGTGCGT")],
        ));

        let problems = find_problems(&request, Some(&table), &DemuxConfig::default());
        assert_eq!(problems.len(), 2, "{:?}", problems);
        assert!(problems[0].contains("MID999"));
        assert!(problems[1].contains("no barcodes"));
    }
}
