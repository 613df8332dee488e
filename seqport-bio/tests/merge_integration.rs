/// Integration tests for platform-unit grouping followed by merging
use seqport_bio::{compute_file_metrics, group_by_platform_unit, Merger};
use seqport_core::{FileGroup, FilePair};
use seqport_test::{count_fastq_records, write_random_fastq, TestEnvironment};

fn lane(env: &TestEnvironment, name: &str, reads: usize, seed: u64) -> FilePair {
    let r1 = env.input_path(&format!("{}_R1.fastq", name));
    let r2 = env.input_path(&format!("{}_R2.fastq", name));
    write_random_fastq(&r1, reads, 75, seed).unwrap();
    write_random_fastq(&r2, reads, 75, seed + 1).unwrap();
    FilePair::paired(r1, r2)
}

#[test]
fn test_two_lanes_of_one_platform_unit_merge() {
    let env = TestEnvironment::new().unwrap();
    let group = FileGroup::new(
        "TestReadset0",
        vec![
            lane(&env, "L1a", 211, 10).with_platform_unit("platformUnit1"),
            lane(&env, "L1b", 211, 20).with_platform_unit("platformUnit1"),
            lane(&env, "L2", 150, 30).with_platform_unit("platformUnit2"),
        ],
    );

    let groups = group_by_platform_unit(&group);
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].len(), 2);

    let merged = Merger::default()
        .merge(&groups[0], &env.work_dir(), "TestReadset0_platformUnit1")
        .unwrap();
    assert_eq!(merged.reads1, 422);
    assert_eq!(count_fastq_records(&merged.file1).unwrap(), 422);
    assert_eq!(
        count_fastq_records(merged.file2.as_ref().unwrap()).unwrap(),
        422
    );

    let stats = compute_file_metrics(&merged.file1).unwrap();
    assert_eq!(stats.reads, 422);
    assert_eq!(stats.bases, 422 * 75);
    assert_eq!(stats.to_metrics().len(), 15);
}

#[test]
fn test_merge_reads_gzipped_and_plain_members() {
    let env = TestEnvironment::new().unwrap();
    let plain = env.input_path("a.fastq");
    let gz = env.input_path("b.fastq.gz");
    write_random_fastq(&plain, 12, 40, 1).unwrap();
    write_random_fastq(&gz, 8, 40, 2).unwrap();

    let merged = Merger::new(9)
        .merge(
            &[
                FilePair::single(&plain).with_platform_unit("pu"),
                FilePair::single(&gz).with_platform_unit("pu"),
            ],
            &env.work_dir(),
            "mixed",
        )
        .unwrap();

    assert_eq!(merged.reads1, 20);
    assert!(merged.file2.is_none());
    // originals are never touched by the merger
    assert!(plain.exists());
    assert!(gz.exists());
}
