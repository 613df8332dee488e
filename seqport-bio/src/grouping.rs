//! Partitioning of a file group by platform unit

use seqport_core::{FileGroup, FilePair};

/// Split a group into the units that each become one ReadData.
///
/// Pairs without a platform unit are never merged with anything and come first, in encounter
/// order. Pairs sharing a platform unit form one cluster; clusters follow in the order their
/// platform unit was first seen.
pub fn group_by_platform_unit(group: &FileGroup) -> Vec<Vec<FilePair>> {
    let mut singletons: Vec<Vec<FilePair>> = Vec::new();
    let mut clusters: Vec<(&str, Vec<FilePair>)> = Vec::new();

    for pair in &group.file_pairs {
        match pair.platform_unit.as_deref() {
            None => singletons.push(vec![pair.clone()]),
            Some(pu) => match clusters.iter_mut().find(|(name, _)| *name == pu) {
                Some((_, members)) => members.push(pair.clone()),
                None => clusters.push((pu, vec![pair.clone()])),
            },
        }
    }

    singletons
        .into_iter()
        .chain(clusters.into_iter().map(|(_, members)| members))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn pair(name: &str, pu: Option<&str>) -> FilePair {
        let fp = FilePair::paired(format!("{}_R1.fastq", name), format!("{}_R2.fastq", name));
        match pu {
            Some(pu) => fp.with_platform_unit(pu),
            None => fp,
        }
    }

    #[test]
    fn test_two_platform_units() {
        let group = FileGroup::new(
            "Group1",
            vec![
                pair("L1a", Some("platformUnit1")),
                pair("L1b", Some("platformUnit1")),
                pair("L2", Some("platformUnit2")),
            ],
        );

        let groups = group_by_platform_unit(&group);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[1].len(), 1);
        assert_eq!(groups[1][0].platform_unit.as_deref(), Some("platformUnit2"));
    }

    #[test]
    fn test_null_platform_units_are_singletons_first() {
        let group = FileGroup::new(
            "Mixed",
            vec![
                pair("a", Some("pu")),
                pair("b", None),
                pair("c", None),
                pair("d", Some("pu")),
            ],
        );

        let groups = group_by_platform_unit(&group);
        let names: Vec<Vec<String>> = groups
            .iter()
            .map(|g| g.iter().map(|p| p.file1.display().to_string()).collect())
            .collect();

        assert_eq!(
            names,
            vec![
                vec!["b_R1.fastq".to_string()],
                vec!["c_R1.fastq".to_string()],
                vec!["a_R1.fastq".to_string(), "d_R1.fastq".to_string()],
            ]
        );
    }

    #[test]
    fn test_empty_group() {
        assert!(group_by_platform_unit(&FileGroup::new("empty", vec![])).is_empty());
    }

    proptest! {
        #[test]
        fn prop_partition_sizes(units in proptest::collection::vec(proptest::option::of(0u8..4), 0..40)) {
            let pairs: Vec<FilePair> = units
                .iter()
                .enumerate()
                .map(|(i, pu)| {
                    let fp = FilePair::single(format!("f{}.fastq", i));
                    match pu {
                        Some(pu) => fp.with_platform_unit(format!("pu{}", pu)),
                        None => fp,
                    }
                })
                .collect();
            let group = FileGroup::new("prop", pairs);
            let groups = group_by_platform_unit(&group);

            let nulls = units.iter().filter(|u| u.is_none()).count();
            let distinct: HashSet<_> = units.iter().flatten().collect();

            prop_assert_eq!(groups.len(), nulls + distinct.len());
            prop_assert_eq!(groups.iter().map(|g| g.len()).sum::<usize>(), units.len());
            for g in &groups {
                let pus: HashSet<_> = g.iter().map(|p| p.platform_unit.clone()).collect();
                prop_assert_eq!(pus.len(), 1);
                if g[0].platform_unit.is_none() {
                    prop_assert_eq!(g.len(), 1);
                }
            }
        }
    }
}
