/// Auxiliary files that travel with a primary artifact (indexes, compressed copies)
use seqport_core::config::ReconcilerConfig;

#[derive(Debug, Clone)]
struct SidecarRule {
    /// Lower-case file name suffix the rule applies to, e.g. `.vcf`
    primary: String,
    /// Appended to the primary's full name
    suffixes: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SidecarRules {
    rules: Vec<SidecarRule>,
}

impl SidecarRules {
    /// No rules at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// BAM, CRAM, VCF and BED indexes; compressed VCF siblings only if allowed
    pub fn standard(allow_compressed_vcf: bool) -> Self {
        let mut vcf = vec![".tbi", ".idx", ".bgz"];
        if allow_compressed_vcf {
            vcf.extend([".gz", ".gz.tbi", ".gz.idx"]);
        }
        Self::empty()
            .with_rule(".bam", &[".bai"])
            .with_rule(".cram", &[".crai"])
            .with_rule(".vcf", &vcf)
            .with_rule(".vcf.gz", &[".tbi", ".idx"])
            .with_rule(".bed", &[".idx"])
    }

    pub fn from_config(config: &ReconcilerConfig) -> Self {
        Self::standard(config.allow_compressed_vcf)
    }

    pub fn with_rule(mut self, primary: &str, suffixes: &[&str]) -> Self {
        self.rules.push(SidecarRule {
            primary: primary.to_ascii_lowercase(),
            suffixes: suffixes.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    /// Sidecar names for `file_name`, using the rule with the longest matching suffix
    pub fn sidecars_for(&self, file_name: &str) -> Vec<String> {
        let lower = file_name.to_ascii_lowercase();
        self.rules
            .iter()
            .filter(|rule| lower.ends_with(&rule.primary))
            .max_by_key(|rule| rule.primary.len())
            .map(|rule| {
                rule.suffixes
                    .iter()
                    .map(|suffix| format!("{}{}", file_name, suffix))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bam_and_bed() {
        let rules = SidecarRules::standard(true);
        assert_eq!(rules.sidecars_for("sample.bam"), vec!["sample.bam.bai"]);
        assert_eq!(rules.sidecars_for("regions.BED"), vec!["regions.BED.idx"]);
        assert!(rules.sidecars_for("notes.txt").is_empty());
    }

    #[test]
    fn test_vcf_with_and_without_compression() {
        let strict = SidecarRules::standard(false).sidecars_for("calls.vcf");
        assert_eq!(strict, vec!["calls.vcf.tbi", "calls.vcf.idx", "calls.vcf.bgz"]);

        let relaxed = SidecarRules::standard(true).sidecars_for("calls.vcf");
        assert_eq!(relaxed.len(), 6);
        assert!(relaxed.contains(&"calls.vcf.gz.tbi".to_string()));
    }

    #[test]
    fn test_longest_suffix_wins() {
        let rules = SidecarRules::standard(true);
        assert_eq!(
            rules.sidecars_for("calls.vcf.gz"),
            vec!["calls.vcf.gz.tbi", "calls.vcf.gz.idx"]
        );
    }
}
