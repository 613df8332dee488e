//! Barcode matching strategies

use super::BarcodeEntry;

/// Where and how well a barcode was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarcodeHit {
    pub name: String,
    pub offset: usize,
    pub mismatches: usize,
    pub deletions: usize,
}

impl BarcodeHit {
    /// Lower is better: edit cost first, then distance from the read end
    pub fn score(&self) -> (usize, usize) {
        (self.mismatches + self.deletions, self.offset)
    }
}

/// Locates a barcode at the start of a read region.
///
/// Implementations return `None` both when nothing matches and when the best score is shared by
/// different barcodes.
pub trait BarcodeMatcher: Send + Sync {
    fn best_match(&self, region: &[u8], candidates: &[BarcodeEntry]) -> Option<BarcodeHit>;
}

/// Searches each barcode at offsets `0..=max_offset`, tolerating substitutions and bases of the
/// barcode missing from the read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetMismatchMatcher {
    pub max_offset: usize,
    pub max_mismatches: usize,
    pub max_deletions: usize,
}

impl Default for OffsetMismatchMatcher {
    fn default() -> Self {
        Self {
            max_offset: 3,
            max_mismatches: 1,
            max_deletions: 0,
        }
    }
}

impl OffsetMismatchMatcher {
    pub fn new(max_offset: usize, max_mismatches: usize, max_deletions: usize) -> Self {
        Self {
            max_offset,
            max_mismatches,
            max_deletions,
        }
    }

    /// Fewest mismatches aligning all of `barcode` to `region[offset..]` with exactly `d` barcode
    /// bases skipped, for each `d` up to `max_deletions`
    fn align(&self, barcode: &[u8], region: &[u8], offset: usize) -> Option<(usize, usize)> {
        const NONE: usize = usize::MAX;
        let width = self.max_deletions + 1;
        let mut row = vec![NONE; width];
        row[0] = 0;

        for (i, &base) in barcode.iter().enumerate() {
            let mut next = vec![NONE; width];
            for d in 0..width {
                let cost = row[d];
                if cost == NONE {
                    continue;
                }
                // read position of barcode base i when d bases were skipped so far
                let pos = offset + i - d;
                if let Some(&observed) = region.get(pos) {
                    let mm = cost + usize::from(!bases_equal(base, observed));
                    if mm <= self.max_mismatches && mm < next[d] {
                        next[d] = mm;
                    }
                }
                if d + 1 < width && cost < next[d + 1] {
                    next[d + 1] = cost;
                }
            }
            row = next;
        }

        row.iter()
            .enumerate()
            .filter(|&(_, &mm)| mm != NONE)
            .map(|(d, &mm)| (mm, d))
            .min_by_key(|&(mm, d)| (mm + d, d))
    }
}

fn bases_equal(expected: u8, observed: u8) -> bool {
    let observed = observed.to_ascii_uppercase();
    observed != b'N' && expected.to_ascii_uppercase() == observed
}

impl BarcodeMatcher for OffsetMismatchMatcher {
    fn best_match(&self, region: &[u8], candidates: &[BarcodeEntry]) -> Option<BarcodeHit> {
        let mut best: Option<BarcodeHit> = None;
        let mut ambiguous = false;

        for entry in candidates {
            let barcode = entry.sequence.as_bytes();
            if barcode.len() <= self.max_deletions {
                continue;
            }
            let hit = (0..=self.max_offset)
                .filter_map(|offset| {
                    self.align(barcode, region, offset)
                        .map(|(mismatches, deletions)| BarcodeHit {
                            name: entry.name.clone(),
                            offset,
                            mismatches,
                            deletions,
                        })
                })
                .min_by_key(|hit| hit.score());

            let Some(hit) = hit else { continue };
            let better = match &best {
                None => true,
                Some(current) => {
                    if hit.score() == current.score() && hit.name != current.name {
                        ambiguous = true;
                    }
                    hit.score() < current.score()
                }
            };
            if better {
                ambiguous = false;
                best = Some(hit);
            }
        }

        if ambiguous {
            None
        } else {
            best
        }
    }
}
