//! Barcoded read generation for demultiplexing tests

use crate::fixtures::TestRead;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 10bp multiplex identifiers used across demultiplexing tests
pub const TEST_BARCODES: [(&str, &str); 6] = [
    ("MID001", "ACGAGTGCGT"),
    ("MID002", "ACGCTCGACA"),
    ("MID003", "AGACGCACTC"),
    ("MID004", "AGCACTGTAG"),
    ("MID005", "ATCAGACACG"),
    ("MID006", "ATATCGCGAG"),
];

pub fn reverse_complement(seq: &str) -> String {
    seq.chars()
        .rev()
        .map(|c| match c {
            'A' => 'T',
            'T' => 'A',
            'C' => 'G',
            'G' => 'C',
            other => other,
        })
        .collect()
}

pub fn barcode_seq(name: &str) -> &'static str {
    TEST_BARCODES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, s)| *s)
        .unwrap_or_else(|| panic!("unknown test barcode {}", name))
}

/// Builds reads laid out as `barcode5 + insert + revcomp(barcode3)`
pub struct BarcodedReadFactory {
    rng: StdRng,
    insert_len: usize,
    next_id: usize,
}

impl BarcodedReadFactory {
    pub fn new(seed: u64, insert_len: usize) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            insert_len,
            next_id: 0,
        }
    }

    fn insert(&mut self) -> String {
        let bases = ['A', 'C', 'G', 'T'];
        (0..self.insert_len)
            .map(|_| bases[self.rng.gen_range(0..4)])
            .collect()
    }

    fn name(&mut self, tag: &str) -> String {
        self.next_id += 1;
        format!("read{}-{}", self.next_id, tag)
    }

    /// A read carrying exact copies of the given barcodes
    pub fn read(&mut self, barcode5: Option<&str>, barcode3: Option<&str>) -> TestRead {
        let five = barcode5.map(barcode_seq).unwrap_or("");
        let three = barcode3.map(|b| reverse_complement(barcode_seq(b))).unwrap_or_default();
        let tag = format!("{}_{}", barcode5.unwrap_or("none"), barcode3.unwrap_or("none"));
        let name = self.name(&tag);
        TestRead::new(name, format!("{}{}{}", five, self.insert(), three))
    }

    /// A read whose flanks can match no barcode
    pub fn unbarcoded(&mut self) -> TestRead {
        let name = self.name("unknown");
        let flank = "N".repeat(10);
        TestRead::new(name, format!("{}{}{}", flank, self.insert(), flank))
    }

    /// Deterministically interleave reads so buckets are not contiguous in the file
    pub fn shuffle(&mut self, reads: &mut [TestRead]) {
        for i in (1..reads.len()).rev() {
            let j = self.rng.gen_range(0..=i);
            reads.swap(i, j);
        }
    }
}
