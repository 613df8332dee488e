//! FASTQ reading and writing, transparently handling gzip

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use seq_io::fastq::{Reader as FastqReader, Record};
use seqport_core::{SeqportError, SeqportResult};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Sniff the gzip magic bytes rather than trusting the extension
pub fn is_gzipped(path: &Path) -> SeqportResult<bool> {
    let mut file = File::open(path)?;
    let mut magic = [0u8; 2];
    let n = file.read(&mut magic)?;
    Ok(n == 2 && magic == GZIP_MAGIC)
}

/// Open a FASTQ file, plain or gzipped (multi-member gzip included)
pub fn open_fastq(path: &Path) -> SeqportResult<FastqReader<Box<dyn Read>>> {
    let mut file = File::open(path).map_err(|e| {
        SeqportError::Configuration(format!("Unable to open {}: {}", path.display(), e))
    })?;
    let mut magic = [0u8; 2];
    let n = file.read(&mut magic)?;
    file.seek(SeekFrom::Start(0))?;

    let reader: Box<dyn Read> = if n == 2 && magic == GZIP_MAGIC {
        Box::new(MultiGzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(FastqReader::new(reader))
}

pub(crate) fn parse_error(path: &Path, err: seq_io::fastq::Error) -> SeqportError {
    SeqportError::Parse(format!("{}: {}", path.display(), err))
}

/// Count the records of a FASTQ file
pub fn count_reads(path: &Path) -> SeqportResult<u64> {
    let mut reader = open_fastq(path)?;
    let mut count = 0u64;
    while let Some(record) = reader.next() {
        record.map_err(|e| parse_error(path, e))?;
        count += 1;
    }
    Ok(count)
}

/// File name with FASTQ and compression extensions stripped
pub fn fastq_basename(path: &Path) -> String {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    for suffix in [".gz", ".fastq", ".fq"] {
        if let Some(stripped) = name.strip_suffix(suffix) {
            name = stripped.to_string();
        }
    }
    name
}

/// A readset or bucket name made safe for use in an output file name
///
/// Distinct names can map to the same result (`"S 1"` and `"S_1"`), so callers that derive
/// several outputs in one directory must compare the sanitized forms.
pub fn safe_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

enum SinkInner {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

/// A FASTQ output that is only durable once [`FastqSink::finish`] returns
///
/// Gzip is chosen by the `.gz` extension of the target path.
pub struct FastqSink {
    path: PathBuf,
    inner: SinkInner,
    records: u64,
}

impl FastqSink {
    pub fn create(path: &Path, compression_level: u32) -> SeqportResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = BufWriter::new(File::create(path)?);
        let inner = if path.extension().map(|e| e == "gz").unwrap_or(false) {
            SinkInner::Gzip(GzEncoder::new(file, Compression::new(compression_level)))
        } else {
            SinkInner::Plain(file)
        };
        Ok(Self {
            path: path.to_path_buf(),
            inner,
            records: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    fn writer(&mut self) -> &mut dyn Write {
        match &mut self.inner {
            SinkInner::Plain(w) => w,
            SinkInner::Gzip(w) => w,
        }
    }

    pub fn write_parts(&mut self, head: &[u8], seq: &[u8], qual: &[u8]) -> SeqportResult<()> {
        seq_io::fastq::write_to(self.writer(), head, seq, qual)?;
        self.records += 1;
        Ok(())
    }

    pub fn write_record<R: Record>(&mut self, record: &R) -> SeqportResult<()> {
        self.write_parts(record.head(), record.seq(), record.qual())
    }

    /// Flush, finish the gzip stream and fsync. Returns the number of records written.
    pub fn finish(self) -> SeqportResult<u64> {
        let buffered = match self.inner {
            SinkInner::Plain(w) => w,
            SinkInner::Gzip(w) => w.finish()?,
        };
        let file = buffered.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqport_test::{generate_reads, write_fastq};

    #[test]
    fn test_count_plain_and_gzipped() {
        let dir = tempfile::tempdir().unwrap();
        let reads = generate_reads("r", 25, 50, 1);

        let plain = dir.path().join("a.fastq");
        let gz = dir.path().join("b.fastq.gz");
        write_fastq(&plain, &reads).unwrap();
        write_fastq(&gz, &reads).unwrap();

        assert_eq!(count_reads(&plain).unwrap(), 25);
        assert_eq!(count_reads(&gz).unwrap(), 25);
        assert!(is_gzipped(&gz).unwrap());
        assert!(!is_gzipped(&plain).unwrap());
    }

    #[test]
    fn test_empty_file_has_no_reads() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.fastq");
        std::fs::write(&empty, b"").unwrap();
        assert_eq!(count_reads(&empty).unwrap(), 0);
    }

    #[test]
    fn test_sink_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.fastq.gz");
        let mut sink = FastqSink::create(&out, 6).unwrap();
        sink.write_parts(b"r1", b"ACGT", b"IIII").unwrap();
        sink.write_parts(b"r2", b"TTTT", b"####").unwrap();
        assert_eq!(sink.finish().unwrap(), 2);
        assert_eq!(count_reads(&out).unwrap(), 2);
    }

    #[test]
    fn test_basename() {
        assert_eq!(fastq_basename(Path::new("/x/L1a_R1.fastq.gz")), "L1a_R1");
        assert_eq!(fastq_basename(Path::new("sample.fq")), "sample");
        assert_eq!(fastq_basename(Path::new("plain.txt")), "plain.txt");
    }

    #[test]
    fn test_safe_file_name() {
        assert_eq!(safe_file_name("Test Readset/1"), "Test_Readset_1");
        assert_eq!(safe_file_name("platformUnit1"), "platformUnit1");
        assert_eq!(safe_file_name("S 1"), safe_file_name("S_1"));
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let err = open_fastq(Path::new("/no/such/file.fastq")).err().unwrap();
        assert!(err.is_fatal_configuration());
    }
}
