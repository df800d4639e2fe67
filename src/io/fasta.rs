use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use crate::util::dna;

#[derive(Debug, Clone)]
pub struct FastaRecord {
    pub id: String,
    pub seq: Vec<u8>,
}

pub struct FastaReader<R: BufRead> {
    reader: R,
    buf: String,
    done: bool,
    peek_header: Option<String>,
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: String::new(),
            done: false,
            peek_header: None,
        }
    }

    pub fn next_record(&mut self) -> Result<Option<FastaRecord>> {
        if self.done {
            return Ok(None);
        }

        // Find header line
        let header = if let Some(h) = self.peek_header.take() {
            h
        } else {
            loop {
                self.buf.clear();
                let n = self.reader.read_line(&mut self.buf)?;
                if n == 0 {
                    self.done = true;
                    return Ok(None);
                }
                if self.buf.starts_with('>') {
                    break self.buf[1..].trim().to_string();
                }
            }
        };

        // id is the first word; the description is not kept
        let id = header.split_whitespace().next().unwrap_or("").to_string();

        // Sequence lines, normalized as they are read (RNA U -> T)
        let mut seq: Vec<u8> = Vec::new();
        loop {
            self.buf.clear();
            let n = self.reader.read_line(&mut self.buf)?;
            if n == 0 {
                self.done = true;
                break;
            }
            if self.buf.starts_with('>') {
                self.peek_header = Some(self.buf[1..].trim().to_string());
                break;
            }
            for &b in self.buf.as_bytes() {
                match b {
                    b'\n' | b'\r' | b' ' | b'\t' => {}
                    _ => seq.push(dna::normalize_base(b)),
                }
            }
        }

        Ok(Some(FastaRecord { id, seq }))
    }
}

/// 按名称查找的参考序列集合
///
/// Keeps file order so output headers list references the way the FASTA does.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    index: HashMap<String, usize>,
    records: Vec<FastaRecord>,
}

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let fh = std::fs::File::open(path)
            .with_context(|| format!("cannot open reference FASTA '{}'", path.display()))?;
        Self::from_reader(std::io::BufReader::new(fh))
            .with_context(|| format!("invalid reference FASTA '{}'", path.display()))
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut reader = FastaReader::new(reader);
        let mut set = Self::new();
        while let Some(rec) = reader.next_record()? {
            if rec.id.is_empty() {
                bail!("FASTA record without a name");
            }
            if rec.seq.is_empty() {
                bail!("reference '{}' has an empty sequence", rec.id);
            }
            if set.contains(&rec.id) {
                bail!("duplicate reference name '{}'", rec.id);
            }
            set.push(rec);
        }
        if set.is_empty() {
            bail!("FASTA contains no sequences");
        }
        Ok(set)
    }

    /// Add or replace a reference. Bases are normalized.
    pub fn insert(&mut self, name: impl Into<String>, seq: &[u8]) {
        self.push(FastaRecord {
            id: name.into(),
            seq: dna::normalize_seq(seq),
        });
    }

    /// `rec.seq` must already be normalized (as `FastaReader` yields it).
    fn push(&mut self, rec: FastaRecord) {
        match self.index.get(&rec.id) {
            Some(&i) => self.records[i].seq = rec.seq,
            None => {
                self.index.insert(rec.id.clone(), self.records.len());
                self.records.push(rec);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.index.get(name).map(|&i| self.records[i].seq.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `(name, sequence)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.records.iter().map(|r| (r.id.as_str(), r.seq.as_slice()))
    }
}
