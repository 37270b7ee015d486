//! Normalization rule tables.
//!
//! A rule is the data half of the normalizer: two 65,536-entry per-unit maps,
//! small linear-scan decomposition and surrogate tables, a dense combining
//! map, and the meta-character tables. Production rules are compiled from a
//! dictionary and loaded from a data directory; tests assemble small rules
//! through [`NormRuleBuilder`].

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use sable_types::{ArchiveReader, Utf16String};

use crate::error::NormError;

/// Entries in either per-unit map.
pub(crate) const MAP_LEN: usize = 0x10000;

/// Map value requesting decomposition through the decomposition table.
pub(crate) const MAP_DECOMPOSE: u16 = 0xFFFF;

/// Map value marking a combining mark that must not be deleted.
pub(crate) const MAP_KEEP_COMBINING: u16 = 0x077F;

/// Maximum entry count of the decomposition and surrogate tables.
const SMALL_TABLE_MAX: usize = 256;

/// A surrogate-pair replacement entry.
#[derive(Debug, Clone)]
pub(crate) struct SurrogateEntry {
    pub high: u16,
    pub low: u16,
    pub replacement: Utf16String,
}

/// Immutable normalization tables.
#[derive(Clone)]
pub struct NormRule {
    pub(crate) pre_map: Box<[u16]>,
    pub(crate) post_map: Box<[u16]>,
    pub(crate) pre_decomp: Vec<(u16, Utf16String)>,
    pub(crate) post_decomp: Vec<(u16, Utf16String)>,
    pub(crate) pre_surrogate: Vec<SurrogateEntry>,
    pub(crate) post_surrogate: Vec<SurrogateEntry>,
    pub(crate) combi_map: HashMap<u32, u16>,
    pub(crate) english: bool,
}

impl std::fmt::Debug for NormRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NormRule")
            .field("pre_decomp", &self.pre_decomp.len())
            .field("post_decomp", &self.post_decomp.len())
            .field("combi_map", &self.combi_map.len())
            .field("english", &self.english)
            .finish()
    }
}

fn identity_map() -> Box<[u16]> {
    (0..MAP_LEN as u32).map(|c| c as u16).collect()
}

impl NormRule {
    /// Starts building a rule over identity maps.
    pub fn builder() -> NormRuleBuilder {
        NormRuleBuilder {
            rule: NormRule {
                pre_map: identity_map(),
                post_map: identity_map(),
                pre_decomp: Vec::new(),
                post_decomp: Vec::new(),
                pre_surrogate: Vec::new(),
                post_surrogate: Vec::new(),
                combi_map: HashMap::new(),
                english: false,
            },
        }
    }

    /// Loads the rule tables from a data directory.
    ///
    /// File layout (all integers little-endian):
    /// - `premap.dat`, `postmap.dat`: 65,536 u16 map entries;
    /// - `predecomp.dat`, `postdecomp.dat`: u32 count, then per entry a u16
    ///   original and a length-prefixed UTF-16 replacement;
    /// - `presurrogate.dat`, `postsurrogate.dat`: u32 count, then per entry
    ///   u16 high, u16 low, and a length-prefixed UTF-16 replacement;
    /// - `combimap.dat`: u32 count, then per entry a u32 `(base << 16) |
    ///   mark` key and a u16 composition.
    pub fn load(dir: &Path, english: bool) -> Result<NormRule, NormError> {
        Ok(NormRule {
            pre_map: load_map(&dir.join("premap.dat"))?,
            post_map: load_map(&dir.join("postmap.dat"))?,
            pre_decomp: load_decomp(&dir.join("predecomp.dat"))?,
            post_decomp: load_decomp(&dir.join("postdecomp.dat"))?,
            pre_surrogate: load_surrogate(&dir.join("presurrogate.dat"))?,
            post_surrogate: load_surrogate(&dir.join("postsurrogate.dat"))?,
            combi_map: load_combi(&dir.join("combimap.dat"))?,
            english,
        })
    }

    /// English-normalization mode flag.
    pub fn english(&self) -> bool {
        self.english
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, NormError> {
    fs::read(path).map_err(|_| NormError::BadArgument)
}

fn load_map(path: &Path) -> Result<Box<[u16]>, NormError> {
    let bytes = read_file(path)?;
    if bytes.len() != MAP_LEN * 2 {
        return Err(NormError::BadArgument);
    }
    let mut reader = ArchiveReader::new(&bytes);
    let mut map = Vec::with_capacity(MAP_LEN);
    for _ in 0..MAP_LEN {
        map.push(reader.read_u16().map_err(|_| NormError::Unexpected)?);
    }
    Ok(map.into_boxed_slice())
}

fn load_decomp(path: &Path) -> Result<Vec<(u16, Utf16String)>, NormError> {
    let bytes = read_file(path)?;
    let mut reader = ArchiveReader::new(&bytes);
    let count = reader.read_len().map_err(|_| NormError::BadArgument)? as usize;
    if count > SMALL_TABLE_MAX {
        return Err(NormError::BadArgument);
    }
    let mut table = Vec::with_capacity(count);
    for _ in 0..count {
        let orig = reader.read_u16().map_err(|_| NormError::BadArgument)?;
        let repl = reader.read_str16().map_err(|_| NormError::BadArgument)?;
        table.push((orig, repl));
    }
    Ok(table)
}

fn load_surrogate(path: &Path) -> Result<Vec<SurrogateEntry>, NormError> {
    let bytes = read_file(path)?;
    let mut reader = ArchiveReader::new(&bytes);
    let count = reader.read_len().map_err(|_| NormError::BadArgument)? as usize;
    if count > SMALL_TABLE_MAX {
        return Err(NormError::BadArgument);
    }
    let mut table = Vec::with_capacity(count);
    for _ in 0..count {
        table.push(SurrogateEntry {
            high: reader.read_u16().map_err(|_| NormError::BadArgument)?,
            low: reader.read_u16().map_err(|_| NormError::BadArgument)?,
            replacement: reader.read_str16().map_err(|_| NormError::BadArgument)?,
        });
    }
    Ok(table)
}

fn load_combi(path: &Path) -> Result<HashMap<u32, u16>, NormError> {
    let bytes = read_file(path)?;
    let mut reader = ArchiveReader::new(&bytes);
    let count = reader.read_len().map_err(|_| NormError::BadArgument)? as usize;
    let mut map = HashMap::with_capacity(count);
    for _ in 0..count {
        let key = reader.read_u32().map_err(|_| NormError::BadArgument)?;
        let value = reader.read_u16().map_err(|_| NormError::BadArgument)?;
        map.insert(key, value);
    }
    Ok(map)
}

/// Assembles a [`NormRule`] entry by entry.
#[derive(Debug)]
pub struct NormRuleBuilder {
    rule: NormRule,
}

impl NormRuleBuilder {
    /// Maps `from` to `to` in the pre-map. `to = 0` deletes the character.
    pub fn pre(mut self, from: u16, to: u16) -> Self {
        self.rule.pre_map[from as usize] = to;
        self
    }

    /// Maps `from` to `to` in the post-map. `to = 0` deletes the character.
    pub fn post(mut self, from: u16, to: u16) -> Self {
        self.rule.post_map[from as usize] = to;
        self
    }

    /// Decomposes `from` into `replacement` during the pre-pass.
    pub fn pre_decompose(mut self, from: u16, replacement: &str) -> Self {
        self.rule.pre_map[from as usize] = MAP_DECOMPOSE;
        self.rule.pre_decomp.push((from, Utf16String::from(replacement)));
        self
    }

    /// Decomposes `from` into `replacement` during the post-pass.
    pub fn post_decompose(mut self, from: u16, replacement: &str) -> Self {
        self.rule.post_map[from as usize] = MAP_DECOMPOSE;
        self.rule.post_decomp.push((from, Utf16String::from(replacement)));
        self
    }

    /// Marks `mark` as a combining mark (deleted when it does not combine).
    pub fn combining(mut self, mark: u16) -> Self {
        self.rule.pre_map[mark as usize] = 0;
        self
    }

    /// Marks `mark` as a combining mark that must survive uncombined.
    pub fn combining_keep(mut self, mark: u16) -> Self {
        self.rule.pre_map[mark as usize] = MAP_KEEP_COMBINING;
        self
    }

    /// Registers a composition: `base` followed by `mark` becomes `composed`.
    pub fn combine(mut self, base: u16, mark: u16, composed: u16) -> Self {
        self.rule
            .combi_map
            .insert(((base as u32) << 16) | mark as u32, composed);
        self
    }

    /// Replaces the surrogate pair `high`,`low` during the pre-pass.
    pub fn pre_surrogate(mut self, high: u16, low: u16, replacement: &str) -> Self {
        self.rule.pre_surrogate.push(SurrogateEntry {
            high,
            low,
            replacement: Utf16String::from(replacement),
        });
        self
    }

    /// Enables English normalization (ASCII alpha runs go through the rules).
    pub fn english(mut self, english: bool) -> Self {
        self.rule.english = english;
        self
    }

    /// Finishes the rule.
    pub fn build(self) -> NormRule {
        self.rule
    }
}
