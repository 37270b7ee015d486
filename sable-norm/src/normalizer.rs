//! The normalization pipeline.

use std::sync::Arc;

use sable_types::Utf16String;

use crate::chars;
use crate::error::NormError;
use crate::rule::{NormRule, MAP_DECOMPOSE, MAP_KEEP_COMBINING};
use crate::ruleset::{strip_sentinels, RuleSet, ENGLISH_SENTINEL, RULE_DELIMITERS};

/// Default group delimiters `d0 d1 d2` for both-mode output.
pub const DEFAULT_DELIMITERS: [u16; 3] = [0xEE7B, 0xEE2C, 0xEE7D];

/// Default escape character `d3`.
pub const DEFAULT_ESCAPE: u16 = 0xEE5C;

/// Default chunking threshold in code units.
pub const DEFAULT_MAX_BUF_LEN: usize = 100_000;

/// Delimiters produced by the expansion rule set: `X(A,B)Y`.
const EXPAND_DELIMITERS: [u16; 3] = [b'(' as u16, b',' as u16, b')' as u16];

const NAKATEN_DEFAULT: &[u16] = &[0x30FB, 0xFF65, 0x00B7];
const CHOUON_DEFAULT: &[u16] = &[0x30FC, 0xFF70, 0x2015, 0x2500];
const HYPHEN_DEFAULT: &[u16] = &[0x002D, 0x2010, 0x2011, 0x2012, 0x2013, 0xFF0D];
const IGNORE_BOTH_DEFAULT: &[u16] = &[0x3099, 0x309A];

/// What the normalizer emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Only the normalized form.
    Normalized,
    /// Only the original form (extraction only).
    Original,
    /// `d0 original d1 normalized d2` groups interleaved with unchanged runs.
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Null,
    Kana,
    Alpha,
}

#[derive(Debug, Clone)]
struct PreChar {
    orig: u16,
    repl: Utf16String,
}

#[derive(Debug)]
struct ExtractState {
    units: Vec<u16>,
    pos: usize,
    mode: OutputMode,
    delims: [u16; 4],
    escape: u16,
    stat: OutputMode,
}

/// The rule-driven text normalizer.
pub struct Normalizer {
    base: Arc<NormRule>,
    second: Option<Arc<NormRule>>,
    active: Arc<NormRule>,
    post_map: Box<[u16]>,
    rules: Box<dyn RuleSet>,
    expand_rules: Box<dyn RuleSet>,
    nakaten: Vec<u16>,
    chouon: Vec<u16>,
    hyphen: Vec<u16>,
    ignore_both: Vec<u16>,
    nakaten_check: bool,
    max_buf_len: usize,
    extract: Option<ExtractState>,
}

impl std::fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Normalizer")
            .field("english", &self.active.english())
            .field("has_second_rule", &self.second.is_some())
            .finish()
    }
}

impl Normalizer {
    /// Creates a normalizer over one rule and its two rule tables.
    pub fn new(
        rule: Arc<NormRule>,
        rules: Box<dyn RuleSet>,
        expand_rules: Box<dyn RuleSet>,
    ) -> Normalizer {
        let post_map = rule.post_map.clone();
        Normalizer {
            active: rule.clone(),
            base: rule,
            second: None,
            post_map,
            rules,
            expand_rules,
            nakaten: NAKATEN_DEFAULT.to_vec(),
            chouon: CHOUON_DEFAULT.to_vec(),
            hyphen: HYPHEN_DEFAULT.to_vec(),
            ignore_both: IGNORE_BOTH_DEFAULT.to_vec(),
            nakaten_check: true,
            max_buf_len: DEFAULT_MAX_BUF_LEN,
            extract: None,
        }
    }

    /// Layers a second rule on top; [`Normalizer::switch_rule`] selects it.
    pub fn add_rule(&mut self, rule: Arc<NormRule>) {
        self.second = Some(rule);
    }

    /// Returns true when a second rule is installed.
    pub fn has_second_rule(&self) -> bool {
        self.second.is_some()
    }

    /// Switches the active table set: 1 selects the base rule, 2 the second
    /// rule (base when none is installed), 3 disables space folding in the
    /// post-map, 4 turns the space-folded entries into deletions.
    pub fn switch_rule(&mut self, n: i32) {
        match n {
            1 => {
                self.active = self.base.clone();
                self.post_map = self.active.post_map.clone();
            }
            2 => {
                self.active = self.second.clone().unwrap_or_else(|| self.base.clone());
                self.post_map = self.active.post_map.clone();
            }
            3 => {
                for (i, entry) in self.post_map.iter_mut().enumerate() {
                    if self.base.post_map[i] == 0x20 {
                        *entry = i as u16;
                    }
                }
            }
            4 => {
                for (i, entry) in self.post_map.iter_mut().enumerate() {
                    if self.base.post_map[i] == 0x20 {
                        *entry = 0;
                    }
                }
            }
            _ => {}
        }
    }

    /// Toggles the four meta-character classes: ignore-in-both, middle dot,
    /// long-sound mark, and hyphen.
    pub fn enable_meta_tables(&mut self, s1: bool, s2: bool, s3: bool, s4: bool) {
        self.ignore_both = if s1 { IGNORE_BOTH_DEFAULT.to_vec() } else { Vec::new() };
        self.nakaten = if s2 { NAKATEN_DEFAULT.to_vec() } else { Vec::new() };
        self.chouon = if s3 { CHOUON_DEFAULT.to_vec() } else { Vec::new() };
        self.hyphen = if s4 { HYPHEN_DEFAULT.to_vec() } else { Vec::new() };
    }

    /// Controls whether a middle dot inside a kana run survives when the
    /// following character is not kana. Disabled, middle dots in kana runs
    /// are always dropped.
    pub fn set_nakaten_check(&mut self, check: bool) {
        self.nakaten_check = check;
    }

    /// Normalizes `input` with default delimiters and chunk limit.
    pub fn normalize(
        &self,
        input: &Utf16String,
        mode: OutputMode,
    ) -> Result<Utf16String, NormError> {
        self.normalize_buf(
            input,
            0,
            0,
            mode,
            DEFAULT_DELIMITERS,
            DEFAULT_ESCAPE,
            DEFAULT_MAX_BUF_LEN,
        )
    }

    /// Normalizes `input[begin..end]` (`end = 0` means to the end of input).
    ///
    /// The three delimiters and the escape must be pairwise distinct and must
    /// not be katakana. [`OutputMode::Original`] is rejected: it exists only
    /// for extraction.
    #[allow(clippy::too_many_arguments)]
    pub fn normalize_buf(
        &self,
        input: &Utf16String,
        begin: usize,
        end: usize,
        mode: OutputMode,
        delimiters: [u16; 3],
        escape: u16,
        max_buf_len: usize,
    ) -> Result<Utf16String, NormError> {
        validate_delimiters(delimiters, escape)?;
        if mode == OutputMode::Original {
            return Err(NormError::BadArgument);
        }
        let len = input.len();
        let end = if end == 0 {
            if len > 0 && begin >= len {
                return Err(NormError::BadArgument);
            }
            len
        } else {
            if end < begin || end > len {
                return Err(NormError::BadArgument);
            }
            end
        };
        let mut output = Utf16String::new();
        if begin == end {
            return Ok(output);
        }
        let max_buf_len = if max_buf_len == 0 {
            self.max_buf_len
        } else {
            max_buf_len
        };
        let units = input.units();
        let mut piece_start = begin;
        while piece_start < end {
            let clip = if end - piece_start > max_buf_len {
                self.find_clip_point(units, piece_start + max_buf_len, end)
            } else {
                end
            };
            let mut pass = Pass::new(self, delimiters, escape);
            pass.chk_pre(&units[piece_start..clip])?;
            if mode == OutputMode::Both {
                pass.chk_both(&mut output)?;
            } else {
                pass.chk_rule()?;
                pass.chk_post(&mut output)?;
            }
            piece_start = clip;
        }
        Ok(output)
    }

    fn is_breakpoint(&self, c: u16) -> bool {
        chars::is_kanji(c)
            || chars::is_control(c)
            || chars::is_space(c)
            || chars::is_line(c)
            || chars::is_digit(c)
    }

    fn find_clip_point(&self, units: &[u16], from: usize, end: usize) -> usize {
        (from..end)
            .find(|i| self.is_breakpoint(units[*i]))
            .unwrap_or(end)
    }

    /// Expands `input` into its spelling alternatives.
    ///
    /// With `check_containment` an alternative containing another alternative
    /// is dropped, and a single survivor containing the input collapses the
    /// result to no alternatives. With `expand_only` the input is taken as
    /// already normalized and only the expansion rules run. Empty input
    /// yields no alternatives.
    pub fn expand(
        &self,
        input: &Utf16String,
        check_containment: bool,
        expand_only: bool,
    ) -> Result<Vec<Utf16String>, NormError> {
        if input.is_empty() {
            return Ok(Vec::new());
        }
        let mut pass = Pass::new(self, DEFAULT_DELIMITERS, DEFAULT_ESCAPE);
        if expand_only {
            pass.gen = input
                .units()
                .iter()
                .map(|u| PreChar {
                    orig: *u,
                    repl: Utf16String::from(&[*u][..]),
                })
                .collect();
            pass.chk_exp(true)?;
        } else {
            pass.chk_pre(input.units())?;
            pass.chk_exp(false)?;
        }
        let mut flat = Utf16String::new();
        pass.chk_post(&mut flat)?;

        let mut expanded = expand_array(&flat);
        if check_containment {
            expanded = filter_containment(expanded);
            if expanded.len() == 1 && expanded[0].contains(input) {
                expanded.clear();
            }
        }
        Ok(expanded)
    }

    /// Installs a both-mode string for character-wise extraction.
    pub fn extract_init(
        &mut self,
        input: &Utf16String,
        mode: OutputMode,
        delimiters: [u16; 3],
        escape: u16,
    ) -> Result<(), NormError> {
        validate_delimiters(delimiters, escape)?;
        self.extract = Some(ExtractState {
            units: input.units().to_vec(),
            pos: 0,
            mode,
            delims: [delimiters[0], delimiters[1], delimiters[2], escape],
            escape,
            stat: OutputMode::Both,
        });
        Ok(())
    }

    /// Returns the next extracted character, or `None` at end of input.
    pub fn extract_getc(&mut self) -> Result<Option<u16>, NormError> {
        let state = self.extract.as_mut().ok_or(NormError::NotInitialized)?;
        let mut current = state.units.get(state.pos).copied();
        if state.mode != OutputMode::Both {
            let mut escaped = false;
            while let Some(c) = current {
                let is_delim = state.delims.contains(&c);
                let skip_region = state.stat != OutputMode::Both && state.stat != state.mode;
                if !is_delim && !skip_region {
                    break;
                }
                if escaped {
                    if state.stat == state.mode {
                        break;
                    }
                    escaped = false;
                } else if c == state.escape && state.stat != OutputMode::Both {
                    escaped = true;
                } else if c == state.delims[0] && state.stat == OutputMode::Both {
                    state.stat = OutputMode::Original;
                } else if c == state.delims[1] && state.stat == OutputMode::Original {
                    state.stat = OutputMode::Normalized;
                } else if c == state.delims[2] && state.stat == OutputMode::Normalized {
                    state.stat = OutputMode::Both;
                } else if is_delim {
                    break;
                }
                state.pos += 1;
                current = state.units.get(state.pos).copied();
            }
        }
        state.pos += 1;
        if current.is_none() {
            self.extract = None;
        }
        Ok(current)
    }
}

fn validate_delimiters(d: [u16; 3], escape: u16) -> Result<(), NormError> {
    let all = [d[0], d[1], d[2], escape];
    for i in 0..all.len() {
        for j in i + 1..all.len() {
            if all[i] == all[j] {
                tracing::error!(
                    "invalid delimiter/escape: {:#06x} {:#06x} {:#06x} {:#06x}",
                    d[0],
                    d[1],
                    d[2],
                    escape
                );
                return Err(NormError::BadArgument);
            }
        }
        if chars::is_katakana(all[i]) {
            tracing::error!("katakana delimiter/escape: {:#06x}", all[i]);
            return Err(NormError::BadArgument);
        }
    }
    Ok(())
}

/// One normalization pass over one chunk of input.
struct Pass<'a> {
    norm: &'a Normalizer,
    delims: [u16; 4],
    escape: u16,
    gen: Vec<PreChar>,
    seikika: Utf16String,
    una: Utf16String,
    stri_left: usize,
    stri_right: usize,
    una_do_prn: bool,
}

impl<'a> Pass<'a> {
    fn new(norm: &'a Normalizer, delimiters: [u16; 3], escape: u16) -> Self {
        Pass {
            norm,
            delims: [delimiters[0], delimiters[1], delimiters[2], escape],
            escape,
            gen: Vec::new(),
            seikika: Utf16String::new(),
            una: Utf16String::new(),
            stri_left: 0,
            stri_right: 0,
            una_do_prn: false,
        }
    }

    fn map_unit(
        &self,
        c: u16,
        map: &[u16],
        decomp: &[(u16, Utf16String)],
    ) -> Result<Utf16String, NormError> {
        let mapped = map[c as usize];
        if mapped == MAP_DECOMPOSE && c != 0xFFFF {
            return decomp
                .iter()
                .find(|(orig, _)| *orig == c)
                .map(|(_, repl)| repl.clone())
                .ok_or(NormError::Unexpected);
        }
        if mapped == 0 {
            return Ok(Utf16String::new());
        }
        Ok(Utf16String::from(&[mapped][..]))
    }

    fn map_surrogate(&self, high: u16, low: u16) -> Utf16String {
        for entry in &self.norm.active.pre_surrogate {
            if entry.high == 0 {
                break;
            }
            if entry.high == high && entry.low == low {
                return entry.replacement.clone();
            }
        }
        Utf16String::from(&[high, low][..])
    }

    fn combine(&self, base: u16, mark: u16) -> Option<u16> {
        self.norm
            .active
            .combi_map
            .get(&(((base as u32) << 16) | mark as u32))
            .copied()
    }

    /// Pre-pass: surrogate lookup, combining composition, per-unit pre-map.
    fn chk_pre(&mut self, units: &[u16]) -> Result<(), NormError> {
        let rule = &self.norm.active;
        self.gen = units
            .iter()
            .map(|u| PreChar {
                orig: *u,
                repl: Utf16String::new(),
            })
            .collect();
        let len = units.len();
        let mut i = 0;
        while i < len {
            let mut target = units[i];
            if chars::is_high_surrogate(target)
                && i + 1 < len
                && chars::is_low_surrogate(units[i + 1])
            {
                self.gen[i].repl = self.map_surrogate(target, units[i + 1]);
                i += 2;
                continue;
            }
            let mut except = 0u32;
            let mut j = i + 1;
            while j < len {
                let next = units[j];
                let next_map = rule.pre_map[next as usize];
                if next_map != 0 && next_map != MAP_KEEP_COMBINING {
                    break;
                }
                if (target == 0xFFFE || target == 0xFFFF) && j == i + 1 {
                    break;
                }
                match self.combine(target, next) {
                    None => {
                        // The mark does not compose; a deletable mark is
                        // consumed, a protected one is left for the next round.
                        if next_map == 0 {
                            j += 1;
                        }
                        break;
                    }
                    Some(composed @ (0xFFFE | 0xFFFF)) => {
                        except += 1;
                        target = composed;
                        j += 1;
                    }
                    Some(composed) => {
                        except = 0;
                        target = composed;
                        j += 1;
                    }
                }
            }
            if except > 0 {
                // A two-mark composition fell through; back to the original.
                target = units[i];
            }
            self.gen[i].repl = self.map_unit(target, &rule.pre_map, &rule.pre_decomp)?;
            if self.gen[i].repl.get(0) == Some(MAP_KEEP_COMBINING) {
                self.gen[i].repl = Utf16String::from(&[units[i]][..]);
            }
            i = j.max(i + 1);
        }
        Ok(())
    }

    /// The first replacement character after position `(i, j)`, or 0 at end.
    fn next_repl_char(&self, i: usize, j: usize) -> u16 {
        let mut i = i;
        let mut j = j + 1;
        loop {
            if let Some(c) = self.gen[i].repl.get(j) {
                return c;
            }
            i += 1;
            if i >= self.gen.len() {
                return 0;
            }
            j = 0;
        }
    }

    fn is_kana(c: u16) -> bool {
        chars::is_katakana(c) || chars::is_hankaku_kana(c)
    }

    fn apply_rules(&self, buffer: &Utf16String) -> Utf16String {
        // Analyzer failures are recoverable: the run passes through.
        self.norm
            .rules
            .apply(buffer)
            .unwrap_or_else(|_| strip_sentinels(buffer))
    }

    fn apply_expand_rules(&self, buffer: &Utf16String) -> Utf16String {
        self.norm
            .expand_rules
            .apply(buffer)
            .unwrap_or_else(|_| strip_sentinels(buffer))
    }

    /// Applies the rules to the buffered run and appends the normalized
    /// alternative (the `B` of `X{A,B}Y`) to the intermediate string.
    fn do_rule(&mut self, context: Context) {
        if self.una.is_empty() {
            return;
        }
        if context == Context::Alpha {
            self.una.push(ENGLISH_SENTINEL);
        }
        let buffer = std::mem::take(&mut self.una);
        let result = self.apply_rules(&buffer);
        self.seikika.connect(&pick_alternative(&result));
    }

    /// Context-classifying walk emitting into the intermediate string.
    fn chk_rule(&mut self) -> Result<(), NormError> {
        let mut context = Context::Null;
        for i in 0..self.gen.len() {
            let repl_len = self.gen[i].repl.len();
            for j in 0..repl_len {
                let Some(mut this_char) = self.gen[i].repl.get(j) else {
                    break;
                };
                if Self::is_kana(this_char) {
                    if context == Context::Alpha {
                        self.do_rule(context);
                        context = Context::Null;
                    }
                    if context != Context::Kana {
                        if self.norm.nakaten.contains(&this_char) {
                            self.seikika.push(this_char);
                            context = Context::Null;
                            continue;
                        }
                        if self.norm.hyphen.contains(&this_char) {
                            self.seikika.push(self.norm.hyphen[0]);
                            context = Context::Null;
                            continue;
                        }
                        self.una.push(this_char);
                        context = Context::Kana;
                        continue;
                    }
                    if self.norm.nakaten.contains(&this_char) {
                        if self.norm.nakaten_check {
                            let next = self.next_repl_char(i, j);
                            if next == 0 || !Self::is_kana(next) {
                                self.una.push(this_char);
                            }
                        }
                    } else {
                        self.una.push(this_char);
                    }
                    continue;
                }
                if self.norm.active.english()
                    && chars::is_ascii(this_char)
                    && chars::is_ascii_alpha(this_char)
                {
                    if context == Context::Kana {
                        if self.norm.chouon.contains(&this_char) {
                            self.una.push(self.norm.chouon[0]);
                            continue;
                        }
                        self.do_rule(context);
                    }
                    if self.una.is_empty() {
                        self.una.push(ENGLISH_SENTINEL);
                    }
                    self.una.push(this_char);
                    context = Context::Alpha;
                    continue;
                }
                if context == Context::Kana {
                    if self.norm.chouon.contains(&this_char) {
                        self.una.push(self.norm.chouon[0]);
                        continue;
                    }
                    if self.norm.nakaten.contains(&this_char) {
                        if self.norm.nakaten_check {
                            let next = self.next_repl_char(i, j);
                            if next != 0 && Self::is_kana(next) {
                                continue;
                            }
                        } else {
                            continue;
                        }
                    }
                }
                if context != Context::Null {
                    self.do_rule(context);
                }
                if self.norm.hyphen.contains(&this_char) {
                    this_char = self.norm.hyphen[0];
                }
                self.seikika.push(this_char);
                context = Context::Null;
            }
        }
        if context != Context::Null {
            self.do_rule(context);
        }
        Ok(())
    }

    /// Post-pass: per-unit post-map over the intermediate string.
    fn chk_post(&mut self, output: &mut Utf16String) -> Result<(), NormError> {
        let seikika = std::mem::take(&mut self.seikika);
        for i in 0..seikika.len() {
            let Some(c) = seikika.get(i) else { break };
            let mapped =
                self.map_unit(c, &self.norm.post_map, &self.norm.active.post_decomp)?;
            output.connect(&mapped);
        }
        Ok(())
    }

    fn post_mapped(&self, c: u16) -> Result<Utf16String, NormError> {
        self.map_unit(c, &self.norm.post_map, &self.norm.active.post_decomp)
    }

    fn is_delim(&self, c: u16) -> bool {
        self.delims.contains(&c)
    }

    /// Writes `mapped` escaping any delimiter characters in it.
    fn output_str(&self, output: &mut Utf16String, mapped: &Utf16String) {
        for &c in mapped.units() {
            if self.is_delim(c) {
                output.push(self.escape);
            }
            output.push(c);
        }
    }

    /// Original run of the current rule window, minus ignored characters.
    fn output_original(&self, output: &mut Utf16String) {
        for i in self.stri_left..self.stri_right {
            let c = self.gen[i].orig;
            if self.norm.ignore_both.contains(&c) {
                continue;
            }
            output.push(c);
        }
    }

    /// A character the pre-pass deleted: `d0 c d1 d2`.
    fn output_char_null(&self, output: &mut Utf16String, c: u16) {
        output.push(self.delims[0]);
        if self.is_delim(c) {
            output.push(self.escape);
        }
        output.push(c);
        output.push(self.delims[1]);
        output.push(self.delims[2]);
    }

    /// A character unchanged by the pre-pass; groups only when the post-map
    /// changes it or it collides with a delimiter.
    fn output_char_simple(&self, output: &mut Utf16String, c: u16) -> Result<(), NormError> {
        let mapped = self.post_mapped(c)?;
        let unchanged = mapped.len() == 1 && mapped.get(0) == Some(c);
        if self.is_delim(c) {
            if unchanged {
                output.push(self.delims[0]);
                output.push(self.escape);
                output.push(c);
                output.push(self.delims[1]);
                output.push(self.escape);
                output.push(c);
                output.push(self.delims[2]);
                return Ok(());
            }
            output.push(self.delims[0]);
            output.push(self.escape);
            output.push(c);
            output.push(self.delims[1]);
        } else {
            if unchanged {
                output.push(c);
                return Ok(());
            }
            output.push(self.delims[0]);
            output.push(c);
            output.push(self.delims[1]);
        }
        self.output_str(output, &mapped);
        output.push(self.delims[2]);
        Ok(())
    }

    /// A single original character with a known single replacement.
    fn output_char_mapped(
        &self,
        output: &mut Utf16String,
        orig: u16,
        out_char: u16,
    ) -> Result<(), NormError> {
        output.push(self.delims[0]);
        if self.is_delim(orig) {
            output.push(self.escape);
        }
        output.push(orig);
        output.push(self.delims[1]);
        self.output_str(output, &self.post_mapped(out_char)?);
        output.push(self.delims[2]);
        Ok(())
    }

    /// A whole pre-pass replacement emitted against its original character.
    fn output_char_index(&self, output: &mut Utf16String, i: usize) -> Result<(), NormError> {
        let orig = self.gen[i].orig;
        output.push(self.delims[0]);
        if self.is_delim(orig) {
            output.push(self.escape);
        }
        output.push(orig);
        output.push(self.delims[1]);
        for n in 0..self.gen[i].repl.len() {
            let Some(c) = self.gen[i].repl.get(n) else { break };
            self.output_str(output, &self.post_mapped(c)?);
        }
        output.push(self.delims[2]);
        Ok(())
    }

    fn output_post_simple(&self, output: &mut Utf16String, c: u16) -> Result<(), NormError> {
        self.output_str(output, &self.post_mapped(c)?);
        Ok(())
    }

    /// Rule application for both mode: emits a `d0 orig d1 normalized d2`
    /// group when anything changed, the bare run otherwise.
    fn do_both(&mut self, output: &mut Utf16String, context: Context) -> Result<(), NormError> {
        if self.una.is_empty() {
            return Ok(());
        }
        if context == Context::Alpha {
            self.una.push(ENGLISH_SENTINEL);
        }
        let buffer = std::mem::take(&mut self.una);
        let result = self.apply_rules(&buffer);
        if result.find(RULE_DELIMITERS[0], 0).is_none() {
            let mut original = Utf16String::new();
            self.output_original(&mut original);
            let mut normalized = Utf16String::new();
            for &c in result.units() {
                self.output_post_simple(&mut normalized, c)?;
            }
            if original != normalized {
                output.push(self.delims[0]);
                output.connect(&original);
                output.push(self.delims[1]);
                output.connect(&normalized);
                output.push(self.delims[2]);
            } else {
                output.connect(&original);
            }
            return Ok(());
        }
        self.una_do_prn = true;
        output.push(self.delims[0]);
        self.output_original(output);
        output.push(self.delims[1]);
        let alternative = pick_alternative(&result);
        for &c in alternative.units() {
            self.output_post_simple(output, c)?;
        }
        output.push(self.delims[2]);
        self.una_do_prn = false;
        Ok(())
    }

    /// Context-classifying walk for both mode.
    fn chk_both(&mut self, output: &mut Utf16String) -> Result<(), NormError> {
        let mut context = Context::Null;
        self.stri_left = 0;
        self.stri_right = 0;
        self.una_do_prn = false;
        let len = self.gen.len();
        for i in 0..len {
            let repl_len = self.gen[i].repl.len();
            if repl_len == 0 {
                let orig = self.gen[i].orig;
                if self.norm.ignore_both.contains(&orig) {
                    continue;
                }
                if context == Context::Null {
                    self.output_char_null(output, orig);
                } else {
                    self.una_do_prn = true;
                }
                continue;
            }
            for j in 0..repl_len {
                let Some(mut this_char) = self.gen[i].repl.get(j) else {
                    break;
                };
                let orig_char = self.gen[i].orig;
                if Self::is_kana(this_char) {
                    if !self.una_do_prn && chars::is_hankaku_kana(orig_char) {
                        self.una_do_prn = true;
                    }
                    if context == Context::Alpha {
                        self.stri_right = i;
                        self.do_both(output, context)?;
                        context = Context::Null;
                    }
                    if context != Context::Kana {
                        if self.norm.nakaten.contains(&this_char) {
                            if this_char != orig_char {
                                self.output_char_mapped(output, orig_char, this_char)?;
                            } else {
                                self.output_char_simple(output, this_char)?;
                            }
                            context = Context::Null;
                            continue;
                        }
                        if self.norm.hyphen.contains(&this_char) {
                            this_char = self.norm.hyphen[0];
                            if this_char != orig_char {
                                self.output_char_mapped(output, orig_char, this_char)?;
                            } else {
                                self.output_char_simple(output, this_char)?;
                            }
                            context = Context::Null;
                            continue;
                        }
                        self.stri_left = i;
                        self.stri_right = i;
                        self.una.push(this_char);
                        context = Context::Kana;
                        continue;
                    }
                    if self.norm.nakaten.contains(&this_char) {
                        if self.norm.nakaten_check {
                            let next = self.next_repl_char(i, j);
                            if next == 0 || !Self::is_kana(next) {
                                self.una.push(this_char);
                            } else {
                                self.una_do_prn = true;
                            }
                        } else {
                            self.una_do_prn = true;
                        }
                    } else {
                        self.una.push(this_char);
                    }
                    continue;
                }
                if self.norm.active.english()
                    && chars::is_ascii(this_char)
                    && chars::is_ascii_alpha(this_char)
                {
                    if !self.una_do_prn
                        && !(chars::is_ascii(orig_char) && chars::is_ascii_lower(orig_char))
                    {
                        self.una_do_prn = true;
                    }
                    if context == Context::Kana {
                        if self.norm.chouon.contains(&this_char) {
                            self.una.push(self.norm.chouon[0]);
                            continue;
                        }
                        self.stri_right = i;
                        self.do_both(output, context)?;
                    }
                    if context != Context::Alpha {
                        self.stri_left = i;
                        self.stri_right = i;
                    }
                    if self.una.is_empty() {
                        self.una.push(ENGLISH_SENTINEL);
                    }
                    self.una.push(this_char);
                    context = Context::Alpha;
                    continue;
                }
                if context == Context::Kana {
                    if self.norm.chouon.contains(&this_char) {
                        self.una.push(self.norm.chouon[0]);
                        continue;
                    }
                    if self.norm.nakaten.contains(&this_char) {
                        if self.norm.nakaten_check {
                            let next = self.next_repl_char(i, j);
                            if next != 0 && Self::is_kana(next) {
                                self.una_do_prn = true;
                                continue;
                            }
                        } else {
                            self.una_do_prn = true;
                            continue;
                        }
                    }
                }
                if context != Context::Null {
                    self.stri_right = i;
                    self.do_both(output, context)?;
                }
                if self.norm.hyphen.contains(&this_char) {
                    this_char = self.norm.hyphen[0];
                    if this_char != orig_char {
                        self.output_char_mapped(output, orig_char, this_char)?;
                    } else {
                        self.output_char_simple(output, this_char)?;
                    }
                } else if this_char != orig_char {
                    if j == 0 {
                        self.output_char_index(output, i)?;
                    }
                } else {
                    self.output_char_simple(output, this_char)?;
                }
                context = Context::Null;
            }
        }
        if context != Context::Null {
            self.stri_right = len;
            self.do_both(output, context)?;
        }
        Ok(())
    }

    /// Rule + expansion application for the expand path.
    fn do_exp(&mut self, context: Context, skip_first: bool) {
        if self.una.is_empty() {
            return;
        }
        if context == Context::Alpha {
            self.una.push(ENGLISH_SENTINEL);
        }
        let buffer = std::mem::take(&mut self.una);
        let rule_result = if skip_first {
            buffer
        } else {
            let result = self.apply_rules(&buffer);
            let mut r = Utf16String::new();
            if context == Context::Alpha {
                r.push(ENGLISH_SENTINEL);
            }
            r.connect(&pick_alternative(&result));
            if context == Context::Alpha {
                r.push(ENGLISH_SENTINEL);
            }
            r
        };
        let mut expanded = self.apply_expand_rules(&rule_result);
        expanded.replace_unit(EXPAND_DELIMITERS[0], DEFAULT_DELIMITERS[0]);
        expanded.replace_unit(EXPAND_DELIMITERS[1], DEFAULT_DELIMITERS[1]);
        expanded.replace_unit(EXPAND_DELIMITERS[2], DEFAULT_DELIMITERS[2]);
        self.seikika.connect(&expanded);
    }

    /// Context-classifying walk for the expand path.
    fn chk_exp(&mut self, skip_first: bool) -> Result<(), NormError> {
        let mut context = Context::Null;
        for i in 0..self.gen.len() {
            let repl_len = self.gen[i].repl.len();
            for j in 0..repl_len {
                let Some(mut this_char) = self.gen[i].repl.get(j) else {
                    break;
                };
                if Self::is_kana(this_char) {
                    if context == Context::Alpha {
                        self.do_exp(context, skip_first);
                        context = Context::Null;
                    }
                    if context != Context::Kana {
                        if self.norm.nakaten.contains(&this_char) {
                            self.seikika.push(this_char);
                            context = Context::Null;
                            continue;
                        }
                        if self.norm.hyphen.contains(&this_char) {
                            self.seikika.push(self.norm.hyphen[0]);
                            context = Context::Null;
                            continue;
                        }
                        self.una.push(this_char);
                        context = Context::Kana;
                        continue;
                    }
                    if self.norm.nakaten.contains(&this_char) {
                        if self.norm.nakaten_check {
                            let next = self.next_repl_char(i, j);
                            if next == 0 || !Self::is_kana(next) {
                                self.una.push(this_char);
                            }
                        }
                    } else {
                        self.una.push(this_char);
                    }
                    continue;
                }
                if self.norm.active.english()
                    && chars::is_ascii(this_char)
                    && chars::is_ascii_alpha(this_char)
                {
                    if context == Context::Kana {
                        if self.norm.chouon.contains(&this_char) {
                            self.una.push(self.norm.chouon[0]);
                            continue;
                        }
                        self.do_exp(context, skip_first);
                    }
                    if self.una.is_empty() {
                        self.una.push(ENGLISH_SENTINEL);
                    }
                    self.una.push(this_char);
                    context = Context::Alpha;
                    continue;
                }
                if context == Context::Kana {
                    if self.norm.chouon.contains(&this_char) {
                        self.una.push(self.norm.chouon[0]);
                        continue;
                    }
                    if self.norm.nakaten.contains(&this_char) {
                        if self.norm.nakaten_check {
                            let next = self.next_repl_char(i, j);
                            if next != 0 && Self::is_kana(next) {
                                continue;
                            }
                        } else {
                            continue;
                        }
                    }
                }
                if context != Context::Null {
                    self.do_exp(context, skip_first);
                }
                if self.norm.hyphen.contains(&this_char) {
                    this_char = self.norm.hyphen[0];
                }
                self.seikika.push(this_char);
                context = Context::Null;
            }
        }
        if context != Context::Null {
            self.do_exp(context, skip_first);
        }
        Ok(())
    }
}

/// Builds `XBY` out of `X{A,B}Y`.
fn pick_alternative(result: &Utf16String) -> Utf16String {
    let units = result.units();
    let mut out = Utf16String::with_capacity(units.len());
    let mut pos = 0;
    while let Some(open) = result.find(RULE_DELIMITERS[0], pos) {
        out.connect_units(&units[pos..open]);
        let Some(comma) = result.find(RULE_DELIMITERS[1], open + 1) else {
            out.connect_units(&units[open..]);
            return out;
        };
        let Some(close) = result.find(RULE_DELIMITERS[2], comma + 1) else {
            out.connect_units(&units[open..]);
            return out;
        };
        out.connect_units(&units[comma + 1..close]);
        pos = close + 1;
    }
    out.connect_units(&units[pos..]);
    out
}

/// Cartesian product of `(A,B,…)` groups over the private delimiters.
fn expand_array(s: &Utf16String) -> Vec<Utf16String> {
    let units = s.units();
    let mut result = vec![Utf16String::new()];
    let mut pos = 0;
    while let Some(open) = s.find(DEFAULT_DELIMITERS[0], pos) {
        for r in &mut result {
            r.connect_units(&units[pos..open]);
        }
        let close = s.find(DEFAULT_DELIMITERS[2], open + 1).unwrap_or(units.len());
        let mut alternatives = Vec::new();
        let mut alt_start = open + 1;
        loop {
            match s.find(DEFAULT_DELIMITERS[1], alt_start) {
                Some(comma) if comma < close => {
                    alternatives.push(&units[alt_start..comma]);
                    alt_start = comma + 1;
                }
                _ => {
                    alternatives.push(&units[alt_start..close]);
                    break;
                }
            }
        }
        let mut next = Vec::with_capacity(result.len() * alternatives.len());
        for r in &result {
            for alt in &alternatives {
                let mut combined = r.clone();
                combined.connect_units(alt);
                next.push(combined);
            }
        }
        result = next;
        pos = (close + 1).min(units.len());
    }
    for r in &mut result {
        r.connect_units(&units[pos..]);
    }
    result
}

/// Drops alternatives that contain another alternative.
fn filter_containment(mut expanded: Vec<Utf16String>) -> Vec<Utf16String> {
    for i in 0..expanded.len() {
        if expanded[i].is_empty() {
            continue;
        }
        for j in i + 1..expanded.len() {
            if expanded[j].is_empty() {
                continue;
            }
            if expanded[i].contains(&expanded[j]) {
                expanded[i].clear();
                break;
            } else if expanded[j].contains(&expanded[i]) {
                expanded[j].clear();
            }
        }
    }
    expanded.retain(|e| !e.is_empty());
    expanded
}
