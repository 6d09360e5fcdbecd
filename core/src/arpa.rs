//! ARPA n-gram language models: parsing, serialization and backoff scoring.
//!
//! An `ArpaModel` keeps every entry resident in insertion order so that a model
//! can be written back in the layout it was read in, while a hash index gives the
//! random access that recursive backoff scoring needs.
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::ops::Range;
use std::path::Path;
use tempfile::Builder;

use crate::error::{DivideError, Result};
use crate::progress::{Progress, Silent};

/// Sentence-begin symbol.
pub const BOS: &str = "<s>";
/// Sentence-end symbol.
pub const EOS: &str = "</s>";

const DELIMITER: char = '\t';

/// Log-probability and log-backoff pair of one n-gram entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weight {
    pub log_prob: f64,
    #[serde(default)]
    pub log_backoff: f64,
}

impl Weight {
    /// Fallback used for unseen single tokens unless configured otherwise.
    pub const UNKNOWN: Weight = Weight {
        log_prob: -100.0,
        log_backoff: 0.0,
    };

    pub const fn new(log_prob: f64, log_backoff: f64) -> Self {
        Self {
            log_prob,
            log_backoff,
        }
    }

    /// Weight without a backoff (as on the highest order of a model).
    pub const fn with_prob(log_prob: f64) -> Self {
        Self::new(log_prob, 0.0)
    }
}

impl Default for Weight {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

/// Insertion-ordered n-gram table.
///
/// Entries of one order occupy a contiguous run of `entries`; `offsets[o - 1]` is
/// where order `o` starts.
#[derive(Debug, Clone, Default)]
struct NgramTable {
    entries: Vec<(String, Weight)>,
    index: AHashMap<String, usize>,
    offsets: Vec<usize>,
}

impl NgramTable {
    fn begin_order(&mut self) {
        self.offsets.push(self.entries.len());
    }

    /// Returns false (and leaves the table untouched) if `key` already exists.
    fn insert(&mut self, key: String, weight: Weight) -> bool {
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, weight));
        true
    }

    fn get(&self, key: &str) -> Option<&Weight> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    fn range(&self, order: usize) -> Range<usize> {
        if order == 0 || order > self.offsets.len() {
            return 0..0;
        }
        let start = self.offsets[order - 1];
        let end = self
            .offsets
            .get(order)
            .copied()
            .unwrap_or(self.entries.len());
        start..end
    }
}

/// An n-gram language model in ARPA form.
///
/// The model order is the number of per-order counts. Keys are single-space
/// joined token sequences; the number of tokens in a key is its order.
#[derive(Debug, Clone)]
pub struct ArpaModel {
    counts: Vec<usize>,
    table: NgramTable,
    unknown: Weight,
}

impl ArpaModel {
    /// Create an empty model (order 0) with the given unknown-token weight.
    pub fn new(unknown: Weight) -> Self {
        Self::with_counts(Vec::new(), unknown)
    }

    /// Create a model that declares `counts` but holds no entries yet.
    pub(crate) fn with_counts(counts: Vec<usize>, unknown: Weight) -> Self {
        Self {
            counts,
            table: NgramTable::default(),
            unknown,
        }
    }

    /// Load a model from an ARPA file.
    pub fn load<P: AsRef<Path>>(path: P, unknown: Weight) -> Result<Self> {
        Self::load_with_progress(path, unknown, &mut Silent)
    }

    /// Load a model from an ARPA file, reporting one stage per order.
    ///
    /// Fails with `DivideError::File` before reading anything if `path` is not an
    /// existing regular file.
    pub fn load_with_progress<P: AsRef<Path>>(
        path: P,
        unknown: Weight,
        progress: &mut dyn Progress,
    ) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(DivideError::file(
                path,
                io::Error::new(io::ErrorKind::NotFound, "no such model file"),
            ));
        }
        let file = File::open(path).map_err(|e| DivideError::file(path, e))?;
        tracing::info!("loading ARPA model from {}", path.display());
        let model = Self::read_from(
            BufReader::new(file),
            &path.display().to_string(),
            unknown,
            progress,
        )?;
        tracing::info!(
            "loaded {} entries (order {}) from {}",
            model.len(),
            model.order(),
            path.display()
        );
        Ok(model)
    }

    /// Parse a model from any buffered reader. `source_name` labels diagnostics.
    pub fn read_from<R: BufRead>(
        reader: R,
        source_name: &str,
        unknown: Weight,
        progress: &mut dyn Progress,
    ) -> Result<Self> {
        let mut lines = Lines::new(reader);
        let counts = read_counts(&mut lines, source_name)?;
        let mut model = Self::with_counts(counts, unknown);
        for order in 1..=model.order() {
            model.read_section(&mut lines, source_name, order, progress)?;
        }
        read_end(&mut lines, source_name)?;
        Ok(model)
    }

    fn read_section<R: BufRead>(
        &mut self,
        lines: &mut Lines<R>,
        source_name: &str,
        order: usize,
        progress: &mut dyn Progress,
    ) -> Result<()> {
        let header = format!("\\{}-grams:", order);
        if !lines.advance_non_blank()? {
            return Err(DivideError::format(
                source_name,
                lines.line_no(),
                format!("expected {}, found end of file", header),
            ));
        }
        if lines.current().trim() != header {
            return Err(DivideError::format(
                source_name,
                lines.line_no(),
                format!("expected {}, found {:?}", header, lines.current()),
            ));
        }

        let count = self.counts[order - 1];
        tracing::debug!("reading {} {}-gram entries from {}", count, order, source_name);
        progress.start(&format!("loading {}-grams", order), count as u64);
        self.table.begin_order();
        for read in 0..count {
            if !lines.advance()? {
                return Err(DivideError::format(
                    source_name,
                    lines.line_no(),
                    format!(
                        "unexpected end of file after {} of {} {}-gram entries",
                        read, count, order
                    ),
                ));
            }
            let (key, weight) = parse_entry(lines.current(), order)
                .map_err(|msg| DivideError::format(source_name, lines.line_no(), msg))?;
            if self.table.get(&key).is_some() {
                return Err(DivideError::format(
                    source_name,
                    lines.line_no(),
                    format!("duplicate n-gram {:?}", key),
                ));
            }
            self.table.insert(key, weight);
            progress.advance(1);
        }
        progress.finish();
        Ok(())
    }

    /// Save the model as an ARPA file.
    ///
    /// The file is written next to `path` under a temporary name and moved into
    /// place once complete.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_atomically(path.as_ref(), |out| self.write_to(out))
    }

    /// Serialize the model in ARPA form.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut out = ArpaWriter::new(writer);
        out.write_header(&self.counts)?;
        for order in 1..=self.order() {
            out.begin_order(order)?;
            for (gram, weight) in self.ngrams(order) {
                out.write_entry(gram, weight)?;
            }
        }
        out.finish()?;
        Ok(())
    }

    /// Maximum n-gram length.
    pub fn order(&self) -> usize {
        self.counts.len()
    }

    /// Declared number of entries per order (index 0 is unigrams).
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Total number of entries held.
    pub fn len(&self) -> usize {
        self.table.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.entries.is_empty()
    }

    pub fn unknown_weight(&self) -> Weight {
        self.unknown
    }

    /// Stored weight for an exact key.
    pub fn get(&self, gram: &str) -> Option<&Weight> {
        self.table.get(gram)
    }

    pub fn contains(&self, gram: &str) -> bool {
        self.table.get(gram).is_some()
    }

    /// Stored weight for `gram`, or the unknown-token weight if it is absent.
    pub fn weight(&self, gram: &str) -> Weight {
        self.table.get(gram).copied().unwrap_or(self.unknown)
    }

    /// Stored backoff for `gram`, or 0.0 if it is absent.
    pub fn backoff(&self, gram: &str) -> f64 {
        self.table.get(gram).map_or(0.0, |w| w.log_backoff)
    }

    /// All entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Weight)> {
        self.table.entries.iter().map(|(k, w)| (k.as_str(), w))
    }

    /// Entries of one order in insertion order. Empty if `order` is out of range.
    pub fn ngrams(&self, order: usize) -> impl Iterator<Item = (&str, &Weight)> {
        self.table.entries[self.table.range(order)]
            .iter()
            .map(|(k, w)| (k.as_str(), w))
    }

    pub(crate) fn positions(&self, order: usize) -> Range<usize> {
        self.table.range(order)
    }

    pub(crate) fn entry_at(&self, position: usize) -> (&str, &Weight) {
        let (k, w) = &self.table.entries[position];
        (k.as_str(), w)
    }

    pub(crate) fn begin_order(&mut self) {
        self.table.begin_order();
    }

    pub(crate) fn push(&mut self, gram: &str, weight: Weight) {
        let inserted = self.table.insert(gram.to_string(), weight);
        debug_assert!(inserted, "duplicate n-gram {:?}", gram);
    }

    /// Log-probability of the last token of `gram` given the preceding tokens.
    ///
    /// Grams longer than the model order are truncated to their last `order`
    /// tokens. An exact entry wins; an unseen single token scores the unknown
    /// weight; otherwise the score backs off:
    /// `backoff(gram[..n-1]) + score(gram[1..])`.
    pub fn score(&self, gram: &str) -> f64 {
        let tokens: Vec<&str> = gram.split_whitespace().collect();
        self.score_tokens(&tokens)
    }

    /// Same as [`ArpaModel::score`] on an already tokenized gram.
    pub fn score_tokens(&self, tokens: &[&str]) -> f64 {
        let order = self.order();
        let tokens = if order > 0 && tokens.len() > order {
            &tokens[tokens.len() - order..]
        } else {
            tokens
        };
        self.backoff_score(tokens)
    }

    fn backoff_score(&self, tokens: &[&str]) -> f64 {
        if let Some(w) = self.table.get(&tokens.join(" ")) {
            return w.log_prob;
        }
        match tokens.len() {
            0 | 1 => self.unknown.log_prob,
            n => self.backoff(&tokens[..n - 1].join(" ")) + self.backoff_score(&tokens[1..]),
        }
    }

    /// Per-token scores of a whitespace-tokenized sentence.
    ///
    /// With `bos` the sentence is prefixed by `<s>`, whose own score is not
    /// reported; with `eos` `</s>` is appended and scored. A sentence of `k`
    /// tokens with both flags yields `k + 1` scores.
    pub fn full_scores(&self, sentence: &str, bos: bool, eos: bool) -> Vec<f64> {
        let mut words = Vec::new();
        if bos {
            words.push(BOS);
        }
        words.extend(sentence.split_whitespace());
        if eos {
            words.push(EOS);
        }
        let first = if bos { 2 } else { 1 };
        (first..=words.len())
            .map(|i| self.score_tokens(&words[..i]))
            .collect()
    }

    /// Sum of [`ArpaModel::full_scores`].
    pub fn sentence_score(&self, sentence: &str, bos: bool, eos: bool) -> f64 {
        self.full_scores(sentence, bos, eos).iter().sum()
    }
}

/// Line-oriented ARPA writer shared by `ArpaModel::save` and the divider.
pub struct ArpaWriter<W: Write> {
    inner: W,
}

impl<W: Write> ArpaWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn write_header(&mut self, counts: &[usize]) -> io::Result<()> {
        writeln!(self.inner, "\\data\\")?;
        for (i, count) in counts.iter().enumerate() {
            writeln!(self.inner, "ngram {}={}", i + 1, count)?;
        }
        Ok(())
    }

    pub fn begin_order(&mut self, order: usize) -> io::Result<()> {
        writeln!(self.inner, "\n\\{}-grams:", order)
    }

    /// Write one entry; a zero backoff is omitted.
    pub fn write_entry(&mut self, gram: &str, weight: &Weight) -> io::Result<()> {
        if weight.log_backoff != 0.0 {
            writeln!(
                self.inner,
                "{}{}{}{}{}",
                weight.log_prob, DELIMITER, gram, DELIMITER, weight.log_backoff
            )
        } else {
            writeln!(self.inner, "{}{}{}", weight.log_prob, DELIMITER, gram)
        }
    }

    /// Write the `\end\` marker and flush.
    pub fn finish(mut self) -> io::Result<W> {
        writeln!(self.inner, "\n\\end\\")?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Run `body` against a temporary file next to `path`, then move it over `path`.
///
/// If `body` fails the temporary file is removed and `path` is left untouched.
pub(crate) fn write_atomically<T, F>(path: &Path, body: F) -> Result<T>
where
    F: FnOnce(&mut dyn Write) -> Result<T>,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut builder = Builder::new();
    // same mode as a freshly created file, subject to the umask
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }
    let mut tmp = builder
        .tempfile_in(dir)
        .map_err(|e| DivideError::file(dir, e))?;
    let value = {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        let value = body(&mut writer)?;
        writer.flush()?;
        value
    };
    tmp.persist(path)?;
    Ok(value)
}

/// Line cursor over an ARPA source with 1-based line numbers.
struct Lines<R> {
    inner: R,
    buf: String,
    line_no: usize,
    held: bool,
}

impl<R: BufRead> Lines<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            buf: String::new(),
            line_no: 0,
            held: false,
        }
    }

    /// Move to the next line. Returns false at end of input.
    fn advance(&mut self) -> Result<bool> {
        if self.held {
            self.held = false;
            return Ok(true);
        }
        self.buf.clear();
        if self.inner.read_line(&mut self.buf)? == 0 {
            return Ok(false);
        }
        self.line_no += 1;
        Ok(true)
    }

    fn advance_non_blank(&mut self) -> Result<bool> {
        while self.advance()? {
            if !self.current().trim().is_empty() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Make the next `advance` return the current line again.
    fn hold(&mut self) {
        self.held = true;
    }

    fn current(&self) -> &str {
        self.buf.trim_end_matches(&['\n', '\r'][..])
    }

    fn line_no(&self) -> usize {
        self.line_no
    }
}

fn read_counts<R: BufRead>(lines: &mut Lines<R>, source_name: &str) -> Result<Vec<usize>> {
    if !lines.advance_non_blank()? {
        return Err(DivideError::format(
            source_name,
            lines.line_no(),
            "expected \\data\\, found end of file",
        ));
    }
    if lines.current().trim() != "\\data\\" {
        return Err(DivideError::format(
            source_name,
            lines.line_no(),
            format!("expected \\data\\, found {:?}", lines.current()),
        ));
    }

    let mut counts = Vec::new();
    while lines.advance()? {
        let line = lines.current().trim();
        if line.is_empty() {
            break;
        }
        if line.starts_with('\\') {
            // section header without a separating blank line
            lines.hold();
            break;
        }
        let (order, count) = parse_count_line(line).ok_or_else(|| {
            DivideError::format(
                source_name,
                lines.line_no(),
                format!("malformed count line {:?}", line),
            )
        })?;
        if order != counts.len() + 1 {
            return Err(DivideError::format(
                source_name,
                lines.line_no(),
                format!("expected ngram {}=, found ngram {}=", counts.len() + 1, order),
            ));
        }
        counts.push(count);
    }

    if counts.is_empty() {
        return Err(DivideError::format(
            source_name,
            lines.line_no(),
            "no ngram counts in \\data\\ section",
        ));
    }
    Ok(counts)
}

fn read_end<R: BufRead>(lines: &mut Lines<R>, source_name: &str) -> Result<()> {
    if !lines.advance_non_blank()? {
        return Err(DivideError::format(
            source_name,
            lines.line_no(),
            "expected \\end\\, found end of file",
        ));
    }
    if lines.current().trim() != "\\end\\" {
        return Err(DivideError::format(
            source_name,
            lines.line_no(),
            format!("expected \\end\\, found {:?}", lines.current()),
        ));
    }
    Ok(())
}

/// Parse `ngram <order>=<count>`.
fn parse_count_line(line: &str) -> Option<(usize, usize)> {
    let rest = line.strip_prefix("ngram")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let (order, count) = rest.trim().split_once('=')?;
    Some((order.trim().parse().ok()?, count.trim().parse().ok()?))
}

/// Parse `<log_prob>\t<gram>[\t<log_backoff>]` for a section of `order`.
fn parse_entry(line: &str, order: usize) -> std::result::Result<(String, Weight), String> {
    let mut fields = line.trim().split(DELIMITER);
    let (Some(prob), Some(gram)) = (fields.next(), fields.next()) else {
        return Err(format!(
            "expected <log_prob>\\t<gram>[\\t<log_backoff>], found {:?}",
            line
        ));
    };
    let backoff = fields.next();
    if fields.next().is_some() {
        return Err(format!("too many fields in {:?}", line));
    }

    let tokens: Vec<&str> = gram.split_whitespace().collect();
    if tokens.len() != order {
        return Err(format!(
            "{:?} has {} tokens in the {}-gram section",
            gram,
            tokens.len(),
            order
        ));
    }
    let log_prob = parse_float(prob)?;
    let log_backoff = match backoff {
        Some(b) => parse_float(b)?,
        None => 0.0,
    };
    Ok((tokens.join(" "), Weight::new(log_prob, log_backoff)))
}

fn parse_float(field: &str) -> std::result::Result<f64, String> {
    field
        .trim()
        .parse()
        .map_err(|_| format!("invalid number {:?}", field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const TRIGRAM: &str = "\\data\\
ngram 1=5
ngram 2=3
ngram 3=1

\\1-grams:
-1.0\t<s>\t-0.5
-0.7\ta\t-0.3
-0.9\tb\t-0.2
-1.1\tc
-0.8\t</s>

\\2-grams:
-0.4\t<s> a\t-0.1
-0.3\ta b\t-0.25
-0.6\tb </s>

\\3-grams:
-0.2\t<s> a b

\\end\\
";

    fn parse(text: &str) -> Result<ArpaModel> {
        ArpaModel::read_from(Cursor::new(text), "test", Weight::UNKNOWN, &mut Silent)
    }

    fn format_line(text: &str) -> usize {
        match parse(text) {
            Err(DivideError::Format(e)) => e.line(),
            other => panic!("expected a format error, got {:?}", other),
        }
    }

    #[test]
    fn parses_counts_and_entries() {
        let m = parse(TRIGRAM).unwrap();
        assert_eq!(m.order(), 3);
        assert_eq!(m.counts(), &[5, 3, 1]);
        assert_eq!(m.len(), 9);
        assert_eq!(m.get("a b"), Some(&Weight::new(-0.3, -0.25)));
        assert_eq!(m.get("b </s>"), Some(&Weight::with_prob(-0.6)));
        for order in 1..=3 {
            assert_eq!(m.ngrams(order).count(), m.counts()[order - 1]);
            assert!(m
                .ngrams(order)
                .all(|(k, _)| k.split(' ').count() == order));
        }
        assert_eq!(m.ngrams(4).count(), 0);
    }

    #[test]
    fn keeps_insertion_order() {
        let m = parse(TRIGRAM).unwrap();
        let keys: Vec<&str> = m.iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec!["<s>", "a", "b", "c", "</s>", "<s> a", "a b", "b </s>", "<s> a b"]
        );
    }

    #[test]
    fn exact_entries_score_their_log_prob() {
        let m = parse(TRIGRAM).unwrap();
        assert_eq!(m.score("a"), -0.7);
        assert_eq!(m.score("<s> a b"), -0.2);
        // longer than the order: only the last three tokens count
        assert_eq!(m.score("c c <s> a b"), -0.2);
    }

    #[test]
    fn unseen_unigram_scores_unknown() {
        let m = parse(TRIGRAM).unwrap();
        assert_eq!(m.score("zzz"), -100.0);
        assert_eq!(m.weight("zzz"), Weight::UNKNOWN);
        assert_eq!(m.weight("a"), Weight::new(-0.7, -0.3));
    }

    #[test]
    fn unseen_bigram_backs_off() {
        let m = parse(TRIGRAM).unwrap();
        // backoff(a) + score(c)
        assert!((m.score("a c") - (-0.3 + -1.1)).abs() < 1e-12);
        // prefix without an entry contributes nothing
        assert!((m.score("zzz c") - -1.1).abs() < 1e-12);
    }

    #[test]
    fn unseen_trigram_backs_off_recursively() {
        let m = parse(TRIGRAM).unwrap();
        // backoff(a b) + score(b c) = -0.25 + backoff(b) + score(c)
        let expected = -0.25 + -0.2 + -1.1;
        assert!((m.score("a b c") - expected).abs() < 1e-12);
        assert_eq!(m.score("a b c"), m.backoff("a b") + m.score("b c"));
    }

    #[test]
    fn full_scores_drops_sentence_begin() {
        let m = parse(TRIGRAM).unwrap();
        let scores = m.full_scores("a b", true, true);
        assert_eq!(scores.len(), 3);
        assert_eq!(scores[0], m.score("<s> a"));
        assert_eq!(scores[1], m.score("<s> a b"));
        assert_eq!(scores[2], m.score("a b </s>"));

        let bare = m.full_scores("a b", false, false);
        assert_eq!(bare, vec![m.score("a"), m.score("a b")]);
        assert_eq!(m.full_scores("", true, true), vec![m.score("<s> </s>")]);
        assert!(
            (m.sentence_score("a b", true, true) - scores.iter().sum::<f64>()).abs() < 1e-12
        );
    }

    #[test]
    fn write_omits_zero_backoff() {
        let m = parse(TRIGRAM).unwrap();
        let mut out = Vec::new();
        m.write_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("\\data\\\nngram 1=5\nngram 2=3\nngram 3=1\n\n\\1-grams:\n"));
        assert!(text.contains("-0.3\ta b\t-0.25\n"));
        assert!(text.contains("-1.1\tc\n"));
        assert!(text.ends_with("\n\\end\\\n"));

        let again = parse(&text).unwrap();
        assert_eq!(again.counts(), m.counts());
        assert!(again.iter().eq(m.iter()));
    }

    #[test]
    fn explicit_zero_backoff_reads_as_absent() {
        let text = "\\data\\\nngram 1=1\n\n\\1-grams:\n-1\ta\t0\n\n\\end\\\n";
        let m = parse(text).unwrap();
        assert_eq!(m.get("a"), Some(&Weight::with_prob(-1.0)));
    }

    #[test]
    fn header_without_blank_separator_is_accepted() {
        let text = "\n\n\\data\\\nngram 1=1\n\\1-grams:\n-1\ta\n\\end\\\n";
        let m = parse(text).unwrap();
        assert_eq!(m.counts(), &[1]);
    }

    #[test]
    fn normalizes_gram_whitespace() {
        let text = "\\data\\\nngram 1=2\nngram 2=1\n\n\\1-grams:\n-1\ta\n-1\tb\n\n\\2-grams:\n-0.5\ta  b \n\n\\end\\\n";
        let m = parse(text).unwrap();
        assert!(m.contains("a b"));
        assert_eq!(m.score("a   b"), -0.5);
    }

    #[test]
    fn rejects_missing_data_marker() {
        assert_eq!(format_line("ngram 1=1\n"), 1);
        assert!(matches!(parse(""), Err(DivideError::Format(_))));
    }

    #[test]
    fn rejects_malformed_count_lines() {
        assert_eq!(format_line("\\data\\\nngram 1=x\n\n"), 2);
        assert_eq!(format_line("\\data\\\nngrams 1=2\n\n"), 2);
        assert_eq!(format_line("\\data\\\nngram 2=2\n\n"), 2);
        assert_eq!(format_line("\\data\\\n\n\\1-grams:\n"), 2);
    }

    #[test]
    fn rejects_wrong_section_header() {
        let text = "\\data\\\nngram 1=1\n\n\\2-grams:\n-1\ta\n\\end\\\n";
        assert_eq!(format_line(text), 4);
    }

    #[test]
    fn rejects_truncated_section() {
        let text = "\\data\\\nngram 1=3\n\n\\1-grams:\n-1\ta\n-1\tb\n";
        assert_eq!(format_line(text), 6);
    }

    #[test]
    fn rejects_missing_end_marker() {
        let text = "\\data\\\nngram 1=1\n\n\\1-grams:\n-1\ta\n\n";
        assert!(matches!(parse(text), Err(DivideError::Format(_))));
        let text = "\\data\\\nngram 1=1\n\n\\1-grams:\n-1\ta\n\\2-grams:\n";
        assert_eq!(format_line(text), 6);
    }

    #[test]
    fn rejects_bad_entries() {
        let base = "\\data\\\nngram 1=1\nngram 2=1\n\n\\1-grams:\n-1\ta\n\n\\2-grams:\n";
        // wrong token count
        assert_eq!(format_line(&format!("{}-1\ta\n\\end\\\n", base)), 9);
        // not a number
        assert_eq!(format_line(&format!("{}x\ta a\n\\end\\\n", base)), 9);
        // too many fields
        assert_eq!(format_line(&format!("{}-1\ta a\t-1\t-1\n\\end\\\n", base)), 9);
        // blank line inside a section
        assert_eq!(format_line(&format!("{}\n-1\ta a\n\\end\\\n", base)), 9);
    }

    #[test]
    fn rejects_duplicate_keys() {
        let text = "\\data\\\nngram 1=2\n\n\\1-grams:\n-1\ta\n-2\ta\n\n\\end\\\n";
        assert_eq!(format_line(text), 6);
    }

    #[test]
    fn missing_file_is_a_file_error() {
        let err = ArpaModel::load("/nonexistent/model.arpa", Weight::UNKNOWN).unwrap_err();
        match err {
            DivideError::File(e) => assert_eq!(e.path(), Path::new("/nonexistent/model.arpa")),
            other => panic!("expected a file error, got {:?}", other),
        }
    }

    #[test]
    fn failed_atomic_write_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.arpa");
        let result: Result<()> = write_atomically(&path, |out| {
            out.write_all(b"\\data\\\n")?;
            Err(DivideError::NoOutputRequested)
        });
        assert!(result.is_err());
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        write_atomically(&path, |out| Ok(out.write_all(b"done\n")?)).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "done\n");
    }

    #[test]
    fn empty_model_scores_unknown() {
        let m = ArpaModel::new(Weight::new(-7.0, 0.0));
        assert_eq!(m.order(), 0);
        assert!(m.is_empty());
        assert_eq!(m.score("a b"), -7.0);
    }
}
