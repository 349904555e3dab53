use std::borrow::Cow;
use std::ffi::OsStr;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use unicode_normalization::UnicodeNormalization;

use super::config::{Phoneme, PhonemeType, PhonemizeConfig};
use super::model::PiperError;

/// Converts text into sentences of phonemes.
pub trait Phonemizer {
    fn phonemize(
        &mut self,
        text: &str,
        config: &PhonemizeConfig,
    ) -> Result<Vec<Vec<Phoneme>>, PiperError>;
}

/// Adds diacritics to text before phonemization (e.g. Arabic tashkeel).
pub trait Diacritizer {
    fn diacritize(&mut self, text: &str) -> Result<String, PiperError>;
}

/// Uses the text's own codepoints as phonemes ("text" phoneme type).
///
/// The text is lowercased and NFD-decomposed, so accents arrive as separate
/// combining marks. Every non-empty line becomes one sentence.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodepointPhonemizer;

impl Phonemizer for CodepointPhonemizer {
    fn phonemize(
        &mut self,
        text: &str,
        _config: &PhonemizeConfig,
    ) -> Result<Vec<Vec<Phoneme>>, PiperError> {
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| line.to_lowercase().nfd().collect())
            .collect())
    }
}

/// Location of the espeak-ng executable and its data.
#[derive(Debug, Clone, Default)]
pub struct EspeakConfig {
    /// `None` runs `espeak-ng` from PATH.
    pub bin_path: Option<PathBuf>,
    /// Passed as `--path`; `None` uses the built-in data location.
    pub data_path: Option<PathBuf>,
}

/// IPA phonemes from the espeak-ng command line tool.
#[derive(Debug, Clone, Default)]
pub struct EspeakPhonemizer {
    config: EspeakConfig,
}

impl EspeakPhonemizer {
    pub fn new(config: EspeakConfig) -> Self {
        Self { config }
    }
}

impl Phonemizer for EspeakPhonemizer {
    fn phonemize(
        &mut self,
        text: &str,
        config: &PhonemizeConfig,
    ) -> Result<Vec<Vec<Phoneme>>, PiperError> {
        let sentences = split_sentences(text);

        let clauses: Vec<&str> = sentences
            .iter()
            .flatten()
            .filter_map(|part| match part {
                TextPart::Text(clause) => Some(clause.as_str()),
                TextPart::Punct(_) => None,
            })
            .collect();
        if clauses.is_empty() {
            return Ok(sentences.iter().map(|s| punct_only(s)).collect());
        }

        let ipa = self.phonemize_clauses(&clauses, &config.espeak_voice)?;
        let mut ipa = ipa.into_iter();

        let mut result = Vec::with_capacity(sentences.len());
        for sentence in &sentences {
            let mut phonemes = Vec::new();
            for (i, part) in sentence.iter().enumerate() {
                match part {
                    TextPart::Text(_) => {
                        if let Some(clause) = ipa.next() {
                            phonemes.extend(clause);
                        }
                    }
                    TextPart::Punct(ch) => {
                        phonemes.push(*ch);
                        // Clause breaks inside a sentence are followed by a word gap.
                        if i + 1 < sentence.len() {
                            phonemes.push(' ');
                        }
                    }
                }
            }
            result.push(phonemes);
        }
        Ok(result)
    }
}

impl EspeakPhonemizer {
    /// Phonemize clauses in one espeak-ng call, one per line.
    fn phonemize_clauses(
        &self,
        clauses: &[&str],
        voice: &str,
    ) -> Result<Vec<Vec<Phoneme>>, PiperError> {
        let output = self.run_espeak(&clauses.join("\n"), voice)?;
        let lines: Vec<&str> = output.lines().filter(|l| !l.trim().is_empty()).collect();

        // espeak-ng should emit one line per input line in stdin mode.
        // If this assumption breaks, fall back to per-clause invocation.
        if lines.len() != clauses.len() {
            log::debug!(
                "espeak-ng returned {} line(s) for {} clause(s), retrying one at a time",
                lines.len(),
                clauses.len()
            );
            return clauses
                .iter()
                .map(|clause| Ok(ipa_to_phonemes(&self.run_espeak(clause, voice)?)))
                .collect();
        }

        Ok(lines.iter().map(|line| ipa_to_phonemes(line)).collect())
    }

    fn run_espeak(&self, input: &str, voice: &str) -> Result<String, PiperError> {
        let bin = self
            .config
            .bin_path
            .as_deref()
            .map(|p| p.as_os_str())
            .unwrap_or_else(|| OsStr::new("espeak-ng"));

        let mut command = Command::new(bin);
        command.args(["--ipa", "--stdin", "-q", "-v", voice]);
        if let Some(data) = &self.config.data_path {
            command.arg("--path").arg(data);
        }

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    PiperError::EspeakNotFound
                } else {
                    PiperError::Io(e)
                }
            })?;

        // espeak-ng is line-oriented on stdin; an unterminated last line
        // can lose its final token.
        let input = newline_terminated(input);
        let stdin = child.stdin.take();

        // Feed stdin while draining stdout so neither pipe can fill up and
        // stall the other side. Dropping the pipe signals end of input.
        let (written, output) = std::thread::scope(|scope| {
            let writer = scope.spawn(move || -> std::io::Result<()> {
                if let Some(mut stdin) = stdin {
                    stdin.write_all(input.as_bytes())?;
                }
                Ok(())
            });
            let output = child.wait_with_output();
            (writer.join(), output)
        });
        let output = output?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PiperError::Phonemization(format!(
                "espeak-ng exited with code {:?}: {stderr}",
                output.status.code()
            )));
        }

        written.map_err(|_| {
            PiperError::Phonemization("espeak-ng input writer panicked".to_string())
        })??;

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Pick the phonemizer matching the voice's phoneme type.
pub fn phonemizer_for(config: &PhonemizeConfig, espeak: &EspeakConfig) -> Box<dyn Phonemizer> {
    match config.phoneme_type {
        PhonemeType::Espeak => Box::new(EspeakPhonemizer::new(espeak.clone())),
        PhonemeType::Text => Box::new(CodepointPhonemizer),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TextPart {
    Text(String),
    Punct(char),
}

/// Split text into sentences of clauses and punctuation.
///
/// A sentence ends after `.`, `!`, `?` or a line break (which reads as `.`).
fn split_sentences(text: &str) -> Vec<Vec<TextPart>> {
    let mut sentences = Vec::new();
    let mut parts = Vec::new();
    let mut current = String::new();

    for (idx, ch) in text.char_indices() {
        if let Some(punct) = map_boundary_punctuation(ch) {
            if !is_numeric_connector_between_digits(text, idx, ch) {
                flush_text_part(&mut parts, &mut current);
                let is_line_break = punct == '.' && ch != '.';
                // A line break right after terminal punctuation adds nothing.
                if !(is_line_break && parts.is_empty()) {
                    parts.push(TextPart::Punct(punct));
                }
                if is_terminal(punct) && !parts.is_empty() {
                    sentences.push(std::mem::take(&mut parts));
                }
                continue;
            }
        }

        if ch.is_whitespace() {
            if !current.is_empty() && !current.ends_with(' ') {
                current.push(' ');
            }
            continue;
        }

        current.push(ch);
    }

    flush_text_part(&mut parts, &mut current);
    if !parts.is_empty() {
        sentences.push(parts);
    }
    sentences
}

fn flush_text_part(parts: &mut Vec<TextPart>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        parts.push(TextPart::Text(trimmed.to_string()));
    }
    current.clear();
}

fn punct_only(sentence: &[TextPart]) -> Vec<Phoneme> {
    sentence
        .iter()
        .filter_map(|part| match part {
            TextPart::Punct(ch) => Some(*ch),
            TextPart::Text(_) => None,
        })
        .collect()
}

fn is_terminal(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?')
}

fn map_boundary_punctuation(ch: char) -> Option<char> {
    match ch {
        '.' | '!' | '?' | ',' | ';' | ':' => Some(ch),
        '\n' | '\r' => Some('.'),
        _ => None,
    }
}

fn is_numeric_connector_between_digits(text: &str, idx: usize, ch: char) -> bool {
    if !matches!(ch, '.' | ',') {
        return false;
    }

    let prev = text[..idx].chars().next_back();
    let next = text[idx + ch.len_utf8()..].chars().next();

    matches!(
        (prev, next),
        (Some(left), Some(right)) if left.is_ascii_digit() && right.is_ascii_digit()
    )
}

fn newline_terminated(input: &str) -> Cow<'_, str> {
    if input.ends_with('\n') {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(format!("{input}\n"))
    }
}

/// Decompose IPA output into phoneme codepoints.
///
/// espeak-ng may break one clause over several lines (at brackets, dashes or
/// ellipses); those lines are rejoined with a word gap. Word-boundary `_`
/// markers are dropped.
fn ipa_to_phonemes(ipa: &str) -> Vec<Phoneme> {
    let joined = ipa
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    joined.nfd().filter(|&ch| ch != '_').collect()
}
