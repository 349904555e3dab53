use std::collections::BTreeMap;
use std::fmt::Write as _;

use super::config::{Phoneme, PhonemeId, PhonemizeConfig};

/// Occurrence counts of phonemes that had no entry in the id map.
///
/// Ordered by codepoint so reports are stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissingPhonemes {
    counts: BTreeMap<Phoneme, usize>,
}

impl MissingPhonemes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, phoneme: Phoneme) {
        *self.counts.entry(phoneme).or_insert(0) += 1;
    }

    /// Add all counts from `other` into `self`.
    pub fn merge(&mut self, other: &MissingPhonemes) {
        for (&phoneme, &count) in &other.counts {
            *self.counts.entry(phoneme).or_insert(0) += count;
        }
    }

    pub fn count(&self, phoneme: Phoneme) -> usize {
        self.counts.get(&phoneme).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Number of distinct missing phonemes.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Phoneme, usize)> + '_ {
        self.counts.iter().map(|(&p, &c)| (p, c))
    }

    /// Log every missing phoneme with its codepoint and count.
    pub fn report(&self) {
        if self.is_empty() {
            return;
        }
        log::warn!("Missing {} phoneme(s) from phoneme/id map!", self.len());
        for (phoneme, count) in self.iter() {
            log::warn!(
                "Missing \"{}\" (U+{:04X}): {} time(s)",
                phoneme,
                phoneme as u32,
                count
            );
        }
    }
}

/// Ids for one sentence (or phrase) plus the phonemes that could not be mapped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappedPhonemes {
    pub ids: Vec<PhonemeId>,
    pub missing: MissingPhonemes,
}

/// Convert phonemes to model ids.
///
/// Substitutions from `phoneme_map` run first, then each phoneme contributes
/// its full id list. The sequence is wrapped in bos/eos, and with
/// `intersperse_pad` the pad id sits between every adjacent pair of ids.
pub fn phonemes_to_ids(phonemes: &[Phoneme], config: &PhonemizeConfig) -> MappedPhonemes {
    let mut missing = MissingPhonemes::new();
    let mut body: Vec<PhonemeId> = Vec::with_capacity(phonemes.len());

    let mut push_phoneme = |phoneme: Phoneme| match config.phoneme_id_map.get(&phoneme) {
        Some(ids) => body.extend_from_slice(ids),
        None => missing.record(phoneme),
    };

    for &phoneme in phonemes {
        match config.phoneme_map.as_ref().and_then(|m| m.get(&phoneme)) {
            Some(replacements) => replacements.iter().copied().for_each(&mut push_phoneme),
            None => push_phoneme(phoneme),
        }
    }

    let mut ids = Vec::with_capacity(if config.intersperse_pad {
        body.len() * 2 + 3
    } else {
        body.len() + 2
    });
    ids.push(config.id_bos);
    for id in body {
        if config.intersperse_pad {
            ids.push(config.id_pad);
        }
        ids.push(id);
    }
    if config.intersperse_pad {
        ids.push(config.id_pad);
    }
    ids.push(config.id_eos);

    MappedPhonemes { ids, missing }
}

/// Render phonemes as a string for debug logging.
pub fn phonemes_to_string(phonemes: &[Phoneme]) -> String {
    phonemes.iter().collect()
}

/// Render ids as `1, 0, 65, ...` for debug logging.
pub fn ids_to_string(ids: &[PhonemeId]) -> String {
    let mut out = String::new();
    for (i, id) in ids.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{id}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::piper::config::VoiceConfig;
    use std::collections::HashMap;

    fn config_with(ids: &[(char, &[i64])]) -> PhonemizeConfig {
        PhonemizeConfig {
            phoneme_id_map: ids.iter().map(|(p, i)| (*p, i.to_vec())).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn interleaves_pad_between_every_id() {
        let config = VoiceConfig::from_json_str(r#"{"phoneme_id_map": {"A": [65, 0]}}"#)
            .unwrap()
            .phonemize;
        let mapped = phonemes_to_ids(&['A'], &config);
        assert_eq!(mapped.ids, vec![1, 0, 65, 0, 0, 0, 2]);
        assert!(mapped.missing.is_empty());
    }

    #[test]
    fn without_intersperse_only_boundaries_are_added() {
        let mut config = config_with(&[('a', &[5]), ('b', &[6, 7])]);
        config.intersperse_pad = false;
        let mapped = phonemes_to_ids(&['a', 'b'], &config);
        assert_eq!(mapped.ids, vec![1, 5, 6, 7, 2]);
    }

    #[test]
    fn custom_reserved_ids() {
        let mut config = config_with(&[('a', &[5])]);
        config.id_pad = 9;
        config.id_bos = 7;
        config.id_eos = 8;
        assert_eq!(phonemes_to_ids(&['a'], &config).ids, vec![7, 9, 5, 9, 8]);
    }

    #[test]
    fn empty_input_is_bos_pad_eos() {
        let config = config_with(&[]);
        assert_eq!(phonemes_to_ids(&[], &config).ids, vec![1, 0, 2]);
    }

    #[test]
    fn counts_missing_phonemes_and_keeps_going() {
        let config = config_with(&[('a', &[5])]);
        let mapped = phonemes_to_ids(&['x', 'a', 'x', 'y'], &config);
        assert_eq!(mapped.ids, vec![1, 0, 5, 0, 2]);
        assert_eq!(mapped.missing.count('x'), 2);
        assert_eq!(mapped.missing.count('y'), 1);
        assert_eq!(mapped.missing.len(), 2);
    }

    #[test]
    fn substitution_runs_before_lookup() {
        let mut config = config_with(&[('t', &[10]), ('ʃ', &[11])]);
        let mut map = HashMap::new();
        map.insert('ʧ', vec!['t', 'ʃ']);
        map.insert('-', vec![]);
        config.phoneme_map = Some(map);
        config.intersperse_pad = false;

        let mapped = phonemes_to_ids(&['ʧ', '-', 't'], &config);
        assert_eq!(mapped.ids, vec![1, 10, 11, 10, 2]);
        assert!(mapped.missing.is_empty());
    }

    #[test]
    fn substituted_phonemes_are_reported_when_unmapped() {
        let mut config = config_with(&[]);
        config.phoneme_map = Some(HashMap::from([('a', vec!['q', 'q'])]));
        let mapped = phonemes_to_ids(&['a'], &config);
        assert_eq!(mapped.missing.count('q'), 2);
        assert_eq!(mapped.missing.count('a'), 0);
    }

    #[test]
    fn merging_adds_counts() {
        let config = config_with(&[]);
        let first = phonemes_to_ids(&['z', 'z', 'z'], &config).missing;
        let second = phonemes_to_ids(&['z', 'w'], &config).missing;

        let mut total = MissingPhonemes::new();
        total.merge(&first);
        total.merge(&second);
        assert_eq!(total.count('z'), 4);
        assert_eq!(total.count('w'), 1);

        let mut reversed = MissingPhonemes::new();
        reversed.merge(&second);
        reversed.merge(&first);
        assert_eq!(total, reversed);
    }

    #[test]
    fn iterates_in_codepoint_order() {
        let mut missing = MissingPhonemes::new();
        for p in ['ə', 'b', 'a', 'b'] {
            missing.record(p);
        }
        let order: Vec<_> = missing.iter().collect();
        assert_eq!(order, vec![('a', 1), ('b', 2), ('ə', 1)]);
    }

    #[test]
    fn debug_renderings() {
        assert_eq!(phonemes_to_string(&['h', 'ə']), "hə");
        assert_eq!(ids_to_string(&[1, 0, 65]), "1, 0, 65");
        assert_eq!(ids_to_string(&[]), "");
    }
}
