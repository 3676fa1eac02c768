use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::probe::AudioStreamTags;

/// Canonical code for English tracks
pub const ENGLISH_CODE: &str = "eng";
/// Canonical code for the preferred language (French)
pub const FRENCH_CODE: &str = "fre";
/// Code for tracks whose language cannot be determined
pub const UNDETERMINED_CODE: &str = "und";
/// Rank given to every track outside the preferred language
pub const NON_PREFERRED_RANK: u32 = 999;

const ENGLISH_ALIASES: &[&str] = &["eng", "en", "english"];
const FRENCH_ALIASES: &[&str] = &["fre", "fra", "fr", "french", "français", "francais"];

/// Dubbing variant of a French track, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum DubVariant {
    /// VFF: France-produced dub
    Vff,
    /// VFI: international French dub
    Vfi,
    /// French with no variant marker
    Generic,
    /// VFA: alternate/adapted French dub
    Vfa,
    /// VFQ: Québec dub
    Vfq,
}

impl DubVariant {
    pub fn rank(&self) -> u32 {
        match self {
            DubVariant::Vff => 0,
            DubVariant::Vfi => 1,
            DubVariant::Generic => 2,
            DubVariant::Vfa => 3,
            DubVariant::Vfq => 4,
        }
    }
}

const GENERIC_FRENCH_PATTERN: &str = r"\b(?:vf|french|français|francais)\b";
const VF_WORD_PATTERN: &str = r"\bvf\b";
const VFF_PATTERN: &str = r"\bvff\b";
const VFI_PATTERN: &str = r"\bvfi\b";
const VFA_PATTERN: &str = r"\bvfa\b";
const VFQ_PATTERN: &str = r"\b(?:vfq|québec|quebec)\b";

fn keyword_regex(pattern: &str) -> Regex {
    // Constant patterns, all compiled in the tests
    Regex::new(pattern).expect("keyword pattern is valid")
}

static GENERIC_FRENCH: Lazy<Regex> = Lazy::new(|| keyword_regex(GENERIC_FRENCH_PATTERN));
static VF_WORD: Lazy<Regex> = Lazy::new(|| keyword_regex(VF_WORD_PATTERN));

/// Variant markers in checking order. The first row that matches decides the
/// variant even when a title carries several markers.
static VARIANT_PRECEDENCE: Lazy<Vec<(DubVariant, Regex)>> = Lazy::new(|| {
    vec![
        (DubVariant::Vff, keyword_regex(VFF_PATTERN)),
        (DubVariant::Vfi, keyword_regex(VFI_PATTERN)),
        (DubVariant::Vfa, keyword_regex(VFA_PATTERN)),
        (DubVariant::Vfq, keyword_regex(VFQ_PATTERN)),
    ]
});

/// Short Québec region tags, only meaningful next to a "vf" marker
const SHORT_REGION_MARKERS: &[&str] = &[" qc", "(qc", "[qc"];

/// Classified audio stream; derived once from its tags and never mutated
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioStreamDescriptor {
    /// Position among the source's audio streams (`0:a:<position>`)
    pub position: usize,
    /// Normalized language code written to the output metadata
    pub language: String,
    pub preferred: bool,
    pub variant: Option<DubVariant>,
    pub rank: u32,
    /// Tie-break key: order in which the stream was discovered
    pub discovery_order: usize,
}

fn normalize_text(s: Option<&str>) -> String {
    s.map(|v| v.trim().to_lowercase()).unwrap_or_default()
}

/// Map a raw language tag to its canonical code; `None` when the tag is absent
pub fn normalize_language(raw: Option<&str>) -> Option<String> {
    let lang = normalize_text(raw);
    if lang.is_empty() {
        None
    } else if ENGLISH_ALIASES.contains(&lang.as_str()) {
        Some(ENGLISH_CODE.to_string())
    } else if FRENCH_ALIASES.contains(&lang.as_str()) {
        Some(FRENCH_CODE.to_string())
    } else {
        Some(lang)
    }
}

/// Decide whether the track is French and, if so, which dub variant it is
fn classify_variant(language: &str, title: &str, handler: &str) -> Option<DubVariant> {
    let search = format!("{} {} {}", language, title, handler).to_lowercase();

    let variant = VARIANT_PRECEDENCE
        .iter()
        .find(|(_, pattern)| pattern.is_match(&search))
        .map(|(variant, _)| *variant);

    let is_french = language == FRENCH_CODE || GENERIC_FRENCH.is_match(&search) || variant.is_some();
    if !is_french {
        return None;
    }

    if variant.is_some() {
        return variant;
    }

    let short_region = SHORT_REGION_MARKERS.iter().any(|m| search.contains(m));
    if short_region && VF_WORD.is_match(&search) {
        return Some(DubVariant::Vfq);
    }

    Some(DubVariant::Generic)
}

/// Orders audio tracks so the best French dub comes first
pub struct AudioTrackClassifier;

impl AudioTrackClassifier {
    /// Create a new audio track classifier
    pub fn new() -> Self {
        AudioTrackClassifier
    }

    /// Classify a single stream
    pub fn describe(&self, tags: &AudioStreamTags, discovery_order: usize) -> AudioStreamDescriptor {
        let title = normalize_text(tags.title.as_deref());
        let handler = normalize_text(tags.handler.as_deref());

        let language = match normalize_language(tags.language.as_deref()) {
            Some(code) => code,
            None => match classify_variant(UNDETERMINED_CODE, &title, &handler) {
                Some(_) => FRENCH_CODE.to_string(),
                None => UNDETERMINED_CODE.to_string(),
            },
        };

        let variant = classify_variant(&language, &title, &handler);

        AudioStreamDescriptor {
            position: tags.position,
            preferred: variant.is_some(),
            rank: variant.map(|v| v.rank()).unwrap_or(NON_PREFERRED_RANK),
            variant,
            language,
            discovery_order,
        }
    }

    /// Classify every stream and sort by (preferred first, rank, discovery order)
    pub fn classify(&self, streams: &[AudioStreamTags]) -> Vec<AudioStreamDescriptor> {
        let mut tracks: Vec<AudioStreamDescriptor> = streams
            .iter()
            .enumerate()
            .map(|(order, tags)| self.describe(tags, order))
            .collect();

        tracks.sort_by_key(|t| (!t.preferred, t.rank, t.discovery_order));

        for (out_idx, track) in tracks.iter().enumerate() {
            debug!(
                "audio out#{} <- 0:a:{} lang={} variant={:?}",
                out_idx, track.position, track.language, track.variant
            );
        }

        tracks
    }
}

impl Default for AudioTrackClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn positions(tracks: &[AudioStreamDescriptor]) -> Vec<usize> {
        tracks.iter().map(|t| t.position).collect()
    }

    #[test]
    fn test_keyword_patterns_compile() {
        for pattern in [
            GENERIC_FRENCH_PATTERN,
            VF_WORD_PATTERN,
            VFF_PATTERN,
            VFI_PATTERN,
            VFA_PATTERN,
            VFQ_PATTERN,
        ] {
            assert!(Regex::new(pattern).is_ok(), "{}", pattern);
        }
        assert_eq!(VARIANT_PRECEDENCE.len(), 4);
        assert!(GENERIC_FRENCH.is_match("piste française vf"));
    }

    #[test]
    fn test_language_normalization() {
        assert_eq!(normalize_language(Some("ENG")).as_deref(), Some("eng"));
        assert_eq!(normalize_language(Some("english")).as_deref(), Some("eng"));
        assert_eq!(normalize_language(Some("fra")).as_deref(), Some("fre"));
        assert_eq!(normalize_language(Some(" Français ")).as_deref(), Some("fre"));
        assert_eq!(normalize_language(Some("fr")).as_deref(), Some("fre"));
        assert_eq!(normalize_language(Some("JPN")).as_deref(), Some("jpn"));
        assert_eq!(normalize_language(Some("  ")), None);
        assert_eq!(normalize_language(None), None);
    }

    #[test]
    fn test_vff_before_vfq_before_english() {
        let streams = vec![
            AudioStreamTags::new(0).language("fr").title("VFF"),
            AudioStreamTags::new(1).language("fr").title("VFQ"),
            AudioStreamTags::new(2).language("en"),
        ];
        let tracks = AudioTrackClassifier::new().classify(&streams);

        assert_eq!(positions(&tracks), vec![0, 1, 2]);
        assert_eq!(tracks[0].rank, 0);
        assert_eq!(tracks[1].rank, 4);
        assert_eq!(tracks[2].rank, NON_PREFERRED_RANK);
        assert!(!tracks[2].preferred);
    }

    #[test]
    fn test_full_precedence_order() {
        // Discovered worst-first; must come out VFF, VFI, VF, VFA, VFQ, others
        let streams = vec![
            AudioStreamTags::new(0).language("eng").title("English 5.1"),
            AudioStreamTags::new(1).language("fre").title("VFQ"),
            AudioStreamTags::new(2).language("fre").title("VFA"),
            AudioStreamTags::new(3).language("fre").title("Stereo"),
            AudioStreamTags::new(4).language("fre").title("VFI"),
            AudioStreamTags::new(5).language("fre").title("VFF"),
        ];
        let tracks = AudioTrackClassifier::new().classify(&streams);
        assert_eq!(positions(&tracks), vec![5, 4, 3, 2, 1, 0]);
        assert_eq!(
            tracks.iter().map(|t| t.variant).collect::<Vec<_>>(),
            vec![
                Some(DubVariant::Vff),
                Some(DubVariant::Vfi),
                Some(DubVariant::Generic),
                Some(DubVariant::Vfa),
                Some(DubVariant::Vfq),
                None,
            ]
        );
    }

    #[test]
    fn test_equal_tracks_keep_discovery_order() {
        let streams = vec![
            AudioStreamTags::new(0).language("fre").title("Stereo"),
            AudioStreamTags::new(1).language("fre").title("5.1"),
        ];
        let tracks = AudioTrackClassifier::new().classify(&streams);
        assert_eq!(positions(&tracks), vec![0, 1]);
    }

    #[test]
    fn test_untagged_non_french_sorts_last() {
        let streams = vec![
            AudioStreamTags::new(0).title("Commentary"),
            AudioStreamTags::new(1).language("fre"),
        ];
        let tracks = AudioTrackClassifier::new().classify(&streams);
        assert_eq!(positions(&tracks), vec![1, 0]);
        assert_eq!(tracks[1].language, UNDETERMINED_CODE);
        assert!(!tracks[1].preferred);
    }

    #[test]
    fn test_untagged_title_marker_becomes_french() {
        let streams = vec![
            AudioStreamTags::new(0).language("eng"),
            AudioStreamTags::new(1).title("VFI AC3"),
        ];
        let tracks = AudioTrackClassifier::new().classify(&streams);
        assert_eq!(tracks[0].position, 1);
        assert_eq!(tracks[0].language, FRENCH_CODE);
        assert_eq!(tracks[0].variant, Some(DubVariant::Vfi));
    }

    #[test]
    fn test_handler_name_counts_as_marker_text() {
        let tags = AudioStreamTags::new(0).handler("French VFF");
        let track = AudioTrackClassifier::new().describe(&tags, 0);
        assert_eq!(track.language, FRENCH_CODE);
        assert_eq!(track.rank, 0);
    }

    #[test]
    fn test_markers_require_whole_words() {
        // "vff" embedded in a longer token must not count
        let tags = AudioStreamTags::new(0).language("eng").title("xvffy vfiz");
        let track = AudioTrackClassifier::new().describe(&tags, 0);
        assert!(!track.preferred);
        assert_eq!(track.rank, NON_PREFERRED_RANK);

        let tags = AudioStreamTags::new(0).language("fre").title("vfqx");
        let track = AudioTrackClassifier::new().describe(&tags, 0);
        assert_eq!(track.variant, Some(DubVariant::Generic));
    }

    #[test]
    fn test_first_marker_in_precedence_wins() {
        // Both VFF and VFQ present: VFF is checked first
        let tags = AudioStreamTags::new(0).language("fre").title("VFQ / VFF");
        let track = AudioTrackClassifier::new().describe(&tags, 0);
        assert_eq!(track.variant, Some(DubVariant::Vff));

        // VFA is checked before the Québec markers
        let tags = AudioStreamTags::new(0).title("Québec VFA");
        let track = AudioTrackClassifier::new().describe(&tags, 0);
        assert_eq!(track.variant, Some(DubVariant::Vfa));
    }

    #[test]
    fn test_quebec_spellings_and_short_region() {
        let classifier = AudioTrackClassifier::new();
        let accented = classifier.describe(&AudioStreamTags::new(0).title("Doublage Québec"), 0);
        assert_eq!(accented.variant, Some(DubVariant::Vfq));
        assert_eq!(accented.language, FRENCH_CODE);

        let short = classifier.describe(&AudioStreamTags::new(0).language("fre").title("VF (QC)"), 0);
        assert_eq!(short.variant, Some(DubVariant::Vfq));

        // Region tag without a "vf" marker stays generic
        let region_only = classifier.describe(&AudioStreamTags::new(0).language("fre").title("Stereo [qc]"), 0);
        assert_eq!(region_only.variant, Some(DubVariant::Generic));
    }

    #[test]
    fn test_english_with_french_title_is_preferred() {
        // Language tag says English but the title carries a French marker
        let tags = AudioStreamTags::new(0).language("eng").title("VF");
        let track = AudioTrackClassifier::new().describe(&tags, 0);
        assert!(track.preferred);
        assert_eq!(track.language, ENGLISH_CODE);
        assert_eq!(track.rank, 2);
    }

    fn tag_strategy() -> impl Strategy<Value = (Option<String>, Option<String>)> {
        let lang = prop_oneof![
            Just(None),
            Just(Some("fre".to_string())),
            Just(Some("fra".to_string())),
            Just(Some("eng".to_string())),
            Just(Some("jpn".to_string())),
        ];
        let title = prop_oneof![
            Just(None),
            Just(Some("VFF".to_string())),
            Just(Some("VFI".to_string())),
            Just(Some("VFA".to_string())),
            Just(Some("VFQ".to_string())),
            Just(Some("VF (QC)".to_string())),
            Just(Some("Commentary".to_string())),
            Just(Some("Stereo".to_string())),
        ];
        (lang, title)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Selection is a permutation of the probed positions
        #[test]
        fn test_selection_is_permutation(raw in prop::collection::vec(tag_strategy(), 0..8)) {
            let streams: Vec<AudioStreamTags> = raw
                .iter()
                .enumerate()
                .map(|(i, (lang, title))| AudioStreamTags {
                    position: i,
                    language: lang.clone(),
                    title: title.clone(),
                    handler: None,
                })
                .collect();

            let tracks = AudioTrackClassifier::new().classify(&streams);
            prop_assert_eq!(tracks.len(), streams.len());

            let unique: HashSet<usize> = tracks.iter().map(|t| t.position).collect();
            prop_assert_eq!(unique.len(), streams.len());
            prop_assert!(tracks.iter().all(|t| t.position < streams.len()));
        }

        /// Output is sorted by (preferred, rank) and ties keep discovery order
        #[test]
        fn test_selection_order_and_stability(raw in prop::collection::vec(tag_strategy(), 0..8)) {
            let streams: Vec<AudioStreamTags> = raw
                .iter()
                .enumerate()
                .map(|(i, (lang, title))| AudioStreamTags {
                    position: i,
                    language: lang.clone(),
                    title: title.clone(),
                    handler: None,
                })
                .collect();

            let classifier = AudioTrackClassifier::new();
            let tracks = classifier.classify(&streams);

            for pair in tracks.windows(2) {
                let a = (!pair[0].preferred, pair[0].rank, pair[0].discovery_order);
                let b = (!pair[1].preferred, pair[1].rank, pair[1].discovery_order);
                prop_assert!(a < b, "{:?} should sort before {:?}", pair[0], pair[1]);
            }
            for t in &tracks {
                prop_assert_eq!(t.preferred, t.rank != NON_PREFERRED_RANK);
            }

            // Deterministic across runs
            prop_assert_eq!(classifier.classify(&streams), tracks);
        }
    }
}
