//! Kokoro voice catalogue.
//!
//! Voice names follow `{language prefix}{gender}_{name}`; the prefix decides which
//! lexicon files or espeak language the local engine needs.

/// Metadata for one Kokoro v1.0 voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Voice {
    pub name: &'static str,
    pub speaker_id: i32,
    pub espeak_code: &'static str,
    pub language: &'static str,
}

const fn voice(name: &'static str, speaker_id: i32, espeak_code: &'static str, language: &'static str) -> Voice {
    Voice { name, speaker_id, espeak_code, language }
}

/// Sorted by name for binary search.
const VOICES: &[Voice] = &[
    voice("af_alloy", 0, "en-us", "American English"),
    voice("af_aoede", 1, "en-us", "American English"),
    voice("af_bella", 2, "en-us", "American English"),
    voice("af_heart", 3, "en-us", "American English"),
    voice("af_jessica", 4, "en-us", "American English"),
    voice("af_kore", 5, "en-us", "American English"),
    voice("af_nicole", 6, "en-us", "American English"),
    voice("af_nova", 7, "en-us", "American English"),
    voice("af_river", 8, "en-us", "American English"),
    voice("af_sarah", 9, "en-us", "American English"),
    voice("af_sky", 10, "en-us", "American English"),
    voice("am_adam", 11, "en-us", "American English"),
    voice("am_echo", 12, "en-us", "American English"),
    voice("am_eric", 13, "en-us", "American English"),
    voice("am_fenrir", 14, "en-us", "American English"),
    voice("am_liam", 15, "en-us", "American English"),
    voice("am_michael", 16, "en-us", "American English"),
    voice("am_onyx", 17, "en-us", "American English"),
    voice("am_puck", 18, "en-us", "American English"),
    voice("am_santa", 19, "en-us", "American English"),
    voice("bf_alice", 20, "en-gb", "British English"),
    voice("bf_emma", 21, "en-gb", "British English"),
    voice("bf_isabella", 22, "en-gb", "British English"),
    voice("bf_lily", 23, "en-gb", "British English"),
    voice("bm_daniel", 24, "en-gb", "British English"),
    voice("bm_fable", 25, "en-gb", "British English"),
    voice("bm_george", 26, "en-gb", "British English"),
    voice("bm_lewis", 27, "en-gb", "British English"),
    voice("ef_dora", 28, "es", "Spanish"),
    voice("em_alex", 29, "es", "Spanish"),
    voice("ff_siwis", 30, "fr-fr", "French"),
    voice("hf_alpha", 31, "hi", "Hindi"),
    voice("hf_beta", 32, "hi", "Hindi"),
    voice("hm_omega", 33, "hi", "Hindi"),
    voice("hm_psi", 34, "hi", "Hindi"),
    voice("if_sara", 35, "it", "Italian"),
    voice("im_nicola", 36, "it", "Italian"),
    voice("jf_alpha", 37, "ja", "Japanese"),
    voice("jf_gongitsune", 38, "ja", "Japanese"),
    voice("jf_nezumi", 39, "ja", "Japanese"),
    voice("jf_tebukuro", 40, "ja", "Japanese"),
    voice("jm_kumo", 41, "ja", "Japanese"),
    voice("pf_dora", 42, "pt-br", "Portuguese BR"),
    voice("pm_alex", 43, "pt-br", "Portuguese BR"),
    voice("pm_santa", 44, "pt-br", "Portuguese BR"),
    voice("zf_xiaobei", 45, "cmn", "Mandarin Chinese"),
    voice("zf_xiaoni", 46, "cmn", "Mandarin Chinese"),
    voice("zf_xiaoxiao", 47, "cmn", "Mandarin Chinese"),
    voice("zf_xiaoyi", 48, "cmn", "Mandarin Chinese"),
    voice("zm_yunjian", 49, "cmn", "Mandarin Chinese"),
    voice("zm_yunxi", 50, "cmn", "Mandarin Chinese"),
    voice("zm_yunxia", 51, "cmn", "Mandarin Chinese"),
    voice("zm_yunyang", 52, "cmn", "Mandarin Chinese"),
];

/// Languages in catalogue display order.
const LANGUAGES: &[&str] = &[
    "American English",
    "British English",
    "Spanish",
    "French",
    "Hindi",
    "Italian",
    "Japanese",
    "Portuguese BR",
    "Mandarin Chinese",
];

impl Voice {
    fn prefix(&self) -> &'static str {
        self.name.get(..2).unwrap_or("")
    }

    /// Lexicon files (relative to the model directory) used for this voice.
    /// Empty for languages that go through espeak-ng instead.
    pub fn lexicon_files(&self) -> &'static [&'static str] {
        match self.prefix() {
            "af" | "am" => &["lexicon-us-en.txt"],
            "bf" | "bm" => &["lexicon-gb-en.txt"],
            // Chinese with English fallback
            "zf" | "zm" => &["lexicon-us-en.txt", "lexicon-zh.txt"],
            _ => &[],
        }
    }

    /// Language code for voices without a lexicon; empty otherwise.
    pub fn lang(&self) -> &'static str {
        match self.prefix() {
            "ef" | "em" => "es",
            "ff" => "fr",
            "hf" | "hm" => "hi",
            "if" | "im" => "it",
            "jf" | "jm" => "ja",
            "pf" | "pm" => "pt-br",
            _ => "",
        }
    }
}

/// Look up a voice by name.
pub fn get_voice(name: &str) -> Option<&'static Voice> {
    VOICES.binary_search_by_key(&name, |v| v.name).ok().map(|idx| &VOICES[idx])
}

/// Print the catalogue grouped by language.
pub fn print_voices() {
    println!("═══════════════════════════════════════════════════════════════════");
    println!("  Kokoro TTS v1.0 - {} Voices Across {} Languages", VOICES.len(), LANGUAGES.len());
    println!("═══════════════════════════════════════════════════════════════════");

    for lang in LANGUAGES {
        let mut lang_voices: Vec<_> = VOICES.iter().filter(|v| v.language == *lang).collect();
        lang_voices.sort_by_key(|v| v.speaker_id);

        println!("\n── {} ({} voices) ──", lang, lang_voices.len());
        println!("{:<15} {:<4} ESPEAK", "VOICE", "ID");
        println!("{}", "─".repeat(50));
        for v in lang_voices {
            println!("{:<15} {:<4} {}", v.name, v.speaker_id, v.espeak_code);
        }
    }

    println!("\n{}\n", "─".repeat(70));
    println!("Usage (local engine):");
    println!("  narrator --text chapter.md --voice af_bella");
    println!("  narrator --text chapter.md --voice bf_emma --rate 0.95");
}

/// Print details for one voice.
///
/// # Errors
/// Returns an error if the voice is not in the catalogue.
pub fn print_voice_info(name: &str) -> anyhow::Result<()> {
    let voice = get_voice(name).ok_or_else(|| anyhow::anyhow!("Voice '{}' not found. Run with --list-voices to see available voices", name))?;

    println!();
    println!("Voice: {}", voice.name);
    println!("{}", "─".repeat(40));
    println!("Speaker ID:    {}", voice.speaker_id);
    println!("Language:      {}", voice.language);
    println!("espeak code:   {}", voice.espeak_code);
    if voice.lexicon_files().is_empty() {
        println!("Lexicon:       none (espeak-ng lang '{}')", voice.lang());
    } else {
        println!("Lexicon:       {}", voice.lexicon_files().join(", "));
    }
    println!();

    Ok(())
}
