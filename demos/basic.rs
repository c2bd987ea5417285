//! Basic piper-phonemize demo: codepoint phonemes, ids, and optional tashkeel.
//!
//! Usage:
//!   cargo run --example basic
//!   cargo run --example basic -- --text "Привіт" --language uk
//!   cargo run --example basic -- --text "مرحبا" --tashkeel-repo ORG/REPO
//!
//! The tashkeel model is downloaded from the HuggingFace Hub on first use and
//! cached afterwards.

use piper_phonemize::{ids::escape_token, CodepointsConfig, MissingPhonemes, Phonemizer};

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);

    let mut text = "ВЕСЕ́ЛКА".to_string();
    let mut language = "uk".to_string();
    let mut tashkeel_repo: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--text"          => { if let Some(v) = args.next() { text = v; } }
            "--language"      => { if let Some(v) = args.next() { language = v; } }
            "--tashkeel-repo" => { tashkeel_repo = args.next(); }
            "--help" => {
                println!("Usage: basic [--text TEXT] [--language LANG] [--tashkeel-repo REPO_ID]");
                return Ok(());
            }
            _ => {}
        }
    }

    let mut phonemizer = Phonemizer::default();
    println!(
        "Codepoint languages: {:?}",
        phonemizer.tables().codepoint_languages().collect::<Vec<_>>()
    );

    if let Some(repo) = &tashkeel_repo {
        println!("Downloading tashkeel model from {repo}…");
        let restorer = piper_phonemize::download::load_restorer_from_hub(repo, None)?;
        phonemizer = phonemizer.with_restorer(restorer);
        text = phonemizer.restore_diacritics(&text)?;
        println!("Diacritized : {text}");
    }

    let utterance = phonemizer.phonemize_codepoints(&text, &CodepointsConfig::default());
    let mut missing = MissingPhonemes::new();
    let ids = phonemizer.encode_utterance_codepoints(&utterance, &language, &mut missing)?;

    println!("Text        : {text:?}");
    println!("Phonemes    : {:?}", utterance);
    println!("Phoneme ids : {:?}", ids);
    for (token, count) in missing.iter() {
        println!("Missing     : {} (count={count})", escape_token(token));
    }
    Ok(())
}
