//! Line-oriented phonemizer: text (or JSONL) on stdin, one JSON object per
//! line on stdout.
//!
//! ```text
//! $ echo 'licht!' | piper-phonemize -l de --espeak-data /usr/share
//! {"phoneme_ids":[1,0,24,0,120,0,74,0,16,0,140,0,32,0,4,0,2],"phonemes":["l","ˈ","ɪ","c","̧","t","!"],"processed_text":"licht!","text":"licht!"}
//! ```
//!
//! With `--json-input`, a line may already carry `processed_text` and/or
//! `phonemes`; those stages are then skipped.

use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    process::ExitCode,
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::{Map, Value};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use piper_phonemize::{
    ids::escape_token, Casing, CodepointsConfig, EspeakConfig, MissingPhonemes, PhonemeId,
    PhonemeType, Phonemizer, Restorer, SymbolTables, Utterance, VoiceConfig,
};

/// Phonemize text from stdin and add phoneme ids
#[derive(Debug, Parser)]
#[command(name = "piper-phonemize")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Language of the input text: espeak-ng voice, or codepoint table language
    #[arg(short, long)]
    language: Option<String>,

    /// Phonemizer to use (default: from --config, else espeak)
    #[arg(long, value_enum)]
    phoneme_type: Option<PhonemeType>,

    /// Casing applied by the text phonemizer
    #[arg(long, value_enum, default_value_t = Casing::Fold)]
    casing: Casing,

    /// Directory containing espeak-ng-data
    #[arg(long, env = "ESPEAK_DATA_PATH")]
    espeak_data: Option<PathBuf>,

    /// Path to the tashkeel ONNX model (Arabic)
    #[arg(long)]
    tashkeel_model: Option<PathBuf>,

    /// Voice config.json providing the phoneme id map
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input is JSONL instead of plain text
    #[arg(short, long)]
    json_input: bool,

    /// Don't fail when phonemes are missing from the id map
    #[arg(long)]
    allow_missing_phonemes: bool,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,
}

enum Backend {
    Espeak(EspeakConfig),
    Codepoints { config: CodepointsConfig, language: String },
}

struct Runner {
    phonemizer: Phonemizer,
    backend: Backend,
}

#[cfg(feature = "espeak")]
fn attach_espeak(phonemizer: Phonemizer, data_path: Option<PathBuf>) -> Result<Phonemizer> {
    Ok(phonemizer.with_espeak(data_path.unwrap_or_default()))
}

#[cfg(not(feature = "espeak"))]
fn attach_espeak(_phonemizer: Phonemizer, _data_path: Option<PathBuf>) -> Result<Phonemizer> {
    bail!("espeak phonemes need a build with `--features espeak`; use --phoneme-type text")
}

impl Runner {
    fn from_args(args: &Args) -> Result<Self> {
        let voice = args
            .config
            .as_deref()
            .map(VoiceConfig::from_file)
            .transpose()
            .context("Cannot load voice config")?;

        let phoneme_type = args
            .phoneme_type
            .or(voice.as_ref().map(|v| v.phoneme_type))
            .unwrap_or_default();

        let language = match (&args.language, &voice) {
            (Some(lang), _) => lang.clone(),
            (None, Some(v)) if phoneme_type == PhonemeType::Espeak => v.espeak.voice.clone(),
            (None, Some(v)) => v.language().to_string(),
            (None, None) => bail!("--language is required"),
        };

        let tables = match &voice {
            Some(v) => v.tables().context("Invalid phoneme_id_map in voice config")?,
            None => SymbolTables::shared(),
        };
        let mut phonemizer = Phonemizer::new(tables);

        let backend = match phoneme_type {
            PhonemeType::Espeak => {
                phonemizer = attach_espeak(phonemizer, args.espeak_data.clone())?;
                let mut config = EspeakConfig::new(language);
                if let Some(v) = &voice {
                    config.phoneme_map = v.espeak_config().phoneme_map.or(config.phoneme_map);
                }
                Backend::Espeak(config)
            }
            PhonemeType::Text => {
                phonemizer.tables().codepoints(&language)?;
                let config = match &voice {
                    Some(v) => v.codepoints_config(args.casing),
                    None => CodepointsConfig::with_casing(args.casing),
                };
                Backend::Codepoints { config, language }
            }
        };

        let arabic = match &backend {
            Backend::Espeak(config) => config.voice == "ar",
            Backend::Codepoints { language, .. } => language == "ar",
        };
        if arabic {
            match &args.tashkeel_model {
                Some(path) => {
                    let restorer = Restorer::load(path).context("Cannot load tashkeel model")?;
                    phonemizer = phonemizer.with_restorer(restorer);
                }
                None => warn!("--tashkeel-model is not set, so text cannot be diacritized"),
            }
        }

        Ok(Self { phonemizer, backend })
    }

    fn phonemize(&self, text: &str) -> Result<Utterance> {
        Ok(match &self.backend {
            Backend::Espeak(config) => self.phonemizer.phonemize_linguistic(text, config)?,
            Backend::Codepoints { config, .. } => self.phonemizer.phonemize_codepoints(text, config),
        })
    }

    fn encode(&self, utterance: &Utterance, missing: &mut MissingPhonemes) -> Result<Vec<PhonemeId>> {
        let sentences = match &self.backend {
            Backend::Espeak(_) => self.phonemizer.encode_utterance_linguistic(utterance, missing),
            Backend::Codepoints { language, .. } => {
                self.phonemizer.encode_utterance_codepoints(utterance, language, missing)?
            }
        };
        Ok(sentences.concat())
    }

    /// Fill in whatever `processed_text`, `phonemes` and `phoneme_ids` the
    /// line does not already carry.
    fn process(&self, mut obj: Map<String, Value>, missing: &mut MissingPhonemes) -> Result<Value> {
        let text = obj
            .get("text")
            .and_then(Value::as_str)
            .context("input line has no \"text\" string")?
            .to_string();

        let processed = match obj.get("processed_text").and_then(Value::as_str) {
            Some(p) => p.to_string(),
            None => {
                let p = if self.phonemizer.has_restorer() {
                    self.phonemizer.restore_diacritics(&text)?
                } else {
                    text
                };
                obj.insert("processed_text".into(), Value::from(p.clone()));
                p
            }
        };

        let utterance: Utterance = match obj.get("phonemes") {
            Some(given) => vec![serde_json::from_value(given.clone())
                .context("\"phonemes\" must be an array of strings")?],
            None => {
                let utterance = self.phonemize(&processed)?;
                obj.insert("phonemes".into(), Value::from(utterance.concat()));
                utterance
            }
        };

        if !obj.contains_key("phoneme_ids") {
            let ids = self.encode(&utterance, missing)?;
            obj.insert("phoneme_ids".into(), Value::from(ids));
        }

        Ok(Value::Object(obj))
    }
}

/// One line per missing token, naming the output line it came from.
fn missing_report(missing: &MissingPhonemes, out: &Value) -> Vec<String> {
    missing
        .iter()
        .map(|(token, _)| format!("Missing phoneme: {} for: {out}", escape_token(token)))
        .collect()
}

/// End-of-run summary for `--allow-missing-phonemes`.
fn missing_summary(missing: &MissingPhonemes) -> Vec<String> {
    let mut lines = vec![format!("WARNING: There were {} missing phonemes:", missing.len())];
    lines.extend(
        missing
            .iter()
            .map(|(token, count)| format!("{} (count={count})", escape_token(token))),
    );
    lines
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .compact()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let runner = Runner::from_args(&args)?;
    info!(version = env!("CARGO_PKG_VERSION"), "piper-phonemize ready");

    let mut missing = MissingPhonemes::new();
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();

    for (n, line) in stdin.lock().lines().enumerate() {
        let line = line.context("Cannot read stdin")?;
        let obj = if args.json_input {
            serde_json::from_str::<Map<String, Value>>(&line)
                .with_context(|| format!("line {}: not a JSON object", n + 1))?
        } else {
            let mut obj = Map::new();
            obj.insert("text".into(), Value::from(line));
            obj
        };

        let out = runner.process(obj, &mut missing).with_context(|| format!("line {}", n + 1))?;

        if !missing.is_empty() && !args.allow_missing_phonemes {
            for line in missing_report(&missing, &out) {
                eprintln!("{line}");
            }
            return Ok(ExitCode::FAILURE);
        }

        writeln!(stdout, "{out}")?;
    }
    stdout.flush()?;

    if !missing.is_empty() {
        for line in missing_summary(&missing) {
            eprintln!("{line}");
        }
    }

    Ok(ExitCode::SUCCESS)
}

// ─── Tests ────────────────────────────────────────────────────────────────────
