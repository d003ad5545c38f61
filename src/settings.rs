use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;
use crate::recognition::RecognitionConfig;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

const ENV_API_ENDPOINT: &str = "API_ENDPOINT";
const ENV_PROCESSOR_NAME: &str = "PROCESSOR_NAME";
const ENV_ACCESS_TOKEN: &str = "DOCUMENT_AI_ACCESS_TOKEN";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_endpoint: Option<String>,
    pub processor_name: Option<String>,
    pub access_token: Option<String>,
    pub invisible_font: Option<PathBuf>,
    pub visible_font: Option<PathBuf>,
    pub default_dpi: f64,
    pub debug_image_opacity: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_endpoint: None,
            processor_name: None,
            access_token: None,
            invisible_font: None,
            visible_font: None,
            default_dpi: 300.0,
            debug_image_opacity: 0.3,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    recognition: Option<RecognitionSettings>,
    fonts: Option<FontSettings>,
    render: Option<RenderSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct RecognitionSettings {
    endpoint: Option<String>,
    processor: Option<String>,
    access_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FontSettings {
    invisible: Option<String>,
    visible: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RenderSettings {
    default_dpi: Option<f64>,
    debug_image_opacity: Option<f64>,
}

/// Loads the built-in defaults, then `./settings.toml`,
/// `./settings.local.toml`, `~/.ocr-text-layer/settings.toml`,
/// `~/.ocr-text-layer/settings.local.toml` and finally `extra_path`, each
/// overriding the previous. Environment variables win over all files.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    let defaults: SettingsFile =
        toml::from_str(DEFAULT_SETTINGS_TOML).with_context(|| "failed to parse built-in settings")?;
    settings.merge(defaults);

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(home) = paths::settings_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    settings.apply_env(|key| std::env::var(key).ok());
    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(recognition) = incoming.recognition {
            merge_text(&mut self.api_endpoint, recognition.endpoint);
            merge_text(&mut self.processor_name, recognition.processor);
            merge_text(&mut self.access_token, recognition.access_token);
        }
        if let Some(fonts) = incoming.fonts {
            merge_path(&mut self.invisible_font, fonts.invisible);
            merge_path(&mut self.visible_font, fonts.visible);
        }
        if let Some(render) = incoming.render {
            if let Some(dpi) = render.default_dpi
                && dpi > 0.0
            {
                self.default_dpi = dpi;
            }
            if let Some(opacity) = render.debug_image_opacity
                && (0.0..=1.0).contains(&opacity)
            {
                self.debug_image_opacity = opacity;
            }
        }
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        merge_text(&mut self.api_endpoint, lookup(ENV_API_ENDPOINT));
        merge_text(&mut self.processor_name, lookup(ENV_PROCESSOR_NAME));
        merge_text(&mut self.access_token, lookup(ENV_ACCESS_TOKEN));
    }

    pub fn recognition_config(&self) -> RecognitionConfig {
        RecognitionConfig {
            api_endpoint: self.api_endpoint.clone().unwrap_or_default(),
            processor_name: self.processor_name.clone().unwrap_or_default(),
            access_token: self.access_token.clone(),
        }
    }
}

fn merge_text(slot: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value
        && !value.trim().is_empty()
    {
        *slot = Some(value.trim().to_string());
    }
}

fn merge_path(slot: &mut Option<PathBuf>, value: Option<String>) {
    if let Some(value) = value
        && !value.trim().is_empty()
    {
        *slot = Some(paths::expand_tilde(&value));
    }
}
