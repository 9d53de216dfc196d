//! JSON serialization types for VGM data

use super::commands::VgmCommand;
use super::gd3::Gd3Tag;
use super::reader::{ChipInfo, VgmHeader};
use serde::Serialize;
use std::collections::HashMap;

/// Top-level JSON structure for a VGM file
#[derive(Debug, Clone, Serialize)]
pub struct VgmJson {
    /// VGM version as a string (e.g., "1.51")
    pub version: String,
    /// Header information
    pub header: VgmHeaderJson,
    /// GD3 metadata (if present)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gd3: Option<Gd3Json>,
    /// VGM commands
    pub commands: Vec<VgmCommand>,
}

/// JSON representation of VGM header
#[derive(Debug, Clone, Serialize)]
pub struct VgmHeaderJson {
    /// Total samples in the file
    pub total_samples: u32,
    /// Loop offset (if looping)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_offset: Option<u32>,
    /// Number of samples in the loop
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_samples: Option<u32>,
    /// Playback rate (Hz)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<u32>,
    /// Sound chips used in this file
    pub chips: HashMap<String, ChipJson>,
}

/// JSON representation of chip information
#[derive(Debug, Clone, Serialize)]
pub struct ChipJson {
    /// Clock frequency in Hz
    pub clock: u32,
    /// Whether this is a dual-chip configuration
    #[serde(skip_serializing_if = "is_false")]
    pub dual: bool,
}

/// JSON representation of GD3 metadata
#[derive(Debug, Clone, Serialize)]
pub struct Gd3Json {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title_jp: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub game: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub game_jp: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub system: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub system_jp: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub composer: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub composer_jp: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub date: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub converter: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub notes: String,
}

fn is_false(v: &bool) -> bool {
    !v
}

impl VgmJson {
    pub fn new(header: &VgmHeader, gd3: Option<&Gd3Tag>, commands: Vec<VgmCommand>) -> Self {
        Self {
            version: format!(
                "{}.{:02x}",
                header.version >> 8,
                header.version & 0xFF
            ),
            header: VgmHeaderJson {
                total_samples: header.total_samples,
                loop_offset: nonzero(header.loop_offset),
                loop_samples: nonzero(header.loop_samples),
                rate: nonzero(header.rate),
                chips: header
                    .chips
                    .iter()
                    .map(|(name, info)| (name.clone(), ChipJson::from(info)))
                    .collect(),
            },
            gd3: gd3.map(Gd3Json::from),
            commands,
        }
    }
}

impl From<&ChipInfo> for ChipJson {
    fn from(info: &ChipInfo) -> Self {
        Self {
            clock: info.clock,
            dual: info.dual,
        }
    }
}

impl From<&Gd3Tag> for Gd3Json {
    fn from(tag: &Gd3Tag) -> Self {
        Self {
            title: tag.title_en.clone(),
            title_jp: tag.title_jp.clone(),
            game: tag.game_en.clone(),
            game_jp: tag.game_jp.clone(),
            system: tag.system_en.clone(),
            system_jp: tag.system_jp.clone(),
            composer: tag.composer_en.clone(),
            composer_jp: tag.composer_jp.clone(),
            date: tag.date.clone(),
            converter: tag.converter.clone(),
            notes: tag.notes.clone(),
        }
    }
}

fn nonzero(v: u32) -> Option<u32> {
    if v == 0 {
        None
    } else {
        Some(v)
    }
}
