//! TMATS setup record decoding.
//!
//! A recording opens with a TMATS packet describing the channel
//! configuration as ASCII `CODE:value;` attribute records.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::le_u32;
use crate::{Error, Result};

/// Channel specific data word for a TMATS packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsdwTmats {
    pub raw: u32,
}

impl CsdwTmats {
    /// Chapter 10 release the recorder wrote against.
    #[must_use]
    pub fn ch10_version(&self) -> u8 {
        (self.raw & 0xff) as u8
    }

    /// Setup differs from the previous recording on this recorder.
    #[must_use]
    pub fn config_change(&self) -> bool {
        self.raw & (1 << 8) != 0
    }

    /// 0 for ASCII, 1 for XML.
    #[must_use]
    pub fn format(&self) -> u8 {
        ((self.raw >> 9) & 0x1) as u8
    }

    /// Human readable release label for [`Self::ch10_version`].
    #[must_use]
    pub fn version_label(&self) -> &'static str {
        match self.ch10_version() {
            0 => "106-05 or earlier",
            7 => "106-07",
            8 => "106-09",
            9 => "106-11",
            10 => "106-13",
            11 => "106-15",
            12 => "106-17",
            13 => "106-19",
            _ => "Unknown",
        }
    }
}

/// One data source named by the G record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    pub name: String,
    pub kind: String,
}

/// One point of contact named by the G record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointOfContact {
    pub name: String,
    pub agency: String,
    pub address: String,
    pub telephone: String,
}

/// A decoded TMATS setup record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tmats {
    pub csdw: CsdwTmats,
    text: String,
    attrs: HashMap<String, String>,
}

impl Tmats {
    /// Decode a TMATS packet body. Malformed records (no colon separator)
    /// are skipped with a warning; an absent attribute is not an error at
    /// this layer, so decoding succeeds even for an empty body.
    ///
    /// # Errors
    /// [`Error::NotEnoughData`] if the payload is shorter than the channel
    /// specific word.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let Some(raw) = le_u32(payload, 0) else {
            return Err(Error::NotEnoughData {
                actual: payload.len(),
                minimum: 4,
            });
        };
        let csdw = CsdwTmats { raw };
        let text = String::from_utf8_lossy(&payload[4..]).into_owned();

        let mut attrs = HashMap::new();
        for record in text.split(';') {
            let record = record.trim_matches(|c: char| c.is_whitespace() || c == '\0');
            if record.is_empty() {
                continue;
            }
            match record.split_once(':') {
                Some((code, value)) => {
                    attrs.insert(code.trim().to_string(), value.to_string());
                }
                None => warn!(record, "TMATS record without separator"),
            }
        }
        Ok(Tmats { csdw, text, attrs })
    }

    /// Look up an attribute by code, e.g. `G\PN`. Returns the empty string
    /// when the attribute is absent; absence is ordinary in TMATS, not an
    /// error.
    #[must_use]
    pub fn find(&self, code: &str) -> &str {
        self.attrs.get(code).map_or("", String::as_str)
    }

    /// The raw setup record text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    fn counted(&self, code: &str) -> usize {
        self.find(code).trim().parse().unwrap_or(0)
    }

    #[must_use]
    pub fn program_name(&self) -> &str {
        self.find("G\\PN")
    }

    #[must_use]
    pub fn test_item(&self) -> &str {
        self.find("G\\TA")
    }

    /// IRIG 106 revision declared in the setup record, e.g. `09`.
    #[must_use]
    pub fn irig_revision(&self) -> &str {
        self.find("G\\106")
    }

    #[must_use]
    pub fn origination_date(&self) -> &str {
        self.find("G\\OD")
    }

    #[must_use]
    pub fn classification(&self) -> &str {
        self.find("G\\SC")
    }

    /// Data sources enumerated by the G record. The declared count
    /// (`G\DSI\N`) governs; entries with missing attributes come back with
    /// empty fields.
    #[must_use]
    pub fn data_sources(&self) -> Vec<DataSource> {
        (1..=self.counted("G\\DSI\\N"))
            .map(|n| DataSource {
                name: self.find(&format!("G\\DSI-{n}")).to_string(),
                kind: self.find(&format!("G\\DST-{n}")).to_string(),
            })
            .collect()
    }

    /// Points of contact enumerated by the G record (`G\POC\N`).
    #[must_use]
    pub fn points_of_contact(&self) -> Vec<PointOfContact> {
        (1..=self.counted("G\\POC\\N"))
            .map(|n| PointOfContact {
                name: self.find(&format!("G\\POC1-{n}")).to_string(),
                agency: self.find(&format!("G\\POC2-{n}")).to_string(),
                address: self.find(&format!("G\\POC3-{n}")).to_string(),
                telephone: self.find(&format!("G\\POC4-{n}")).to_string(),
            })
            .collect()
    }

    /// Number of parsed attribute records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}
