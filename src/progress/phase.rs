//! phase.rs
//!
//! Classification of the raw status value the service reports for one video,
//! and the single transition function driving the upload progress.
//!
//! Raw value → phase:
//! - absent / empty           → NotStarted
//! - "<n>%" (n != 100)         → Uploading(n)   (leading integer, clamped to 100)
//! - "100%"                    → GeneratingContent
//! - "Finished"                → Finished       (terminal)
//! - "Failed"                  → Failed         (terminal)
//! - anything else             → unrecognised, state kept
//!
//! Terminal phases absorb every later input, so their side effects fire once.

use std::fmt::{Display, Formatter};

pub const STATUS_FINISHED: &str = "Finished";
pub const STATUS_FAILED: &str = "Failed";
pub const STATUS_GENERATING: &str = "100%";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    NotStarted,
    Uploading(u8),
    GeneratingContent,
    Finished,
    Failed,
}

/// Side effects the owner of a poller has to carry out after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Upload has made progress but is not done (`finished = false`).
    NotifyProgressing,
    /// Upload is done (`finished = true`).
    NotifyFinished,
    /// Ask the service to drop the finished task's record.
    ExcludeRecord,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: Phase,
    pub effects: Vec<Effect>,
}

impl Phase {
    /// Maps a raw status value to a phase. `None` means the value is not
    /// part of the protocol.
    pub fn classify(raw: Option<&str>) -> Option<Phase> {
        let raw = match raw.map(str::trim) {
            None | Some("") => return Some(Phase::NotStarted),
            Some(s) => s,
        };

        match raw {
            STATUS_FINISHED => Some(Phase::Finished),
            STATUS_FAILED => Some(Phase::Failed),
            STATUS_GENERATING => Some(Phase::GeneratingContent),
            _ => parse_percent(raw).map(Phase::Uploading),
        }
    }

    /// Computes the next phase for a freshly observed raw value.
    pub fn advance(self, raw: Option<&str>) -> Transition {
        if self.is_terminal() {
            return Transition {
                next: self,
                effects: Vec::new(),
            };
        }

        let Some(next) = Phase::classify(raw) else {
            return Transition {
                next: self,
                effects: Vec::new(),
            };
        };

        let effects = match next {
            Phase::Uploading(p) if p > 0 => vec![Effect::NotifyProgressing],
            Phase::Finished => vec![Effect::NotifyFinished, Effect::ExcludeRecord],
            _ => Vec::new(),
        };

        Transition { next, effects }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Finished | Phase::Failed)
    }

    pub fn percent(&self) -> u8 {
        match self {
            Phase::NotStarted | Phase::Failed => 0,
            Phase::Uploading(p) => *p,
            Phase::GeneratingContent | Phase::Finished => 100,
        }
    }

    /// Whether the percentage bar is the right widget for this phase.
    pub fn shows_bar(&self) -> bool {
        matches!(self, Phase::Uploading(_) | Phase::GeneratingContent)
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::NotStarted => write!(f, "not started"),
            Phase::Uploading(p) => write!(f, "uploading {p}%"),
            Phase::GeneratingContent => write!(f, "generating content"),
            Phase::Finished => write!(f, "finished"),
            Phase::Failed => write!(f, "failed"),
        }
    }
}

/// Leading integer of a `"<n>%"` value, clamped to 100. Anything after the
/// leading digits is ignored, so `"4.5%"` reads as 4.
fn parse_percent(raw: &str) -> Option<u8> {
    let number = raw.strip_suffix('%')?.trim_start();
    let end = number
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(number.len());
    let digits = &number[..end];
    if digits.is_empty() {
        return None;
    }
    // long digit runs overflow u64 but are still "more than 100"
    let value = digits.parse::<u64>().unwrap_or(u64::MAX);
    Some(value.min(100) as u8)
}
