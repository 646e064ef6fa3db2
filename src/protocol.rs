//! Serial frame codec
//!
//! Commands are ASCII frames of the form `*Z0{zone}{body}\r`. Replies to a
//! status query are either `#Z0{zone}PWROFF` or
//! `#Z0{zone}PWRON,SRC{source},GRP{group},VOL-{token},POFF`.

use crate::types::{SourceId, ZoneId, ZoneStatus, MAX_VOLUME};
use regex::Regex;
use std::sync::LazyLock;

/// Frame terminator, used both for writing and as the read delimiter
pub const EOL: &[u8] = b"\r";

/// Length of one terminator unit
pub const LEN_EOL: usize = EOL.len();

/// Volume tokens the amplifier reports in place of a level while muted
pub const MUTE_SENTINELS: [&str; 2] = ["MT", "XM"];

static ZONE_PATTERN_OFF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#Z0(\d)PWROFF").expect("valid regex"));

static ZONE_PATTERN_ON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#Z0(\d)PWRON,SRC(\d),GRP(\d),VOL-(\w\w),POFF").expect("valid regex")
});

/// A command addressed to one zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Query the zone status (`CONSR`)
    Status,
    /// Power the zone on or off
    Power(bool),
    /// Mute or unmute the zone
    Mute(bool),
    /// Volume on the native 0..78 scale
    Volume(u8),
    /// Source id, 0..6
    Source(SourceId),
}

impl Command {
    /// Volume command from a percentage, clamped to 0..100
    pub fn volume_percent(percent: i32) -> Self {
        Command::Volume(percent_to_native(percent))
    }

    /// Source command, clamped to 0..6
    pub fn source(source: i32) -> Self {
        Command::Source(source.clamp(0, 6) as SourceId)
    }

    /// Encode the command for a zone into a terminated frame
    pub fn encode(&self, zone: ZoneId) -> Vec<u8> {
        let body = match self {
            Command::Status => "CONSR".to_string(),
            Command::Power(true) => "ON".to_string(),
            Command::Power(false) => "OFF".to_string(),
            Command::Mute(true) => "MTON".to_string(),
            Command::Mute(false) => "MTOFF".to_string(),
            Command::Volume(native) => format!("VOL{:02}", (*native).min(MAX_VOLUME)),
            Command::Source(source) => format!("SRC{}", (*source).min(6)),
        };

        let mut frame = format!("*Z0{}{}", zone, body).into_bytes();
        frame.extend_from_slice(EOL);
        frame
    }

    /// Commands that bring a zone back to a captured status, in replay order
    ///
    /// Power, mute, volume, then source. Tone controls have no encoding and
    /// are not part of the replay.
    pub fn restore_sequence(status: &ZoneStatus) -> [Command; 4] {
        [
            Command::Power(status.power),
            Command::Mute(status.mute),
            Command::volume_percent(status.volume_percent()),
            Command::source(i32::from(status.source)),
        ]
    }

    /// Number of leading reply bytes to read before honouring a terminator
    pub fn skip(&self) -> usize {
        match self {
            Command::Status => LEN_EOL,
            _ => 0,
        }
    }
}

/// Convert a percentage (clamped to 0..100) to the native 0..78 scale
pub fn percent_to_native(percent: i32) -> u8 {
    let percent = percent.clamp(0, 100) as f64;
    (percent / 100.0 * MAX_VOLUME as f64).round() as u8
}

/// Convert a native 0..78 volume to a percentage
pub fn native_to_percent(native: u8) -> f64 {
    native.min(MAX_VOLUME) as f64 / MAX_VOLUME as f64 * 100.0
}

pub fn encode_status_request(zone: ZoneId) -> Vec<u8> {
    Command::Status.encode(zone)
}

pub fn encode_power(zone: ZoneId, power: bool) -> Vec<u8> {
    Command::Power(power).encode(zone)
}

pub fn encode_mute(zone: ZoneId, mute: bool) -> Vec<u8> {
    Command::Mute(mute).encode(zone)
}

/// Encode a volume command from a percentage; out of range values are clamped
pub fn encode_volume(zone: ZoneId, percent: i32) -> Vec<u8> {
    Command::volume_percent(percent).encode(zone)
}

/// Encode a source command; out of range values are clamped to 0..6
pub fn encode_source(zone: ZoneId, source: i32) -> Vec<u8> {
    Command::source(source).encode(zone)
}

/// Volume field of a power-on report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeToken {
    /// Native volume, 0..78
    Level(u8),
    /// One of the mute sentinels
    Muted,
}

impl VolumeToken {
    fn parse(token: &str) -> Option<Self> {
        if MUTE_SENTINELS.contains(&token) {
            return Some(VolumeToken::Muted);
        }
        token
            .parse::<u8>()
            .ok()
            .map(|level| VolumeToken::Level(level.min(MAX_VOLUME)))
    }
}

/// A decoded status reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// `#Z0{zone}PWROFF`
    Off { zone: ZoneId },
    /// `#Z0{zone}PWRON,SRC{source},GRP{group},VOL-{token},POFF`
    On {
        zone: ZoneId,
        source: SourceId,
        group: u8,
        volume: VolumeToken,
    },
}

impl Reply {
    /// Match a reply against the known shapes
    ///
    /// The terminator may be present or stripped. Returns `None` when the text
    /// matches neither shape.
    pub fn parse(text: &str) -> Option<Self> {
        if let Some(caps) = ZONE_PATTERN_OFF.captures(text) {
            let zone = digit(&caps[1])?;
            return Some(Reply::Off { zone });
        }

        let caps = ZONE_PATTERN_ON.captures(text)?;
        Some(Reply::On {
            zone: digit(&caps[1])?,
            source: digit(&caps[2])?,
            group: digit(&caps[3])?,
            volume: VolumeToken::parse(&caps[4])?,
        })
    }

    /// Zone the reply refers to
    pub fn zone(&self) -> ZoneId {
        match self {
            Reply::Off { zone } | Reply::On { zone, .. } => *zone,
        }
    }
}

impl From<Reply> for ZoneStatus {
    fn from(reply: Reply) -> Self {
        match reply {
            // The amplifier does not report a source while off
            Reply::Off { zone } => ZoneStatus {
                zone,
                power: false,
                mute: false,
                volume: 0.0,
                source: 1,
            },
            Reply::On {
                zone,
                source,
                volume: VolumeToken::Muted,
                ..
            } => ZoneStatus {
                zone,
                power: true,
                mute: true,
                volume: 0.0,
                source,
            },
            Reply::On {
                zone,
                source,
                volume: VolumeToken::Level(native),
                ..
            } => ZoneStatus {
                zone,
                power: true,
                mute: false,
                volume: native_to_percent(native),
                source,
            },
        }
    }
}

/// Decode a status reply, or `None` if the text is not a status report
pub fn decode_status(text: &str) -> Option<ZoneStatus> {
    let status = Reply::parse(text).map(ZoneStatus::from);
    if status.is_none() && !text.is_empty() {
        tracing::debug!("Unrecognised status reply: {:?}", text);
    }
    status
}

fn digit(text: &str) -> Option<u8> {
    text.parse().ok()
}
