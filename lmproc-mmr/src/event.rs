//! mMR list-mode record types.
//!
//! Records are 32-bit little-endian words. The kind is given by the top
//! bits of the word:
//!
//! | top bits | kind               | payload                                   |
//! |----------|--------------------|-------------------------------------------|
//! | `0p`     | coincidence        | bit 30 prompt flag, bits 0..=29 LOR code  |
//! | `100`    | time tag           | bits 0..=28 increment in ms               |
//! | `1010`   | bucket singles     | bits 19..=27 bucket, bits 0..=18 delta    |
//! | `1100`   | gantry position    | bits 0..=27                               |
//! | `1110`   | patient monitoring | bits 0..=27                               |
//! | `1111`   | control            | bits 0..=27                               |

/// Bytes per record.
pub const WORD_SIZE: usize = 4;

const EVENT_FLAG: u32 = 0x8000_0000;
const PROMPT_FLAG: u32 = 0x4000_0000;
const LOR_MASK: u32 = 0x3FFF_FFFF;

const TIME_TAG_SELECT: u32 = 0xE000_0000;
const TIME_TAG_BITS: u32 = 0x8000_0000;
const TIME_TAG_MASK: u32 = 0x1FFF_FFFF;

const BUCKET_NIBBLE: u32 = 0xA;
const BUCKET_SHIFT: u32 = 19;
const BUCKET_MASK: u32 = 0x1FF;
const DELTA_MASK: u32 = 0x7_FFFF;

const GANTRY_NIBBLE: u32 = 0xC;
const MONITOR_NIBBLE: u32 = 0xE;
const CONTROL_NIBBLE: u32 = 0xF;
const TAG_PAYLOAD_MASK: u32 = 0x0FFF_FFFF;

/// Record kinds, as read from the tag bits alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Prompt coincidence.
    Prompt,
    /// Delayed (randoms) coincidence.
    Delayed,
    /// Elapsed-time marker.
    TimeTag,
    /// Bucket singles rate.
    Bucket,
    /// Gantry position tag.
    Gantry,
    /// Patient monitoring (gating, motion) tag.
    PatientMonitor,
    /// Acquisition control tag.
    Control,
}

impl EventKind {
    /// Classify a raw word by its tag bits.
    ///
    /// Returns `None` for the unassigned patterns `1011` and `1101`.
    #[inline]
    #[must_use]
    pub fn classify(word: u32) -> Option<Self> {
        if word & EVENT_FLAG == 0 {
            return Some(if word & PROMPT_FLAG != 0 {
                EventKind::Prompt
            } else {
                EventKind::Delayed
            });
        }
        if word & TIME_TAG_SELECT == TIME_TAG_BITS {
            return Some(EventKind::TimeTag);
        }
        match word >> 28 {
            BUCKET_NIBBLE => Some(EventKind::Bucket),
            GANTRY_NIBBLE => Some(EventKind::Gantry),
            MONITOR_NIBBLE => Some(EventKind::PatientMonitor),
            CONTROL_NIBBLE => Some(EventKind::Control),
            _ => None,
        }
    }
}

/// Which external collaborator a motion-related tag belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionTag {
    /// Gantry / bed position.
    Gantry,
    /// Patient monitoring (respiratory, cardiac, motion tracking).
    PatientMonitor,
}

/// A decoded list-mode record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventRecord {
    /// Prompt coincidence with its LOR code.
    PromptCoincidence { lor: u32 },
    /// Delayed coincidence with its LOR code.
    DelayedCoincidence { lor: u32 },
    /// Time tag advancing the clock.
    TimeTag { increment_ms: u32 },
    /// Singles count for one bucket.
    Bucket { bucket: u16, delta: u32 },
    /// Gantry or patient-monitoring tag, opaque to histogramming.
    GantryOrMotion { tag: MotionTag, payload: u32 },
    /// Control tag, opaque to histogramming.
    Control { payload: u32 },
}

impl EventRecord {
    /// Decode one raw word.
    ///
    /// Returns `None` if the tag bits match no known kind.
    #[inline]
    #[must_use]
    pub fn decode(word: u32) -> Option<Self> {
        let record = match EventKind::classify(word)? {
            EventKind::Prompt => EventRecord::PromptCoincidence {
                lor: word & LOR_MASK,
            },
            EventKind::Delayed => EventRecord::DelayedCoincidence {
                lor: word & LOR_MASK,
            },
            EventKind::TimeTag => EventRecord::TimeTag {
                increment_ms: word & TIME_TAG_MASK,
            },
            EventKind::Bucket => EventRecord::Bucket {
                // 9 bits
                bucket: ((word >> BUCKET_SHIFT) & BUCKET_MASK) as u16,
                delta: word & DELTA_MASK,
            },
            EventKind::Gantry => EventRecord::GantryOrMotion {
                tag: MotionTag::Gantry,
                payload: word & TAG_PAYLOAD_MASK,
            },
            EventKind::PatientMonitor => EventRecord::GantryOrMotion {
                tag: MotionTag::PatientMonitor,
                payload: word & TAG_PAYLOAD_MASK,
            },
            EventKind::Control => EventRecord::Control {
                payload: word & TAG_PAYLOAD_MASK,
            },
        };
        Some(record)
    }

    /// Encode back into a raw word. Payloads wider than their field are truncated.
    #[must_use]
    pub fn encode(&self) -> u32 {
        match *self {
            EventRecord::PromptCoincidence { lor } => PROMPT_FLAG | (lor & LOR_MASK),
            EventRecord::DelayedCoincidence { lor } => lor & LOR_MASK,
            EventRecord::TimeTag { increment_ms } => TIME_TAG_BITS | (increment_ms & TIME_TAG_MASK),
            EventRecord::Bucket { bucket, delta } => {
                (BUCKET_NIBBLE << 28)
                    | ((u32::from(bucket) & BUCKET_MASK) << BUCKET_SHIFT)
                    | (delta & DELTA_MASK)
            }
            EventRecord::GantryOrMotion { tag, payload } => {
                let nibble = match tag {
                    MotionTag::Gantry => GANTRY_NIBBLE,
                    MotionTag::PatientMonitor => MONITOR_NIBBLE,
                };
                (nibble << 28) | (payload & TAG_PAYLOAD_MASK)
            }
            EventRecord::Control { payload } => (CONTROL_NIBBLE << 28) | (payload & TAG_PAYLOAD_MASK),
        }
    }

    /// Returns the kind of this record.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            EventRecord::PromptCoincidence { .. } => EventKind::Prompt,
            EventRecord::DelayedCoincidence { .. } => EventKind::Delayed,
            EventRecord::TimeTag { .. } => EventKind::TimeTag,
            EventRecord::Bucket { .. } => EventKind::Bucket,
            EventRecord::GantryOrMotion {
                tag: MotionTag::Gantry,
                ..
            } => EventKind::Gantry,
            EventRecord::GantryOrMotion {
                tag: MotionTag::PatientMonitor,
                ..
            } => EventKind::PatientMonitor,
            EventRecord::Control { .. } => EventKind::Control,
        }
    }

    /// Returns true for prompt and delayed coincidences.
    #[must_use]
    pub fn is_coincidence(&self) -> bool {
        matches!(
            self,
            EventRecord::PromptCoincidence { .. } | EventRecord::DelayedCoincidence { .. }
        )
    }
}

/// Increment carried by a time-tag word, without a full decode.
#[inline]
#[must_use]
pub fn time_tag_increment(word: u32) -> Option<u32> {
    (word & TIME_TAG_SELECT == TIME_TAG_BITS).then_some(word & TIME_TAG_MASK)
}
