//! Register window layouts.
//!
//! Every peripheral exposes the same shape: a small window of 32-bit
//! registers at word-aligned offsets. A [`Layout`] names those registers,
//! says which of them accept stores through the attribute surface and lists
//! the values programmed when the peripheral comes up.

use core::fmt;

/// Width of every register, in bytes.
pub const WORD: usize = 4;

/// Span of the register window of every peripheral in this family.
pub const SPAN: usize = 16;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AccessMode {
    ReadWrite,
    /// Stores through the attribute surface are accepted and discarded.
    ReadOnly,
}

/// How an attribute renders its value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Radix {
    Hex,
    Decimal,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    /// Text shown before the value, `None` to show the bare value.
    pub label: Option<&'static str>,
    pub offset: usize,
    pub access: AccessMode,
    pub radix: Radix,
}

impl FieldDef {
    pub const fn new(name: &'static str, offset: usize) -> Self {
        Self {
            name,
            label: None,
            offset,
            access: AccessMode::ReadWrite,
            radix: Radix::Hex,
        }
    }

    pub const fn label(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }

    pub const fn read_only(mut self) -> Self {
        self.access = AccessMode::ReadOnly;
        self
    }

    pub const fn decimal(mut self) -> Self {
        self.radix = Radix::Decimal;
        self
    }

    pub fn is_writable(&self) -> bool {
        self.access == AccessMode::ReadWrite
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Layout {
    /// Name of the raw character device, e.g. `rgb_led`.
    pub device_name: &'static str,
    /// Device tree `compatible` string the peripheral is matched against.
    pub compatible: &'static str,
    pub span: usize,
    pub fields: &'static [FieldDef],
    /// Values programmed when the peripheral becomes active, in order.
    pub defaults: &'static [(&'static str, u32)],
}

impl Layout {
    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn offset_of(&self, name: &str) -> Option<usize> {
        self.field(name).map(|f| f.offset)
    }

    pub fn field_at(&self, offset: usize) -> Option<&'static FieldDef> {
        self.fields.iter().find(|f| f.offset == offset)
    }

    /// Word-aligned offsets of the window, whether or not a field lives there.
    pub fn offsets(&self) -> impl Iterator<Item=usize> {
        (0..self.span).step_by(WORD)
    }

    /// Checks that fields are word-aligned, inside the span, disjoint and
    /// uniquely named, and that every default names a writable field.
    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.span == 0 {
            return Err(LayoutError::EmptySpan);
        }
        if self.span % WORD != 0 {
            return Err(LayoutError::SpanNotWordMultiple { span: self.span });
        }

        for (i, field) in self.fields.iter().enumerate() {
            if field.offset % WORD != 0 {
                return Err(LayoutError::Misaligned { name: field.name, offset: field.offset });
            }
            if field.offset >= self.span {
                return Err(LayoutError::OutOfSpan { name: field.name, offset: field.offset, span: self.span });
            }
            for other in &self.fields[..i] {
                if other.name == field.name {
                    return Err(LayoutError::DuplicateName(field.name));
                }
                if other.offset == field.offset {
                    return Err(LayoutError::Overlap { first: other.name, second: field.name, offset: field.offset });
                }
            }
        }

        for &(name, _) in self.defaults {
            match self.field(name) {
                Some(f) if f.is_writable() => {},
                _ => return Err(LayoutError::UnknownDefault(name)),
            }
        }

        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LayoutError {
    EmptySpan,
    SpanNotWordMultiple { span: usize },
    Misaligned { name: &'static str, offset: usize },
    OutOfSpan { name: &'static str, offset: usize, span: usize },
    Overlap { first: &'static str, second: &'static str, offset: usize },
    DuplicateName(&'static str),
    UnknownDefault(&'static str),
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySpan => write!(f, "window span is zero"),
            Self::SpanNotWordMultiple { span } => write!(f, "window span {span} is not a multiple of {WORD}"),
            Self::Misaligned { name, offset } => write!(f, "field {name} at {offset:#x} is not word-aligned"),
            Self::OutOfSpan { name, offset, span } => write!(f, "field {name} at {offset:#x} is outside the {span}-byte window"),
            Self::Overlap { first, second, offset } => write!(f, "fields {first} and {second} both live at {offset:#x}"),
            Self::DuplicateName(name) => write!(f, "field {name} is declared twice"),
            Self::UnknownDefault(name) => write!(f, "default names {name}, which is not a writable field"),
        }
    }
}

///////////////////////////////////////////////////////////////////////
// Buzzer

pub static BUZZER: Layout = Layout {
    device_name: "buzzer",
    compatible: "Howard,buzzer",
    span: SPAN,
    fields: &[
        FieldDef::new("volume", 0x0).label("Volume"),
        FieldDef::new("pitch",  0x4).label("Pitch"),
    ],
    defaults: &[
        ("volume", 0x0),
        ("pitch",  0x0106),
    ],
};

///////////////////////////////////////////////////////////////////////
// LED array

pub static LED_ARRAY: Layout = Layout {
    device_name: "led_array",
    compatible: "Howard,array",
    span: SPAN,
    fields: &[
        FieldDef::new("led_array", 0x0).decimal(),
    ],
    defaults: &[
        ("led_array", 0xff),
    ],
};

///////////////////////////////////////////////////////////////////////
// RGB LED controller
//
// Two register orders are in circulation for this core: the driver places
// the duty cycles first and the period last, the userspace demo programs
// place the period first. Pick the one matching the synthesized core.

const RGB_DEFAULTS: &[(&str, u32)] = &[
    ("period",           1),
    ("red_duty_cycle",   0),
    ("green_duty_cycle", 0),
    ("blue_duty_cycle",  0),
];

pub static RGB_LED: Layout = Layout {
    device_name: "rgb_led",
    compatible: "Howard,rgb_led",
    span: SPAN,
    fields: &[
        FieldDef::new("red_duty_cycle",   0x0).label("Red duty cycle"),
        FieldDef::new("green_duty_cycle", 0x4).label("Green duty cycle"),
        FieldDef::new("blue_duty_cycle",  0x8).label("Blue duty cycle"),
        FieldDef::new("period",           0xc).label("Period").decimal(),
    ],
    defaults: RGB_DEFAULTS,
};

pub static RGB_LED_PERIOD_FIRST: Layout = Layout {
    device_name: "rgb_led",
    compatible: "Howard,rgb_led",
    span: SPAN,
    fields: &[
        FieldDef::new("period",           0x0).label("Period").decimal(),
        FieldDef::new("red_duty_cycle",   0x4).label("Red duty cycle"),
        FieldDef::new("green_duty_cycle", 0x8).label("Green duty cycle"),
        FieldDef::new("blue_duty_cycle",  0xc).label("Blue duty cycle"),
    ],
    defaults: RGB_DEFAULTS,
};

///////////////////////////////////////////////////////////////////////
// Rotary encoder
//
// Both registers are status from the control side. The attribute surface
// still offers a store for them, which discards its input.

pub static ROTARY: Layout = Layout {
    device_name: "rotary",
    compatible: "Kaiser,rotary",
    span: SPAN,
    fields: &[
        FieldDef::new("output", 0x0).label("Output").read_only(),
        FieldDef::new("enable", 0x4).label("enable").read_only(),
    ],
    defaults: &[],
};

/// Every layout shipped with this crate.
pub static ALL: [&Layout; 5] = [&BUZZER, &LED_ARRAY, &RGB_LED, &RGB_LED_PERIOD_FIRST, &ROTARY];

pub fn by_compatible(compatible: &str) -> Option<&'static Layout> {
    ALL.iter().copied().find(|l| l.compatible == compatible)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipped_layouts_are_valid() {
        for layout in ALL {
            assert_eq!(layout.validate(), Ok(()), "{}", layout.device_name);
        }
    }

    #[test]
    fn rgb_tables_cover_the_same_fields() {
        for field in RGB_LED.fields {
            assert!(RGB_LED_PERIOD_FIRST.field(field.name).is_some());
        }
        assert_eq!(RGB_LED.offset_of("period"), Some(0xc));
        assert_eq!(RGB_LED_PERIOD_FIRST.offset_of("period"), Some(0x0));
    }

    #[test]
    fn offsets_walk_the_window() {
        let offsets: Vec<usize> = BUZZER.offsets().collect();
        assert_eq!(offsets, [0, 4, 8, 12]);
        assert_eq!(BUZZER.field_at(4).map(|f| f.name), Some("pitch"));
        assert!(BUZZER.field_at(8).is_none());
    }

    #[test]
    fn rotary_fields_are_read_only() {
        assert!(ROTARY.fields.iter().all(|f| !f.is_writable()));
    }

    #[test]
    fn lookup_by_compatible() {
        assert_eq!(by_compatible("Howard,array"), Some(&LED_ARRAY));
        assert_eq!(by_compatible("Kaiser,rotary"), Some(&ROTARY));
        assert_eq!(by_compatible("Howard,nothing"), None);
    }

    static COLLIDING: Layout = Layout {
        device_name: "rgb_led",
        compatible: "Howard,rgb_led",
        span: SPAN,
        fields: &[
            FieldDef::new("red_duty_cycle",   0x8),
            FieldDef::new("green_duty_cycle", 0x4),
            FieldDef::new("blue_duty_cycle",  0x8),
        ],
        defaults: &[],
    };

    #[test]
    fn overlapping_fields_are_rejected() {
        assert_eq!(COLLIDING.validate(), Err(LayoutError::Overlap {
            first: "red_duty_cycle",
            second: "blue_duty_cycle",
            offset: 0x8,
        }));
    }

    #[test]
    fn misaligned_and_out_of_span_fields_are_rejected() {
        static MISALIGNED: Layout = Layout {
            device_name: "x", compatible: "x", span: SPAN,
            fields: &[FieldDef::new("a", 0x2)],
            defaults: &[],
        };
        static OUTSIDE: Layout = Layout {
            device_name: "x", compatible: "x", span: SPAN,
            fields: &[FieldDef::new("a", 0x10)],
            defaults: &[],
        };
        assert_eq!(MISALIGNED.validate(), Err(LayoutError::Misaligned { name: "a", offset: 2 }));
        assert_eq!(OUTSIDE.validate(), Err(LayoutError::OutOfSpan { name: "a", offset: 16, span: 16 }));
    }

    #[test]
    fn bad_spans_are_rejected() {
        static EMPTY: Layout = Layout {
            device_name: "x", compatible: "x", span: 0, fields: &[], defaults: &[],
        };
        static ODD: Layout = Layout {
            device_name: "x", compatible: "x", span: 6, fields: &[], defaults: &[],
        };
        assert_eq!(EMPTY.validate(), Err(LayoutError::EmptySpan));
        assert_eq!(ODD.validate(), Err(LayoutError::SpanNotWordMultiple { span: 6 }));
    }

    #[test]
    fn defaults_must_name_writable_fields() {
        static BAD_DEFAULT: Layout = Layout {
            device_name: "x", compatible: "x", span: SPAN,
            fields: &[FieldDef::new("status", 0x0).read_only()],
            defaults: &[("status", 1)],
        };
        assert_eq!(BAD_DEFAULT.validate(), Err(LayoutError::UnknownDefault("status")));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        static DUP: Layout = Layout {
            device_name: "x", compatible: "x", span: SPAN,
            fields: &[FieldDef::new("a", 0x0), FieldDef::new("a", 0x4)],
            defaults: &[],
        };
        assert_eq!(DUP.validate(), Err(LayoutError::DuplicateName("a")));
    }
}
