//! Minimal printf-style formatter for the serial port.
//!
//! Supported directives:
//!
//! | Directive | Argument            | Output            |
//! |-----------|---------------------|-------------------|
//! | `%c`      | 8-bit unsigned      | decimal           |
//! | `%h`      | 16-bit unsigned     | decimal           |
//! | `%d`      | 32-bit unsigned     | decimal           |
//! | `%s`      | borrowed string     | verbatim          |
//! | `%%`      | none                | `%`               |
//!
//! A directive may carry a width (`%6h`) that pads with spaces on the left,
//! or on the right when prefixed with `-` (`%-4c`). Text longer than the width
//! is never truncated.
//!
//! Arguments are a tagged [`Arg`] slice consumed left to right. A numeric
//! directive accepts any numeric argument whose value fits its width; a
//! missing or mismatched argument renders nothing for that field and the scan
//! continues. Numbers are converted into a stack buffer ([`Decimal`]), so
//! formatting never allocates.

use log::warn;

/// Byte-oriented output, e.g. a UART transmit register.
pub trait ByteSink {
    /// Write one byte.
    fn put(
        &mut self,
        byte: u8,
    );

    /// Write every byte of `bytes`.
    fn put_bytes(
        &mut self,
        bytes: &[u8],
    ) {
        for &byte in bytes {
            self.put(byte);
        }
    }

    /// Write a string.
    fn put_str(
        &mut self,
        text: &str,
    ) {
        self.put_bytes(text.as_bytes());
    }
}

/// Capture sink. Bytes past the capacity are dropped.
impl<const N: usize> ByteSink for heapless::Vec<u8, N> {
    fn put(
        &mut self,
        byte: u8,
    ) {
        self.push(byte).ok();
    }
}

impl<S: ByteSink + ?Sized> ByteSink for &mut S {
    fn put(
        &mut self,
        byte: u8,
    ) {
        (**self).put(byte);
    }
}

/// One positional formatter argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arg<'a> {
    /// Value for `%c`.
    Narrow(u8),
    /// Value for `%h`.
    Medium(u16),
    /// Value for `%d`.
    Wide(u32),
    /// Value for `%s`. Borrowed, never copied.
    Str(&'a str),
}

impl Arg<'_> {
    /// Numeric value of the argument, if it is a number.
    const fn number(&self) -> Option<u32> {
        match *self {
            Self::Narrow(v) => Some(v as u32),
            Self::Medium(v) => Some(v as u32),
            Self::Wide(v) => Some(v),
            Self::Str(_) => None,
        }
    }
}

/// Decimal rendering of a `u32`, held by value.
#[derive(Clone, Copy, Debug)]
pub struct Decimal {
    digits: [u8; 10],
    start: usize,
}

impl Decimal {
    pub fn new(mut value: u32) -> Self {
        let mut digits = [b'0'; 10];
        let mut start = digits.len();
        loop {
            start -= 1;
            digits[start] = b'0' + (value % 10) as u8;
            value /= 10;
            if value == 0 {
                break;
            }
        }
        Self { digits, start }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] { &self.digits[self.start..] }

    #[cfg(test)]
    pub fn as_str(&self) -> &str {
        // Only ASCII digits are ever stored.
        core::str::from_utf8(self.as_bytes()).unwrap_or("")
    }
}

/// Parsed width and alignment of one directive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Padding {
    width: usize,
    left: bool,
}

impl Padding {
    fn emit<S: ByteSink + ?Sized>(
        self,
        sink: &mut S,
        text: &[u8],
    ) {
        let fill = self.width.saturating_sub(text.len());
        if !self.left {
            put_spaces(sink, fill);
        }
        sink.put_bytes(text);
        if self.left {
            put_spaces(sink, fill);
        }
    }
}

fn put_spaces<S: ByteSink + ?Sized>(
    sink: &mut S,
    count: usize,
) {
    for _ in 0..count {
        sink.put(b' ');
    }
}

/// Largest value each numeric directive accepts.
const fn directive_limit(directive: u8) -> Option<u32> {
    match directive {
        b'c' => Some(u8::MAX as u32),
        b'h' => Some(u16::MAX as u32),
        b'd' => Some(u32::MAX),
        _ => None,
    }
}

/// Render `template` with `args` into `sink`.
pub fn write_formatted<S: ByteSink + ?Sized>(
    sink: &mut S,
    template: &str,
    args: &[Arg<'_>],
) {
    let bytes = template.as_bytes();
    let mut pos = 0;
    let mut next_arg = 0;

    while pos < bytes.len() {
        let byte = bytes[pos];
        pos += 1;
        if byte != b'%' {
            sink.put(byte);
            continue;
        }

        let mut padding = Padding::default();
        if bytes.get(pos) == Some(&b'-') {
            padding.left = true;
            pos += 1;
        }
        while let Some(digit) = bytes.get(pos).filter(|b| b.is_ascii_digit()) {
            padding.width = padding.width.saturating_mul(10).saturating_add(usize::from(digit - b'0'));
            pos += 1;
        }

        // Trailing '%' (with or without a width) ends the scan.
        let Some(&directive) = bytes.get(pos) else {
            break;
        };
        pos += 1;

        match directive {
            b'%' => sink.put(b'%'),
            b's' => {
                match args.get(next_arg) {
                    Some(Arg::Str(text)) => padding.emit(sink, text.as_bytes()),
                    other => warn!("format: %s field {} skipped ({:?})", next_arg, other),
                }
                next_arg += 1;
            }
            b'c' | b'h' | b'd' => {
                let limit = directive_limit(directive).unwrap_or(0);
                match args.get(next_arg).and_then(Arg::number).filter(|v| *v <= limit) {
                    Some(value) => padding.emit(sink, Decimal::new(value).as_bytes()),
                    None => warn!("format: %{} field {} skipped", directive as char, next_arg),
                }
                next_arg += 1;
            }
            other => warn!("format: unknown directive %{}", other as char),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use heapless::Vec;

    use super::*;

    fn render(
        template: &str,
        args: &[Arg<'_>],
    ) -> Vec<u8, 128> {
        let mut out: Vec<u8, 128> = Vec::new();
        write_formatted(&mut out, template, args);
        out
    }

    #[test]
    fn test_plain_text_passthrough() {
        assert_eq!(render("hello\r\n", &[]).as_slice(), b"hello\r\n");
    }

    #[test]
    fn test_left_justified_narrow() {
        assert_eq!(render("%-4c,", &[Arg::Narrow(7)]).as_slice(), b"7   ,");
    }

    #[test]
    fn test_right_justified_default() {
        assert_eq!(render("[%4h]", &[Arg::Medium(42)]).as_slice(), b"[  42]");
        assert_eq!(render("[%13s]", &[Arg::Str("IDLE")]).as_slice(), b"[         IDLE]");
    }

    #[test]
    fn test_string_unchanged() {
        assert_eq!(render("%s", &[Arg::Str("hi")]).as_slice(), b"hi");
    }

    #[test]
    fn test_width_never_truncates() {
        assert_eq!(render("%2d", &[Arg::Wide(123_456)]).as_slice(), b"123456");
        assert_eq!(render("%-1s|", &[Arg::Str("abc")]).as_slice(), b"abc|");
    }

    #[test]
    fn test_percent_literal() {
        assert_eq!(render("%c%%", &[Arg::Narrow(50)]).as_slice(), b"50%");
        assert_eq!(render("100%%", &[]).as_slice(), b"100%");
    }

    #[test]
    fn test_multiple_args_in_order() {
        let out = render(
            "%c.%c %h %d %s",
            &[Arg::Narrow(12), Arg::Narrow(3), Arg::Medium(512), Arg::Wide(70_000), Arg::Str("ok")],
        );
        assert_eq!(out.as_slice(), b"12.3 512 70000 ok");
    }

    #[test]
    fn test_zero_renders_single_digit() {
        assert_eq!(render("%d", &[Arg::Wide(0)]).as_slice(), b"0");
        assert_eq!(Decimal::new(0).as_str(), "0");
        assert_eq!(Decimal::new(u32::MAX).as_str(), "4294967295");
    }

    #[test]
    fn test_trailing_percent_stops() {
        assert_eq!(render("abc%", &[]).as_slice(), b"abc");
        assert_eq!(render("abc%-4", &[Arg::Narrow(1)]).as_slice(), b"abc");
    }

    #[test]
    fn test_missing_argument_skips_field() {
        assert_eq!(render("a%cb%sc", &[]).as_slice(), b"abc");
    }

    #[test]
    fn test_mismatched_argument_skips_field() {
        // Strings are not numbers and numbers are not strings.
        assert_eq!(render("<%c>", &[Arg::Str("x")]).as_slice(), b"<>");
        assert_eq!(render("<%s>", &[Arg::Wide(1)]).as_slice(), b"<>");
        // A 16-bit value does not fit %c.
        assert_eq!(render("<%c>", &[Arg::Medium(300)]).as_slice(), b"<>");
        // ...but a narrow value widens into %d.
        assert_eq!(render("<%d>", &[Arg::Narrow(9)]).as_slice(), b"<9>");
    }

    #[test]
    fn test_skipped_field_still_consumes_argument() {
        let out = render("%c|%c", &[Arg::Str("bad"), Arg::Narrow(2)]);
        assert_eq!(out.as_slice(), b"|2");
    }

    #[test]
    fn test_unknown_directive_emits_nothing() {
        assert_eq!(render("a%qb", &[]).as_slice(), b"ab");
    }
}
