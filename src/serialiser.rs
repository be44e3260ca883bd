use crate::error::{OverlayError, Result};
use crate::position::OverlayPosition;
use crate::sync::{CaptionFrame, DisplaySurface};

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;
use std::time::Duration;

/// Output shared by every surface mounted during one run.
pub type SharedWriter = Rc<RefCell<Box<dyn Write>>>;

pub fn shared<W: Write + 'static>(writer: W) -> SharedWriter {
    let writer: Box<dyn Write> = Box::new(writer);
    Rc::new(RefCell::new(writer))
}

/// A display surface that prints each rendered frame as one line:
///
/// ```text
/// 00:00:01,500 [primary] 你好 | nǐ hǎo | hello
/// 00:00:04,250 [primary]
/// ```
pub struct TranscriptWriter {
    out: SharedWriter,
}

impl TranscriptWriter {
    pub fn new(out: SharedWriter) -> Self {
        Self { out }
    }
}

impl DisplaySurface for TranscriptWriter {
    fn render(&mut self, frame: &CaptionFrame) -> Result<()> {
        let mut out = self.out.borrow_mut();
        write_frame(&mut *out, frame).map_err(|err| OverlayError::Render(err.to_string()))
    }

    fn move_to(&mut self, position: OverlayPosition) -> Result<()> {
        let mut out = self.out.borrow_mut();
        writeln!(out, "-- overlay at ({}, {})", position.x, position.y)
            .map_err(|err| OverlayError::Render(err.to_string()))
    }
}

fn write_frame<W: Write + ?Sized>(buf: &mut W, frame: &CaptionFrame) -> std::io::Result<()> {
    write_ts(buf, frame.time)?;
    write!(buf, " [{}]", frame.source)?;
    if !frame.is_blank() {
        let slots: Vec<&str> = [&frame.text, &frame.phonetic, &frame.translation]
            .iter()
            .map(|s| s.as_str())
            .filter(|s| !s.is_empty())
            .collect();
        write!(buf, " {}", slots.join(" | "))?;
    }
    writeln!(buf)?;
    buf.flush()
}

fn write_ts<W: Write + ?Sized>(buf: &mut W, seconds: f64) -> std::io::Result<()> {
    let timestamp = match Duration::try_from_secs_f64(seconds) {
        Ok(timestamp) => timestamp,
        Err(_) => return write!(buf, "--:--:--,---"),
    };
    let total_secs = timestamp.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    let millis = timestamp.as_millis() % 1000;
    write!(
        buf,
        "{:02}:{:02}:{:02},{:03}",
        hours, minutes, seconds, millis
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caption::CaptionEntry;
    use crate::sync::FrameSource;
    use std::io::Cursor;

    macro_rules! test_write_ts {
        ($($name:ident: $value:expr,)*) => {
        $(
            #[test]
            fn $name() {
                let (input, expected) = $value;

                let mut buf = Cursor::new(vec![]);

                write_ts(&mut buf, input).expect("Failed to write to buffer");

                assert_eq!(String::from_utf8(buf.into_inner()).unwrap(), expected);
            }
        )*
        }
    }

    test_write_ts! {
        test_write_ts_0: (0.0, "00:00:00,000"),
        test_write_ts_1: (0.25, "00:00:00,250"),
        test_write_ts_2: (1.5, "00:00:01,500"),
        test_write_ts_3: (59.75, "00:00:59,750"),
        test_write_ts_4: (60.0, "00:01:00,000"),
        test_write_ts_5: (3600.0, "01:00:00,000"),
        test_write_ts_6: (7326.125, "02:02:06,125"),
        test_write_ts_7: (360000.0, "100:00:00,000"),
        test_write_ts_8: (-1.0, "--:--:--,---"),
        test_write_ts_9: (f64::NAN, "--:--:--,---"),
    }

    fn render_to_string(frame: &CaptionFrame) -> String {
        let mut buf = Cursor::new(vec![]);
        write_frame(&mut buf, frame).unwrap();
        String::from_utf8(buf.into_inner()).unwrap()
    }

    #[test]
    fn writes_non_empty_slots() {
        let entry = CaptionEntry {
            start: 0.0,
            end: 2.0,
            text: Some("你好".to_string()),
            phonetic: None,
            translation: Some("hello".to_string()),
        };
        let frame = CaptionFrame::from_entry(1.5, FrameSource::Primary, &entry);

        assert_eq!(render_to_string(&frame), "00:00:01,500 [primary] 你好 | hello\n");
    }

    #[test]
    fn writes_blank_frame_as_bare_timestamp() {
        let frame = CaptionFrame::blank(4.25, FrameSource::Fallback);
        assert_eq!(render_to_string(&frame), "00:00:04,250 [fallback]\n");
    }

    #[test]
    fn surfaces_share_one_output() {
        let buffer = Rc::new(RefCell::new(Vec::new()));

        struct Sink(Rc<RefCell<Vec<u8>>>);
        impl Write for Sink {
            fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
                self.0.borrow_mut().write(data)
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let out = shared(Sink(buffer.clone()));
        let mut first = TranscriptWriter::new(out.clone());
        let mut second = TranscriptWriter::new(out);

        first.move_to(OverlayPosition::new(3, 4)).unwrap();
        second.render(&CaptionFrame::blank(0.0, FrameSource::Primary)).unwrap();

        let written = String::from_utf8(buffer.borrow().clone()).unwrap();
        assert_eq!(written, "-- overlay at (3, 4)\n00:00:00,000 [primary]\n");
    }
}
