use std::mem;

/// Size of one kernel `struct input_event`.
pub const EVENT_SIZE: usize = mem::size_of::<libc::timeval>() + 8;

/// Records read from the device in one go.
pub const BATCH_EVENTS: usize = 64;

pub const EV_KEY: u16 = 0x01;
pub const EV_ABS: u16 = 0x03;
pub const BTN_TOUCH: u16 = 330;
pub const ABS_Y: u16 = 0x01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchRecord {
    pub kind: u16,
    pub code: u16,
    pub value: i32,
}

/// Splits raw device bytes into records; a trailing partial record is dropped.
pub fn decode_records(buf: &[u8]) -> Vec<TouchRecord> {
    let header = mem::size_of::<libc::timeval>();
    buf.chunks_exact(EVENT_SIZE)
        .map(|raw| {
            let body = &raw[header..];
            TouchRecord {
                kind: u16::from_ne_bytes([body[0], body[1]]),
                code: u16::from_ne_bytes([body[2], body[3]]),
                value: i32::from_ne_bytes([body[4], body[5], body[6], body[7]]),
            }
        })
        .collect()
}

/// Maps one batch onto a page key: a press whose row lies past `midpoint`
/// pages forward, any other positive row pages back.
pub fn translate_touch(records: &[TouchRecord], midpoint: i32) -> Option<u8> {
    let pressed = records
        .iter()
        .any(|r| r.kind == EV_KEY && r.code == BTN_TOUCH && r.value == 1);
    if !pressed {
        return None;
    }
    records
        .iter()
        .filter(|r| r.kind == EV_ABS && r.code == ABS_Y)
        .find_map(|r| {
            if r.value > midpoint {
                Some(b'J')
            } else if r.value > 0 {
                Some(b'K')
            } else {
                None
            }
        })
}

#[cfg(test)]
pub(crate) fn encode_record(record: TouchRecord) -> Vec<u8> {
    let mut raw = vec![0u8; mem::size_of::<libc::timeval>()];
    raw.extend_from_slice(&record.kind.to_ne_bytes());
    raw.extend_from_slice(&record.code.to_ne_bytes());
    raw.extend_from_slice(&record.value.to_ne_bytes());
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press() -> TouchRecord {
        TouchRecord {
            kind: EV_KEY,
            code: BTN_TOUCH,
            value: 1,
        }
    }

    fn row(value: i32) -> TouchRecord {
        TouchRecord {
            kind: EV_ABS,
            code: ABS_Y,
            value,
        }
    }

    #[test]
    fn lower_half_pages_forward_upper_half_back() {
        assert_eq!(translate_touch(&[press(), row(1500)], 1056), Some(b'J'));
        assert_eq!(translate_touch(&[row(300), press()], 1056), Some(b'K'));
        assert_eq!(translate_touch(&[press(), row(1056)], 1056), Some(b'K'));
    }

    #[test]
    fn batch_without_press_is_ignored() {
        let release = TouchRecord {
            value: 0,
            ..press()
        };
        assert_eq!(translate_touch(&[release, row(1500)], 1056), None);
        assert_eq!(translate_touch(&[row(1500)], 1056), None);
    }

    #[test]
    fn first_positive_row_wins() {
        let records = [press(), row(0), row(2000), row(10)];
        assert_eq!(translate_touch(&records, 1056), Some(b'J'));
        assert_eq!(translate_touch(&[press(), row(0)], 1056), None);
    }

    #[test]
    fn records_decode_from_raw_bytes() {
        let mut raw = encode_record(press());
        raw.extend(encode_record(row(-7)));
        raw.extend([1, 2, 3]);
        assert_eq!(decode_records(&raw), vec![press(), row(-7)]);
    }
}
