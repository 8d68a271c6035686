//! Keycode decoding for KD100 interrupt reports
//!
//! The key dial sends 40-byte reports on endpoint 0x81. A pressed button shows
//! up in one of three bytes, each carrying a different bank of codes:
//! - Byte 4: code as-is
//! - Byte 5: code + 128
//! - Byte 6: code + 256
//!
//! When byte 1 is 0xF1 the report belongs to the secondary bank (the wheel),
//! which adds another 512. The combined code is then looked up in a fixed
//! table to get a logical button index.

/// Length of one interrupt report
pub const REPORT_LEN: usize = 40;

/// Raw report as read from the device
pub type Report = [u8; REPORT_LEN];

/// Bank flag location and value
const BANK_FLAG_OFFSET: usize = 1;
const BANK_FLAG_VALUE: u8 = 241;
const BANK_BIAS: u16 = 512;

/// Keycode byte offsets in priority order, with the bias each one adds
const CODE_OFFSETS: [(usize, u16); 3] = [(4, 0), (5, 128), (6, 256)];

/// Known button codes; the position in this table is the logical index
pub const BUTTON_CODES: [u16; 19] = [
    1, 2, 4, 8, 16, 32, 64, 128, 129, 130, 132, 136, 144, 160, 192, 256, 257, 258, 260,
];

/// Number of logical buttons the hardware can produce (including the wheel toggle)
pub const BUTTON_COUNT: usize = BUTTON_CODES.len();

/// Index of the button in the middle of the wheel
pub const WHEEL_TOGGLE_INDEX: usize = 18;

/// Wheel rotation codes
pub const WHEEL_CW_CODE: u16 = 641;
pub const WHEEL_CCW_CODE: u16 = 642;

/// A decoded hardware event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalEvent {
    /// Button press by logical index
    Button(usize),
    /// Wheel turned clockwise
    WheelCw,
    /// Wheel turned counter-clockwise
    WheelCcw,
    /// Report with no key set - everything was released
    Idle,
}

/// Combine the keycode bytes of a report into one numeric code.
///
/// Missing bytes (short reports) read as zero.
pub fn raw_keycode(report: &[u8]) -> u16 {
    let byte = |i: usize| report.get(i).copied().unwrap_or(0);

    let mut code = CODE_OFFSETS
        .iter()
        .find(|(offset, _)| byte(*offset) != 0)
        .map(|(offset, bias)| u16::from(byte(*offset)) + bias)
        .unwrap_or(0);

    if byte(BANK_FLAG_OFFSET) == BANK_FLAG_VALUE {
        code += BANK_BIAS;
    }
    code
}

/// Map a numeric keycode to a logical event
pub fn lookup(code: u16) -> Option<LogicalEvent> {
    match code {
        0 => Some(LogicalEvent::Idle),
        WHEEL_CW_CODE => Some(LogicalEvent::WheelCw),
        WHEEL_CCW_CODE => Some(LogicalEvent::WheelCcw),
        _ => BUTTON_CODES
            .iter()
            .position(|&c| c == code)
            .map(LogicalEvent::Button),
    }
}

/// Decode a raw report. Unknown codes yield `None`.
pub fn decode(report: &[u8]) -> Option<LogicalEvent> {
    lookup(raw_keycode(report))
}

/// Short display name for a button index
pub fn button_name(index: usize) -> String {
    if index == WHEEL_TOGGLE_INDEX {
        "WHEEL".to_string()
    } else {
        format!("B{}", index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report_with(offset: usize, value: u8) -> Report {
        let mut r = [0u8; REPORT_LEN];
        r[offset] = value;
        r
    }

    #[test]
    fn test_primary_bank() {
        assert_eq!(decode(&report_with(4, 1)), Some(LogicalEvent::Button(0)));
        assert_eq!(decode(&report_with(4, 128)), Some(LogicalEvent::Button(7)));
    }

    #[test]
    fn test_biased_banks() {
        // 1 + 128 = 129 -> index 8
        assert_eq!(decode(&report_with(5, 1)), Some(LogicalEvent::Button(8)));
        // 4 + 256 = 260 -> wheel toggle
        assert_eq!(
            decode(&report_with(6, 4)),
            Some(LogicalEvent::Button(WHEEL_TOGGLE_INDEX))
        );
    }

    #[test]
    fn test_first_nonzero_offset_wins() {
        let mut r = report_with(4, 2);
        r[5] = 1;
        r[6] = 1;
        assert_eq!(decode(&r), Some(LogicalEvent::Button(1)));
    }

    #[test]
    fn test_wheel_codes() {
        // 129 + 512 = 641
        let mut r = report_with(5, 1);
        r[BANK_FLAG_OFFSET] = BANK_FLAG_VALUE;
        assert_eq!(decode(&r), Some(LogicalEvent::WheelCw));

        let mut r = report_with(5, 2);
        r[BANK_FLAG_OFFSET] = BANK_FLAG_VALUE;
        assert_eq!(decode(&r), Some(LogicalEvent::WheelCcw));
    }

    #[test]
    fn test_idle_and_unknown() {
        assert_eq!(decode(&[0u8; REPORT_LEN]), Some(LogicalEvent::Idle));
        assert_eq!(decode(&report_with(4, 3)), None);
        // Bank flag alone gives 512, which is not a known code
        assert_eq!(decode(&report_with(BANK_FLAG_OFFSET, BANK_FLAG_VALUE)), None);
    }

    #[test]
    fn test_short_reports_do_not_panic() {
        assert_eq!(decode(&[]), Some(LogicalEvent::Idle));
        assert_eq!(decode(&[0, 0, 0, 0, 16]), Some(LogicalEvent::Button(4)));
        assert_eq!(decode(&[0, 241]), None);
    }

    #[test]
    fn test_every_table_code_round_trips() {
        for (index, &code) in BUTTON_CODES.iter().enumerate() {
            assert_eq!(lookup(code), Some(LogicalEvent::Button(index)));
        }
    }
}
